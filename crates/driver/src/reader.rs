//! Bulk read loop
//!
//! Accumulates whatever the transport hands back and drains complete frames
//! out of it. Partial frames wait for more bytes; malformed payloads drop
//! their whole frame; corrupted headers trigger a byte-wise resync with a
//! bounded budget.

use crate::driver::Shared;
use crate::events::{DriverEvent, FailureReason};
use bytes::{Buf, BytesMut};
use common::{DongleTransport, ReadOutcome};
use protocol::DecodeOutcome;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace, warn};

const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// Body of the `carlink-read` thread
pub(crate) fn run_read_loop(shared: &Arc<Shared>, transport: Arc<dyn DongleTransport>) {
    debug!("read thread started");
    let mut buffer = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    let mut resync_attempts = 0u32;

    while shared.running.load(Ordering::SeqCst) {
        match transport.read(shared.tuning.read_timeout) {
            // a silent dongle is normal between frames
            Ok(ReadOutcome::TimedOut) => continue,
            Ok(ReadOutcome::Data(chunk)) => {
                shared.clear_errors();
                buffer.extend_from_slice(&chunk);
                if drain(shared, &mut buffer, &mut resync_attempts).is_break() {
                    return;
                }
            }
            Err(err) => {
                warn!("bulk read failed: {err}");
                if shared.note_transport_error() {
                    return;
                }
            }
        }
    }
    debug!(
        leftover = buffer.len(),
        "read thread exiting, discarding buffered bytes"
    );
}

/// Decode every complete frame currently buffered
fn drain(
    shared: &Arc<Shared>,
    buffer: &mut BytesMut,
    resync_attempts: &mut u32,
) -> ControlFlow<()> {
    loop {
        match protocol::decode(buffer) {
            Ok(DecodeOutcome::NeedMoreData) => return ControlFlow::Continue(()),
            Ok(DecodeOutcome::Message { message, consumed }) => {
                buffer.advance(consumed);
                *resync_attempts = 0;
                trace!(kind = message.kind(), bytes = consumed, "message decoded");
                shared
                    .events
                    .publish(&DriverEvent::Message(Arc::new(message)));
            }
            Ok(DecodeOutcome::Dropped {
                type_code,
                consumed,
                reason,
            }) => {
                // frame boundary is intact, only the payload is bad
                warn!(type_code, "dropping malformed frame: {reason}");
                buffer.advance(consumed);
                *resync_attempts = 0;
            }
            Err(err) => {
                *resync_attempts += 1;
                if *resync_attempts > shared.tuning.resync_budget {
                    shared.fail(FailureReason::ResyncExhausted {
                        attempts: *resync_attempts,
                    });
                    return ControlFlow::Break(());
                }
                trace!(attempt = *resync_attempts, "resync skip: {err}");
                buffer.advance(1);
            }
        }
    }
}
