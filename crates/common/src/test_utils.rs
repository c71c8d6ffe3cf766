//! Test utilities for carlink
//!
//! Provides a scripted [`MockTransport`] so driver behavior can be tested
//! without hardware: queue up reads (bytes, timeouts, errors) and inspect
//! everything the driver wrote.
//!
//! # Example
//!
//! ```
//! use common::test_utils::MockTransport;
//! use common::{DongleTransport, ReadOutcome};
//! use std::time::Duration;
//!
//! let transport = MockTransport::new();
//! transport.push_bytes(vec![1, 2, 3]);
//! let outcome = transport.read(Duration::from_millis(10)).unwrap();
//! assert_eq!(outcome, ReadOutcome::Data(vec![1, 2, 3]));
//! ```

use crate::transport::{DongleTransport, ReadOutcome, TransportError};
use protocol::{Message, MessageHeader};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted step of the mock's read side
#[derive(Debug, Clone)]
enum ReadStep {
    Data(Vec<u8>),
    TimedOut,
    Error(TransportError),
}

/// Scripted in-memory transport
///
/// Reads pop scripted steps in order; once the script is exhausted every
/// read reports a timeout, which keeps a driver read loop idling exactly
/// like a silent device. Writes are recorded, and failures can be injected
/// for the next N writes.
#[derive(Debug, Default)]
pub struct MockTransport {
    reads: Mutex<VecDeque<ReadStep>>,
    writes: Mutex<Vec<Vec<u8>>>,
    write_failures: Mutex<u32>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for one read
    pub fn push_bytes(&self, bytes: Vec<u8>) {
        self.reads
            .lock()
            .expect("mock lock")
            .push_back(ReadStep::Data(bytes));
    }

    /// Queue one whole encoded frame for one read
    pub fn push_frame(&self, message: &Message) {
        let bytes = protocol::encode(message).expect("encodable test message");
        self.push_bytes(bytes);
    }

    /// Queue one inbound frame from a raw type code and payload, for message
    /// types the host side never encodes
    pub fn push_inbound(&self, type_code: u32, payload: &[u8]) {
        let mut frame = MessageHeader::to_bytes(type_code, payload.len() as u32).to_vec();
        frame.extend_from_slice(payload);
        self.push_bytes(frame);
    }

    /// Queue a read timeout (device silent)
    pub fn push_timeout(&self) {
        self.reads
            .lock()
            .expect("mock lock")
            .push_back(ReadStep::TimedOut);
    }

    /// Queue a read error
    pub fn push_error(&self, error: TransportError) {
        self.reads
            .lock()
            .expect("mock lock")
            .push_back(ReadStep::Error(error));
    }

    /// Make the next `count` writes fail
    pub fn fail_next_writes(&self, count: u32) {
        *self.write_failures.lock().expect("mock lock") = count;
    }

    /// Every write the driver performed, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().expect("mock lock").clone()
    }

    /// All written bytes as one stream
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes().concat()
    }
}

impl DongleTransport for MockTransport {
    fn read(&self, timeout: Duration) -> Result<ReadOutcome, TransportError> {
        let step = self.reads.lock().expect("mock lock").pop_front();
        match step {
            Some(ReadStep::Data(bytes)) => Ok(ReadOutcome::Data(bytes)),
            Some(ReadStep::Error(error)) => Err(error),
            // block like a real bulk read with nothing to deliver
            Some(ReadStep::TimedOut) | None => {
                std::thread::sleep(timeout);
                Ok(ReadOutcome::TimedOut)
            }
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        {
            let mut failures = self.write_failures.lock().expect("mock lock");
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::Io("injected write failure".to_string()));
            }
        }
        self.writes.lock().expect("mock lock").push(bytes.to_vec());
        Ok(())
    }
}
