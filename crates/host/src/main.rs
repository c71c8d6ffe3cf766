//! carlink-host: stream a CarPlay/Android-Auto dongle session to the log
//!
//! Opens the first attached dongle, runs the driver, and reports what the
//! phone sends: connection phases, stream statistics, media metadata. Video
//! and audio payloads are counted, not rendered; wiring them into a decoder
//! is the embedding application's job.

mod config;

use crate::config::HostConfig;
use anyhow::Context;
use clap::Parser;
use common::{StreamStats, setup_logging};
use driver::{DongleDriver, DriverEvent, EventKind, UsbDongleTransport};
use protocol::{MediaPayload, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "carlink-host", version, about = "CarPlay/Android-Auto dongle host")]
struct Args {
    /// Config file path (default: <config dir>/carlink/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Log filter override, e.g. "debug" or "driver=trace"
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref()).context("loading configuration")?;
    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    setup_logging(level)?;
    run(&config)
}

fn run(config: &HostConfig) -> anyhow::Result<()> {
    let transport = UsbDongleTransport::open_first().context("opening dongle")?;
    let mut driver = DongleDriver::with_tuning(config.driver.tuning());

    let stats = Arc::new(Mutex::new(StreamStats::default()));
    let failed = Arc::new(AtomicBool::new(false));

    {
        let stats = stats.clone();
        driver.events().subscribe(EventKind::Message, move |event| {
            if let DriverEvent::Message(message) = event {
                handle_message(message, &stats);
            }
        });
    }
    {
        let failed = failed.clone();
        driver.events().subscribe(EventKind::Failure, move |event| {
            if let DriverEvent::Failure(reason) = event {
                error!("dongle link failed: {reason}");
                failed.store(true, Ordering::SeqCst);
            }
        });
    }

    driver
        .initialize(Arc::new(transport))
        .context("initializing driver")?;
    driver
        .start(&config.connection)
        .context("starting session")?;
    info!("session started, waiting for a phone");

    let mut seconds = 0u64;
    while !failed.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_secs(1));
        seconds += 1;
        if config.stats_interval_secs > 0
            && seconds.is_multiple_of(config.stats_interval_secs)
            && let Ok(mut stats) = stats.lock()
        {
            let snap = stats.snapshot();
            if snap.total_frames > 0 {
                info!(
                    fps = format_args!("{:.1}", snap.fps),
                    kbps = format_args!("{:.0}", snap.bitrate_bps / 1000.0),
                    frames = snap.total_frames,
                    resolution = ?snap.resolution,
                    "video stream"
                );
            }
        }
    }

    driver.teardown();
    anyhow::bail!("dongle link failed")
}

fn handle_message(message: &Message, stats: &Mutex<StreamStats>) {
    match message {
        Message::Video(frame) => {
            if let Ok(mut stats) = stats.lock() {
                stats.record_frame(frame.data.len(), Some((frame.width, frame.height)));
            }
        }
        Message::Audio(_) => {}
        Message::Plugged { phone_type, wifi } => {
            info!(?phone_type, ?wifi, "phone connected");
        }
        Message::Unplugged => info!("phone disconnected"),
        Message::Phase(phase) => info!(phase, "connection phase"),
        Message::BluetoothAddress(addr) => info!(%addr, "dongle bluetooth address"),
        Message::BluetoothPin(pin) => info!(%pin, "bluetooth pairing pin"),
        Message::WifiDeviceName(ssid) => info!(%ssid, "dongle wifi network"),
        Message::SoftwareVersion(version) => info!(%version, "dongle firmware"),
        Message::Media(MediaPayload::Metadata(meta)) => info!(%meta, "now playing"),
        Message::Media(MediaPayload::AlbumCover(bytes)) => {
            info!(len = bytes.len(), "album cover received");
        }
        Message::Unknown { type_code, payload } => {
            warn!(type_code, len = payload.len(), "unhandled message type");
        }
        other => info!(kind = other.kind(), "message"),
    }
}
