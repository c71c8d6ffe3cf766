//! Stream statistics
//!
//! Sliding-window frame-rate and bitrate counters fed by whoever consumes
//! the driver's `message` events. Pure bookkeeping: no clocks are read
//! except at the recording call sites.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Point-in-time view of a [`StreamStats`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Frames per second over the sliding window
    pub fps: f64,
    /// Bits per second over the sliding window
    pub bitrate_bps: f64,
    /// Frames recorded since construction
    pub total_frames: u64,
    /// Payload bytes recorded since construction
    pub total_bytes: u64,
    /// Most recently reported frame resolution
    pub resolution: Option<(u32, u32)>,
}

/// Sliding-window statistics for one media stream
#[derive(Debug)]
pub struct StreamStats {
    window: Duration,
    frames: VecDeque<(Instant, u64)>,
    total_frames: u64,
    total_bytes: u64,
    resolution: Option<(u32, u32)>,
}

impl StreamStats {
    /// Create a tracker with the given averaging window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            frames: VecDeque::new(),
            total_frames: 0,
            total_bytes: 0,
            resolution: None,
        }
    }

    /// Record one frame of `byte_len` payload bytes
    pub fn record_frame(&mut self, byte_len: usize, resolution: Option<(u32, u32)>) {
        self.record_at(Instant::now(), byte_len, resolution);
    }

    fn record_at(&mut self, at: Instant, byte_len: usize, resolution: Option<(u32, u32)>) {
        self.total_frames += 1;
        self.total_bytes += byte_len as u64;
        if resolution.is_some() {
            self.resolution = resolution;
        }
        self.frames.push_back((at, byte_len as u64));
        self.prune(at);
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&(at, _)) = self.frames.front() {
            if now.duration_since(at) > self.window {
                self.frames.pop_front();
            } else {
                break;
            }
        }
    }

    /// Current rates and totals
    pub fn snapshot(&mut self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&mut self, now: Instant) -> StatsSnapshot {
        self.prune(now);
        let secs = self.window.as_secs_f64();
        let window_bytes: u64 = self.frames.iter().map(|&(_, bytes)| bytes).sum();
        StatsSnapshot {
            fps: self.frames.len() as f64 / secs,
            bitrate_bps: window_bytes as f64 * 8.0 / secs,
            total_frames: self.total_frames,
            total_bytes: self.total_bytes,
            resolution: self.resolution,
        }
    }
}

impl Default for StreamStats {
    /// One-second window, matching the usual FPS readout
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
