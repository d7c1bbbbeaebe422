//! Conversion progress counter
//!
//! A single percentage shared between the thread running `convert` and any
//! number of observers.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Share of the scale given to the decode phase
pub const DECODE_PHASE_END: u8 = 50;
/// Highest value published before the trailer is written
pub const ENCODE_PHASE_END: u8 = 99;

/// Cloneable handle to a 0..=100 progress value.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    value: Arc<AtomicU8>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current percentage
    pub fn get(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    /// Raise the value to `percent`; lower values are ignored.
    pub(crate) fn advance(&self, percent: u8) {
        self.value.fetch_max(percent.min(100), Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }

    pub(crate) fn complete(&self) {
        self.value.store(100, Ordering::Relaxed);
    }

    /// Publish decode-phase progress from the demuxed position.
    pub(crate) fn decode_position(&self, position_secs: f64, duration_secs: f64) {
        self.advance(scale(position_secs, duration_secs, 0, DECODE_PHASE_END));
    }

    /// Publish encode-phase progress from samples drained out of the FIFO.
    pub(crate) fn encode_position(&self, drained: usize, total: usize) {
        self.advance(scale(
            drained as f64,
            total as f64,
            DECODE_PHASE_END,
            ENCODE_PHASE_END,
        ));
    }
}

fn scale(done: f64, total: f64, from: u8, to: u8) -> u8 {
    if total.is_nan() || total <= 0.0 || !done.is_finite() {
        return from;
    }
    let fraction = (done / total).clamp(0.0, 1.0);
    from + (fraction * f64::from(to - from)).floor() as u8
}
