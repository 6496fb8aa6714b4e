// src/config.rs
//
// Looper configuration and crossfade length derivation.

use crate::error::{LooperError, Result};

/// Upper bound (exclusive) for the crossfade duration in milliseconds.
pub const MAX_CROSSFADE_MS: f64 = 2000.0;

/// Crossfade duration used when none is configured.
pub const DEFAULT_CROSSFADE_MS: f64 = 200.0;

/// Longest internal fallback buffer in seconds.
pub const MAX_INTERNAL_BUFFER_SECONDS: f64 = 3600.0;

/// Stream-start configuration for a looper.
#[derive(Debug, Clone, PartialEq)]
pub struct LooperConfig {
    /// Crossfade duration in milliseconds, `0 <= ms < MAX_CROSSFADE_MS`.
    pub crossfade_ms: f64,

    /// Length of the private buffer allocated when no storage is attached
    /// at `prepare`. `None` leaves the looper unavailable instead.
    pub internal_buffer_seconds: Option<f64>,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            crossfade_ms: DEFAULT_CROSSFADE_MS,
            internal_buffer_seconds: None,
        }
    }
}

impl LooperConfig {
    pub fn with_crossfade_ms(mut self, ms: f64) -> Self {
        self.crossfade_ms = ms;
        self
    }

    pub fn with_internal_buffer(mut self, seconds: f64) -> Self {
        self.internal_buffer_seconds = Some(seconds);
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_crossfade_ms(self.crossfade_ms)?;
        if let Some(seconds) = self.internal_buffer_seconds {
            if !(seconds > 0.0 && seconds <= MAX_INTERNAL_BUFFER_SECONDS) {
                return Err(LooperError::InternalBufferOutOfRange(seconds));
            }
        }
        Ok(())
    }
}

/// Accept a crossfade duration if it lies in `[0, MAX_CROSSFADE_MS)`.
pub fn validate_crossfade_ms(ms: f64) -> Result<f64> {
    if (0.0..MAX_CROSSFADE_MS).contains(&ms) {
        Ok(ms)
    } else {
        Err(LooperError::CrossfadeOutOfRange(ms))
    }
}

/// Reject sample rates the looper cannot size its caches from.
pub fn validate_sample_rate(sample_rate: f64) -> Result<f64> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(sample_rate)
    } else {
        Err(LooperError::InvalidSampleRate(sample_rate))
    }
}

/// Crossfade length in frames: truncated to whole frames, then rounded
/// up to the next even count so the window splits into two halves.
#[inline]
pub fn crossfade_frames(sample_rate: f64, ms: f64) -> usize {
    let frames = (sample_rate * ms / 1000.0) as usize;
    frames + frames % 2
}

/// Capacity of the pre-buffer and fade caches: half of the longest
/// crossfade the stream can be configured with.
#[inline]
pub fn fade_capacity(sample_rate: f64) -> usize {
    let max_xfade = (sample_rate * MAX_CROSSFADE_MS / 1000.0) as usize;
    max_xfade.div_ceil(2)
}
