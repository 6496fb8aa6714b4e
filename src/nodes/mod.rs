// src/nodes/mod.rs
//
// Node types for the looper engine.

mod looper;

pub use looper::*;

// ═══════════════════════════════════════════════════════════════════
// Parameter IDs
// ═══════════════════════════════════════════════════════════════════

pub mod params {
    /// Crossfade duration in milliseconds, `[0, 2000)`.
    pub const CROSSFADE_MS: u32 = 0;

    /// Trigger pulse: start/stop recording. The value is ignored.
    pub const TAP: u32 = 1;
}
