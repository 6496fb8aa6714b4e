// src/command.rs
//
// Commands from the control thread to the audio thread.
//
// Commands are the ONLY way the control side can mutate the looper.
// They are queued and applied at the start of the next audio block.

use std::sync::Arc;

use crate::looper::State;
use crate::storage::SampleBuffer;

/// A command from the control thread to the looper.
#[derive(Debug, Clone)]
pub enum Command {
    /// Start/stop recording.
    Tap,

    /// Abort the loop or recording.
    Reset,

    /// Reconfigure the crossfade (already range-checked).
    SetCrossfade { ms: f64 },

    /// Attach, swap or detach the loop buffer.
    SetBuffer { buffer: Option<Arc<SampleBuffer>> },
}

/// Snapshot of the audio-thread state for the control side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LooperReadback {
    pub state: State,

    /// Normalized loop position of the last frame, `-1.0` while unavailable.
    pub position: f32,

    pub loop_length: usize,
    pub xfade_length: usize,

    /// The loop buffer was acquired for the last block.
    pub available: bool,
}
