// src/lib.rs
//
// Library entry point: a tap-controlled drone looper with crossfaded loop
// boundaries, driven block by block from an audio callback.

mod audio_buffer;
mod bridge;
mod command;
mod config;
mod error;
mod event;
mod looper;
mod node;
mod nodes;
mod storage;


// Re-export key types for Rust consumers
pub use audio_buffer::AudioBuffer;
pub use bridge::{EngineHandle, LooperHandle, STATE_QUEUE_CAPACITY, create_bridge};
pub use command::{Command, LooperReadback};
pub use config::{
    DEFAULT_CROSSFADE_MS, LooperConfig, MAX_CROSSFADE_MS, MAX_INTERNAL_BUFFER_SECONDS,
    crossfade_frames, fade_capacity,
};
pub use error::{LooperError, Result};
pub use event::Event;
pub use looper::{
    FadeCaches, Fired, Frame, Looper, LooperContext, PreBuffer, Source, State, TRANSITIONS,
    Transition, crossfade_sample,
};
pub use node::{Node, ProcessContext};
pub use nodes::{LOOPER_CHANNELS, LooperNode, UNAVAILABLE_POSITION, params};
pub use storage::{SampleBuffer, SampleLock};
