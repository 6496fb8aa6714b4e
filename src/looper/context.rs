// src/looper/context.rs

use crate::config::{crossfade_frames, fade_capacity};
use crate::event::Event;

use super::crossfade::FadeCaches;
use super::pre_buffer::PreBuffer;
use super::state::State;

/// Mutable looper state shared by guards, actions and per-state production.
///
/// Invariants:
/// - `xfade_length` is even
/// - `xfade_length <= loop_length` once a loop has been committed
/// - at most one event is pending
#[derive(Debug, Clone)]
pub struct LooperContext {
    pub state: State,
    pub event: Event,

    pub sample_rate: f64,

    /// Active crossfade duration (ms).
    pub xfade_ms: f64,
    /// Duration applied by the next `XfadeChanged` transition.
    pub xfade_ms_scheduled: f64,
    /// Crossfade length in frames.
    pub xfade_length: usize,

    /// Frames available in the loop buffer.
    pub buffer_length: usize,
    pub loop_pos: usize,
    pub loop_length: usize,

    pub fadeout_start: usize,
    pub fadeout_pos: usize,

    pub pre_buffer: PreBuffer,
    pub fades: FadeCaches,
}

impl LooperContext {
    pub fn new(xfade_ms: f64) -> Self {
        Self {
            state: State::Prebuffer,
            event: Event::Nop,
            sample_rate: 0.0,
            xfade_ms,
            xfade_ms_scheduled: xfade_ms,
            xfade_length: 0,
            buffer_length: 0,
            loop_pos: 0,
            loop_length: 0,
            fadeout_start: 0,
            fadeout_pos: 0,
            pre_buffer: PreBuffer::new(0),
            fades: FadeCaches::new(0),
        }
    }

    /// Size the caches for `sample_rate`. Allocates; call outside the audio callback.
    pub fn allocate(&mut self, sample_rate: f64) {
        let capacity = fade_capacity(sample_rate);
        self.sample_rate = sample_rate;
        self.pre_buffer.reserve(capacity);
        self.fades.reserve(capacity);
    }

    /// Stream (re)start: derive the crossfade and enter PREBUFFER.
    ///
    /// Does not allocate. A pending control event survives the restart;
    /// a pending `Done` belonged to the previous state and is dropped.
    pub fn restart(&mut self, buffer_length: usize) {
        if self.event == Event::Done {
            self.event = Event::Nop;
        }

        self.buffer_length = buffer_length;
        self.xfade_length = self.derive_xfade_length(self.xfade_ms);
        self.pre_buffer.resize(self.xfade_length / 2);

        self.loop_length = 0;
        self.loop_pos = 0;
        self.fadeout_start = 0;
        self.fadeout_pos = 0;

        self.state = State::Prebuffer;
    }

    /// Crossfade frames for `ms`, clamped to what the caches hold.
    pub fn derive_xfade_length(&self, ms: f64) -> usize {
        let max = self.fades.capacity() * 2;
        crossfade_frames(self.sample_rate, ms).min(max)
    }

    /// Latch `event` into the pending slot, replacing whatever was there.
    #[inline]
    pub fn raise(&mut self, event: Event) {
        self.event = event;
    }

    #[inline]
    pub fn half_xfade(&self) -> usize {
        self.xfade_length / 2
    }

    /// Normalized loop position, `0.0` while no loop length is known.
    #[inline]
    pub fn position(&self) -> f32 {
        if self.loop_length == 0 {
            0.0
        } else {
            self.loop_pos as f32 / self.loop_length as f32
        }
    }
}
