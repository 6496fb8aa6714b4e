// src/nodes/looper.rs
//
// Looper Node - drives the looper state machine across an audio block.
//
// Per block: acquire the shared sample buffer, run the state machine one
// sample at a time, release the buffer on every path and mark it dirty
// once if anything was written. Without a usable buffer the block is
// silent and the position output carries a sentinel.

use std::sync::Arc;
use std::sync::mpsc::SyncSender;

use log::{debug, info, warn};

use crate::audio_buffer::AudioBuffer;
use crate::config::{LooperConfig, validate_sample_rate};
use crate::error::{LooperError, Result};
use crate::event::Event;
use crate::looper::{Fired, Looper, State};
use crate::node::{Node, ProcessContext};
use crate::storage::SampleBuffer;

use super::params;

/// Position output while the sample buffer is unavailable.
pub const UNAVAILABLE_POSITION: f32 = -1.0;

/// Output channels: audio, normalized loop position.
pub const LOOPER_CHANNELS: usize = 2;

pub struct LooperNode {
    looper: Looper,
    config: LooperConfig,

    /// Attached loop buffer (host-owned or internal fallback).
    storage: Option<Arc<SampleBuffer>>,

    /// Edge-triggered state outlet.
    state_tx: Option<SyncSender<State>>,

    /// Last unavailability reported, so an outage logs once.
    outage: Option<LooperError>,

    last_position: f32,
}

impl LooperNode {
    pub fn new(config: LooperConfig) -> Result<Self> {
        let looper = Looper::new(&config)?;
        Ok(Self {
            looper,
            config,
            storage: None,
            state_tx: None,
            outage: None,
            last_position: UNAVAILABLE_POSITION,
        })
    }

    /// Create with a buffer already attached.
    pub fn with_buffer(config: LooperConfig, buffer: Arc<SampleBuffer>) -> Result<Self> {
        let mut node = Self::new(config)?;
        node.storage = Some(buffer);
        Ok(node)
    }

    /// Route state changes to `tx`. Notifications are dropped if the queue is full.
    pub fn connect_state_output(&mut self, tx: SyncSender<State>) {
        self.state_tx = Some(tx);
    }

    // ───────────────────────────────────────────────────────────────
    // Control
    // ───────────────────────────────────────────────────────────────

    pub fn tap(&mut self) {
        self.looper.tap();
    }

    pub fn reset_loop(&mut self) {
        self.looper.reset();
    }

    /// Schedule a new crossfade duration; out-of-range values are rejected.
    pub fn set_crossfade(&mut self, ms: f64) -> Result<()> {
        self.looper.set_crossfade(ms)
    }

    /// Swap the loop buffer.
    ///
    /// Once prepared, the looper restarts from PREBUFFER against the new
    /// frame count.
    pub fn set_buffer(&mut self, buffer: Option<Arc<SampleBuffer>>) {
        match &buffer {
            Some(b) => info!("Buffer set to {}, length {}", b.name(), b.frame_count()),
            None => warn!("Buffer detached"),
        }
        self.storage = buffer;
        self.outage = None;

        if self.looper.is_prepared() {
            let frames = self.storage.as_ref().map_or(0, |b| b.frame_count());
            let state = self.looper.restart(frames);
            self.emit(state);
        }
    }

    pub fn buffer(&self) -> Option<&Arc<SampleBuffer>> {
        self.storage.as_ref()
    }

    // ───────────────────────────────────────────────────────────────
    // Processing
    // ───────────────────────────────────────────────────────────────

    /// Process one block.
    ///
    /// Returns `false` (silence, sentinel position) if the buffer could not
    /// be acquired; the attempt is repeated next block.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32], position: &mut [f32]) -> bool {
        let Some(storage) = self.storage.as_ref() else {
            report_unavailable(&mut self.outage, LooperError::StorageDetached);
            return silence(output, position, &mut self.last_position);
        };

        let mut samples = match storage.lock() {
            Ok(samples) => samples,
            Err(err) => {
                report_unavailable(&mut self.outage, err);
                return silence(output, position, &mut self.last_position);
            }
        };

        if let Some(err) = self.outage.take() {
            info!("Buffer {} available again (was: {err})", storage.name());
        }

        if samples.len() != self.looper.buffer_length() {
            debug!(
                "Buffer {} length changed {} -> {}",
                storage.name(),
                self.looper.buffer_length(),
                samples.len()
            );
            let state = self.looper.restart(samples.len());
            notify(&self.state_tx, state);
        }

        let state_tx = &self.state_tx;
        let wrote = self
            .looper
            .process_block(input, &mut samples, output, position, |fired| {
                log_transition(&fired);
                notify(state_tx, fired.to);
            });

        drop(samples);
        if wrote {
            storage.set_dirty();
        }

        self.last_position = position.last().copied().unwrap_or(self.last_position);
        true
    }

    fn emit(&self, state: State) {
        debug!("-> {state}");
        notify(&self.state_tx, state);
    }

    // ───────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────

    pub fn looper(&self) -> &Looper {
        &self.looper
    }

    #[inline]
    pub fn state(&self) -> State {
        self.looper.state()
    }

    /// Position output of the last processed frame.
    #[inline]
    pub fn last_position(&self) -> f32 {
        self.last_position
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.outage.is_none() && self.storage.is_some()
    }
}

/// Log an outage once, not every block.
fn report_unavailable(outage: &mut Option<LooperError>, err: LooperError) {
    if outage.as_ref() != Some(&err) {
        warn!("{err}");
        *outage = Some(err);
    }
}

fn silence(output: &mut [f32], position: &mut [f32], last_position: &mut f32) -> bool {
    output.fill(0.0);
    position.fill(UNAVAILABLE_POSITION);
    *last_position = UNAVAILABLE_POSITION;
    false
}

#[inline]
fn notify(tx: &Option<SyncSender<State>>, state: State) {
    if let Some(tx) = tx {
        let _ = tx.try_send(state);
    }
}

#[inline]
fn log_transition(fired: &Fired) {
    debug!("{} -> {} ({})", fired.from, fired.to, fired.event);
}

impl Node for LooperNode {
    fn prepare(&mut self, sample_rate: f64, _max_block: usize) {
        if let Err(err) = validate_sample_rate(sample_rate) {
            warn!("{err}");
            return;
        }

        if self.storage.is_none() {
            if let Some(seconds) = self.config.internal_buffer_seconds {
                warn!("No buffer supplied, using internal buffer ({seconds} s)");
                self.storage = Some(Arc::new(SampleBuffer::with_duration(
                    "internal",
                    sample_rate,
                    seconds,
                )));
            } else {
                warn!("Buffer name missing");
            }
        }

        let frames = self.storage.as_ref().map_or(0, |b| b.frame_count());
        match self.looper.prepare(sample_rate, frames) {
            Ok(state) => self.emit(state),
            Err(err) => warn!("{err}"),
        }
    }

    fn process(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[&AudioBuffer],
        output: &mut AudioBuffer,
    ) -> bool {
        let frames = ctx.frames.min(output.frames);
        let input: &[f32] = match inputs.first() {
            Some(buffer) => buffer.channel(0),
            None => &[],
        };

        let (audio, position) = output.stereo_mut();
        let available = self.process_block(
            &input[..frames.min(input.len())],
            &mut audio[..frames],
            &mut position[..frames],
        );

        !available || matches!(self.state(), State::Prebuffer | State::Idle | State::Record)
    }

    fn num_channels(&self) -> usize {
        LOOPER_CHANNELS
    }

    fn set_param(&mut self, param_id: u32, value: f32) {
        match param_id {
            params::CROSSFADE_MS => {
                if let Err(err) = self.set_crossfade(value as f64) {
                    debug!("Ignoring crossfade: {err}");
                }
            }
            params::TAP => self.looper.raise(Event::Tap),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.reset_loop();
    }
}
