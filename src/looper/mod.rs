// src/looper/mod.rs
//
// Per-sample looper state machine.
//
// Every sample runs the same sequence:
//   1. push the input into the pre-buffer
//   2. fire at most one transition for the pending event
//   3. produce the sample for the (possibly new) state
//   4. report the normalized loop position
//
// Nothing here allocates after `prepare`; the loop buffer is borrowed
// per call so the caller controls acquisition and release.

mod context;
mod crossfade;
mod pre_buffer;
mod state;
mod transition;

pub use context::LooperContext;
pub use crossfade::{FadeCaches, crossfade_sample};
pub use pre_buffer::PreBuffer;
pub use state::State;
pub use transition::{Fired, Source, TRANSITIONS, Transition};

use crate::config::{LooperConfig, validate_crossfade_ms, validate_sample_rate};
use crate::error::Result;
use crate::event::Event;

/// Result of one sample step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub output: f32,
    pub position: f32,
    pub fired: Option<Fired>,
    /// The loop buffer was written during this step.
    pub wrote: bool,
}

pub struct Looper {
    ctx: LooperContext,
}

impl Looper {
    pub fn new(config: &LooperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ctx: LooperContext::new(config.crossfade_ms),
        })
    }

    /// Stream start: size the caches for `sample_rate` and enter PREBUFFER.
    ///
    /// Allocates; call outside the audio callback.
    pub fn prepare(&mut self, sample_rate: f64, buffer_length: usize) -> Result<State> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        if sample_rate != self.ctx.sample_rate {
            self.ctx.allocate(sample_rate);
        }
        Ok(self.restart(buffer_length))
    }

    /// Re-run stream-start initialisation against a new buffer length.
    ///
    /// Real-time safe once `prepare` has run.
    pub fn restart(&mut self, buffer_length: usize) -> State {
        self.ctx.restart(buffer_length);
        self.ctx.state
    }

    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.ctx.sample_rate > 0.0
    }

    // ───────────────────────────────────────────────────────────────
    // Events
    // ───────────────────────────────────────────────────────────────

    /// Latch an event for the next sample, replacing any pending one.
    #[inline]
    pub fn raise(&mut self, event: Event) {
        self.ctx.raise(event);
    }

    pub fn tap(&mut self) {
        self.raise(Event::Tap);
    }

    pub fn reset(&mut self) {
        self.raise(Event::Reset);
    }

    /// Schedule a new crossfade duration.
    ///
    /// Out-of-range durations are rejected and leave the looper untouched.
    pub fn set_crossfade(&mut self, ms: f64) -> Result<()> {
        let ms = validate_crossfade_ms(ms)?;
        self.ctx.xfade_ms_scheduled = ms;
        self.ctx.raise(Event::XfadeChanged);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────
    // Processing
    // ───────────────────────────────────────────────────────────────

    /// Advance the state machine by one sample.
    pub fn process_sample(&mut self, input: f32, samples: &mut [f32]) -> Frame {
        if self.ctx.xfade_length > 0 {
            self.ctx.pre_buffer.push(input);
        }

        let fired = transition::step(&mut self.ctx, samples);
        let (output, wrote) = self.produce(input, samples);

        Frame {
            output,
            position: self.ctx.position(),
            fired,
            wrote: wrote || fired.is_some_and(|f| f.wrote),
        }
    }

    /// Process a block sample by sample.
    ///
    /// `on_transition` is called for every transition that fires. Missing
    /// input frames are treated as silence. Returns `true` if the loop
    /// buffer was written.
    pub fn process_block<F>(
        &mut self,
        input: &[f32],
        samples: &mut [f32],
        output: &mut [f32],
        position: &mut [f32],
        mut on_transition: F,
    ) -> bool
    where
        F: FnMut(Fired),
    {
        let mut wrote = false;

        for (i, (out, pos)) in output.iter_mut().zip(position.iter_mut()).enumerate() {
            let x = input.get(i).copied().unwrap_or(0.0);
            let frame = self.process_sample(x, samples);

            if let Some(fired) = frame.fired {
                on_transition(fired);
            }

            *out = frame.output;
            *pos = frame.position;
            wrote |= frame.wrote;
        }

        wrote
    }

    /// State-specific production. Returns the output sample and whether
    /// the loop buffer was written.
    fn produce(&mut self, input: f32, samples: &mut [f32]) -> (f32, bool) {
        let ctx = &mut self.ctx;

        match ctx.state {
            State::Prebuffer => {
                if ctx.xfade_length == 0 || ctx.pre_buffer.is_full() {
                    ctx.raise(Event::Done);
                }
                (0.0, false)
            }

            State::Idle => (0.0, false),

            State::Fadeout => {
                if ctx.xfade_length == 0 {
                    ctx.raise(Event::Done);
                    return (0.0, false);
                }

                let diff = ctx.fadeout_pos - ctx.fadeout_start;
                let mut out = 0.0;
                if diff <= ctx.xfade_length {
                    out = fading_tail(ctx, samples, diff);
                }
                // Re-raised until consumed so an overwriting event cannot strand the fade.
                if diff >= ctx.xfade_length {
                    ctx.raise(Event::Done);
                }
                (out, false)
            }

            State::Record => (0.0, record(ctx, input, samples)),

            State::RecordFadeout => {
                let mut out = 0.0;
                if ctx.xfade_length > 0 {
                    let diff = ctx.fadeout_pos - ctx.fadeout_start;
                    // Strict bound: the sample at alpha == 1 stays silent.
                    if diff < ctx.xfade_length {
                        out = fading_tail(ctx, samples, diff);
                    }
                }
                (out, record(ctx, input, samples))
            }

            State::FirstLoop => {
                let half = ctx.half_xfade();
                let pos = ctx.loop_pos;

                let out = if pos < half {
                    // Linear fade-in while capturing the next loop's fade-out material.
                    ctx.fades.fade_out[pos] = input;
                    samples[pos] * (pos as f32 / half as f32)
                } else {
                    crossfade_sample(samples, pos, ctx.loop_length, ctx.xfade_length, &ctx.fades)
                };

                if ctx.loop_pos < ctx.loop_length {
                    ctx.loop_pos += 1;
                }
                if ctx.loop_pos >= ctx.loop_length {
                    ctx.raise(Event::Done);
                }
                (out, false)
            }

            State::Loop => {
                let out = crossfade_sample(
                    samples,
                    ctx.loop_pos,
                    ctx.loop_length,
                    ctx.xfade_length,
                    &ctx.fades,
                );
                ctx.loop_pos = wrap(ctx.loop_pos + 1, ctx.loop_length);
                (out, false)
            }
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────

    #[inline]
    pub fn state(&self) -> State {
        self.ctx.state
    }

    #[inline]
    pub fn pending_event(&self) -> Event {
        self.ctx.event
    }

    #[inline]
    pub fn loop_pos(&self) -> usize {
        self.ctx.loop_pos
    }

    #[inline]
    pub fn loop_length(&self) -> usize {
        self.ctx.loop_length
    }

    #[inline]
    pub fn xfade_length(&self) -> usize {
        self.ctx.xfade_length
    }

    #[inline]
    pub fn crossfade_ms(&self) -> f64 {
        self.ctx.xfade_ms
    }

    #[inline]
    pub fn buffer_length(&self) -> usize {
        self.ctx.buffer_length
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.ctx.sample_rate
    }

    #[inline]
    pub fn position(&self) -> f32 {
        self.ctx.position()
    }

    /// Active part of the fade-in cache.
    pub fn fade_in(&self) -> &[f32] {
        &self.ctx.fades.fade_in[..self.ctx.half_xfade()]
    }

    /// Active part of the fade-out cache.
    pub fn fade_out(&self) -> &[f32] {
        &self.ctx.fades.fade_out[..self.ctx.half_xfade()]
    }

    pub fn context(&self) -> &LooperContext {
        &self.ctx
    }
}

/// Linearly faded crossfade sample at the fade-out cursor; advances the cursor.
#[inline]
fn fading_tail(ctx: &mut LooperContext, samples: &[f32], diff: usize) -> f32 {
    let alpha = diff as f32 / ctx.xfade_length as f32;
    let pos = wrap(ctx.fadeout_pos, ctx.loop_length);
    let out = (1.0 - alpha)
        * crossfade_sample(samples, pos, ctx.loop_length, ctx.xfade_length, &ctx.fades);
    ctx.fadeout_pos += 1;
    out
}

/// Write `input` at the record cursor; raises `Tap` once the buffer is full.
#[inline]
fn record(ctx: &mut LooperContext, input: f32, samples: &mut [f32]) -> bool {
    let wrote = match samples.get_mut(ctx.loop_pos) {
        Some(slot) => {
            *slot = input;
            ctx.loop_pos += 1;
            true
        }
        None => false,
    };
    if ctx.loop_pos >= ctx.buffer_length {
        ctx.raise(Event::Tap);
    }
    wrote
}

#[inline]
fn wrap(pos: usize, len: usize) -> usize {
    if len == 0 { 0 } else { pos % len }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LooperError;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_1_SQRT_2;

    const RATE: f64 = 1000.0;

    fn prepared(xfade_ms: f64, buffer: usize) -> (Looper, Vec<f32>) {
        let config = LooperConfig::default().with_crossfade_ms(xfade_ms);
        let mut looper = Looper::new(&config).unwrap();
        looper.prepare(RATE, buffer).unwrap();
        (looper, vec![0.0; buffer])
    }

    fn run(looper: &mut Looper, samples: &mut [f32], input: &[f32]) -> (Vec<f32>, Vec<State>) {
        let mut out = vec![0.0; input.len()];
        let mut pos = vec![0.0; input.len()];
        let mut states = Vec::new();
        looper.process_block(input, samples, &mut out, &mut pos, |f| states.push(f.to));
        (out, states)
    }

    fn settle_idle(looper: &mut Looper, samples: &mut [f32]) {
        for _ in 0..10_000 {
            if looper.state() == State::Idle {
                return;
            }
            run(looper, samples, &[0.0]);
        }
        panic!("looper never reached IDLE");
    }

    /// Record `input` (first sample is the tap sample), then tap again.
    fn record_loop(looper: &mut Looper, samples: &mut [f32], input: &[f32]) {
        looper.tap();
        run(looper, samples, input);
        assert_eq!(looper.state(), State::Record);
        looper.tap();
    }

    #[test]
    fn test_prepare_enters_prebuffer() {
        let (looper, _) = prepared(4.0, 32);
        assert_eq!(looper.state(), State::Prebuffer);
        assert_eq!(looper.xfade_length(), 4);
        assert_eq!(looper.context().pre_buffer.len(), 2);
    }

    #[test]
    fn test_prebuffer_waits_for_fill() {
        let (mut looper, mut samples) = prepared(4.0, 32);
        let (out, states) = run(&mut looper, &mut samples, &[0.1, 0.2]);
        assert_eq!(out, vec![0.0, 0.0]);
        assert!(states.is_empty());
        assert_eq!(looper.pending_event(), Event::Done);

        let (_, states) = run(&mut looper, &mut samples, &[0.3]);
        assert_eq!(states, vec![State::Idle]);
    }

    #[test]
    fn test_zero_crossfade_skips_prebuffer_fill() {
        let (mut looper, mut samples) = prepared(200.0, 32);
        assert_eq!(looper.xfade_length(), 200);
        looper.set_crossfade(0.0).unwrap();

        let (_, states) = run(&mut looper, &mut samples, &[0.0]);
        assert_eq!(states, vec![State::Prebuffer]);
        assert_eq!(looper.xfade_length(), 0);
        assert_eq!(looper.pending_event(), Event::Done);

        let (_, states) = run(&mut looper, &mut samples, &[0.0]);
        assert_eq!(states, vec![State::Idle]);
    }

    #[test]
    fn test_out_of_range_crossfade_ignored() {
        let (mut looper, mut samples) = prepared(4.0, 32);
        settle_idle(&mut looper, &mut samples);

        let err = looper.set_crossfade(2500.0).unwrap_err();
        assert_eq!(err, LooperError::CrossfadeOutOfRange(2500.0));
        assert_eq!(looper.xfade_length(), 4);
        assert_eq!(looper.pending_event(), Event::Nop);

        let (_, states) = run(&mut looper, &mut samples, &[0.0; 8]);
        assert!(states.is_empty());
        assert_eq!(looper.state(), State::Idle);
    }

    #[test]
    fn test_repeated_reset_in_idle() {
        let (mut looper, mut samples) = prepared(4.0, 16);
        settle_idle(&mut looper, &mut samples);

        for _ in 0..3 {
            samples.fill(0.7);
            looper.reset();
            let (out, states) = run(&mut looper, &mut samples, &[0.4]);
            assert_eq!(states, vec![State::Idle]);
            assert_eq!(out, vec![0.0]);
            assert!(samples.iter().all(|&s| s == 0.0));
            assert_eq!(looper.loop_length(), 0);
            assert_eq!(looper.pending_event(), Event::Nop);
        }
    }

    #[test]
    fn test_tap_seeds_fade_in_and_commits_loop() {
        let (mut looper, mut samples) = prepared(4.0, 64);
        settle_idle(&mut looper, &mut samples);

        // The two most recent inputs when the tap lands: 0.25 and 0.5.
        run(&mut looper, &mut samples, &[0.25]);
        looper.tap();
        let (_, states) = run(&mut looper, &mut samples, &[0.5]);
        assert_eq!(states, vec![State::Record]);
        assert_eq!(looper.fade_in(), &[0.25, 0.5]);

        let recorded: Vec<f32> = (1..10).map(|i| i as f32 * 0.1).collect();
        run(&mut looper, &mut samples, &recorded);
        assert_eq!(looper.loop_pos(), 10);

        looper.tap();
        let (_, states) = run(&mut looper, &mut samples, &[0.0]);
        assert_eq!(states, vec![State::FirstLoop]);
        assert_eq!(looper.loop_length(), 10);
        assert_eq!(samples[0], 0.5);
        assert_eq!(&samples[1..10], recorded.as_slice());
        assert!(samples[10..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_early_tap_waits_for_crossfade_length() {
        let (mut looper, mut samples) = prepared(4.0, 64);
        settle_idle(&mut looper, &mut samples);
        looper.tap();
        run(&mut looper, &mut samples, &[0.1]);
        assert_eq!(looper.loop_pos(), 1);

        looper.tap();
        let (_, states) = run(&mut looper, &mut samples, &[0.2, 0.3, 0.4]);
        assert!(states.is_empty());
        assert_eq!(looper.state(), State::Record);
        assert_eq!(looper.pending_event(), Event::Tap);
        assert_eq!(looper.loop_pos(), 4);

        let (_, states) = run(&mut looper, &mut samples, &[0.5]);
        assert_eq!(states, vec![State::FirstLoop]);
        assert_eq!(looper.loop_length(), 4);
    }

    #[test]
    fn test_first_loop_then_steady_loop() {
        let (mut looper, mut samples) = prepared(4.0, 64);
        settle_idle(&mut looper, &mut samples);
        run(&mut looper, &mut samples, &[0.3]);

        let recorded: Vec<f32> = (0..12).map(|i| 0.05 * (i + 1) as f32).collect();
        record_loop(&mut looper, &mut samples, &recorded);
        assert_eq!(looper.fade_in(), &[0.3, recorded[0]]);

        // First pass: linear fade-in over the first half window while the
        // live input is captured as the next fade-out.
        let follow: Vec<f32> = (0..12).map(|i| -0.02 * i as f32 - 0.1).collect();
        let (first, states) = run(&mut looper, &mut samples, &follow);
        assert_eq!(states, vec![State::FirstLoop]);
        assert_eq!(looper.loop_length(), 12);
        assert_eq!(looper.fade_out(), &follow[..2]);
        assert_eq!(first[0], 0.0);
        assert_abs_diff_eq!(first[1], recorded[1] * 0.5, epsilon = 1e-6);
        assert_eq!(&first[2..10], &recorded[2..10]);
        assert_eq!(first[10], recorded[10]);
        assert_eq!(looper.pending_event(), Event::Done);

        // Steady state repeats exactly once per loop.
        let (steady, states) = run(&mut looper, &mut samples, &[0.0; 24]);
        assert_eq!(states, vec![State::Loop]);
        assert_eq!(&steady[..12], &steady[12..]);
        assert_abs_diff_eq!(
            steady[0],
            recorded[0] * FRAC_1_SQRT_2 + follow[0] * FRAC_1_SQRT_2,
            epsilon = 1e-6
        );
        assert_eq!(looper.loop_pos(), 0);
    }

    #[test]
    fn test_recording_stops_at_capacity() {
        let (mut looper, mut samples) = prepared(4.0, 8);
        settle_idle(&mut looper, &mut samples);
        looper.tap();
        run(&mut looper, &mut samples, &[0.5; 8]);
        assert_eq!(looper.state(), State::Record);
        assert_eq!(looper.pending_event(), Event::Tap);

        let (_, states) = run(&mut looper, &mut samples, &[0.0]);
        assert_eq!(states, vec![State::FirstLoop]);
        assert_eq!(looper.loop_length(), 8);
    }

    #[test]
    fn test_buffer_shorter_than_crossfade_never_overruns() {
        let (mut looper, mut samples) = prepared(4.0, 3);
        settle_idle(&mut looper, &mut samples);
        looper.tap();
        run(&mut looper, &mut samples, &[0.5; 16]);
        assert_eq!(looper.state(), State::Record);
        assert_eq!(looper.loop_pos(), 3);

        looper.reset();
        let (_, states) = run(&mut looper, &mut samples, &[0.0]);
        assert_eq!(states, vec![State::Idle]);
    }

    fn looping(xfade_ms: f64) -> (Looper, Vec<f32>) {
        let (mut looper, mut samples) = prepared(xfade_ms, 32);
        settle_idle(&mut looper, &mut samples);
        record_loop(&mut looper, &mut samples, &[0.5; 8]);
        run(&mut looper, &mut samples, &[0.5; 8]);
        run(&mut looper, &mut samples, &[0.0]);
        assert_eq!(looper.state(), State::Loop);
        (looper, samples)
    }

    #[test]
    fn test_reset_fades_out_then_idles() {
        let (mut looper, mut samples) = looping(4.0);
        looper.reset();
        let (out, states) = run(&mut looper, &mut samples, &[0.0; 6]);
        assert_eq!(states, vec![State::Fadeout, State::Idle]);
        assert!(out[0] > 0.0);
        assert!(out[1] < out[0] && out[2] < out[1] && out[3] < out[2]);
        assert_eq!(out[4], 0.0);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_reset_with_zero_crossfade_is_immediate() {
        let (mut looper, mut samples) = looping(0.0);
        looper.reset();
        let (out, states) = run(&mut looper, &mut samples, &[0.0; 2]);
        assert_eq!(states, vec![State::Fadeout, State::Idle]);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn test_record_fadeout_tail_ends_silent() {
        let (mut looper, mut samples) = looping(4.0);
        looper.tap();
        let input: Vec<f32> = (0..8).map(|i| 0.01 * i as f32).collect();
        let (out, states) = run(&mut looper, &mut samples, &input);
        assert_eq!(states, vec![State::RecordFadeout]);
        assert!(out[0] > 0.0);
        assert!(out[3] > 0.0 && out[3] < out[0]);
        assert!(out[4..].iter().all(|&s| s == 0.0));
        assert_eq!(&samples[..8], input.as_slice());
        assert_eq!(looper.loop_pos(), 8);
    }

    #[test]
    fn test_position_signal() {
        let (mut looper, mut samples) = looping(4.0);
        let mut out = [0.0; 4];
        let mut pos = [0.0; 4];
        looper.process_block(&[0.0; 4], &mut samples, &mut out, &mut pos, |_| {});
        assert_eq!(pos, [2.0 / 8.0, 3.0 / 8.0, 4.0 / 8.0, 5.0 / 8.0]);
    }
}
