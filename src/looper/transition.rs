// src/looper/transition.rs
//
// Transition table for the looper state machine.
//
// Each row pairs a (source, event) key with a guard and an action. Guards
// and actions are plain functions over the context; actions also get the
// locked loop buffer and report whether they wrote to it.

use crate::event::Event;

use super::context::LooperContext;
use super::state::State;

/// Row source: a concrete state or any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Any,
    State(State),
}

impl Source {
    #[inline]
    fn matches(self, state: State) -> bool {
        match self {
            Source::Any => true,
            Source::State(s) => s == state,
        }
    }
}

pub type Guard = fn(&LooperContext) -> bool;

/// Returns `true` if the loop buffer was written.
pub type Action = fn(&mut LooperContext, &mut [f32]) -> bool;

pub struct Transition {
    pub source: Source,
    pub event: Event,
    pub target: State,
    pub guard: Guard,
    pub action: Action,
}

/// A transition that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub from: State,
    pub to: State,
    pub event: Event,
    /// The action wrote to the loop buffer.
    pub wrote: bool,
}

// ═══════════════════════════════════════════════════════════════════
// Guards
// ═══════════════════════════════════════════════════════════════════

fn always(_ctx: &LooperContext) -> bool {
    true
}

/// The recording must cover at least one full crossfade window.
fn can_finish_recording(ctx: &LooperContext) -> bool {
    ctx.loop_pos > 0 && ctx.loop_pos >= ctx.xfade_length
}

// ═══════════════════════════════════════════════════════════════════
// Actions
// ═══════════════════════════════════════════════════════════════════

/// Seed the fade-in from the pre-buffer and start writing at 0.
fn save_pre_buffer(ctx: &mut LooperContext, _samples: &mut [f32]) -> bool {
    ctx.pre_buffer.synthesize_fade_in(&mut ctx.fades.fade_in);
    ctx.loop_pos = 0;
    false
}

fn commit_loop(ctx: &mut LooperContext, _samples: &mut [f32]) -> bool {
    ctx.loop_length = ctx.loop_pos;
    ctx.loop_pos = 0;
    false
}

fn rewind(ctx: &mut LooperContext, _samples: &mut [f32]) -> bool {
    ctx.loop_pos = 0;
    false
}

fn begin_fadeout(ctx: &mut LooperContext, _samples: &mut [f32]) -> bool {
    ctx.fadeout_start = ctx.loop_pos;
    ctx.fadeout_pos = ctx.fadeout_start;
    false
}

fn begin_record_fadeout(ctx: &mut LooperContext, samples: &mut [f32]) -> bool {
    begin_fadeout(ctx, samples);
    save_pre_buffer(ctx, samples)
}

/// Silence the buffer and forget the loop.
fn enter_idle(ctx: &mut LooperContext, samples: &mut [f32]) -> bool {
    samples.fill(0.0);
    ctx.loop_pos = 0;
    ctx.loop_length = 0;
    true
}

fn apply_crossfade(ctx: &mut LooperContext, samples: &mut [f32]) -> bool {
    ctx.xfade_ms = ctx.xfade_ms_scheduled;
    ctx.xfade_length = ctx.derive_xfade_length(ctx.xfade_ms);
    ctx.pre_buffer.resize(ctx.xfade_length / 2);
    enter_idle(ctx, samples)
}

// ═══════════════════════════════════════════════════════════════════
// Table
// ═══════════════════════════════════════════════════════════════════

const fn row(source: Source, event: Event, target: State, guard: Guard, action: Action) -> Transition {
    Transition {
        source,
        event,
        target,
        guard,
        action,
    }
}

use State::*;

pub static TRANSITIONS: [Transition; 13] = [
    row(Source::State(Prebuffer), Event::Done, Idle, always, enter_idle),
    row(Source::State(Idle), Event::Tap, Record, always, save_pre_buffer),
    row(Source::State(Idle), Event::Reset, Idle, always, enter_idle),
    row(Source::State(Loop), Event::Tap, RecordFadeout, always, begin_record_fadeout),
    row(Source::State(Loop), Event::Reset, Fadeout, always, begin_fadeout),
    row(Source::State(Fadeout), Event::Done, Idle, always, enter_idle),
    row(Source::State(Record), Event::Tap, FirstLoop, can_finish_recording, commit_loop),
    row(Source::State(Record), Event::Reset, Idle, always, enter_idle),
    row(Source::State(FirstLoop), Event::Done, Loop, always, rewind),
    row(Source::State(FirstLoop), Event::Reset, Fadeout, always, begin_fadeout),
    row(Source::State(RecordFadeout), Event::Reset, Idle, always, enter_idle),
    row(Source::State(RecordFadeout), Event::Tap, FirstLoop, can_finish_recording, commit_loop),
    row(Source::Any, Event::XfadeChanged, Prebuffer, always, apply_crossfade),
];

/// Fire at most one transition for the pending event.
///
/// The first row whose source, event and guard all match runs its action,
/// moves to its target and consumes the event. A rejected guard leaves the
/// event pending for the next sample.
pub fn step(ctx: &mut LooperContext, samples: &mut [f32]) -> Option<Fired> {
    if ctx.event == Event::Nop {
        return None;
    }

    let transition = TRANSITIONS.iter().find(|t| {
        t.source.matches(ctx.state) && t.event == ctx.event && (t.guard)(ctx)
    })?;

    let from = ctx.state;
    let event = ctx.event;
    let wrote = (transition.action)(ctx, samples);
    ctx.state = transition.target;
    ctx.event = Event::Nop;

    Some(Fired {
        from,
        to: transition.target,
        event,
        wrote,
    })
}
