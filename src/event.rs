// src/event.rs

use std::fmt;

/// An event consumed by the looper state machine.
///
/// These events:
/// - occupy a single pending slot (the last one raised wins)
/// - are consumed by at most one transition per sample
/// - stay pending while a guard rejects them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Event {
    /// Start or stop recording.
    Tap,

    /// Abort the current loop or recording.
    Reset,

    /// Raised internally when a state has finished its work.
    Done,

    /// Crossfade duration reconfigured.
    XfadeChanged,

    /// Nothing pending.
    #[default]
    Nop,
}

impl Event {
    pub fn label(self) -> &'static str {
        match self {
            Event::Tap => "TAP",
            Event::Reset => "RESET",
            Event::Done => "DONE",
            Event::XfadeChanged => "XFADE_CHANGED",
            Event::Nop => "NOP",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
