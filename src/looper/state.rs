// src/looper/state.rs

use std::fmt;

/// Looper states. The discriminant is the ordinal emitted on the state outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum State {
    /// Filling the pre-buffer after a (re)start.
    #[default]
    Prebuffer = 0,
    Idle = 1,
    /// Fading the loop out before going idle.
    Fadeout = 2,
    Loop = 3,
    Record = 4,
    /// Recording while the previous loop fades out.
    RecordFadeout = 5,
    /// First pass over a freshly recorded loop.
    FirstLoop = 6,
}

impl State {
    #[inline]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(State::Prebuffer),
            1 => Some(State::Idle),
            2 => Some(State::Fadeout),
            3 => Some(State::Loop),
            4 => Some(State::Record),
            5 => Some(State::RecordFadeout),
            6 => Some(State::FirstLoop),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            State::Prebuffer => "PREBUFFER",
            State::Idle => "IDLE",
            State::Fadeout => "FADEOUT",
            State::Loop => "LOOP",
            State::Record => "RECORD",
            State::RecordFadeout => "RECORD_FADEOUT",
            State::FirstLoop => "FIRST_LOOP",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
