// src/looper/pre_buffer.rs
//
// Rolling capture of the most recent input, used to seed the fade-in
// of a new loop with whatever was playing just before recording started.

/// Fixed-capacity ring buffer over the last `len` input samples.
///
/// Storage is allocated once for the worst-case crossfade; `len` is the
/// active window (half the current crossfade length) and may shrink or
/// grow within that storage without reallocating.
#[derive(Debug, Clone)]
pub struct PreBuffer {
    data: Vec<f32>,
    len: usize,
    cursor: usize,
    filled: usize,
}

impl PreBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            data: vec![0.0; max_len],
            len: 0,
            cursor: 0,
            filled: 0,
        }
    }

    /// Reallocate storage for a new worst case. Not real-time safe.
    pub fn reserve(&mut self, max_len: usize) {
        self.data.resize(max_len, 0.0);
        self.len = self.len.min(max_len);
        self.clear();
    }

    /// Change the active window and forget everything captured so far.
    pub fn resize(&mut self, len: usize) {
        debug_assert!(len <= self.data.len());
        self.len = len.min(self.data.len());
        self.clear();
    }

    /// Reset the write cursor and filled count.
    pub fn clear(&mut self) {
        self.cursor = 0;
        self.filled = 0;
        self.data[..self.len].fill(0.0);
    }

    /// Append one sample, overwriting the oldest once full.
    #[inline]
    pub fn push(&mut self, sample: f32) {
        if self.len == 0 {
            return;
        }
        self.data[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % self.len;
        if self.filled < self.len {
            self.filled += 1;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn filled(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled == self.len
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Unwrap the ring into `target[..len]` in chronological order:
    /// the segment after the cursor (oldest) followed by the segment before it.
    pub fn synthesize_fade_in(&self, target: &mut [f32]) {
        let len = self.len;
        let cursor = self.cursor;
        let older = len - cursor;
        target[..older].copy_from_slice(&self.data[cursor..len]);
        target[older..len].copy_from_slice(&self.data[..cursor]);
    }
}
