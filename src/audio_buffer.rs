// src/audio_buffer.rs

/// Planar view over caller-owned sample data: `channels` consecutive
/// runs of `frames` samples each.
#[derive(Debug)]
pub struct AudioBuffer<'a> {
    pub channels: usize,
    pub frames: usize,
    pub data: &'a mut [f32], // planar: ch0[0..frames], ch1[0..frames], ...
}

impl<'a> AudioBuffer<'a> {
    /// Create a new AudioBuffer wrapping existing data.
    #[inline]
    pub fn new(data: &'a mut [f32], channels: usize) -> Self {
        let frames = data.len() / channels.max(1);
        Self {
            channels,
            frames,
            data,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.frames;
        &self.data[start..start + self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.frames;
        &mut self.data[start..start + self.frames]
    }

    /// Borrow channels 0 and 1 mutably at the same time.
    #[inline]
    pub fn stereo_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        let frames = self.frames;
        let (first, rest) = self.data.split_at_mut(frames);
        (first, &mut rest[..frames])
    }
}
