// src/looper/crossfade.rs
//
// Equal-power crossfade across the loop point.
//
// The first half-window of the loop is blended with the material that
// followed the recording (fade-out part), the last half-window with the
// material that preceded it (fade-in part). Square-root weights keep the
// summed power constant through the blend.

/// Cached fade material, sized for the worst-case crossfade.
#[derive(Debug, Clone)]
pub struct FadeCaches {
    /// Input captured just before recording started.
    pub fade_in: Vec<f32>,

    /// Input captured during the first half-window of the first loop pass.
    pub fade_out: Vec<f32>,
}

impl FadeCaches {
    pub fn new(capacity: usize) -> Self {
        Self {
            fade_in: vec![0.0; capacity],
            fade_out: vec![0.0; capacity],
        }
    }

    /// Reallocate for a new worst case. Not real-time safe.
    pub fn reserve(&mut self, capacity: usize) {
        self.fade_in.resize(capacity, 0.0);
        self.fade_out.resize(capacity, 0.0);
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.fade_in.len()
    }
}

/// One output sample of the looped region at `pos`.
///
/// `pos` must lie in `[0, loop_length)` and `xfade_length <= loop_length`;
/// positions outside the loop yield silence.
#[inline]
pub fn crossfade_sample(
    samples: &[f32],
    pos: usize,
    loop_length: usize,
    xfade_length: usize,
    fades: &FadeCaches,
) -> f32 {
    let half = xfade_length / 2;
    let tail_start = loop_length.saturating_sub(half);

    if pos < half {
        // alpha 0.5 .. 1.0
        let alpha = (pos + half) as f32 / xfade_length as f32;
        samples[pos] * alpha.sqrt() + fades.fade_out[pos] * (1.0 - alpha).sqrt()
    } else if pos < tail_start {
        samples[pos]
    } else if pos < loop_length {
        // alpha 0.0 .. 0.5
        let fade_pos = pos - tail_start;
        let alpha = fade_pos as f32 / xfade_length as f32;
        fades.fade_in[fade_pos] * alpha.sqrt() + samples[pos] * (1.0 - alpha).sqrt()
    } else {
        0.0
    }
}
