// src/node.rs

use crate::audio_buffer::AudioBuffer;

/// Context passed to nodes during processing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext {
    /// Number of frames to process
    pub frames: usize,

    /// Sample rate
    pub sample_rate: f64,

    /// Absolute position of the first frame
    pub sample_pos: u64,
}

impl ProcessContext {
    pub fn new(frames: usize, sample_rate: f64, sample_pos: u64) -> Self {
        Self {
            frames,
            sample_rate,
            sample_pos,
        }
    }
}

/// Block-processing DSP node.
///
/// Nodes:
/// - do NOT allocate in `process`
/// - do NOT block in `process`
/// - consume control changes at the start of the next block
pub trait Node: Send {
    /// Called once before the stream starts or when the sample rate changes.
    fn prepare(&mut self, sample_rate: f64, max_block: usize);

    /// Process audio.
    ///
    /// Arguments:
    /// - `ctx`: Processing context (frames, sample rate)
    /// - `inputs`: Buffers from upstream (may be empty for sources)
    /// - `output`: Buffer to write output to
    ///
    /// Returns `true` if the output is silent (optimization hint).
    fn process(
        &mut self,
        ctx: &ProcessContext,
        inputs: &[&AudioBuffer],
        output: &mut AudioBuffer,
    ) -> bool;

    /// Number of output channels.
    fn num_channels(&self) -> usize;

    /// Set a parameter value.
    fn set_param(&mut self, param_id: u32, value: f32);

    /// Reset node state.
    fn reset(&mut self) {}
}
