//! Thread-safe bridge between the control side and the audio thread.
//!
//! # Architecture
//!
//! - **Control thread** owns [`LooperHandle`]: taps, resets, crossfade and
//!   buffer changes, state notifications and readback
//! - **Audio thread** owns [`EngineHandle`] with the [`LooperNode`]
//! - Commands travel over an MPSC channel and are applied at the start of
//!   the next block; state changes come back over a bounded queue; the
//!   rest of the readback is atomics
//!
//! # Usage
//!
//! ```ignore
//! let (control, mut engine) = create_bridge(node);
//! engine.prepare(48_000.0, 512);
//!
//! // Control thread
//! control.tap();
//!
//! // Audio thread
//! engine.render(&input, &mut output, &mut position);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering},
    mpsc::{self, Receiver, Sender, TryRecvError},
};

use log::debug;

use crate::audio_buffer::AudioBuffer;
use crate::command::{Command, LooperReadback};
use crate::config::validate_crossfade_ms;
use crate::error::Result;
use crate::looper::State;
use crate::node::{Node, ProcessContext};
use crate::nodes::{LOOPER_CHANNELS, LooperNode, UNAVAILABLE_POSITION};
use crate::storage::SampleBuffer;

/// State notifications buffered between two polls; extra ones are dropped.
pub const STATE_QUEUE_CAPACITY: usize = 64;

/// Handle for the control thread.
pub struct LooperHandle {
    /// Channel to send commands to the audio thread.
    command_tx: Sender<Command>,

    /// State outlet of the looper.
    state_rx: Receiver<State>,

    /// Shared readback state (written by the audio thread).
    readback: Arc<SharedReadback>,
}

/// Handle for the audio thread containing the looper node.
pub struct EngineHandle {
    node: LooperNode,

    /// Channel to receive commands from the control thread.
    command_rx: Receiver<Command>,

    /// Shared readback state (written here).
    readback: Arc<SharedReadback>,

    sample_rate: f64,
    max_block: usize,
    sample_pos: u64,

    // Planar scratch, sized in `prepare`.
    input_scratch: Vec<f32>,
    output_scratch: Vec<f32>,
}

/// Lock-free shared state for audio -> control readback.
struct SharedReadback {
    state: AtomicU8,
    /// f32 bits (no AtomicF32 in std)
    position_bits: AtomicU32,
    loop_length: AtomicU64,
    xfade_length: AtomicU64,
    available: AtomicBool,
}

impl SharedReadback {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Prebuffer.ordinal()),
            position_bits: AtomicU32::new(UNAVAILABLE_POSITION.to_bits()),
            loop_length: AtomicU64::new(0),
            xfade_length: AtomicU64::new(0),
            available: AtomicBool::new(false),
        }
    }
}

/// Create a linked pair of handles around `node`.
///
/// The node's state outlet is connected to the returned `LooperHandle`.
pub fn create_bridge(mut node: LooperNode) -> (LooperHandle, EngineHandle) {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (state_tx, state_rx) = mpsc::sync_channel(STATE_QUEUE_CAPACITY);
    let readback = Arc::new(SharedReadback::new());

    node.connect_state_output(state_tx);

    let control = LooperHandle {
        command_tx: cmd_tx,
        state_rx,
        readback: Arc::clone(&readback),
    };

    let engine = EngineHandle {
        node,
        command_rx: cmd_rx,
        readback,
        sample_rate: 0.0,
        max_block: 0,
        sample_pos: 0,
        input_scratch: Vec::new(),
        output_scratch: Vec::new(),
    };

    (control, engine)
}

// ═══════════════════════════════════════════════════════════════════
// LooperHandle - Control Thread API
// ═══════════════════════════════════════════════════════════════════

impl LooperHandle {
    /// Send a command to the audio thread.
    pub fn send(&self, cmd: Command) {
        let _ = self.command_tx.send(cmd);
    }

    /// Start or stop recording.
    pub fn tap(&self) {
        self.send(Command::Tap);
    }

    /// Abort the loop or recording.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    /// Change the crossfade duration.
    ///
    /// Out-of-range durations are rejected here and never reach the looper.
    pub fn set_crossfade(&self, ms: f64) -> Result<()> {
        let ms = validate_crossfade_ms(ms).inspect_err(|err| debug!("{err}"))?;
        self.send(Command::SetCrossfade { ms });
        Ok(())
    }

    /// Attach or swap the loop buffer.
    pub fn set_buffer(&self, buffer: Arc<SampleBuffer>) {
        self.send(Command::SetBuffer {
            buffer: Some(buffer),
        });
    }

    pub fn detach_buffer(&self) {
        self.send(Command::SetBuffer { buffer: None });
    }

    /// Drain the state outlet.
    pub fn poll_state_changes(&self) -> Vec<State> {
        let mut states = Vec::new();
        loop {
            match self.state_rx.try_recv() {
                Ok(state) => states.push(state),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        states
    }

    /// Get the current readback state.
    pub fn readback(&self) -> LooperReadback {
        let ordinal = self.readback.state.load(Ordering::Relaxed);
        LooperReadback {
            state: State::from_ordinal(ordinal).unwrap_or_default(),
            position: f32::from_bits(self.readback.position_bits.load(Ordering::Relaxed)),
            loop_length: self.readback.loop_length.load(Ordering::Relaxed) as usize,
            xfade_length: self.readback.xfade_length.load(Ordering::Relaxed) as usize,
            available: self.readback.available.load(Ordering::Relaxed),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// EngineHandle - Audio Thread API
// ═══════════════════════════════════════════════════════════════════

impl EngineHandle {
    /// Stream start. Allocates; call before the first `render`.
    pub fn prepare(&mut self, sample_rate: f64, max_block: usize) {
        self.sample_rate = sample_rate;
        self.max_block = max_block;
        self.sample_pos = 0;
        self.input_scratch.resize(max_block, 0.0);
        self.output_scratch.resize(max_block * LOOPER_CHANNELS, 0.0);
        self.node.prepare(sample_rate, max_block);
        self.sync_readback();
    }

    /// Apply all pending commands.
    ///
    /// Call this at the start of each audio block. Event-raising commands
    /// share one pending slot, so the last tap/reset/crossfade wins.
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.try_recv() {
            self.apply_command(cmd);
        }
    }

    fn apply_command(&mut self, cmd: Command) {
        match cmd {
            Command::Tap => self.node.tap(),
            Command::Reset => self.node.reset_loop(),
            Command::SetCrossfade { ms } => {
                if let Err(err) = self.node.set_crossfade(ms) {
                    debug!("{err}");
                }
            }
            Command::SetBuffer { buffer } => self.node.set_buffer(buffer),
        }
    }

    /// Process pending commands, then render `output.len()` frames.
    ///
    /// Blocks longer than `max_block` are split. Missing input is silence.
    pub fn render(&mut self, input: &[f32], output: &mut [f32], position: &mut [f32]) {
        self.process_commands();

        let total = output.len().min(position.len());
        if self.max_block == 0 {
            output[..total].fill(0.0);
            position[..total].fill(UNAVAILABLE_POSITION);
            return;
        }

        let mut offset = 0;
        while offset < total {
            let frames = (total - offset).min(self.max_block);

            let in_data = &mut self.input_scratch[..frames];
            in_data.fill(0.0);
            if offset < input.len() {
                let available = (input.len() - offset).min(frames);
                in_data[..available].copy_from_slice(&input[offset..offset + available]);
            }
            let in_buffer = AudioBuffer::new(in_data, 1);

            let mut out_buffer =
                AudioBuffer::new(&mut self.output_scratch[..frames * LOOPER_CHANNELS], LOOPER_CHANNELS);

            let ctx = ProcessContext::new(frames, self.sample_rate, self.sample_pos);
            self.node.process(&ctx, &[&in_buffer], &mut out_buffer);

            output[offset..offset + frames].copy_from_slice(out_buffer.channel(0));
            position[offset..offset + frames].copy_from_slice(out_buffer.channel(1));

            offset += frames;
            self.sample_pos += frames as u64;
        }

        self.sync_readback();
    }

    /// Publish the looper state to the control side.
    pub fn sync_readback(&self) {
        let looper = self.node.looper();
        self.readback
            .state
            .store(looper.state().ordinal(), Ordering::Relaxed);
        self.readback
            .position_bits
            .store(self.node.last_position().to_bits(), Ordering::Relaxed);
        self.readback
            .loop_length
            .store(looper.loop_length() as u64, Ordering::Relaxed);
        self.readback
            .xfade_length
            .store(looper.xfade_length() as u64, Ordering::Relaxed);
        self.readback
            .available
            .store(self.node.is_available(), Ordering::Relaxed);
    }

    // ───────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────

    pub fn node(&self) -> &LooperNode {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut LooperNode {
        &mut self.node
    }

    /// Frames rendered since `prepare`.
    #[inline]
    pub fn sample_position(&self) -> u64 {
        self.sample_pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LooperConfig;
    use crate::error::LooperError;

    fn bridge(frames: usize) -> (LooperHandle, EngineHandle, Arc<SampleBuffer>) {
        let buffer = Arc::new(SampleBuffer::new("loop", frames));
        let config = LooperConfig::default().with_crossfade_ms(4.0);
        let node = LooperNode::with_buffer(config, Arc::clone(&buffer)).unwrap();
        let (control, mut engine) = create_bridge(node);
        engine.prepare(1000.0, 8);
        (control, engine, buffer)
    }

    fn render(engine: &mut EngineHandle, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut out = vec![0.0; input.len()];
        let mut pos = vec![0.0; input.len()];
        engine.render(input, &mut out, &mut pos);
        (out, pos)
    }

    #[test]
    fn test_commands_apply_at_next_block() {
        let (control, mut engine, _) = bridge(64);
        render(&mut engine, &[0.0; 8]);
        assert_eq!(control.poll_state_changes(), vec![State::Prebuffer, State::Idle]);

        control.tap();
        assert_eq!(control.readback().state, State::Idle);
        render(&mut engine, &[0.5; 8]);
        assert_eq!(control.poll_state_changes(), vec![State::Record]);
        assert_eq!(control.readback().state, State::Record);
    }

    #[test]
    fn test_long_blocks_are_chunked() {
        let (_control, mut engine, buffer) = bridge(64);
        render(&mut engine, &[0.0; 8]);
        engine.node_mut().tap();
        let input: Vec<f32> = (0..20).map(|i| i as f32).collect();
        render(&mut engine, &input);
        assert_eq!(engine.sample_position(), 28);
        assert_eq!(engine.node().looper().loop_pos(), 20);
        assert_eq!(&buffer.snapshot()[..20], input.as_slice());
    }

    #[test]
    fn test_rejected_crossfade_never_sent() {
        let (control, mut engine, _) = bridge(64);
        assert_eq!(
            control.set_crossfade(2000.0),
            Err(LooperError::CrossfadeOutOfRange(2000.0))
        );
        render(&mut engine, &[0.0; 8]);
        assert_eq!(control.readback().xfade_length, 4);

        control.set_crossfade(10.0).unwrap();
        render(&mut engine, &[0.0; 8]);
        assert_eq!(control.readback().xfade_length, 10);
    }

    #[test]
    fn test_detach_reports_unavailable() {
        let (control, mut engine, _) = bridge(64);
        render(&mut engine, &[0.0; 8]);
        control.detach_buffer();
        let (out, pos) = render(&mut engine, &[0.5; 8]);
        assert_eq!(out, vec![0.0; 8]);
        assert_eq!(pos, vec![UNAVAILABLE_POSITION; 8]);

        let readback = control.readback();
        assert!(!readback.available);
        assert_eq!(readback.position, UNAVAILABLE_POSITION);

        control.set_buffer(Arc::new(SampleBuffer::new("fresh", 32)));
        render(&mut engine, &[0.0; 8]);
        assert!(control.readback().available);
    }

    #[test]
    fn test_render_before_prepare_is_silent() {
        let node = LooperNode::new(LooperConfig::default()).unwrap();
        let (_control, mut engine) = create_bridge(node);
        let (out, pos) = render(&mut engine, &[0.5; 4]);
        assert_eq!(out, vec![0.0; 4]);
        assert_eq!(pos, vec![UNAVAILABLE_POSITION; 4]);
    }
}
