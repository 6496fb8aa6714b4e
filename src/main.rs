// src/main.rs
//
// Offline demo: renders a synthetic drone through a record / loop /
// re-record / reset session and logs what the control side observes.

use std::f32::consts::TAU;
use std::sync::Arc;

use log::{error, info};

use droneloop::{LooperConfig, LooperHandle, LooperNode, SampleBuffer, create_bridge};

const SAMPLE_RATE: f64 = 48_000.0;
const BLOCK: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Action {
    Tap,
    Reset,
}

/// Two detuned sines, slowly beating.
struct Drone {
    phase_a: f32,
    phase_b: f32,
}

impl Drone {
    fn new() -> Self {
        Self {
            phase_a: 0.0,
            phase_b: 0.0,
        }
    }

    fn fill(&mut self, out: &mut [f32]) {
        let step_a = 110.0 / SAMPLE_RATE as f32;
        let step_b = 110.7 / SAMPLE_RATE as f32;
        for sample in out {
            *sample = 0.25 * ((self.phase_a * TAU).sin() + (self.phase_b * TAU).sin());
            self.phase_a = (self.phase_a + step_a).fract();
            self.phase_b = (self.phase_b + step_b).fract();
        }
    }
}

fn report(control: &LooperHandle, at: f64) {
    for state in control.poll_state_changes() {
        info!("{at:>6.2} s  state {} ({})", state, state.ordinal());
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let buffer = Arc::new(SampleBuffer::with_duration("drone", SAMPLE_RATE, 8.0));
    let config = LooperConfig::default().with_crossfade_ms(150.0);
    let node = match LooperNode::with_buffer(config, Arc::clone(&buffer)) {
        Ok(node) => node,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    let (control, mut engine) = create_bridge(node);
    engine.prepare(SAMPLE_RATE, BLOCK);

    // (time in seconds, action)
    let script = [
        (0.5, Action::Tap),
        (2.5, Action::Tap),
        (5.0, Action::Tap),
        (6.0, Action::Tap),
        (8.0, Action::Reset),
    ];

    let mut drone = Drone::new();
    let mut input = vec![0.0; BLOCK];
    let mut output = vec![0.0; BLOCK];
    let mut position = vec![0.0; BLOCK];
    let mut peak = 0.0f32;
    let mut next = 0;

    let total_blocks = (10.0 * SAMPLE_RATE) as usize / BLOCK;
    for block in 0..total_blocks {
        let now = (block * BLOCK) as f64 / SAMPLE_RATE;

        while next < script.len() && script[next].0 <= now {
            let action = script[next].1;
            info!("{now:>6.2} s  {action:?}");
            match action {
                Action::Tap => control.tap(),
                Action::Reset => control.reset(),
            }
            next += 1;
        }

        drone.fill(&mut input);
        engine.render(&input, &mut output, &mut position);
        peak = output.iter().fold(peak, |p, s| p.max(s.abs()));

        report(&control, now);
    }

    let readback = control.readback();
    info!(
        "Finished in {}: loop {} frames, crossfade {} frames, peak {:.3}",
        readback.state, readback.loop_length, readback.xfade_length, peak
    );
    if buffer.take_dirty() {
        info!("Buffer {} was modified", buffer.name());
    }
}
