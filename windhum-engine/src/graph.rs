//! Lifecycle of the synthesis graph.
//!
//! [`SignalGraph`] is the control-thread handle. While inactive it holds
//! nothing; activation builds a [`SignalChain`], hands it to a backend inside a
//! [`Renderer`] and keeps only a control mailbox, a command queue, a meter tap
//! and the stream.
//!
//! Design goals
//! - Activation is all-or-nothing; a failed activation leaves no stream behind
//! - `activate` while active and `deactivate` while inactive are no-ops
//! - The control thread never waits on the audio thread (latest-wins mailbox,
//!   bounded command queue with `try_send`)
//! - The safety ceiling is applied to the output gain on every retarget

use crossbeam_channel::{bounded, Sender};

use crate::backend::{AudioBackend, PlaybackStream};
pub use crate::chain::CONTROL_COUNT;
use crate::chain::{CaptureTap, Command, Control, ControlMailbox, Renderer, SignalChain};
use crate::error::GraphError;
use crate::mapping::{ControlTarget, SynthesisControlTargets};
use crate::meter::{MeterTap, MeterWriter};
use crate::safety::SafetyGainStage;
use crate::turbine::TurbineConfiguration;

/// Capacity of the lifecycle command queue.
pub const COMMAND_QUEUE: usize = 16;

/// Per-control commands for one set of targets, output gain already bounded.
pub fn control_updates(targets: &SynthesisControlTargets) -> [(Control, ControlTarget); CONTROL_COUNT] {
    let gain = ControlTarget {
        value: SafetyGainStage::apply(targets.raw_gain.value, targets.output_profile),
        time_constant_ms: targets.raw_gain.time_constant_ms,
    };
    [
        (Control::TonalCenter, targets.tonal_center_hz),
        (Control::TonalQ, targets.tonal_q),
        (Control::LowpassCutoff, targets.lowpass_cutoff_hz),
        (Control::GroundShelf, targets.ground_shelf_db),
        (Control::LfoRate, targets.lfo_rate_hz),
        (Control::LfoDepth, targets.lfo_depth),
        (Control::RealismRate, targets.realism_rate_hz),
        (Control::RealismDepth, targets.realism_depth),
        (Control::EqLow, targets.eq_low_db),
        (Control::EqHigh, targets.eq_high_db),
        (Control::OutputGain, gain),
    ]
}

struct ActiveGraph {
    stream: Box<dyn PlaybackStream>,
    controls: ControlMailbox,
    commands: Sender<Command>,
    meter: MeterTap,
    sample_rate: u32,
}

enum GraphState {
    Inactive,
    Active(ActiveGraph),
}

pub struct SignalGraph {
    state: GraphState,
    noise_seed: Option<u64>,
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGraph {
    pub fn new() -> Self {
        Self { state: GraphState::Inactive, noise_seed: None }
    }

    /// Generate the noise buffer from a fixed seed instead of OS entropy.
    pub fn with_noise_seed(seed: u64) -> Self {
        Self { state: GraphState::Inactive, noise_seed: Some(seed) }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, GraphState::Active(_))
    }

    pub fn sample_rate(&self) -> Option<u32> {
        match &self.state {
            GraphState::Active(g) => Some(g.sample_rate),
            GraphState::Inactive => None,
        }
    }

    /// Read handle on the live output; `None` while inactive.
    pub fn meter(&self) -> Option<MeterTap> {
        match &self.state {
            GraphState::Active(g) => Some(g.meter.clone()),
            GraphState::Inactive => None,
        }
    }

    /// Build the chain, start its sources and open the stream.
    ///
    /// The initial targets are queued before the stream starts, so the output
    /// gain ramps up from zero on the very first block.
    pub fn activate(
        &mut self,
        backend: &dyn AudioBackend,
        cfg: &TurbineConfiguration,
        targets: &SynthesisControlTargets,
    ) -> Result<(), GraphError> {
        if self.is_active() {
            log::debug!("activate ignored: graph already active");
            return Ok(());
        }

        let sample_rate = backend.sample_rate()?;
        let mut chain = SignalChain::new(sample_rate as f32, cfg.high_fidelity_enabled(), self.noise_seed);
        chain.start();

        let controls = ControlMailbox::new();
        controls.post(&control_updates(targets));
        let (tx, rx) = bounded(COMMAND_QUEUE);
        let (meter_writer, meter) = MeterWriter::with_tap();

        let stream = backend.open(Renderer::new(chain, controls.clone(), rx, meter_writer))?;
        log::info!(
            "signal graph active at {sample_rate} Hz ({} noise)",
            if cfg.high_fidelity_enabled() { "high-fidelity" } else { "standard" }
        );
        self.state = GraphState::Active(ActiveGraph { stream, controls, commands: tx, meter, sample_rate });
        Ok(())
    }

    /// Stop the sources, pause and release the stream. No-op while inactive.
    pub fn deactivate(&mut self) {
        let GraphState::Active(g) = std::mem::replace(&mut self.state, GraphState::Inactive) else {
            return;
        };
        let _ = g.commands.try_send(Command::StopSources);
        if let Err(e) = g.stream.pause() {
            log::warn!("pausing output stream failed: {e}");
        }
        drop(g);
        log::info!("signal graph released");
    }

    /// Move every live control towards `targets`. No-op while inactive.
    ///
    /// Later calls overwrite targets the audio thread has not picked up yet,
    /// so the chain always heads for the most recent configuration.
    pub fn retarget(&self, targets: &SynthesisControlTargets) {
        if let GraphState::Active(g) = &self.state {
            g.controls.post(&control_updates(targets));
        }
    }

    /// Route a copy of the rendered output to `tap`.
    /// Returns `false` when inactive or the command queue is full.
    pub fn attach_capture(&self, tap: CaptureTap) -> bool {
        match &self.state {
            GraphState::Active(g) => g.commands.try_send(Command::AttachCapture(tap)).is_ok(),
            GraphState::Inactive => false,
        }
    }
}

impl Drop for SignalGraph {
    fn drop(&mut self) {
        self.deactivate();
    }
}

// ------------------------------------ Tests --------------------------------------
