//! The synthesis topology, run sample by sample on the audio thread.
//!
//! ```text
//! noise ─► bandpass ─► lowpass ─► ground shelf ─► ×base gain ─► ×output gain
//!                                                    ▲
//!                               0.8 + lfo·depth + realism·depth
//!
//! ×output gain ─► limiter ─► low shelf ─► high shelf ─► out
//! ```
//!
//! Design goals
//! - Every control is a [`SmoothedParam`]; retargets never jump
//! - Filter coefficients are refreshed at control rate ([`CONTROL_BLOCK`])
//! - Retargets go through a latest-wins [`ControlMailbox`]; lifecycle
//!   messages go through [`Command`]s
//! - No allocation after construction

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use windhum_core::dsp::clamp;
use windhum_core::dynamics::{LimiterParams, SoftLimiter};
use windhum_core::filters::{Biquad, SvfTpt};
use windhum_core::smoothing::SmoothedParam;

use crate::mapping::{ControlTarget, OPEN_CUTOFF_HZ};
use crate::meter::MeterWriter;
use crate::nodes::{Lfo, NoiseLoop};

/// Samples between filter coefficient refreshes.
pub const CONTROL_BLOCK: usize = 16;

/// Constant part of the pre-output gain; modulators add to it.
pub const BASE_GAIN: f32 = 0.8;

pub const INITIAL_TONAL_HZ: f32 = 400.0;
pub const INITIAL_TONAL_Q: f32 = 0.8;
pub const INITIAL_TONAL_Q_HQ: f32 = 1.2;
pub const INITIAL_LFO_HZ: f32 = 1.0;
pub const INITIAL_LFO_DEPTH: f32 = 0.12;
pub const INITIAL_GROUND_DB: f32 = -3.0;

pub const GROUND_SHELF_HZ: f32 = 120.0;
pub const EQ_LOW_HZ: f32 = 120.0;
pub const EQ_HIGH_HZ: f32 = 3_000.0;
const LOWPASS_Q: f32 = core::f32::consts::FRAC_1_SQRT_2;

/// Length of the looped noise buffer.
pub const NOISE_SECONDS: f32 = 8.0;
pub const NOISE_SECONDS_HQ: f32 = 12.0;

/// Number of addressable live controls.
pub const CONTROL_COUNT: usize = 11;

/// Addressable live controls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Control {
    TonalCenter,
    TonalQ,
    LowpassCutoff,
    GroundShelf,
    LfoRate,
    LfoDepth,
    RealismRate,
    RealismDepth,
    EqLow,
    EqHigh,
    /// Already bounded by the safety stage when it gets here.
    OutputGain,
}

impl Control {
    pub const ALL: [Control; CONTROL_COUNT] = [
        Control::TonalCenter,
        Control::TonalQ,
        Control::LowpassCutoff,
        Control::GroundShelf,
        Control::LfoRate,
        Control::LfoDepth,
        Control::RealismRate,
        Control::RealismDepth,
        Control::EqLow,
        Control::EqHigh,
        Control::OutputGain,
    ];

    #[inline]
    const fn slot(self) -> usize {
        self as usize
    }
}

/// Latest pending target per control.
///
/// The control thread overwrites a slot on every update, so a burst of edits
/// collapses to its final state and nothing is ever dropped. The audio thread
/// takes all pending slots once per block with `try_lock`; on contention the
/// targets stay queued for the next block.
#[derive(Clone, Debug, Default)]
pub struct ControlMailbox {
    slots: Arc<Mutex<[Option<ControlTarget>; CONTROL_COUNT]>>,
}

impl ControlMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending targets of the given controls.
    pub fn post(&self, updates: &[(Control, ControlTarget)]) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        for &(control, target) in updates {
            slots[control.slot()] = Some(target);
        }
    }

    /// Hand every pending target to `chain`. Never blocks.
    pub fn deliver(&self, chain: &mut SignalChain) {
        let Ok(mut slots) = self.slots.try_lock() else {
            return;
        };
        for (control, slot) in Control::ALL.iter().zip(slots.iter_mut()) {
            if let Some(target) = slot.take() {
                chain.retarget(*control, target);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .all(Option::is_none)
    }
}

/// Output copy for one capture. Samples that do not fit the queue are counted.
#[derive(Clone, Debug)]
pub struct CaptureTap {
    samples: Sender<f32>,
    dropped: Arc<AtomicUsize>,
}

impl CaptureTap {
    pub fn new(samples: Sender<f32>) -> Self {
        Self { samples, dropped: Arc::new(AtomicUsize::new(0)) }
    }

    /// Shared counter of samples lost to a full queue.
    pub fn dropped(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.dropped)
    }
}

/// Lifecycle messages from the control thread, drained at the start of each block.
#[derive(Debug)]
pub enum Command {
    /// Stop every source; the chain then renders silence.
    StopSources,
    /// Copy every rendered sample to the tap until its receiver disconnects.
    AttachCapture(CaptureTap),
}

/// The node chain itself. Owned by exactly one [`Renderer`].
#[derive(Clone, Debug)]
pub struct SignalChain {
    sr: f32,
    noise: NoiseLoop,

    tonal: SvfTpt,
    tonal_center: SmoothedParam,
    tonal_q: SmoothedParam,
    lowpass: SvfTpt,
    lowpass_cutoff: SmoothedParam,
    ground: Biquad,
    ground_db: SmoothedParam,

    lfo: Lfo,
    lfo_depth: SmoothedParam,
    realism: Lfo,
    realism_depth: SmoothedParam,
    output_gain: SmoothedParam,

    limiter: SoftLimiter,
    eq_low: Biquad,
    eq_low_db: SmoothedParam,
    eq_high: Biquad,
    eq_high_db: SmoothedParam,

    countdown: usize,
}

impl SignalChain {
    /// Build the chain at its initial values, output gain at zero.
    /// Generates the noise buffer, so call it off the audio thread.
    pub fn new(sr: f32, high_fidelity: bool, noise_seed: Option<u64>) -> Self {
        let sr = sr.max(1.0);
        let (noise_seconds, q) = if high_fidelity {
            (NOISE_SECONDS_HQ, INITIAL_TONAL_Q_HQ)
        } else {
            (NOISE_SECONDS, INITIAL_TONAL_Q)
        };
        Self {
            sr,
            noise: NoiseLoop::generate(noise_seconds, sr, noise_seed),
            tonal: SvfTpt::new(INITIAL_TONAL_HZ, q, sr),
            tonal_center: SmoothedParam::new(INITIAL_TONAL_HZ, sr),
            tonal_q: SmoothedParam::new(q, sr),
            lowpass: SvfTpt::new(OPEN_CUTOFF_HZ, LOWPASS_Q, sr),
            lowpass_cutoff: SmoothedParam::new(OPEN_CUTOFF_HZ, sr),
            ground: Biquad::low_shelf(GROUND_SHELF_HZ, INITIAL_GROUND_DB, sr),
            ground_db: SmoothedParam::new(INITIAL_GROUND_DB, sr),
            lfo: Lfo::new(INITIAL_LFO_HZ, sr),
            lfo_depth: SmoothedParam::new(INITIAL_LFO_DEPTH, sr),
            realism: Lfo::new(INITIAL_LFO_HZ, sr),
            realism_depth: SmoothedParam::new(0.0, sr),
            output_gain: SmoothedParam::new(0.0, sr),
            limiter: SoftLimiter::new(LimiterParams::default(), sr),
            eq_low: Biquad::low_shelf(EQ_LOW_HZ, 0.0, sr),
            eq_low_db: SmoothedParam::new(0.0, sr),
            eq_high: Biquad::high_shelf(EQ_HIGH_HZ, 0.0, sr),
            eq_high_db: SmoothedParam::new(0.0, sr),
            countdown: 0,
        }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }
    #[inline] pub fn output_gain(&self) -> f32 { self.output_gain.value() }
    #[inline] pub fn realism_depth(&self) -> f32 { self.realism_depth.value() }

    /// Start the noise and both modulators. Idempotent.
    pub fn start(&mut self) {
        self.noise.start();
        self.lfo.start();
        self.realism.start();
    }

    /// Stop every source. Idempotent.
    pub fn stop(&mut self) {
        self.noise.stop();
        self.lfo.stop();
        self.realism.stop();
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.noise.is_running()
    }

    pub fn retarget(&mut self, control: Control, target: ControlTarget) {
        let ControlTarget { value, time_constant_ms: tc } = target;
        match control {
            Control::TonalCenter => self.tonal_center.set_target(value, tc),
            Control::TonalQ => self.tonal_q.set_target(value, tc),
            Control::LowpassCutoff => self.lowpass_cutoff.set_target(value, tc),
            Control::GroundShelf => self.ground_db.set_target(value, tc),
            Control::LfoRate => self.lfo.retarget_rate(value, tc),
            Control::LfoDepth => self.lfo_depth.set_target(value, tc),
            Control::RealismRate => self.realism.retarget_rate(value, tc),
            Control::RealismDepth => self.realism_depth.set_target(value, tc),
            Control::EqLow => self.eq_low_db.set_target(value, tc),
            Control::EqHigh => self.eq_high_db.set_target(value, tc),
            Control::OutputGain => self.output_gain.set_target(value.max(0.0), tc),
        }
    }

    /// Advance k-rate parameters one block and recompute what moved.
    fn refresh_coefficients(&mut self) {
        if !(self.tonal_center.is_settled() && self.tonal_q.is_settled()) {
            let f = self.tonal_center.skip(CONTROL_BLOCK);
            let q = self.tonal_q.skip(CONTROL_BLOCK);
            self.tonal.set_params(f, q);
        }
        if !self.lowpass_cutoff.is_settled() {
            let f = self.lowpass_cutoff.skip(CONTROL_BLOCK);
            self.lowpass.set_cutoff_hz(f);
        }
        if !self.ground_db.is_settled() {
            let g = self.ground_db.skip(CONTROL_BLOCK);
            self.ground.set_gain_db(g);
        }
        if !self.eq_low_db.is_settled() {
            let g = self.eq_low_db.skip(CONTROL_BLOCK);
            self.eq_low.set_gain_db(g);
        }
        if !self.eq_high_db.is_settled() {
            let g = self.eq_high_db.skip(CONTROL_BLOCK);
            self.eq_high.set_gain_db(g);
        }
    }

    /// Render one mono sample.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.countdown == 0 {
            self.refresh_coefficients();
            self.countdown = CONTROL_BLOCK;
        }
        self.countdown -= 1;

        let x = self.noise.next();
        let x = self.tonal.process_bp(x);
        let x = self.lowpass.process_lp(x);
        let x = self.ground.process(x);

        let modulation =
            self.lfo.next() * self.lfo_depth.next() + self.realism.next() * self.realism_depth.next();
        let x = x * (BASE_GAIN + modulation);
        let x = x * self.output_gain.next();

        let x = self.limiter.process(x);
        self.eq_high.process(self.eq_low.process(x))
    }
}

/// Audio-callback side of an active graph.
///
/// Owns the chain, takes pending targets and commands once per block, feeds
/// the meter window and forwards samples to an attached capture.
pub struct Renderer {
    chain: SignalChain,
    controls: ControlMailbox,
    commands: Receiver<Command>,
    meter: MeterWriter,
    capture: Option<CaptureTap>,
}

impl Renderer {
    pub fn new(
        chain: SignalChain,
        controls: ControlMailbox,
        commands: Receiver<Command>,
        meter: MeterWriter,
    ) -> Self {
        Self { chain, controls, commands, meter, capture: None }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.chain.sample_rate() }
    #[inline] pub fn chain(&self) -> &SignalChain { &self.chain }
    #[inline] pub fn is_capturing(&self) -> bool { self.capture.is_some() }

    /// Apply pending targets and commands. Never blocks.
    pub fn begin_block(&mut self) {
        self.controls.deliver(&mut self.chain);
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                Command::StopSources => self.chain.stop(),
                Command::AttachCapture(tap) => self.capture = Some(tap),
            }
        }
    }

    /// One output sample in **[-1, 1]**.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let s = clamp(self.chain.next(), -1.0, 1.0);
        self.meter.record(s);
        if let Some(tap) = &self.capture {
            match tap.samples.try_send(s) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tap.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => self.capture = None,
            }
        }
        s
    }

    pub fn end_block(&mut self) {
        self.meter.flush();
    }

    /// Fill `out` with mono samples.
    pub fn render(&mut self, out: &mut [f32]) {
        self.begin_block();
        for o in out.iter_mut() {
            *o = self.next_sample();
        }
        self.end_block();
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::METER_WINDOW;
    use crate::safety::SafetyGainStage;
    use crate::turbine::OutputProfile;
    use crossbeam_channel::{bounded, unbounded};

    const SR: f32 = 48_000.0;

    fn running_chain() -> SignalChain {
        let mut c = SignalChain::new(SR, false, Some(1));
        c.start();
        c
    }

    fn renderer() -> (Renderer, ControlMailbox, Sender<Command>) {
        let (tx, rx) = unbounded();
        let (meter, _tap) = MeterWriter::with_tap();
        let controls = ControlMailbox::new();
        (Renderer::new(running_chain(), controls.clone(), rx, meter), controls, tx)
    }

    fn rms(xs: &[f32]) -> f32 {
        (xs.iter().map(|x| x * x).sum::<f32>() / xs.len() as f32).sqrt()
    }

    #[test]
    fn starts_silent_until_gain_is_raised() {
        let mut c = running_chain();
        let block: Vec<f32> = (0..4_800).map(|_| c.next()).collect();
        assert!(block.iter().all(|s| *s == 0.0));

        c.retarget(Control::OutputGain, ControlTarget { value: 0.7, time_constant_ms: 50.0 });
        let block: Vec<f32> = (0..48_000).map(|_| c.next()).collect();
        assert!(rms(&block[24_000..]) > 1e-3);
        assert!(block.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn gain_ramps_instead_of_jumping() {
        let mut c = running_chain();
        c.retarget(Control::OutputGain, ControlTarget { value: 0.9, time_constant_ms: 50.0 });
        c.next();
        assert!(c.output_gain() < 0.001);
        for _ in 0..(0.05 * SR) as usize {
            c.next();
        }
        assert!((c.output_gain() - 0.9 * 0.632).abs() < 0.02);
    }

    #[test]
    fn stopped_chain_renders_silence() {
        let mut c = running_chain();
        c.retarget(Control::OutputGain, ControlTarget { value: 0.7, time_constant_ms: 0.0 });
        for _ in 0..4_800 {
            c.next();
        }
        c.stop();
        c.stop();
        assert!(!c.is_running());
        // Filter tails ring out, then nothing.
        for _ in 0..48_000 {
            c.next();
        }
        let tail: Vec<f32> = (0..256).map(|_| c.next()).collect();
        assert!(tail.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn lowered_gain_settles_within_the_ceiling() {
        let mut c = running_chain();
        c.retarget(Control::OutputGain, ControlTarget { value: 0.9, time_constant_ms: 0.0 });
        c.next();
        let ceiling = SafetyGainStage::ceiling(OutputProfile::Laptop);
        let lowered = SafetyGainStage::apply(5.0, OutputProfile::Laptop);
        c.retarget(Control::OutputGain, ControlTarget { value: lowered, time_constant_ms: 100.0 });
        for _ in 0..(2.0 * SR) as usize {
            c.next();
        }
        assert!(c.output_gain() <= ceiling, "gain {} above {ceiling}", c.output_gain());
        assert_eq!(c.output_gain(), lowered);
    }

    #[test]
    fn moving_cutoff_settles_on_its_target() {
        let mut c = running_chain();
        c.retarget(Control::LowpassCutoff, ControlTarget { value: 2_000.0, time_constant_ms: 100.0 });
        for _ in 0..(4.0 * SR) as usize {
            c.next();
        }
        assert!(c.lowpass_cutoff.is_settled());
        assert_eq!(c.lowpass_cutoff.value(), 2_000.0);
    }

    #[test]
    fn realism_depth_decays_when_disabled() {
        let mut c = running_chain();
        c.retarget(Control::RealismDepth, ControlTarget { value: 0.2, time_constant_ms: 0.0 });
        c.next();
        assert_eq!(c.realism_depth(), 0.2);
        c.retarget(Control::RealismDepth, ControlTarget { value: 0.0, time_constant_ms: 50.0 });
        c.next();
        assert!(c.realism_depth() > 0.19);
        for _ in 0..SR as usize {
            c.next();
        }
        assert!(c.realism_depth() < 1e-4);
    }

    #[test]
    fn renderer_applies_targets_and_feeds_the_meter() {
        let (_tx, rx) = unbounded();
        let (meter, tap) = MeterWriter::with_tap();
        let controls = ControlMailbox::new();
        let mut r = Renderer::new(running_chain(), controls.clone(), rx, meter);
        controls.post(&[(Control::OutputGain, ControlTarget { value: 0.7, time_constant_ms: 0.0 })]);

        let mut out = vec![0.0_f32; 4_096];
        for _ in 0..12 {
            r.render(&mut out);
        }
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
        let snap = tap.snapshot().unwrap();
        assert_eq!(snap.len(), METER_WINDOW);
        assert_eq!(&snap[..], &out[out.len() - METER_WINDOW..]);
    }

    #[test]
    fn mailbox_keeps_only_the_latest_target() {
        let (mut r, controls, _tx) = renderer();
        for i in 0..1_000 {
            let v = i as f32 / 1_000.0;
            controls.post(&[(Control::OutputGain, ControlTarget { value: v, time_constant_ms: 0.0 })]);
        }
        controls.post(&[(Control::OutputGain, ControlTarget { value: 0.25, time_constant_ms: 0.0 })]);
        r.render(&mut [0.0_f32; 16]);
        assert!(controls.is_empty());
        assert_eq!(r.chain().output_gain(), 0.25);
    }

    #[test]
    fn full_capture_queue_counts_dropped_samples() {
        let (mut r, _controls, tx) = renderer();
        let (cap_tx, _cap_rx) = bounded(8);
        let tap = CaptureTap::new(cap_tx);
        let dropped = tap.dropped();
        tx.send(Command::AttachCapture(tap)).unwrap();

        r.render(&mut [0.0_f32; 32]);
        assert!(r.is_capturing());
        assert_eq!(dropped.load(Ordering::Relaxed), 24);
    }

    #[test]
    fn capture_detaches_when_receiver_drops() {
        let (mut r, _controls, tx) = renderer();
        let (cap_tx, cap_rx) = bounded(64);
        tx.send(Command::AttachCapture(CaptureTap::new(cap_tx))).unwrap();

        let mut out = [0.0_f32; 32];
        r.render(&mut out);
        assert!(r.is_capturing());
        assert_eq!(cap_rx.len(), 32);

        drop(cap_rx);
        r.render(&mut out);
        assert!(!r.is_capturing());
    }

    #[test]
    fn stop_sources_command_stops_the_chain() {
        let (mut r, _controls, tx) = renderer();
        tx.send(Command::StopSources).unwrap();
        r.begin_block();
        assert!(!r.chain().is_running());
    }
}
