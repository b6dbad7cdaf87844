//! Parameter smoothing: exponential approach towards a retargetable value.
//!
//! Every live control of the synthesis chain is a [`SmoothedParam`]. A retarget
//! never jumps; the value follows `y += (target - y) * (1 - a)` with
//! `a = exp(-1/(tau*sr))`, so after one time constant ~63% of the distance is
//! covered and rapid edits cannot click.

use crate::dsp::one_pole_coeff_ms;

/// Below this distance to the target (relative for targets above 1) the
/// parameter snaps and reports settled.
pub const SETTLE_EPS: f32 = 1.0e-5;

/// One-pole smoothed control value.
#[derive(Copy, Clone, Debug)]
pub struct SmoothedParam {
    value: f32,
    target: f32,
    alpha: f32,
    sr: f32,
}

impl SmoothedParam {
    /// Start settled at `initial`.
    #[inline]
    pub fn new(initial: f32, sr: f32) -> Self {
        Self { value: initial, target: initial, alpha: 0.0, sr: sr.max(1.0) }
    }

    /// Approach `target` with time constant `time_constant_ms`.
    /// A non-positive time constant jumps on the next tick.
    #[inline]
    pub fn set_target(&mut self, target: f32, time_constant_ms: f32) {
        if !target.is_finite() {
            return;
        }
        self.target = target;
        self.alpha = one_pole_coeff_ms(time_constant_ms, self.sr);
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let d = self.target - self.value;
        let next = self.value + d * (1.0 - self.alpha);
        // Near large targets the step falls below one ulp; snap instead of stalling.
        if next == self.value || d.abs() <= SETTLE_EPS * self.target.abs().max(1.0) {
            self.value = self.target;
        } else {
            self.value = next;
        }
        self.value
    }

    /// Advance `n` samples at once (control-rate updates).
    #[inline]
    pub fn skip(&mut self, n: usize) -> f32 {
        for _ in 0..n {
            self.next();
        }
        self.value
    }

    #[inline] pub fn value(&self) -> f32 { self.value }
    #[inline] pub fn target(&self) -> f32 { self.target }
    #[inline] pub fn is_settled(&self) -> bool { self.value == self.target }
}

// ------------------------------------ Tests --------------------------------------
