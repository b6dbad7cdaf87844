//! Soft-knee peak limiter (compressor with a high ratio).
//!
//! Feed-forward design: a peak detector drives a static soft-knee gain curve in
//! the dB domain, and the resulting gain reduction is smoothed with separate
//! attack and release time constants. It only engages around the threshold.

use crate::dsp::{db_to_lin, lin_to_db, one_pole_coeff_ms};

/// Static curve and ballistics of a [`SoftLimiter`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LimiterParams {
    /// Threshold in dBFS.
    pub threshold_db: f32,
    /// Knee width in dB, centered on the threshold.
    pub knee_db: f32,
    /// Compression ratio above the knee (input dB : output dB).
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for LimiterParams {
    fn default() -> Self {
        Self { threshold_db: -6.0, knee_db: 20.0, ratio: 8.0, attack_ms: 2.0, release_ms: 250.0 }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SoftLimiter {
    params: LimiterParams,
    atk: f32,
    rel: f32,
    /// Current gain reduction in dB (<= 0).
    gr_db: f32,
}

impl SoftLimiter {
    pub fn new(params: LimiterParams, sr: f32) -> Self {
        Self {
            params,
            atk: one_pole_coeff_ms(params.attack_ms, sr),
            rel: one_pole_coeff_ms(params.release_ms, sr),
            gr_db: 0.0,
        }
    }

    #[inline] pub fn params(&self) -> LimiterParams { self.params }

    /// Gain reduction (dB, <= 0) the static curve asks for at `level_db`.
    #[inline]
    pub fn curve_db(&self, level_db: f32) -> f32 {
        let LimiterParams { threshold_db: t, knee_db: k, ratio: r, .. } = self.params;
        let over = level_db - t;
        let slope = 1.0 / r.max(1.0) - 1.0;
        if 2.0 * over < -k {
            0.0
        } else if k > 0.0 && 2.0 * over.abs() <= k {
            let x = over + 0.5 * k;
            slope * x * x / (2.0 * k)
        } else {
            slope * over
        }
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let target = self.curve_db(lin_to_db(x.abs()));
        let a = if target < self.gr_db { self.atk } else { self.rel };
        self.gr_db = a * self.gr_db + (1.0 - a) * target;
        x * db_to_lin(self.gr_db)
    }

    #[inline] pub fn gain_reduction_db(&self) -> f32 { self.gr_db }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::TAU;

    #[test]
    fn quiet_signal_passes_untouched() {
        let mut lim = SoftLimiter::new(LimiterParams::default(), 48_000.0);
        for i in 0..48_000 {
            let x = 0.05 * (TAU * 200.0 * i as f32 / 48_000.0).sin();
            assert!((lim.process(x) - x).abs() < 1e-6);
        }
        assert_eq!(lim.gain_reduction_db(), 0.0);
    }

    #[test]
    fn loud_signal_is_pulled_down() {
        let mut lim = SoftLimiter::new(LimiterParams::default(), 48_000.0);
        let mut peak = 0.0_f32;
        for i in 0..48_000 {
            let y = lim.process(2.0 * (TAU * 200.0 * i as f32 / 48_000.0).sin());
            if i > 24_000 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 1.0, "peak={peak}");
        assert!(lim.gain_reduction_db() < -6.0);
    }

    #[test]
    fn curve_is_continuous_through_knee() {
        let lim = SoftLimiter::new(LimiterParams::default(), 48_000.0);
        let below = lim.curve_db(-16.0 - 1e-3);
        let at_lower_edge = lim.curve_db(-16.0);
        let at_upper_edge = lim.curve_db(4.0);
        let above = lim.curve_db(4.0 + 1e-3);
        assert!((below - at_lower_edge).abs() < 1e-3);
        assert!((at_upper_edge - above).abs() < 1e-2);
        assert!(at_upper_edge < 0.0);
    }
}
