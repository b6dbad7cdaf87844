//! Acoustic readouts derived from a configuration snapshot.
//!
//! Both estimates are pure and cheap; they are recomputed on every
//! configuration change whether or not audio is running.

use crate::turbine::TurbineConfiguration;
use std::fmt;

/// Reference level in dB(A) at [`REFERENCE_DISTANCE_M`].
pub const REFERENCE_SPL_DBA: f32 = 68.0;
/// Distance at which [`REFERENCE_SPL_DBA`] is measured.
pub const REFERENCE_DISTANCE_M: f32 = 50.0;

/// Rate at which blades pass a fixed point: `blades * rpm / 60`.
#[inline]
pub fn blade_passage_hz(cfg: &TurbineConfiguration) -> f32 {
    cfg.blade_count() as f32 * cfg.rpm() / 60.0
}

/// Estimated sound-pressure level at the listener.
///
/// Inverse-distance law in pressure (`20 log10`) relative to the reference
/// point, plus incoherent power summation of `N` equal turbines (`10 log10 N`).
/// The snapshot guarantees `distance >= 1` and `turbines >= 1`.
#[inline]
pub fn estimated_spl_dba(cfg: &TurbineConfiguration) -> f32 {
    let distance_term = 20.0 * (REFERENCE_DISTANCE_M / cfg.distance_m()).log10();
    let multi_turbine_term = 10.0 * (cfg.turbine_count() as f32).log10();
    REFERENCE_SPL_DBA + distance_term + multi_turbine_term
}

/// Numbers shown to the user next to the controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedReadouts {
    pub blade_passage_hz: f32,
    pub estimated_spl_dba: f32,
}

impl DerivedReadouts {
    pub fn compute(cfg: &TurbineConfiguration) -> Self {
        Self {
            blade_passage_hz: blade_passage_hz(cfg),
            estimated_spl_dba: estimated_spl_dba(cfg),
        }
    }
}

impl fmt::Display for DerivedReadouts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BPF {:.1} Hz | SPL {:.1} dB(A)",
            self.blade_passage_hz, self.estimated_spl_dba
        )
    }
}

/// Receives fresh readouts on every configuration change.
pub trait ReadoutSink: Send {
    fn publish(&mut self, readouts: &DerivedReadouts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turbine::TurbineConfiguration;

    fn cfg(distance: f32, turbines: i64) -> TurbineConfiguration {
        TurbineConfiguration::default().with(|s| {
            s.distance_m = distance;
            s.turbine_count = turbines;
        })
    }

    #[test]
    fn three_blades_at_15_rpm() {
        let c = TurbineConfiguration::default().with(|s| {
            s.blade_count = 3;
            s.rpm = 15.0;
        });
        assert_eq!(blade_passage_hz(&c), 0.75);
    }

    #[test]
    fn reference_point_is_exact() {
        assert_eq!(estimated_spl_dba(&cfg(50.0, 1)), 68.0);
    }

    #[test]
    fn halving_distance_adds_six_db() {
        let spl = estimated_spl_dba(&cfg(25.0, 1));
        assert!((spl - (68.0 + 20.0 * 2.0_f32.log10())).abs() < 1e-4);
        assert!((spl - 74.0).abs() < 0.05);
    }

    #[test]
    fn four_turbines_add_six_db() {
        let spl = estimated_spl_dba(&cfg(50.0, 4));
        assert!((spl - (68.0 + 10.0 * 4.0_f32.log10())).abs() < 1e-4);
        assert!((spl - 74.0).abs() < 0.05);
    }

    #[test]
    fn clamped_inputs_keep_spl_finite() {
        let spl = estimated_spl_dba(&cfg(0.0, 0));
        assert!(spl.is_finite());
        assert!((spl - (68.0 + 20.0 * 50.0_f32.log10())).abs() < 1e-4);
    }

    #[test]
    fn display_uses_one_decimal() {
        let r = DerivedReadouts::compute(&TurbineConfiguration::default().with(|s| {
            s.distance_m = 50.0;
            s.rpm = 15.0;
            s.blade_count = 3;
        }));
        assert_eq!(r.to_string(), "BPF 0.8 Hz | SPL 68.0 dB(A)");
    }
}
