//! Configuration → synthesis control targets.
//!
//! [`ParameterMapper::map`] is a deterministic function of the snapshot and the
//! selected [`MappingVariant`]. It produces one [`ControlTarget`] per live
//! control of the signal chain: the value to approach and the smoothing time
//! constant to approach it with. The output gain is left *raw* here; the
//! device ceiling is applied by [`SafetyGainStage`](crate::safety::SafetyGainStage)
//! when the graph consumes the targets.

use crate::acoustics::{blade_passage_hz, REFERENCE_DISTANCE_M};
use crate::turbine::{OutputProfile, TurbineConfiguration, WindDirection};
use serde::{Deserialize, Serialize};

/// Smoothing for spectral and rate controls.
pub const FAST_MS: f32 = 50.0;
/// Smoothing for depths, cutoff and shelf gains.
pub const SLOW_MS: f32 = 100.0;

/// Lowest tonal center frequency.
pub const MIN_TONAL_HZ: f32 = 80.0;
/// Lowpass cutoff with air absorption off (before the direction boost).
pub const OPEN_CUTOFF_HZ: f32 = 18_000.0;
/// Floor for the air-absorption cutoff before the direction boost.
pub const MIN_ABSORPTION_CUTOFF_HZ: f32 = 1_000.0;
/// Absolute floor of the lowpass cutoff.
pub const MIN_CUTOFF_HZ: f32 = 200.0;
/// Hub height at which the ground notch has weakened the most.
pub const GROUND_HEIGHT_SPAN_M: f32 = 150.0;

/// Which of the two historical mappings to reproduce.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingVariant {
    /// Profile- and realism-aware mapping.
    #[default]
    Extended,
    /// Earlier mapping: −4 dB ground shelf, blade-length-scaled tonal peak,
    /// no profile EQ and no realism modulation.
    ///
    /// The blade-length scaling of the tonal peak is an approximation of the
    /// earlier behaviour, not a recorded formula.
    Legacy,
}

/// Value to approach and how fast.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControlTarget {
    pub value: f32,
    pub time_constant_ms: f32,
}

impl ControlTarget {
    #[inline]
    const fn fast(value: f32) -> Self {
        Self { value, time_constant_ms: FAST_MS }
    }

    #[inline]
    const fn slow(value: f32) -> Self {
        Self { value, time_constant_ms: SLOW_MS }
    }
}

/// Every live control of the chain, as computed from one snapshot.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SynthesisControlTargets {
    pub tonal_center_hz: ControlTarget,
    pub tonal_q: ControlTarget,
    pub lowpass_cutoff_hz: ControlTarget,
    pub ground_shelf_db: ControlTarget,
    pub lfo_rate_hz: ControlTarget,
    pub lfo_depth: ControlTarget,
    pub realism_rate_hz: ControlTarget,
    pub realism_depth: ControlTarget,
    pub eq_low_db: ControlTarget,
    pub eq_high_db: ControlTarget,
    /// Natural loudness before the safety clamp.
    pub raw_gain: ControlTarget,
    /// Profile whose ceiling bounds `raw_gain`.
    pub output_profile: OutputProfile,
}

/// Gain multiplier and lowpass cutoff offset for a wind direction.
#[inline]
pub fn direction_adjustment(dir: WindDirection) -> (f32, f32) {
    match dir {
        WindDirection::Neutral => (1.0, 0.0),
        WindDirection::Toward => (1.2, 2_500.0),
        WindDirection::Away => (0.7, -2_500.0),
    }
}

/// Fixed (low shelf dB, high shelf dB) compensation per output profile.
#[inline]
pub fn profile_eq_db(profile: OutputProfile) -> (f32, f32) {
    match profile {
        OutputProfile::Laptop => (5.0, -3.0),
        OutputProfile::External => (2.0, -1.0),
        OutputProfile::Flat => (0.0, 0.0),
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterMapper {
    variant: MappingVariant,
}

impl ParameterMapper {
    pub fn new(variant: MappingVariant) -> Self {
        Self { variant }
    }

    #[inline] pub fn variant(&self) -> MappingVariant { self.variant }

    pub fn tonal_center_hz(&self, cfg: &TurbineConfiguration) -> f32 {
        let bpf = blade_passage_hz(cfg);
        let wind = cfg.wind_speed();
        let rotor_term = match self.variant {
            MappingVariant::Extended => bpf * 2.0,
            // Scaled by blade length as a tip-speed proxy, normalised to 40 m blades.
            MappingVariant::Legacy => bpf * 2.0 * (cfg.blade_length_m() / 40.0),
        };
        (200.0 + wind * 12.0 + rotor_term).max(MIN_TONAL_HZ)
    }

    pub fn tonal_q(&self, cfg: &TurbineConfiguration) -> f32 {
        let wind = cfg.wind_speed();
        if cfg.high_fidelity_enabled() {
            1.2 + wind * 0.03
        } else {
            0.8 + wind * 0.02
        }
    }

    pub fn lowpass_cutoff_hz(&self, cfg: &TurbineConfiguration) -> f32 {
        let (_, boost) = direction_adjustment(cfg.wind_direction());
        let base = if cfg.air_absorption_enabled() {
            (OPEN_CUTOFF_HZ / (1.0 + cfg.distance_m() / 200.0)).max(MIN_ABSORPTION_CUTOFF_HZ)
        } else {
            OPEN_CUTOFF_HZ
        };
        (base + boost).max(MIN_CUTOFF_HZ)
    }

    pub fn ground_shelf_db(&self, cfg: &TurbineConfiguration) -> f32 {
        if !cfg.ground_effect_enabled() {
            return 0.0;
        }
        let base = match self.variant {
            MappingVariant::Extended => -3.0,
            MappingVariant::Legacy => -4.0,
        };
        let height_ratio = (cfg.hub_height_m() / GROUND_HEIGHT_SPAN_M).min(1.0);
        base * (1.0 - 0.2 * height_ratio)
    }

    /// `min(1, sqrt(50/d)) * direction * sqrt(N)`, before any ceiling.
    pub fn raw_gain(&self, cfg: &TurbineConfiguration) -> f32 {
        let (dir_gain, _) = direction_adjustment(cfg.wind_direction());
        let distance_factor = (REFERENCE_DISTANCE_M / cfg.distance_m()).sqrt().min(1.0);
        distance_factor * dir_gain * (cfg.turbine_count() as f32).sqrt()
    }

    fn realism_enabled(&self, cfg: &TurbineConfiguration) -> bool {
        self.variant == MappingVariant::Extended && cfg.realism_enabled()
    }

    pub fn map(&self, cfg: &TurbineConfiguration) -> SynthesisControlTargets {
        let bpf = blade_passage_hz(cfg);
        let wind = cfg.wind_speed();

        let (realism_rate_hz, realism_depth) = if self.realism_enabled(cfg) {
            let depth = (0.06 + wind * 0.01 + (cfg.blade_length_m() / 120.0) * 0.05).min(0.22);
            (ControlTarget::fast((bpf * 0.9).max(0.5)), ControlTarget::slow(depth))
        } else {
            // Rate is left where it is; the depth fades out instead of cutting.
            (ControlTarget::fast((bpf * 0.9).max(0.5)), ControlTarget::fast(0.0))
        };

        let (eq_low, eq_high) = match self.variant {
            MappingVariant::Extended => profile_eq_db(cfg.output_profile()),
            MappingVariant::Legacy => (0.0, 0.0),
        };

        SynthesisControlTargets {
            tonal_center_hz: ControlTarget::fast(self.tonal_center_hz(cfg)),
            tonal_q: ControlTarget::fast(self.tonal_q(cfg)),
            lowpass_cutoff_hz: ControlTarget::slow(self.lowpass_cutoff_hz(cfg)),
            ground_shelf_db: ControlTarget::slow(self.ground_shelf_db(cfg)),
            lfo_rate_hz: ControlTarget::fast((bpf / 2.0).max(0.2)),
            lfo_depth: ControlTarget::slow(0.08 + wind * 0.01),
            realism_rate_hz,
            realism_depth,
            eq_low_db: ControlTarget::slow(eq_low),
            eq_high_db: ControlTarget::slow(eq_high),
            raw_gain: ControlTarget::fast(self.raw_gain(cfg)),
            output_profile: cfg.output_profile(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turbine::TurbineSettings;

    fn cfg(edit: impl FnOnce(&mut TurbineSettings)) -> TurbineConfiguration {
        TurbineConfiguration::default().with(edit)
    }

    const EXT: ParameterMapper = ParameterMapper { variant: MappingVariant::Extended };
    const LEGACY: ParameterMapper = ParameterMapper { variant: MappingVariant::Legacy };

    #[test]
    fn tonal_center_rises_with_wind_and_rotor() {
        let c = cfg(|s| {
            s.wind_speed = 10.0;
            s.rpm = 15.0;
            s.blade_count = 3;
        });
        assert!((EXT.tonal_center_hz(&c) - (200.0 + 120.0 + 1.5)).abs() < 1e-3);
        let faster = cfg(|s| {
            s.wind_speed = 10.0;
            s.rpm = 30.0;
            s.blade_count = 3;
        });
        assert!(EXT.tonal_center_hz(&faster) > EXT.tonal_center_hz(&c));
        assert!(EXT.tonal_center_hz(&cfg(|s| {
            s.wind_speed = 0.0;
            s.rpm = 0.0;
        })) >= MIN_TONAL_HZ);
    }

    #[test]
    fn high_fidelity_sharpens_q() {
        let lo = cfg(|s| s.wind_speed = 10.0);
        let hi = cfg(|s| {
            s.wind_speed = 10.0;
            s.high_fidelity = true;
        });
        assert!((EXT.tonal_q(&lo) - 1.0).abs() < 1e-6);
        assert!((EXT.tonal_q(&hi) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn lfo_targets_follow_bpf_and_wind() {
        let t = EXT.map(&cfg(|s| {
            s.rpm = 15.0;
            s.blade_count = 3;
            s.wind_speed = 4.0;
        }));
        assert_eq!(t.lfo_rate_hz.value, 0.375);
        assert!((t.lfo_depth.value - 0.12).abs() < 1e-6);
        let idle = EXT.map(&cfg(|s| s.rpm = 0.0));
        assert_eq!(idle.lfo_rate_hz.value, 0.2);
    }

    #[test]
    fn realism_depth_is_capped_and_fades_when_off() {
        let on = EXT.map(&cfg(|s| {
            s.realism = true;
            s.wind_speed = 25.0;
            s.blade_length_m = 120.0;
        }));
        assert_eq!(on.realism_depth.value, 0.22);
        assert_eq!(on.realism_depth.time_constant_ms, SLOW_MS);

        let off = EXT.map(&cfg(|s| s.realism = false));
        assert_eq!(off.realism_depth.value, 0.0);
        assert!(off.realism_depth.time_constant_ms > 0.0);

        let legacy = LEGACY.map(&cfg(|s| s.realism = true));
        assert_eq!(legacy.realism_depth.value, 0.0);
    }

    #[test]
    fn direction_shapes_gain_and_cutoff() {
        let neutral = cfg(|s| {
            s.distance_m = 50.0;
            s.air_absorption = false;
        });
        let toward = neutral.with(|s| s.wind_direction = WindDirection::Toward);
        let away = neutral.with(|s| s.wind_direction = WindDirection::Away);
        assert_eq!(EXT.raw_gain(&neutral), 1.0);
        assert!((EXT.raw_gain(&toward) - 1.2).abs() < 1e-6);
        assert!((EXT.raw_gain(&away) - 0.7).abs() < 1e-6);
        assert_eq!(EXT.lowpass_cutoff_hz(&toward), 20_500.0);
        assert_eq!(EXT.lowpass_cutoff_hz(&away), 15_500.0);
    }

    #[test]
    fn raw_gain_never_exceeds_unity_from_distance_alone() {
        for d in [1.0, 5.0, 20.0, 49.0, 50.0] {
            assert_eq!(EXT.raw_gain(&cfg(|s| s.distance_m = d)), 1.0);
        }
        let far = EXT.raw_gain(&cfg(|s| s.distance_m = 200.0));
        assert!((far - 0.5).abs() < 1e-6);
        let four = EXT.raw_gain(&cfg(|s| {
            s.distance_m = 200.0;
            s.turbine_count = 4;
        }));
        assert!((four - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cutoff_is_non_increasing_in_distance_with_absorption() {
        let mut last = f32::INFINITY;
        for d in (1..=5000).step_by(7) {
            let c = EXT.lowpass_cutoff_hz(&cfg(|s| {
                s.distance_m = d as f32;
                s.air_absorption = true;
            }));
            assert!(c <= last, "d={d} c={c} last={last}");
            assert!(c >= MIN_CUTOFF_HZ);
            last = c;
        }
    }

    #[test]
    fn cutoff_is_constant_without_absorption() {
        for dir in [WindDirection::Neutral, WindDirection::Toward, WindDirection::Away] {
            let (_, boost) = direction_adjustment(dir);
            for d in [1.0, 100.0, 1000.0, 10_000.0] {
                let c = EXT.lowpass_cutoff_hz(&cfg(|s| {
                    s.distance_m = d;
                    s.air_absorption = false;
                    s.wind_direction = dir;
                }));
                assert_eq!(c, OPEN_CUTOFF_HZ + boost);
            }
        }
    }

    #[test]
    fn ground_shelf_weakens_with_height_and_vanishes_when_off() {
        for mapper in [EXT, LEGACY] {
            let mut last = f32::INFINITY;
            for h in (0..=400).step_by(5) {
                let on = mapper.ground_shelf_db(&cfg(|s| {
                    s.hub_height_m = h as f32;
                    s.ground_effect = true;
                }));
                assert!(on <= 0.0);
                assert!(on.abs() <= last, "h={h}");
                last = on.abs();

                let off = mapper.ground_shelf_db(&cfg(|s| {
                    s.hub_height_m = h as f32;
                    s.ground_effect = false;
                }));
                assert_eq!(off, 0.0);
            }
        }
        assert_eq!(EXT.ground_shelf_db(&cfg(|s| s.hub_height_m = 0.0)), -3.0);
        assert_eq!(LEGACY.ground_shelf_db(&cfg(|s| s.hub_height_m = 0.0)), -4.0);
        assert!((EXT.ground_shelf_db(&cfg(|s| s.hub_height_m = 300.0)) + 2.4).abs() < 1e-6);
    }

    #[test]
    fn profile_eq_is_fixed_per_profile() {
        for (profile, eq) in [
            (OutputProfile::Laptop, (5.0, -3.0)),
            (OutputProfile::External, (2.0, -1.0)),
            (OutputProfile::Flat, (0.0, 0.0)),
        ] {
            let t = EXT.map(&cfg(|s| s.output_profile = profile));
            assert_eq!((t.eq_low_db.value, t.eq_high_db.value), eq);
            let legacy = LEGACY.map(&cfg(|s| s.output_profile = profile));
            assert_eq!((legacy.eq_low_db.value, legacy.eq_high_db.value), (0.0, 0.0));
        }
    }

    #[test]
    fn mapping_is_deterministic() {
        let c = cfg(|s| {
            s.realism = true;
            s.wind_direction = WindDirection::Away;
        });
        assert_eq!(EXT.map(&c), EXT.map(&c));
    }
}
