//! Output gain protection.
//!
//! The final linear gain is bounded twice: by the ceiling of the active output
//! profile and by a global hard ceiling. The natural (raw) gain computed by the
//! mapper can be anything; what reaches the output gain control never exceeds
//! either bound. This is applied on every retarget, not only at activation.

use crate::turbine::OutputProfile;

/// Global ceiling, independent of profile.
pub const HARD_CEILING: f32 = 0.95;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SafetyGainStage;

impl SafetyGainStage {
    /// Ceiling of a single output profile.
    #[inline]
    pub const fn profile_ceiling(profile: OutputProfile) -> f32 {
        match profile {
            OutputProfile::Laptop => 0.70,
            OutputProfile::External => 0.90,
            OutputProfile::Flat => 1.00,
        }
    }

    /// Effective upper bound for `profile` once the hard ceiling is included.
    #[inline]
    pub fn ceiling(profile: OutputProfile) -> f32 {
        Self::profile_ceiling(profile).min(HARD_CEILING)
    }

    /// `min(hard, min(profile, raw))`, with negative or non-finite input mapped to 0.
    #[inline]
    pub fn apply(raw_gain: f32, profile: OutputProfile) -> f32 {
        if !raw_gain.is_finite() || raw_gain <= 0.0 {
            return 0.0;
        }
        HARD_CEILING.min(Self::profile_ceiling(profile).min(raw_gain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingVariant, ParameterMapper};
    use crate::turbine::{TurbineConfiguration, WindDirection};

    const PROFILES: [OutputProfile; 3] =
        [OutputProfile::Laptop, OutputProfile::External, OutputProfile::Flat];

    #[test]
    fn ceilings_per_profile() {
        assert_eq!(SafetyGainStage::apply(10.0, OutputProfile::Laptop), 0.70);
        assert_eq!(SafetyGainStage::apply(10.0, OutputProfile::External), 0.90);
        assert_eq!(SafetyGainStage::apply(10.0, OutputProfile::Flat), HARD_CEILING);
    }

    #[test]
    fn quiet_gain_passes_through() {
        assert_eq!(SafetyGainStage::apply(0.25, OutputProfile::Laptop), 0.25);
    }

    #[test]
    fn bad_input_is_silenced() {
        for raw in [-1.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert_eq!(SafetyGainStage::apply(raw, OutputProfile::Flat), 0.0);
        }
    }

    #[test]
    fn applied_gain_stays_within_ceiling_for_all_configurations() {
        for variant in [MappingVariant::Extended, MappingVariant::Legacy] {
            let mapper = ParameterMapper::new(variant);
            for profile in PROFILES {
                for dir in [WindDirection::Neutral, WindDirection::Toward, WindDirection::Away] {
                    for distance in [1.0, 10.0, 35.0, 50.0, 120.0, 800.0, 5000.0] {
                        for turbines in [1, 2, 5, 20, 100] {
                            let cfg = TurbineConfiguration::default().with(|s| {
                                s.output_profile = profile;
                                s.wind_direction = dir;
                                s.distance_m = distance;
                                s.turbine_count = turbines;
                            });
                            let t = mapper.map(&cfg);
                            let applied = SafetyGainStage::apply(t.raw_gain.value, t.output_profile);
                            assert!(applied >= 0.0);
                            assert!(
                                applied <= SafetyGainStage::profile_ceiling(profile),
                                "{profile:?} {dir:?} d={distance} n={turbines} -> {applied}"
                            );
                            assert!(applied <= HARD_CEILING);
                        }
                    }
                }
            }
        }
    }
}
