//! Turbine configuration: the raw, deserializable [`TurbineSettings`] and the
//! clamped, immutable [`TurbineConfiguration`] snapshot everything else reads.
//!
//! A snapshot is rebuilt on every change. Out-of-range input is clamped to the
//! nearest valid bound, never rejected, so every snapshot is playable.

use crate::error::EditError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_DISTANCE_M: f32 = 1.0;
pub const MIN_BLADE_LENGTH_M: f32 = 0.1;

/// Wind direction relative to the turbine → listener line.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindDirection {
    #[default]
    Neutral,
    /// Blowing from the turbine towards the listener.
    Toward,
    /// Blowing from the listener towards the turbine.
    Away,
}

impl FromStr for WindDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" | "none" => Ok(Self::Neutral),
            "toward" | "towards" | "downwind" => Ok(Self::Toward),
            "away" | "upwind" => Ok(Self::Away),
            _ => Err(()),
        }
    }
}

impl fmt::Display for WindDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Neutral => "neutral",
            Self::Toward => "toward",
            Self::Away => "away",
        })
    }
}

/// Output device class; selects the gain ceiling and the compensation EQ.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputProfile {
    /// Small built-in speakers.
    #[default]
    Laptop,
    /// External speakers.
    External,
    /// Headphones / reference monitors.
    Flat,
}

impl FromStr for OutputProfile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "laptop" => Ok(Self::Laptop),
            "external" | "speakers" => Ok(Self::External),
            "flat" | "headphones" => Ok(Self::Flat),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OutputProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Laptop => "laptop",
            Self::External => "external",
            Self::Flat => "flat",
        })
    }
}

/// Raw configuration input as it arrives from a settings file, the command
/// line or an interactive edit. Nothing here is validated yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurbineSettings {
    pub distance_m: f32,
    pub rpm: f32,
    pub blade_count: i64,
    pub blade_length_m: f32,
    pub hub_height_m: f32,
    pub wind_speed: f32,
    pub wind_direction: WindDirection,
    pub turbine_count: i64,
    pub air_absorption: bool,
    pub ground_effect: bool,
    pub output_profile: OutputProfile,
    pub realism: bool,
    pub high_fidelity: bool,
}

impl Default for TurbineSettings {
    fn default() -> Self {
        Self {
            distance_m: 300.0,
            rpm: 15.0,
            blade_count: 3,
            blade_length_m: 60.0,
            hub_height_m: 150.0,
            wind_speed: 8.0,
            wind_direction: WindDirection::Neutral,
            turbine_count: 1,
            air_absorption: true,
            ground_effect: true,
            output_profile: OutputProfile::Laptop,
            realism: false,
            high_fidelity: false,
        }
    }
}

/// Immutable, clamped configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurbineConfiguration {
    distance_m: f32,
    rpm: f32,
    blade_count: u32,
    blade_length_m: f32,
    hub_height_m: f32,
    wind_speed: f32,
    wind_direction: WindDirection,
    turbine_count: u32,
    air_absorption: bool,
    ground_effect: bool,
    output_profile: OutputProfile,
    realism: bool,
    high_fidelity: bool,
}

/// Non-finite → `lo`, otherwise at least `lo`.
fn at_least(x: f32, lo: f32) -> f32 {
    if x.is_finite() { x.max(lo) } else { lo }
}

fn count_at_least_one(n: i64) -> u32 {
    u32::try_from(n.max(1)).unwrap_or(u32::MAX)
}

impl From<TurbineSettings> for TurbineConfiguration {
    fn from(s: TurbineSettings) -> Self {
        Self {
            distance_m: at_least(s.distance_m, MIN_DISTANCE_M),
            rpm: at_least(s.rpm, 0.0),
            blade_count: count_at_least_one(s.blade_count),
            blade_length_m: at_least(s.blade_length_m, MIN_BLADE_LENGTH_M),
            hub_height_m: at_least(s.hub_height_m, 0.0),
            wind_speed: at_least(s.wind_speed, 0.0),
            wind_direction: s.wind_direction,
            turbine_count: count_at_least_one(s.turbine_count),
            air_absorption: s.air_absorption,
            ground_effect: s.ground_effect,
            output_profile: s.output_profile,
            realism: s.realism,
            high_fidelity: s.high_fidelity,
        }
    }
}

impl From<&TurbineConfiguration> for TurbineSettings {
    fn from(c: &TurbineConfiguration) -> Self {
        Self {
            distance_m: c.distance_m,
            rpm: c.rpm,
            blade_count: i64::from(c.blade_count),
            blade_length_m: c.blade_length_m,
            hub_height_m: c.hub_height_m,
            wind_speed: c.wind_speed,
            wind_direction: c.wind_direction,
            turbine_count: i64::from(c.turbine_count),
            air_absorption: c.air_absorption,
            ground_effect: c.ground_effect,
            output_profile: c.output_profile,
            realism: c.realism,
            high_fidelity: c.high_fidelity,
        }
    }
}

impl Default for TurbineConfiguration {
    fn default() -> Self {
        TurbineSettings::default().into()
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn parse_f32(v: &str) -> Option<f32> {
    v.trim().parse::<f32>().ok()
}

fn parse_count(v: &str) -> Option<i64> {
    let x = v.trim().parse::<f64>().ok()?;
    x.is_finite().then(|| x.round() as i64)
}

impl TurbineConfiguration {
    #[inline] pub fn distance_m(&self) -> f32 { self.distance_m }
    #[inline] pub fn rpm(&self) -> f32 { self.rpm }
    #[inline] pub fn blade_count(&self) -> u32 { self.blade_count }
    #[inline] pub fn blade_length_m(&self) -> f32 { self.blade_length_m }
    #[inline] pub fn hub_height_m(&self) -> f32 { self.hub_height_m }
    #[inline] pub fn wind_speed(&self) -> f32 { self.wind_speed }
    #[inline] pub fn wind_direction(&self) -> WindDirection { self.wind_direction }
    #[inline] pub fn turbine_count(&self) -> u32 { self.turbine_count }
    #[inline] pub fn air_absorption_enabled(&self) -> bool { self.air_absorption }
    #[inline] pub fn ground_effect_enabled(&self) -> bool { self.ground_effect }
    #[inline] pub fn output_profile(&self) -> OutputProfile { self.output_profile }
    #[inline] pub fn realism_enabled(&self) -> bool { self.realism }
    #[inline] pub fn high_fidelity_enabled(&self) -> bool { self.high_fidelity }

    /// Raw settings equivalent of this snapshot.
    pub fn to_settings(&self) -> TurbineSettings {
        TurbineSettings::from(self)
    }

    /// New snapshot with `edit` applied to the raw settings, then re-clamped.
    pub fn with(&self, edit: impl FnOnce(&mut TurbineSettings)) -> Self {
        let mut s = self.to_settings();
        edit(&mut s);
        s.into()
    }

    /// Apply a textual edit such as `("rpm", "18")` or `("direction", "toward")`.
    ///
    /// Field names accept `-` or `_` separators. Numeric values are clamped like
    /// any other input; only unknown fields and unparsable values are errors.
    pub fn with_edit(&self, field: &str, value: &str) -> Result<Self, EditError> {
        let key = field.trim().to_ascii_lowercase().replace('-', "_");
        let invalid = || EditError::InvalidValue { field: key.clone(), value: value.to_string() };
        let mut s = self.to_settings();
        match key.as_str() {
            "distance" | "distance_m" => s.distance_m = parse_f32(value).ok_or_else(invalid)?,
            "rpm" => s.rpm = parse_f32(value).ok_or_else(invalid)?,
            "blades" | "blade_count" => s.blade_count = parse_count(value).ok_or_else(invalid)?,
            "blade_length" | "blade_length_m" => s.blade_length_m = parse_f32(value).ok_or_else(invalid)?,
            "hub_height" | "hub_height_m" => s.hub_height_m = parse_f32(value).ok_or_else(invalid)?,
            "wind" | "wind_speed" => s.wind_speed = parse_f32(value).ok_or_else(invalid)?,
            "direction" | "wind_direction" => s.wind_direction = value.parse().map_err(|()| invalid())?,
            "turbines" | "turbine_count" => s.turbine_count = parse_count(value).ok_or_else(invalid)?,
            "air_absorption" => s.air_absorption = parse_bool(value).ok_or_else(invalid)?,
            "ground_effect" => s.ground_effect = parse_bool(value).ok_or_else(invalid)?,
            "profile" | "output_profile" => s.output_profile = value.parse().map_err(|()| invalid())?,
            "realism" => s.realism = parse_bool(value).ok_or_else(invalid)?,
            "hq" | "high_fidelity" => s.high_fidelity = parse_bool(value).ok_or_else(invalid)?,
            _ => return Err(EditError::UnknownField(field.to_string())),
        }
        Ok(s.into())
    }
}
