//! Math backend and small DSP helpers shared by the filters, smoothers and the limiter.
//!
//! Design goals:
//! - `no_std` ready (guarded by the crate feature `no-std`)
//! - Math backend selection that works in both `std` and `no_std` contexts
//! - Optional `fast-math` approximations for the per-sample hot paths
//!
//! Conventions:
//! - Frequencies are **Hz**, times are **milliseconds** unless a name says otherwise.
//! - Argument and return domains are documented per function.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // libm (C math) in no_std
    if #[cfg(feature = "no-std")] {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { libm::cosf(x) }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { libm::expf(x) }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { libm::logf(x) }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { libm::tanf(x) }
        #[inline] pub(crate) fn m_sqrt(x: f32) -> f32 { libm::sqrtf(x) }
    // std backend
    } else {
        #[inline] pub(crate) fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] pub(crate) fn m_cos(x: f32) -> f32 { x.cos() }
        #[inline] pub(crate) fn m_exp(x: f32) -> f32 { x.exp() }
        #[inline] pub(crate) fn m_ln(x: f32) -> f32 { x.ln() }
        #[inline] pub(crate) fn m_tan(x: f32) -> f32 { x.tan() }
        #[inline] pub(crate) fn m_sqrt(x: f32) -> f32 { x.sqrt() }
    }
}

// --------------------------------- Constants -------------------------------------

/// 2π
pub const TAU: f32 = 2.0 * PI;

/// Magnitudes below this are flushed to zero in recursive filters.
pub const EPS_SMALL: f32 = 1.0e-20;

/// Floor used by [`lin_to_db`] for silent input.
pub const DB_FLOOR: f32 = -120.0;

// --------------------------------- Utilities -------------------------------------

/// Clamp that also maps NaN to `lo`.
#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x.is_nan() || x < lo { lo } else if x > hi { hi } else { x }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

/// Square root through the selected backend.
#[inline]
pub fn sqrt(x: f32) -> f32 {
    m_sqrt(x)
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    if db <= DB_FLOOR { 0.0 } else { m_exp(0.11512925464970229_f32 * db) } // ln(10)/20
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    if lin <= EPS_SMALL { DB_FLOOR } else { 8.685889638065036553_f32 * m_ln(lin) } // 20/ln(10)
}

// --------------------------------- Fast trig -------------------------------------

/// Sine with an optional 5th-order polynomial under `fast-math` (max abs error ~1e-3).
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let mut xr = x;
            let k = (xr / TAU).round();
            xr -= k * TAU;
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            m_sin(x)
        }
    }
}

#[inline]
pub fn fast_cos(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            fast_sin(x + PI * 0.5)
        } else {
            m_cos(x)
        }
    }
}

// --------------------------------- Exponentials / smoothing ----------------------

/// One-pole coefficient `a = exp(-1/(tau * sr))` for a time constant `t_ms`.
///
/// `t_ms` is the time to cover ~63% (1 - 1/e) of a step, the same meaning a
/// "set target at time" automation gives its time constant. `t_ms <= 0`
/// returns 0.0, i.e. an immediate jump.
#[inline]
pub fn one_pole_coeff_ms(t_ms: f32, sr: f32) -> f32 {
    if t_ms <= 0.0 { return 0.0; }
    let tau = t_ms * 0.001;
    m_exp(-1.0 / (tau * sr.max(1.0)))
}

/// TPT `g = tan(π fc / sr)` for state-variable filters. The cutoff is kept
/// below Nyquist so a boosted lowpass cutoff can never blow up `tan`.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let fc = clamp(cut_hz, 1.0, 0.49 * sr);
    let x = PI * (fc / sr);
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            fast_sin(x) / fast_cos(x)
        } else {
            m_tan(x)
        }
    }
}

// --------------------------------- Tests (std only) ------------------------------
