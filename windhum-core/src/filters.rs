//! Filters: a TPT state-variable filter and RBJ shelving biquads.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Stable under per-sample parameter modulation
//! - Parameterization that matches the usual "biquad node" controls
//!   (frequency in Hz, Q, shelf gain in dB)
//!
//! Contents
//! - `SvfMode` : LP/HP/BP/Notch taps of the SVF
//! - `SvfTpt`  : State-Variable Filter via Topology Preserving Transform
//! - `Shelf`   : low/high shelf selection
//! - `Biquad`  : Direct Form II transposed biquad with RBJ shelf coefficients
//!
//! Notes
//! - `SvfTpt` uses the “g = tan(π fc / sr)” formulation with `R = 1/(2Q)`.
//! - Shelves use the Audio EQ Cookbook formulas with slope `S = 1`.

use crate::dsp::{db_to_lin, fast_cos, fast_sin, kill_denormals, sqrt, tpt_g, TAU};

/// SVF output tap selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    Highpass,
    /// Bandpass normalized to 0 dB at the center frequency.
    Bandpass,
    Notch,
}

/// Topology-Preserving Transform SVF (State-Variable Filter).
///
/// Parameters:
/// - `cut_hz`  : cutoff / center frequency in Hz
/// - `q`       : quality factor (>= ~0.5 typical; lower increases damping)
///
/// Internals:
/// - `g = tan(π fc / sr)`
/// - `R = 1 / (2Q)`
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    sr: f32,
    cut: f32,
    q: f32,
    // derived
    g: f32,
    r: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfTpt {
    #[inline]
    pub fn new(cut_hz: f32, q: f32, sr: f32) -> Self {
        let mut s = Self {
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            q: q.max(1e-4),
            g: 0.0,
            r: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        s.recalc();
        s
    }

    #[inline] pub fn set_cutoff_hz(&mut self, cut_hz: f32) { self.cut = cut_hz.max(0.0); self.recalc(); }

    /// Update cutoff and Q with a single coefficient recalculation.
    #[inline]
    pub fn set_params(&mut self, cut_hz: f32, q: f32) {
        self.cut = cut_hz.max(0.0);
        self.q = q.max(1e-4);
        self.recalc();
    }

    #[inline] pub fn cutoff_hz(&self) -> f32 { self.cut }
    #[inline] pub fn q(&self) -> f32 { self.q }

    #[inline]
    fn recalc(&mut self) {
        self.g = tpt_g(self.cut, self.sr);
        self.r = 1.0 / (2.0 * self.q);
    }

    /// Process one sample and return the four taps `(lp, bp, hp, notch)`.
    /// `bp` is the raw band output whose peak gain equals `Q`.
    #[inline]
    pub fn process_all(&mut self, x: f32) -> (f32, f32, f32, f32) {
        // Zavalishin's TPT SVF, solved for the zero-delay feedback loop.
        let h = 1.0 / (1.0 + 2.0 * self.r * self.g + self.g * self.g);
        let hp = (x - (2.0 * self.r + self.g) * self.ic1eq - self.ic2eq) * h;
        let bp = self.g * hp + self.ic1eq;
        let lp = self.g * bp + self.ic2eq;

        self.ic1eq = kill_denormals(self.g * hp + bp);
        self.ic2eq = kill_denormals(self.g * bp + lp);

        (lp, bp, hp, hp + lp)
    }

    /// Process one sample, returning only the mode requested.
    #[inline]
    pub fn process(&mut self, x: f32, mode: SvfMode) -> f32 {
        let (lp, bp, hp, n) = self.process_all(x);
        match mode {
            SvfMode::Lowpass => lp,
            SvfMode::Highpass => hp,
            SvfMode::Bandpass => 2.0 * self.r * bp,
            SvfMode::Notch => n,
        }
    }

    #[inline] pub fn process_lp(&mut self, x: f32) -> f32 { self.process(x, SvfMode::Lowpass) }
    #[inline] pub fn process_bp(&mut self, x: f32) -> f32 { self.process(x, SvfMode::Bandpass) }
}

/// Which side of the corner frequency a [`Biquad`] shelf acts on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shelf {
    Low,
    High,
}

/// Shelving biquad (Direct Form II transposed).
///
/// `gain_db` boosts (> 0) or cuts (< 0) everything below (`Shelf::Low`) or above
/// (`Shelf::High`) the corner frequency. At 0 dB the filter is an exact passthrough.
#[derive(Copy, Clone, Debug)]
pub struct Biquad {
    shelf: Shelf,
    sr: f32,
    freq: f32,
    gain_db: f32,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    #[inline]
    pub fn new(shelf: Shelf, freq_hz: f32, gain_db: f32, sr: f32) -> Self {
        let mut s = Self {
            shelf,
            sr: sr.max(1.0),
            freq: freq_hz,
            gain_db,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        s.recalc();
        s
    }

    #[inline] pub fn low_shelf(freq_hz: f32, gain_db: f32, sr: f32) -> Self { Self::new(Shelf::Low, freq_hz, gain_db, sr) }
    #[inline] pub fn high_shelf(freq_hz: f32, gain_db: f32, sr: f32) -> Self { Self::new(Shelf::High, freq_hz, gain_db, sr) }

    #[inline]
    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain_db = gain_db;
        self.recalc();
    }

    #[inline] pub fn gain_db(&self) -> f32 { self.gain_db }

    fn recalc(&mut self) {
        let fc = self.freq.clamp(1.0, 0.49 * self.sr);
        let a = db_to_lin(0.5 * self.gain_db); // 10^(gain/40)
        let w0 = TAU * fc / self.sr;
        let (sin_w0, cos_w0) = (fast_sin(w0), fast_cos(w0));
        // S = 1  =>  alpha = sin(w0)/2 * sqrt(2)
        let alpha = sin_w0 * core::f32::consts::FRAC_1_SQRT_2;
        let two_sqrt_a_alpha = 2.0 * sqrt(a) * alpha;
        let (ap1, am1) = (a + 1.0, a - 1.0);

        let (b0, b1, b2, a0, a1, a2) = match self.shelf {
            Shelf::Low => (
                a * (ap1 - am1 * cos_w0 + two_sqrt_a_alpha),
                2.0 * a * (am1 - ap1 * cos_w0),
                a * (ap1 - am1 * cos_w0 - two_sqrt_a_alpha),
                ap1 + am1 * cos_w0 + two_sqrt_a_alpha,
                -2.0 * (am1 + ap1 * cos_w0),
                ap1 + am1 * cos_w0 - two_sqrt_a_alpha,
            ),
            Shelf::High => (
                a * (ap1 + am1 * cos_w0 + two_sqrt_a_alpha),
                -2.0 * a * (am1 + ap1 * cos_w0),
                a * (ap1 + am1 * cos_w0 - two_sqrt_a_alpha),
                ap1 - am1 * cos_w0 + two_sqrt_a_alpha,
                2.0 * (am1 - ap1 * cos_w0),
                ap1 - am1 * cos_w0 - two_sqrt_a_alpha,
            ),
        };

        let inv_a0 = 1.0 / a0;
        self.b0 = b0 * inv_a0;
        self.b1 = b1 * inv_a0;
        self.b2 = b2 * inv_a0;
        self.a1 = a1 * inv_a0;
        self.a2 = a2 * inv_a0;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = kill_denormals(self.b1 * x - self.a1 * y + self.z2);
        self.z2 = kill_denormals(self.b2 * x - self.a2 * y);
        y
    }
}

// ------------------------------------ Tests --------------------------------------
