//! Periodic sources of the synthesis chain.
//!
//! These run per sample on the audio thread; no locks, no heap after construction.
//!
//! Contents:
//! - `Lfo`       : sine low-frequency oscillator with a smoothed rate
//! - `NoiseLoop` : looped buffer of uniform noise, generated off the audio thread
//!
//! Both sources have an explicit running state. `start`/`stop` are idempotent
//! and a stopped source outputs silence.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use windhum_core::dsp::{fast_sin, TAU};
use windhum_core::smoothing::SmoothedParam;

/// Peak amplitude of the noise source.
pub const NOISE_AMPLITUDE: f32 = 0.5;

/// Sine LFO. Output is in **[-1, 1]**.
#[derive(Copy, Clone, Debug)]
pub struct Lfo {
    phase: f32, // [0,1)
    rate: SmoothedParam,
    sr: f32,
    running: bool,
}

impl Lfo {
    #[inline]
    pub fn new(rate_hz: f32, sr: f32) -> Self {
        Self { phase: 0.0, rate: SmoothedParam::new(rate_hz.max(0.0), sr), sr: sr.max(1.0), running: false }
    }

    #[inline] pub fn start(&mut self) { self.running = true; }
    #[inline] pub fn stop(&mut self) { self.running = false; }
    #[inline] pub fn is_running(&self) -> bool { self.running }

    #[inline]
    pub fn retarget_rate(&mut self, hz: f32, time_constant_ms: f32) {
        self.rate.set_target(hz.max(0.0), time_constant_ms);
    }

    #[inline] pub fn rate_hz(&self) -> f32 { self.rate.value() }

    /// Advance one sample.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if !self.running {
            return 0.0;
        }
        let hz = self.rate.next();
        self.phase = (self.phase + hz / self.sr) % 1.0;
        fast_sin(TAU * self.phase)
    }
}

/// Finite noise buffer played in a loop.
#[derive(Clone, Debug)]
pub struct NoiseLoop {
    buf: Vec<f32>,
    pos: usize,
    running: bool,
}

impl NoiseLoop {
    /// Generate `seconds` of uniform noise in `[-0.5, 0.5]`.
    /// With `seed = None` the generator is seeded from OS entropy.
    pub fn generate(seconds: f32, sr: f32, seed: Option<u64>) -> Self {
        let len = ((seconds.max(0.0) * sr).floor() as usize).max(1);
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let buf = (0..len)
            .map(|_| rng.gen_range(-1.0_f32..1.0) * NOISE_AMPLITUDE)
            .collect();
        Self { buf, pos: 0, running: false }
    }

    #[inline] pub fn len(&self) -> usize { self.buf.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.buf.is_empty() }

    #[inline] pub fn start(&mut self) { self.running = true; }
    #[inline] pub fn stop(&mut self) { self.running = false; }
    #[inline] pub fn is_running(&self) -> bool { self.running }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if !self.running {
            return 0.0;
        }
        let s = self.buf[self.pos];
        self.pos += 1;
        if self.pos == self.buf.len() {
            self.pos = 0;
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_bounded_and_loops() {
        let mut n = NoiseLoop::generate(0.01, 48_000.0, Some(7));
        assert_eq!(n.len(), 480);
        n.start();
        let first: Vec<f32> = (0..480).map(|_| n.next()).collect();
        assert!(first.iter().all(|s| s.abs() <= NOISE_AMPLITUDE));
        assert!(first.iter().any(|s| *s != 0.0));
        let again: Vec<f32> = (0..480).map(|_| n.next()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let a = NoiseLoop::generate(0.01, 8_000.0, Some(42));
        let b = NoiseLoop::generate(0.01, 8_000.0, Some(42));
        assert_eq!(a.buf, b.buf);
    }

    #[test]
    fn start_stop_are_idempotent() {
        let mut lfo = Lfo::new(2.0, 1_000.0);
        assert_eq!(lfo.next(), 0.0);
        lfo.start();
        lfo.start();
        assert!(lfo.is_running());
        let _ = lfo.next();
        lfo.stop();
        lfo.stop();
        assert_eq!(lfo.next(), 0.0);
    }

    #[test]
    fn lfo_completes_cycles_at_its_rate() {
        let sr = 1_000.0;
        let mut lfo = Lfo::new(2.0, sr);
        lfo.start();
        let mut crossings = 0;
        let mut prev = lfo.next();
        for _ in 0..(sr as usize) {
            let v = lfo.next();
            if prev < 0.0 && v >= 0.0 {
                crossings += 1;
            }
            prev = v;
        }
        assert_eq!(crossings, 2);
    }
}
