#![cfg_attr(not(feature = "std"), no_std)]
//! windhum core: no_std-ready DSP primitives for the wind-turbine sound simulator.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use the `libm` math backend
//! - `fast-math`: enable polynomial trig in the filter coefficient paths
//!
//! Modules
//! - [`dsp`]       : math backend, dB/linear, one-pole and TPT coefficients
//! - [`filters`]   : TPT state-variable filter, RBJ shelving biquads
//! - [`smoothing`] : retargetable exponential parameter smoothing
//! - [`dynamics`]  : soft-knee peak limiter
//!
//! Everything here is allocation free and safe to run on the audio thread.

pub mod dsp;
pub mod dynamics;
pub mod filters;
pub mod smoothing;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{clamp, db_to_lin, kill_denormals, lin_to_db, one_pole_coeff_ms, tpt_g, TAU};
    pub use crate::dynamics::{LimiterParams, SoftLimiter};
    pub use crate::filters::{Biquad, Shelf, SvfMode, SvfTpt};
    pub use crate::smoothing::SmoothedParam;
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let mut p = SmoothedParam::new(0.0, 48000.0);
        p.set_target(1.0, 50.0);
        let mut bp = SvfTpt::new(400.0, 0.8, 48000.0);
        let _ = bp.process_bp(p.next());
        let mut lim = SoftLimiter::new(LimiterParams::default(), 48000.0);
        let _ = lim.process(0.1);
    }
}
