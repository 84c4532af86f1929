//! brir-core: Shared types for BrirForge
//!
//! Impulse-response buffers, the speaker/ear channel map, configuration and
//! the validation error type used by the `brir-dsp` analysis crate.

mod channel;
mod config;
mod error;
mod sample;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use sample::*;

/// Decibel value wrapper
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);

    /// Level of a power quantity, floored at [`EPSILON`] (-200 dB)
    #[inline]
    pub fn from_power(power: f64) -> Self {
        Self(10.0 * power.max(EPSILON).log10())
    }

    /// Level of an amplitude quantity, floored at [`EPSILON`]
    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        Self(20.0 * gain.abs().max(EPSILON).log10())
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        10.0_f64.powf(self.0 / 20.0)
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}
