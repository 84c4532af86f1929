//! Sample types and impulse response buffers

use serde::{Deserialize, Serialize};

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Floor used wherever a power or magnitude may reach zero (≈ -200 dB)
pub const EPSILON: f64 = 1e-20;

/// Single-channel impulse response
///
/// Owned exclusively by its slot in a [`ChannelMap`](crate::ChannelMap).
/// The decay reshaper and the virtual bass synthesizer mutate `samples`
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseResponse {
    pub samples: Vec<Sample>,
    pub sample_rate: u32,
    /// Raw sweep recording the response was deconvolved from, if kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording: Option<Vec<Sample>>,
}

impl ImpulseResponse {
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            recording: None,
        }
    }

    /// Silent buffer of `len` samples
    pub fn zeros(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn with_recording(mut self, recording: Vec<Sample>) -> Self {
        self.recording = Some(recording);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn sample_rate_f64(&self) -> f64 {
        self.sample_rate as f64
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate_f64()
    }

    /// Zero-pad at the end up to `len` samples. Never shortens.
    pub fn pad_to(&mut self, len: usize) {
        if self.samples.len() < len {
            self.samples.resize(len, 0.0);
        }
    }

    /// Drop samples beyond `len`
    pub fn truncate(&mut self, len: usize) {
        self.samples.truncate(len);
    }

    /// Absolute peak magnitude
    pub fn peak_magnitude(&self) -> Sample {
        self.samples.iter().fold(0.0, |acc, s| acc.max(s.abs()))
    }
}
