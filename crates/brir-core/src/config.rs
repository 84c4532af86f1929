//! Tunable constants for decay analysis and virtual bass synthesis

use serde::{Deserialize, Serialize};

use crate::{BrirError, BrirResult};

/// Configuration for decay analysis and reshaping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// First-peak threshold relative to the buffer maximum (-18 dBFS)
    pub peak_height: f64,

    /// Analysis span after the peak, in seconds
    pub analysis_span_s: f64,

    /// Initial averaging window, in seconds
    pub initial_window_s: f64,

    /// Trailing fraction of the segment used for the seed noise floor
    pub noise_tail_fraction: f64,

    /// Seed regression stops at noise floor + this many dB
    pub seed_slope_headroom_db: f64,

    /// Target number of averaging windows per 10 dB of decay
    pub windows_per_10db: f64,

    /// Upper bound on refinement iterations
    pub max_iterations: usize,

    /// Noise region starts this many dB below the knee level
    pub noise_start_drop_db: f64,

    /// Noise region never starts before this fraction of the segment duration
    pub min_noise_start_fraction: f64,

    /// Late slope regression ends this many dB above the noise floor
    pub late_slope_headroom_db: f64,

    /// Dynamic range covered by the late slope regression
    pub late_slope_range_db: f64,

    /// Decay metric end level must clear noise floor + offset + this margin
    pub snr_margin_db: f64,

    /// Buffers shorter than this are not analysed
    pub min_length: usize,

    /// Reshaping taper starts this long after the peak, in milliseconds
    pub taper_delay_ms: f64,

    /// Moving-average window used when none is supplied, in seconds
    pub fallback_window_s: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            peak_height: 0.12589,
            analysis_span_s: 2.0,
            initial_window_s: 0.03,
            noise_tail_fraction: 0.1,
            seed_slope_headroom_db: 10.0,
            windows_per_10db: 3.0,
            max_iterations: 5,
            noise_start_drop_db: 5.0,
            min_noise_start_fraction: 0.1,
            late_slope_headroom_db: 8.0,
            late_slope_range_db: 20.0,
            snr_margin_db: 10.0,
            min_length: 10,
            taper_delay_ms: 2.0,
            fallback_window_s: 0.01,
        }
    }
}

impl DecayConfig {
    /// Builder pattern: set peak threshold
    pub fn with_peak_height(mut self, height: f64) -> Self {
        self.peak_height = height;
        self
    }

    /// Builder pattern: set analysis span after the peak
    pub fn with_analysis_span(mut self, seconds: f64) -> Self {
        self.analysis_span_s = seconds;
        self
    }

    /// Builder pattern: set iteration cap
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Builder pattern: set reshaping taper delay
    pub fn with_taper_delay_ms(mut self, ms: f64) -> Self {
        self.taper_delay_ms = ms;
        self
    }

    pub fn validate(&self) -> BrirResult<()> {
        let positive = [
            ("analysis_span_s", self.analysis_span_s),
            ("initial_window_s", self.initial_window_s),
            ("windows_per_10db", self.windows_per_10db),
            ("late_slope_range_db", self.late_slope_range_db),
            ("fallback_window_s", self.fallback_window_s),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(BrirError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        for (name, value) in [
            ("noise_tail_fraction", self.noise_tail_fraction),
            ("min_noise_start_fraction", self.min_noise_start_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BrirError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }

        if self.min_length == 0 {
            return Err(BrirError::InvalidConfig("min_length must be at least 1".to_string()));
        }

        if !(self.peak_height.is_finite() && self.peak_height >= 0.0) {
            return Err(BrirError::InvalidConfig(format!(
                "peak_height must be non-negative, got {}",
                self.peak_height
            )));
        }

        if !(self.taper_delay_ms.is_finite() && self.taper_delay_ms >= 0.0) {
            return Err(BrirError::InvalidConfig(format!(
                "taper_delay_ms must be non-negative, got {}",
                self.taper_delay_ms
            )));
        }

        Ok(())
    }
}

/// One RBJ high-shelf section shaping the cross-ear bass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IldShelf {
    pub center_hz: f64,
    pub gain_db: f64,
    pub q: f64,
}

impl IldShelf {
    pub const fn new(center_hz: f64, gain_db: f64, q: f64) -> Self {
        Self {
            center_hz,
            gain_db,
            q,
        }
    }
}

/// Default inter-aural level difference shelves
pub const DEFAULT_ILD_SHELVES: [IldShelf; 3] = [
    IldShelf::new(150.0, -1.5, 0.76),
    IldShelf::new(400.0, -3.0, 0.66),
    IldShelf::new(800.0, -3.5, 0.61),
];

/// Filter design parameters for virtual bass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    /// Boundary between the kept (high-passed) band and the synthesized band
    pub crossover_hz: f64,

    /// Sub-bass roll-off applied to the synthesized band
    pub subsonic_high_pass_hz: f64,

    /// Butterworth order of one crossover / subsonic cascade
    pub butterworth_order: usize,

    /// How many times the crossover cascade is applied in series
    pub crossover_repeats: usize,

    /// Cross-ear shelves, applied in order
    pub ild_shelves: Vec<IldShelf>,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            crossover_hz: 250.0,
            subsonic_high_pass_hz: 15.0,
            butterworth_order: 4,
            crossover_repeats: 2,
            ild_shelves: DEFAULT_ILD_SHELVES.to_vec(),
        }
    }
}

impl CrossoverConfig {
    /// Default design at the given crossover frequency
    pub fn new(crossover_hz: f64) -> Self {
        Self {
            crossover_hz,
            ..Default::default()
        }
    }

    /// Builder pattern: set subsonic high-pass corner
    pub fn with_subsonic_high_pass(mut self, hz: f64) -> Self {
        self.subsonic_high_pass_hz = hz;
        self
    }

    /// Builder pattern: replace the ILD shelves
    pub fn with_ild_shelves(mut self, shelves: Vec<IldShelf>) -> Self {
        self.ild_shelves = shelves;
        self
    }

    /// Effective crossover order after repetition
    pub fn crossover_order(&self) -> usize {
        self.butterworth_order * self.crossover_repeats
    }

    pub fn validate(&self, sample_rate: u32) -> BrirResult<()> {
        let nyquist = sample_rate as f64 / 2.0;
        if sample_rate == 0 {
            return Err(BrirError::InvalidConfig("sample rate must be positive".into()));
        }

        for (name, hz) in [
            ("crossover_hz", self.crossover_hz),
            ("subsonic_high_pass_hz", self.subsonic_high_pass_hz),
        ] {
            if !(hz.is_finite() && hz > 0.0 && hz < nyquist) {
                return Err(BrirError::InvalidConfig(format!(
                    "{name} must lie in (0, {nyquist}) Hz, got {hz}"
                )));
            }
        }

        if self.butterworth_order == 0 || self.butterworth_order % 2 != 0 {
            return Err(BrirError::InvalidConfig(format!(
                "butterworth_order must be even and positive, got {}",
                self.butterworth_order
            )));
        }

        if self.crossover_repeats == 0 {
            return Err(BrirError::InvalidConfig(
                "crossover_repeats must be at least 1".into(),
            ));
        }

        for shelf in &self.ild_shelves {
            if !(shelf.center_hz > 0.0 && shelf.center_hz < nyquist)
                || !(shelf.q.is_finite() && shelf.q > 0.0)
                || !shelf.gain_db.is_finite()
            {
                return Err(BrirError::InvalidConfig(format!(
                    "invalid ILD shelf {shelf:?}"
                )));
            }
        }

        Ok(())
    }
}
