//! brir-dsp: Decay analysis and virtual bass for binaural room impulse responses
//!
//! Operates on complete, finite buffers. Every analysis degrades to a
//! documented fallback instead of failing.
//!
//! ## Modules
//! - `biquad` - second-order sections and TDF-II cascades
//! - `crossover` - Butterworth crossover and RBJ ILD shelf design
//! - `peak` - first significant peak, head cropping
//! - `decay` - Lundeby noise floor / knee point estimation
//! - `decay_times` - Schroeder EDT, RT20, RT30, RT60
//! - `reshape` - decay shortening toward a target RT60
//! - `spectrum` - single-bin magnitude via real FFT
//! - `gain` - global virtual bass gain calibration
//! - `virtual_bass` - low band synthesis across a channel map
//! - `report` - per-channel diagnostics
//! - `test_signals` - reproducible synthetic responses for tests and benches

pub mod biquad;
pub mod crossover;
pub mod decay;
pub mod decay_times;
pub mod gain;
pub mod peak;
pub mod report;
pub mod reshape;
pub mod spectrum;
pub mod stats;
pub mod test_signals;
pub mod virtual_bass;

pub use decay::{DecayParams, estimate_decay};
pub use decay_times::{DecayMetric, DecayTimes, compute_decay_times};
pub use gain::compute_global_gain;
pub use peak::{crop_head, locate_peak, locate_peak_in};
pub use report::{ChannelDiagnostics, DiagnosticsReport, ReflectionEnergy, diagnose};
pub use reshape::adjust_decay;
pub use virtual_bass::{PairBass, VirtualBassSynthesizer, synthesize_virtual_bass};

use brir_core::Sample;

/// Trait for all DSP processors
pub trait Processor {
    /// Reset processor state
    fn reset(&mut self);
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
