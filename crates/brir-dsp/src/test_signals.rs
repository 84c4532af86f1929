//! Synthetic, reproducible signals for tests and benchmarks

use brir_core::{EarPair, ImpulseResponse, Sample, Speaker};
use std::f64::consts::PI;

/// Silence before the direct sound of [`decaying_sine`], in samples
pub const PRE_DELAY: usize = 240;

/// Uniform white noise in [-1, 1) from a fixed seed
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<Sample> {
    let mut state = seed;
    (0..num_samples)
        .map(|_| {
            // Simple LCG for reproducible noise
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state as f64 / u64::MAX as f64) * 2.0 - 1.0
        })
        .collect()
}

/// Unit impulse at `position`
pub fn generate_impulse(num_samples: usize, position: usize) -> Vec<Sample> {
    let mut signal = vec![0.0; num_samples];
    if let Some(s) = signal.get_mut(position) {
        *s = 1.0;
    }
    signal
}

/// 1 kHz tone decaying 60 dB in `rt60` seconds, on top of white noise with
/// amplitude `noise`. The tone starts after [`PRE_DELAY`] samples.
pub fn decaying_sine(rt60: f64, noise: f64, duration: f64, sample_rate: u32) -> ImpulseResponse {
    let fs = sample_rate as f64;
    let len = (duration * fs) as usize;
    // ln(1000): 60 dB amplitude decay
    let rate = 6.907755278982137 / rt60;

    let samples = generate_noise(len, 0x5eed)
        .into_iter()
        .enumerate()
        .map(|(i, n)| {
            let tone = if i >= PRE_DELAY {
                let t = (i - PRE_DELAY) as f64 / fs;
                (-rate * t).exp() * (2.0 * PI * 1000.0 * t).sin()
            } else {
                0.0
            };
            tone + noise * n
        })
        .collect();
    ImpulseResponse::new(samples, sample_rate)
}

/// Ear pair for `speaker` with the far ear arriving `itd` samples later at half level
pub fn binaural_pair(
    speaker: Speaker,
    len: usize,
    direct: usize,
    itd: usize,
    sample_rate: u32,
) -> EarPair {
    let near = generate_impulse(len, direct);
    let mut far = generate_impulse(len, direct + itd);
    far.iter_mut().for_each(|s| *s *= 0.5);

    let (left, right) = if speaker.is_left() { (near, far) } else { (far, near) };
    EarPair {
        left: ImpulseResponse::new(left, sample_rate),
        right: ImpulseResponse::new(right, sample_rate),
    }
}
