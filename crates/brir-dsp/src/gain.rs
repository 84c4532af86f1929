//! Global virtual bass gain

use brir_core::{ChannelMap, CrossoverConfig, EPSILON};

use crate::crossover::CrossoverFilterBank;
use crate::spectrum::magnitude_at;

/// Ratio of the mean crossover-frequency magnitude of every high-passed
/// buffer in `map` to that of the reference bass impulse
///
/// One scalar for the whole map, so relative channel levels are kept.
pub fn compute_global_gain(map: &ChannelMap, config: &CrossoverConfig, sample_rate: u32) -> f64 {
    let bank = CrossoverFilterBank::new(config, sample_rate);
    calibrate(map, &bank, &bank.reference_bass_impulse(map.max_len()))
}

/// Gain against an already designed filter bank and reference impulse
pub(crate) fn calibrate(map: &ChannelMap, bank: &CrossoverFilterBank, reference: &[f64]) -> f64 {
    if reference.is_empty() || map.is_empty() {
        return 0.0;
    }

    let crossover_hz = bank.crossover_hz;
    let magnitudes: Vec<f64> = map
        .responses()
        .map(|ir| magnitude_at(crossover_hz, bank.sample_rate, &bank.high_pass(&ir.samples)))
        .collect();
    let mean = magnitudes.iter().sum::<f64>() / magnitudes.len() as f64;

    let reference_mag = magnitude_at(crossover_hz, bank.sample_rate, reference);
    let gain = mean / (reference_mag + EPSILON);
    log::debug!(
        "global gain {gain:.4}: mean {mean:.4} over {} buffers, reference {reference_mag:.4}",
        magnitudes.len()
    );
    gain
}
