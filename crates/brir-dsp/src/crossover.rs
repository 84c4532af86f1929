//! Crossover filter bank for virtual bass
//!
//! Butterworth cascades are built from RBJ low/high-pass sections with the
//! Butterworth pole Qs, which is the bilinear-transform design with the
//! corner pre-warped. ILD shelves are single RBJ high-shelf sections.

use brir_core::{CrossoverConfig, IldShelf, Sample};
use std::f64::consts::PI;

use crate::biquad::{FilterCascade, FilterSection};

/// Butterworth order of one crossover or subsonic cascade
pub const BUTTERWORTH_ORDER: usize = 4;

/// Q values for cascaded Butterworth response of an even `order`
pub fn butterworth_qs(order: usize) -> Vec<f64> {
    let n = order as f64;
    (0..order / 2)
        .map(|k| 1.0 / (2.0 * (PI * (2 * k + 1) as f64 / (2.0 * n)).cos()))
        .collect()
}

pub fn butterworth_lowpass(order: usize, freq: f64, sample_rate: f64) -> FilterCascade {
    butterworth_qs(order)
        .into_iter()
        .map(|q| FilterSection::lowpass(freq, q, sample_rate))
        .collect()
}

pub fn butterworth_highpass(order: usize, freq: f64, sample_rate: f64) -> FilterCascade {
    butterworth_qs(order)
        .into_iter()
        .map(|q| FilterSection::highpass(freq, q, sample_rate))
        .collect()
}

/// Complementary crossover cascades at one corner
#[derive(Debug, Clone, PartialEq)]
pub struct Crossover {
    pub low_pass: FilterCascade,
    pub high_pass: FilterCascade,
}

/// 8th-order low-pass / high-pass pair: a 4th-order Butterworth applied twice
pub fn design_crossover(crossover_hz: f64, sample_rate: u32) -> Crossover {
    design_crossover_with(&CrossoverConfig::new(crossover_hz), sample_rate)
}

pub fn design_crossover_with(config: &CrossoverConfig, sample_rate: u32) -> Crossover {
    let fs = sample_rate as f64;
    let order = config.butterworth_order;
    Crossover {
        low_pass: butterworth_lowpass(order, config.crossover_hz, fs)
            .repeated(config.crossover_repeats),
        high_pass: butterworth_highpass(order, config.crossover_hz, fs)
            .repeated(config.crossover_repeats),
    }
}

/// 4th-order Butterworth high-pass removing sub-bass below `corner_hz`
pub fn design_subsonic_high_pass(corner_hz: f64, sample_rate: u32) -> FilterCascade {
    butterworth_highpass(BUTTERWORTH_ORDER, corner_hz, sample_rate as f64)
}

/// One RBJ high-shelf section
pub fn design_ild_shelf(center_hz: f64, gain_db: f64, q: f64, sample_rate: u32) -> FilterCascade {
    FilterCascade::new(vec![FilterSection::high_shelf(
        center_hz,
        q,
        gain_db,
        sample_rate as f64,
    )])
}

/// All shelves cascaded in order
pub fn design_ild_cascade(shelves: &[IldShelf], sample_rate: u32) -> FilterCascade {
    shelves
        .iter()
        .map(|s| FilterSection::high_shelf(s.center_hz, s.q, s.gain_db, sample_rate as f64))
        .collect()
}

/// Every filter virtual bass needs, designed once per sample rate
#[derive(Debug, Clone)]
pub struct CrossoverFilterBank {
    pub crossover: Crossover,
    pub subsonic: FilterCascade,
    pub ild: FilterCascade,
    pub crossover_hz: f64,
    pub sample_rate: u32,
}

impl CrossoverFilterBank {
    pub fn new(config: &CrossoverConfig, sample_rate: u32) -> Self {
        let subsonic = butterworth_highpass(
            config.butterworth_order,
            config.subsonic_high_pass_hz,
            sample_rate as f64,
        );
        Self {
            crossover: design_crossover_with(config, sample_rate),
            subsonic,
            ild: design_ild_cascade(&config.ild_shelves, sample_rate),
            crossover_hz: config.crossover_hz,
            sample_rate,
        }
    }

    /// Unit impulse of `len` samples, subsonic high-passed then crossover low-passed
    pub fn reference_bass_impulse(&self, len: usize) -> Vec<Sample> {
        let mut impulse = vec![0.0; len];
        if let Some(first) = impulse.first_mut() {
            *first = 1.0;
        }
        self.subsonic.process_in_place(&mut impulse);
        self.crossover.low_pass.process_in_place(&mut impulse);
        impulse
    }

    /// Remove the band the synthesized bass replaces
    pub fn high_pass(&self, input: &[Sample]) -> Vec<Sample> {
        self.crossover.high_pass.filter(input)
    }
}
