//! Per-channel diagnostics for a channel map

use brir_core::{
    BrirError, BrirResult, ChannelMap, DecayConfig, Decibels, EPSILON, Ear, ImpulseResponse,
    Speaker,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::decay::estimate_decay;
use crate::decay_times::{DecayMetric, compute_decay_times};
use crate::peak::locate_peak;

/// Decay summary of one speaker/ear buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDiagnostics {
    pub speaker: Speaker,
    pub ear: Ear,
    /// Peak-to-noise ratio in dB (negative)
    pub noise_floor_db: f64,
    /// Inter-aural time difference, reported on the far ear only
    pub itd_us: f64,
    /// Peak to knee point
    pub decay_length_ms: f64,
    /// Longest measurable decay metric
    pub decay_metric: Option<DecayMetric>,
    pub decay_time_s: Option<f64>,
}

/// Reflection energy relative to the direct sound on the near ear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionEnergy {
    pub speaker: Speaker,
    pub ear: Ear,
    /// 20 - 50 ms after the peak
    pub early_db: f64,
    /// 50 - 150 ms after the peak
    pub mid_db: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub channels: Vec<ChannelDiagnostics>,
    pub reflections: Vec<ReflectionEnergy>,
}

impl DiagnosticsReport {
    pub fn to_json(&self) -> BrirResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| BrirError::Serialization(e.to_string()))
    }

    /// GitHub-flavored table plus reflection energy lines
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str("| Speaker | Side | PNR | ITD | Length | Decay |\n");
        output.push_str("|---------|------|-----|-----|--------|-------|\n");
        for c in &self.channels {
            // Rows may measure different metrics
            let decay = match (c.decay_metric, c.decay_time_s) {
                (Some(metric), Some(t)) => format!("{metric} {:.1} ms", t * 1000.0),
                _ => "-".to_string(),
            };
            output.push_str(&format!(
                "| {} | {} | {:.1} dB | {:.1} us | {:.1} ms | {} |\n",
                c.speaker,
                ear_name(c.ear),
                c.noise_floor_db,
                c.itd_us,
                c.decay_length_ms,
                decay
            ));
        }

        if !self.reflections.is_empty() {
            output.push_str("\n**Reflection energy relative to direct sound:**\n");
            for r in &self.reflections {
                output.push_str(&format!(
                    "- {} ({}): early (20-50 ms) {:.2} dB, mid (50-150 ms) {:.2} dB\n",
                    r.speaker,
                    ear_name(r.ear),
                    r.early_db,
                    r.mid_db
                ));
            }
        }
        output
    }
}

fn ear_name(ear: Ear) -> &'static str {
    match ear {
        Ear::Left => "left",
        Ear::Right => "right",
    }
}

/// ITD is reported on the ear that hears the speaker second
fn is_far_ear(speaker: Speaker, ear: Ear) -> bool {
    speaker.near_ear().is_some_and(|near| near.opposite() == ear)
}

fn channel_diagnostics(
    speaker: Speaker,
    ear: Ear,
    ir: &ImpulseResponse,
    itd_us: f64,
    config: &DecayConfig,
) -> ChannelDiagnostics {
    let params = estimate_decay(ir, config);
    let longest = compute_decay_times(ir, &params, config).longest();
    let decay_length_ms = if ir.sample_rate > 0 {
        params.decay_len() as f64 / ir.sample_rate_f64() * 1000.0
    } else {
        0.0
    };

    ChannelDiagnostics {
        speaker,
        ear,
        noise_floor_db: params.noise_floor_db,
        itd_us: if is_far_ear(speaker, ear) { itd_us } else { 0.0 },
        decay_length_ms,
        decay_metric: longest.map(|(metric, _)| metric),
        decay_time_s: longest.map(|(_, seconds)| seconds),
    }
}

fn window_energy(samples: &[f64], start: usize, end: usize) -> f64 {
    let end = end.min(samples.len());
    if start >= end {
        return 0.0;
    }
    samples[start..end].iter().map(|s| s * s).sum()
}

fn reflection_energy(speaker: Speaker, ir: &ImpulseResponse) -> ReflectionEnergy {
    let ear = if speaker.is_left() { Ear::Left } else { Ear::Right };
    let frame = |ms: f64| (ms * 1e-3 * ir.sample_rate_f64()) as usize;
    let samples = &ir.samples;

    let peak = samples
        .iter()
        .enumerate()
        .fold((0, 0.0_f64), |best, (i, s)| if s.abs() > best.1 { (i, s.abs()) } else { best })
        .0;

    let direct = window_energy(samples, peak, peak + frame(5.0));
    let relative = |start_ms: f64, end_ms: f64| {
        let e = window_energy(samples, peak + frame(start_ms), peak + frame(end_ms));
        Decibels::from_power(e / (direct + EPSILON)).value()
    };

    ReflectionEnergy {
        speaker,
        ear,
        early_db: relative(20.0, 50.0),
        mid_db: relative(50.0, 150.0),
    }
}

/// Decay and reflection diagnostics for every buffer, in map order
pub fn diagnose(map: &ChannelMap, config: &DecayConfig) -> DiagnosticsReport {
    let jobs: Vec<(Speaker, Ear, &ImpulseResponse, f64)> = map
        .iter()
        .flat_map(|(speaker, pair)| {
            let left_peak = locate_peak(&pair.left.samples, config.peak_height);
            let right_peak = locate_peak(&pair.right.samples, config.peak_height);
            let itd_us = if pair.left.sample_rate > 0 {
                left_peak.abs_diff(right_peak) as f64 / pair.left.sample_rate_f64() * 1e6
            } else {
                0.0
            };
            Ear::BOTH.map(|ear| (speaker, ear, pair.ear(ear), itd_us))
        })
        .collect();

    let channels = jobs
        .par_iter()
        .map(|&(speaker, ear, ir, itd_us)| channel_diagnostics(speaker, ear, ir, itd_us, config))
        .collect();

    let reflections = map
        .iter()
        .map(|(speaker, pair)| {
            let ear = if speaker.is_left() { Ear::Left } else { Ear::Right };
            reflection_energy(speaker, pair.ear(ear))
        })
        .collect();

    DiagnosticsReport {
        channels,
        reflections,
    }
}
