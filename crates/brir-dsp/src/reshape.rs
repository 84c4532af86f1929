//! Decay shortening toward a target RT60
//!
//! A half-Hann gain envelope runs from unity shortly after the peak down to
//! the gain that puts the knee point on the target decay line, and holds that
//! gain afterwards. Only shortening is supported.

use brir_core::{DecayConfig, Decibels, EPSILON, ImpulseResponse, Sample};
use std::f64::consts::PI;

use crate::decay::estimate_decay;
use crate::decay_times::compute_decay_times;

/// Symmetric Hann window of `len` points
fn hann(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    let denom = (len - 1) as f64;
    (0..len)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / denom).cos())
        .collect()
}

/// Gain envelope: 1 before `start`, half-Hann from 1 to `knee_gain` over
/// `[start, knee)`, `knee_gain` from `knee` on
fn decay_envelope(len: usize, start: usize, knee: usize, knee_gain: f64) -> Vec<Sample> {
    let taper = knee - start;
    let half = hann(2 * taper).split_off(taper);

    let mut envelope = vec![1.0; start];
    envelope.extend(half.into_iter().map(|h| knee_gain + h * (1.0 - knee_gain)));
    envelope.resize(len, knee_gain);
    envelope
}

/// Shorten the decay of `ir` toward `target_rt60` seconds, in place
///
/// Returns the level change applied at the knee point in dB, or `None` when
/// nothing was changed (buffer too short, no measurable decay, target not
/// shorter than the current decay, or no room between peak and knee).
pub fn adjust_decay(
    ir: &mut ImpulseResponse,
    target_rt60: f64,
    config: &DecayConfig,
) -> Option<f64> {
    if ir.len() < config.min_length {
        return None;
    }

    let params = estimate_decay(ir, config);
    let times = compute_decay_times(ir, &params, config);
    let Some((metric, seconds)) = times.longest() else {
        log::debug!("adjust_decay: no measurable decay time");
        return None;
    };
    let current_slope = metric.decay_db() / seconds;
    if current_slope.abs() < EPSILON {
        return None;
    }

    if target_rt60.is_nan() || target_rt60 <= EPSILON {
        log::debug!("adjust_decay: invalid target {target_rt60} s");
        return None;
    }
    let target_slope = -60.0 / target_rt60;
    if target_slope > current_slope - EPSILON {
        log::debug!(
            "adjust_decay: target {target_rt60} s is not shorter than current \
             {metric} slope {current_slope:.1} dB/s"
        );
        return None;
    }

    let (peak, knee) = (params.peak_index, params.knee_point_index);
    if knee <= peak || knee >= ir.len() {
        return None;
    }
    let fs = ir.sample_rate_f64();
    let knee_time = (knee - peak) as f64 / fs;
    if knee_time <= EPSILON {
        return None;
    }

    let change_db = (target_slope - current_slope) * knee_time;
    let start = peak.saturating_add((config.taper_delay_ms * fs / 1000.0).max(0.0) as usize);
    if start >= knee {
        return None;
    }

    let envelope = decay_envelope(ir.len(), start, knee, Decibels(change_db).to_gain());
    for (sample, gain) in ir.samples[start..].iter_mut().zip(&envelope[start..]) {
        *sample *= gain;
    }

    log::info!(
        "adjust_decay: {metric} slope {current_slope:.1} -> {target_slope:.1} dB/s, \
         {change_db:.1} dB at knee"
    );
    Some(change_db)
}
