//! Reverberation times from the Schroeder backward integral
//!
//! The Schroeder curve is regressed between metric-specific levels. A
//! moving-average energy curve calibrates the offset between the two so the
//! noise floor can be compared against Schroeder levels.

use brir_core::{DecayConfig, EPSILON, ImpulseResponse};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decay::{DecayParams, FLOOR_DB};
use crate::stats::{TimeGrid, linear_regression, mean, peak_normalized, power_db, running_mean};

/// Reverberation time metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecayMetric {
    Edt,
    Rt20,
    Rt30,
    Rt60,
}

impl DecayMetric {
    pub const ALL: [DecayMetric; 4] = [Self::Edt, Self::Rt20, Self::Rt30, Self::Rt60];

    /// Preference order when one representative decay time is needed
    pub const PRIORITY: [DecayMetric; 4] = [Self::Rt60, Self::Rt30, Self::Rt20, Self::Edt];

    pub fn name(self) -> &'static str {
        match self {
            Self::Edt => "EDT",
            Self::Rt20 => "RT20",
            Self::Rt30 => "RT30",
            Self::Rt60 => "RT60",
        }
    }

    /// Level drop the metric is named after (negative dB)
    pub fn decay_db(self) -> f64 {
        match self {
            Self::Edt => -10.0,
            Self::Rt20 => -20.0,
            Self::Rt30 => -30.0,
            Self::Rt60 => -60.0,
        }
    }

    /// Schroeder levels `(start, end)` bounding the regression
    pub fn fit_range_db(self) -> (f64, f64) {
        match self {
            Self::Edt => (-1.0, -10.0),
            Self::Rt20 => (-5.0, -25.0),
            Self::Rt30 => (-5.0, -35.0),
            Self::Rt60 => (-5.0, -65.0),
        }
    }
}

impl fmt::Display for DecayMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decay times in seconds, `None` where the metric could not be measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DecayTimes {
    pub edt: Option<f64>,
    pub rt20: Option<f64>,
    pub rt30: Option<f64>,
    pub rt60: Option<f64>,
}

impl DecayTimes {
    pub fn get(&self, metric: DecayMetric) -> Option<f64> {
        match metric {
            DecayMetric::Edt => self.edt,
            DecayMetric::Rt20 => self.rt20,
            DecayMetric::Rt30 => self.rt30,
            DecayMetric::Rt60 => self.rt60,
        }
    }

    pub fn set(&mut self, metric: DecayMetric, value: Option<f64>) {
        match metric {
            DecayMetric::Edt => self.edt = value,
            DecayMetric::Rt20 => self.rt20 = value,
            DecayMetric::Rt30 => self.rt30 = value,
            DecayMetric::Rt60 => self.rt60 = value,
        }
    }

    /// Widest-range metric with a usable (positive) value
    pub fn longest(&self) -> Option<(DecayMetric, f64)> {
        DecayMetric::PRIORITY.iter().find_map(|&metric| {
            self.get(metric)
                .filter(|&t| t > EPSILON)
                .map(|t| (metric, t))
        })
    }

    pub fn is_empty(&self) -> bool {
        DecayMetric::ALL.iter().all(|&m| self.get(m).is_none())
    }
}

/// Schroeder curve in dB over `normalized[..=knee]`, 0 dB at the first sample
fn schroeder_curve(normalized: &[f64], knee: usize) -> Vec<f64> {
    if knee == 0 {
        return vec![0.0];
    }
    let decay = &normalized[..=knee];
    let total: f64 = decay.iter().map(|s| s * s).sum();
    if total < EPSILON {
        return vec![FLOOR_DB; decay.len()];
    }

    let mut curve = vec![0.0; decay.len()];
    let mut acc = 0.0;
    for i in (0..decay.len()).rev() {
        acc += decay[i] * decay[i];
        curve[i] = power_db(acc / total);
    }
    curve
}

/// Moving-average energy curve in dB around `[peak, end]` and its lag
/// relative to the Schroeder curve, in samples
fn moving_average_curve(
    samples: &[f64],
    peak: usize,
    end: usize,
    window: usize,
) -> (Vec<f64>, usize) {
    let half = window / 2;
    let head = half.min(peak);
    let tail = half.min(samples.len() - 1 - end);
    let lag = half - head;

    let squared: Vec<f64> = peak_normalized(&samples[peak - head..=end + tail])
        .into_iter()
        .map(|s| s * s)
        .collect();

    let averaged = if squared.len() < window {
        vec![mean(&squared); squared.len()]
    } else {
        running_mean(&squared, window)
    };
    (averaged.into_iter().map(power_db).collect(), lag)
}

/// Mean Schroeder-minus-average difference over the overlap, 0 below two points
fn calibration_offset(schroeder: &[f64], average: &[f64], lag: usize) -> f64 {
    let available = average.len().saturating_sub(lag);
    let common = schroeder.len().min(available);
    if common < 2 {
        return 0.0;
    }
    let diff: Vec<f64> = schroeder[..common]
        .iter()
        .zip(&average[lag..lag + common])
        .map(|(s, a)| s - a)
        .collect();
    mean(&diff)
}

/// EDT, RT20, RT30 and RT60 of `ir` given its decay parameters
pub fn compute_decay_times(
    ir: &ImpulseResponse,
    params: &DecayParams,
    config: &DecayConfig,
) -> DecayTimes {
    let mut times = DecayTimes::default();
    let len = ir.len();
    if !params.has_decay() || len == 0 {
        return times;
    }

    let fs = ir.sample_rate_f64();
    let window = if params.window_size == 0 {
        ((config.fallback_window_s * fs) as usize).max(1)
    } else {
        params.window_size
    };

    let peak = params.peak_index.min(len - 1);
    let normalized = peak_normalized(&ir.samples[peak..]);
    let knee = params
        .knee_point_index
        .saturating_sub(params.peak_index)
        .min(normalized.len() - 1);

    let schroeder = schroeder_curve(&normalized, knee);
    let (average, lag) = moving_average_curve(&ir.samples, peak, peak + knee, window);
    let offset = calibration_offset(&schroeder, &average, lag);

    let time = TimeGrid::new(len, fs);
    for metric in DecayMetric::ALL {
        let (start_db, end_db) = metric.fit_range_db();
        if end_db < params.noise_floor_db + offset + config.snr_margin_db {
            log::debug!(
                "{metric}: end level {end_db} dB too close to noise floor {:.1} dB",
                params.noise_floor_db + offset
            );
            continue;
        }

        let start = schroeder.iter().position(|&l| l <= start_db);
        let end = schroeder.iter().position(|&l| l <= end_db);
        let (Some(start), Some(end)) = (start, end) else {
            continue;
        };
        if end <= start + 1 {
            continue;
        }

        let fit = linear_regression(&time.slice(peak + start, peak + end), &schroeder[start..end]);
        if let Some((slope, _)) = fit {
            if slope.is_finite() && slope.abs() >= EPSILON {
                times.set(metric, Some(metric.decay_db() / slope));
            }
        }
    }
    times
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decay::estimate_decay;
    use crate::test_signals::decaying_sine;
    use approx::assert_relative_eq;

    const FS: u32 = 48000;

    #[test]
    fn test_metric_levels() {
        assert_eq!(DecayMetric::Rt30.fit_range_db(), (-5.0, -35.0));
        assert_eq!(DecayMetric::Edt.decay_db(), -10.0);
        assert_eq!(DecayMetric::Rt60.to_string(), "RT60");
    }

    #[test]
    fn test_longest_prefers_rt60() {
        let times = DecayTimes {
            edt: Some(0.4),
            rt20: Some(0.5),
            rt30: None,
            rt60: Some(0.0),
        };
        assert_eq!(times.longest(), Some((DecayMetric::Rt20, 0.5)));
        assert_eq!(DecayTimes::default().longest(), None);
        assert!(DecayTimes::default().is_empty());
    }

    #[test]
    fn test_schroeder_starts_at_zero_db() {
        let x: Vec<f64> = (0..100).map(|i| (-0.05 * i as f64).exp()).collect();
        let curve = schroeder_curve(&x, 99);
        assert_eq!(curve.len(), 100);
        assert_relative_eq!(curve[0], 0.0, epsilon = 1e-12);
        assert!(curve.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(schroeder_curve(&x, 0), vec![0.0]);
        assert_eq!(schroeder_curve(&[0.0; 10], 9), vec![FLOOR_DB; 10]);
    }

    #[test]
    fn test_no_decay_range() {
        let ir = decaying_sine(0.5, 1e-5, 1.0, FS);
        let params = DecayParams {
            peak_index: 100,
            knee_point_index: 100,
            noise_floor_db: -100.0,
            window_size: 480,
        };
        assert!(compute_decay_times(&ir, &params, &DecayConfig::default()).is_empty());
    }

    #[test]
    fn test_recovers_rt60() {
        let ir = decaying_sine(0.5, 1e-5, 2.5, FS);
        let config = DecayConfig::default();
        let params = estimate_decay(&ir, &config);
        let times = compute_decay_times(&ir, &params, &config);

        let rt60 = times.rt60.expect("RT60 measurable at 100 dB SNR");
        assert_relative_eq!(rt60, 0.5, max_relative = 0.05);
        // Each metric reports the time for its own level drop
        let rt30 = times.rt30.expect("RT30 measurable");
        assert_relative_eq!(rt30, 0.25, max_relative = 0.05);
        assert!(times.edt.is_some());
    }

    #[test]
    fn test_noisy_response_drops_rt60() {
        let ir = decaying_sine(0.5, 1e-2, 2.5, FS);
        let config = DecayConfig::default();
        let params = estimate_decay(&ir, &config);
        let times = compute_decay_times(&ir, &params, &config);

        assert_eq!(times.rt60, None);
        assert!(times.edt.is_some());
    }

    #[test]
    fn test_truncated_tail_drops_late_metrics() {
        // 300 ms of a 0.5 s decay only spans about 36 dB
        let ir = decaying_sine(0.5, 1e-7, 0.3, FS);
        let config = DecayConfig::default();
        let params = estimate_decay(&ir, &config);
        let times = compute_decay_times(&ir, &params, &config);

        assert_eq!(times.rt20, None);
        assert_eq!(times.rt30, None);
        assert_eq!(times.rt60, None);
        assert!(times.edt.is_some());
    }

    #[test]
    fn test_zero_window_uses_fallback() {
        let ir = decaying_sine(0.3, 1e-5, 1.5, FS);
        let config = DecayConfig::default();
        let mut params = estimate_decay(&ir, &config);
        params.window_size = 0;
        let times = compute_decay_times(&ir, &params, &config);
        assert!(times.rt30.is_some());
    }
}
