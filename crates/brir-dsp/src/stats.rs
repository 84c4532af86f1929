//! Small numeric helpers shared by the decay analysis

use brir_core::{Decibels, Sample};

/// Least-squares line through `(x, y)`: returns `(slope, intercept)`
///
/// `None` with fewer than two points or zero spread in `x`.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }

    let nf = n as f64;
    let mean_x = x[..n].iter().sum::<f64>() / nf;
    let mean_y = y[..n].iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x[..n].iter().zip(&y[..n]) {
        let dx = xi - mean_x;
        sxx += dx * dx;
        sxy += dx * (yi - mean_y);
    }

    if sxx <= 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean power in dB with the -200 dB floor
#[inline]
pub fn power_db(mean_power: f64) -> f64 {
    Decibels::from_power(mean_power).value()
}

/// Samples scaled so the largest magnitude is 1. Near-silent input is returned unscaled.
pub fn peak_normalized(samples: &[Sample]) -> Vec<Sample> {
    let peak = samples.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
    if peak < brir_core::EPSILON {
        return samples.to_vec();
    }
    samples.iter().map(|s| s / peak).collect()
}

/// Moving average over full windows only (`len - window + 1` outputs)
pub fn running_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }

    let w = window as f64;
    let mut out = Vec::with_capacity(values.len() - window + 1);
    let mut acc: f64 = values[..window].iter().sum();
    out.push(acc / w);
    for i in window..values.len() {
        acc += values[i] - values[i - window];
        out.push(acc / w);
    }
    out
}

/// Evenly spaced time grid from 0 to `len / sample_rate` inclusive (`len` points)
#[derive(Debug, Clone, Copy)]
pub struct TimeGrid {
    len: usize,
    step: f64,
}

impl TimeGrid {
    pub fn new(len: usize, sample_rate: f64) -> Self {
        let span = if sample_rate > 0.0 {
            len as f64 / sample_rate
        } else {
            0.0
        };
        let step = if len > 1 { span / (len - 1) as f64 } else { 0.0 };
        Self { len, step }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn at(&self, index: usize) -> f64 {
        index as f64 * self.step
    }

    /// Last time stamp (0 for an empty grid)
    pub fn last(&self) -> f64 {
        self.len.checked_sub(1).map_or(0.0, |i| self.at(i))
    }

    /// Index whose time stamp is closest to `t`, first one on ties
    pub fn nearest(&self, t: f64) -> usize {
        if self.len <= 1 || self.step <= 0.0 {
            return 0;
        }
        let pos = (t / self.step).clamp(0.0, (self.len - 1) as f64);
        let lo = pos.floor() as usize;
        let hi = (lo + 1).min(self.len - 1);
        if (t - self.at(hi)).abs() < (t - self.at(lo)).abs() {
            hi
        } else {
            lo
        }
    }

    /// Time stamps `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Vec<f64> {
        (start..end.min(self.len)).map(|i| self.at(i)).collect()
    }
}
