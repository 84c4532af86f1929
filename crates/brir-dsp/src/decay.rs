//! Noise floor and knee point estimation (Lundeby method)
//!
//! Lundeby, Vigran, Bietz, Vorländer: "Uncertainties of Measurements in Room
//! Acoustics", Acustica 81 (1995).
//!
//! The squared, peak-normalized response after the peak is averaged into
//! time windows. A seed noise floor and decay slope give a first knee point,
//! which is then refined by re-estimating noise and late decay slope with
//! windows sized to the decay rate.

use brir_core::{DecayConfig, EPSILON, ImpulseResponse};
use serde::{Deserialize, Serialize};

use crate::peak::locate_peak;
use crate::stats::{TimeGrid, linear_regression, mean, peak_normalized, power_db};

/// Level reported for silent or too-short buffers
pub const FLOOR_DB: f64 = -200.0;

/// Decay parameters of one impulse response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayParams {
    /// Start of the decay
    pub peak_index: usize,
    /// Where the decay merges into the noise floor
    pub knee_point_index: usize,
    /// Noise floor relative to the peak, in dB (the peak-to-noise ratio)
    pub noise_floor_db: f64,
    /// Averaging window width chosen by the estimator, in samples
    pub window_size: usize,
}

impl DecayParams {
    /// Samples between peak and knee point
    pub fn decay_len(&self) -> usize {
        self.knee_point_index.saturating_sub(self.peak_index)
    }

    /// Peak precedes knee point, so a decay range exists
    pub fn has_decay(&self) -> bool {
        self.knee_point_index > self.peak_index
    }
}

/// Squared signal averaged into equal-width windows, in dB
#[derive(Debug, Clone)]
struct Windowed {
    levels_db: Vec<f64>,
    /// Window width in samples
    width: usize,
    /// Window duration in seconds, used for the center time stamps
    duration: f64,
}

impl Windowed {
    /// Split into `count` windows (at least one). Trailing samples that do not
    /// fill a whole window are ignored.
    fn new(squared: &[f64], count: usize, duration: f64) -> Self {
        let width = (squared.len() / count.max(1)).max(1);
        let count = count.max(1).min(squared.len() / width);
        let levels_db = squared
            .chunks_exact(width)
            .take(count)
            .map(|w| power_db(mean(w)))
            .collect();
        Self {
            levels_db,
            width,
            duration,
        }
    }

    fn len(&self) -> usize {
        self.levels_db.len()
    }

    fn center(&self, k: usize) -> f64 {
        k as f64 * self.duration + self.duration / 2.0
    }

    fn centers(&self, start: usize, end: usize) -> Vec<f64> {
        (start..end).map(|k| self.center(k)).collect()
    }

    fn last_center(&self) -> f64 {
        self.center(self.len().saturating_sub(1))
    }

    fn first_at_or_below(&self, level_db: f64) -> Option<usize> {
        self.levels_db.iter().position(|&l| l <= level_db)
    }

    fn first_center_at_or_after(&self, t: f64) -> Option<usize> {
        (0..self.len()).find(|&k| self.center(k) >= t)
    }
}

/// Outcome of one refinement pass
enum Step {
    Moved,
    Converged,
    Stuck(&'static str),
}

/// Best estimate so far, updated by each refinement pass
#[derive(Debug, Clone, Copy)]
struct LundebyState {
    noise_floor_db: f64,
    knee_time: f64,
    knee_window: usize,
    knee_level_db: f64,
}

impl LundebyState {
    fn refine(
        &mut self,
        windows: &Windowed,
        squared: &[f64],
        time: &TimeGrid,
        config: &DecayConfig,
    ) -> Step {
        // Noise region starts where the decay is well below the knee level
        let Some(noise_window) =
            windows.first_at_or_below(self.knee_level_db - config.noise_start_drop_db)
        else {
            return Step::Stuck("no window below knee level");
        };

        let total = time.last();
        let noise_start = windows
            .center(noise_window)
            .max(config.min_noise_start_fraction * total);
        if noise_start > windows.last_center() {
            return Step::Stuck("noise region starts after last window");
        }
        let noise_end = (noise_start + self.knee_time).min(total);

        let (i0, i1) = (time.nearest(noise_start), time.nearest(noise_end));
        if i0 >= i1 {
            return Step::Stuck("empty noise region");
        }
        self.noise_floor_db = power_db(mean(&squared[i0..i1]));

        // Late decay slope between noise + headroom and noise + headroom + range
        let end_level = self.noise_floor_db + config.late_slope_headroom_db;
        let start_level = end_level + config.late_slope_range_db;
        let (Some(end_hit), Some(start_hit)) = (
            windows.first_at_or_below(end_level),
            windows.first_at_or_below(start_level),
        ) else {
            return Step::Stuck("late slope levels not reached");
        };

        let fit_end = end_hit as isize - 1;
        let fit_start = (start_hit as isize - 1).max(0);
        if fit_end <= fit_start + 1 {
            return Step::Stuck("too few points for late slope");
        }
        let (fit_start, fit_end) = (fit_start as usize, fit_end as usize);

        let Some((slope, intercept)) = linear_regression(
            &windows.centers(fit_start, fit_end),
            &windows.levels_db[fit_start..fit_end],
        )
        .filter(|(slope, _)| usable_slope(*slope)) else {
            return Step::Stuck("flat late slope");
        };

        let knee_time =
            ((self.noise_floor_db - intercept) / slope)
                .clamp(windows.center(0), windows.last_center());
        let knee_window = windows
            .first_center_at_or_after(knee_time)
            .unwrap_or(windows.len() - 1);

        let converged = knee_window == self.knee_window;
        self.knee_window = knee_window;
        self.knee_time = windows.center(knee_window);
        self.knee_level_db = windows.levels_db[knee_window];

        if converged {
            Step::Converged
        } else {
            Step::Moved
        }
    }
}

#[inline]
fn usable_slope(slope: f64) -> bool {
    slope.is_finite() && slope.abs() >= EPSILON
}

/// Estimate peak, knee point, noise floor and averaging window of `ir`
///
/// Never fails: degenerate input returns a flat best-effort estimate.
pub fn estimate_decay(ir: &ImpulseResponse, config: &DecayConfig) -> DecayParams {
    let len = ir.len();
    if len == 0 || len < config.min_length {
        log::debug!("estimate_decay: {len} samples is too short, using fallback");
        return DecayParams {
            peak_index: 0,
            knee_point_index: len,
            noise_floor_db: FLOOR_DB,
            window_size: len.max(1),
        };
    }

    let fs = ir.sample_rate_f64();
    let peak_index = locate_peak(&ir.samples, config.peak_height);
    let span = (config.analysis_span_s * fs).max(0.0) as usize;
    let end = peak_index.saturating_add(span).min(len).max(peak_index + 1);

    let squared: Vec<f64> = peak_normalized(&ir.samples[peak_index..end])
        .into_iter()
        .map(|s| s * s)
        .collect();
    let seg_len = squared.len();
    let time = TimeGrid::new(seg_len, fs);

    let flat = |noise_floor_db: f64, window_size: usize| DecayParams {
        peak_index,
        knee_point_index: peak_index + seg_len,
        noise_floor_db,
        window_size,
    };

    // 1. Average into fixed windows
    let count = if fs > 0.0 {
        (seg_len as f64 / fs / config.initial_window_s) as usize
    } else {
        0
    };
    if count == 0 {
        log::debug!("estimate_decay: segment shorter than one window, using fallback");
        return flat(power_db(mean(&squared)), seg_len.max(1));
    }
    let initial = Windowed::new(&squared, count, config.initial_window_s);
    let fallback_window = initial.width;

    // 2. Seed noise floor from the tail
    let tail_start = (seg_len as f64 * (1.0 - config.noise_tail_fraction)) as usize;
    let tail = if tail_start < seg_len {
        &squared[tail_start..]
    } else {
        &squared[..]
    };
    let noise_floor_db = power_db(mean(tail));

    // 3. Seed decay slope down to noise floor + headroom
    let mut fit_end = initial.len();
    if let Some(first) = initial.first_at_or_below(noise_floor_db + config.seed_slope_headroom_db) {
        if first > 0 {
            fit_end = first;
        }
    }
    if fit_end < 2 {
        if initial.len() >= 2 {
            fit_end = initial.len();
        } else {
            log::debug!("estimate_decay: not enough windows for a seed slope");
            return flat(noise_floor_db, fallback_window);
        }
    }

    let Some((slope, intercept)) =
        linear_regression(&initial.centers(0, fit_end), &initial.levels_db[..fit_end])
            .filter(|(slope, _)| usable_slope(*slope))
    else {
        log::debug!("estimate_decay: flat seed slope, using fallback");
        return flat(noise_floor_db, fallback_window);
    };

    // 4. Preliminary knee point
    let knee_time = ((noise_floor_db - intercept) / slope).clamp(0.0, time.last());

    // 5. Windows sized for the decay rate
    let window_s = 10.0 / (slope.abs() * config.windows_per_10db);
    let count = if window_s > EPSILON && fs > 0.0 {
        ((seg_len as f64 / fs / window_s) as usize).max(1)
    } else {
        1
    };
    let windows = Windowed::new(&squared, count, window_s);

    let (knee_window, knee_time) = match windows.first_center_at_or_after(knee_time) {
        Some(k) => (k, knee_time),
        None => {
            let k = windows.len() - 1;
            (k, windows.center(k))
        }
    };

    // 6. Iterate noise floor / late slope / knee point
    let mut state = LundebyState {
        noise_floor_db,
        knee_time,
        knee_window,
        knee_level_db: windows.levels_db[knee_window],
    };
    for iteration in 0..config.max_iterations {
        match state.refine(&windows, &squared, &time, config) {
            Step::Moved => {}
            Step::Converged => {
                log::debug!("estimate_decay: converged after {} iterations", iteration + 1);
                break;
            }
            Step::Stuck(reason) => {
                log::debug!("estimate_decay: stopped at iteration {}: {reason}", iteration + 1);
                break;
            }
        }
    }

    // 7. Knee point back in samples
    DecayParams {
        peak_index,
        knee_point_index: peak_index + time.nearest(state.knee_time),
        noise_floor_db: state.noise_floor_db,
        window_size: windows.width,
    }
}
