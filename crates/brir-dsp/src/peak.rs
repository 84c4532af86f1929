//! First significant peak of an impulse response

use brir_core::{EPSILON, ImpulseResponse, Sample};

/// Default first-peak threshold: -18 dBFS relative to the range maximum
pub const DEFAULT_PEAK_HEIGHT: f64 = 0.12589;

/// First high (positive or negative) peak in the whole buffer
pub fn locate_peak(samples: &[Sample], peak_height: f64) -> usize {
    locate_peak_in(samples, 0, samples.len(), peak_height)
}

/// First high peak in `samples[start..end]`, as an absolute index
///
/// The range is normalized by its own peak magnitude. Local maxima of the
/// signal and of its negation at or above `peak_height` qualify; the earliest
/// one wins. Without any qualifying maximum the absolute-maximum index is
/// returned. Empty or silent ranges return `start`.
pub fn locate_peak_in(samples: &[Sample], start: usize, end: usize, peak_height: f64) -> usize {
    let end = end.min(samples.len());
    if start >= end {
        return start;
    }

    let range = &samples[start..end];
    let max_abs = range.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
    if max_abs < EPSILON {
        return start;
    }

    let normalized: Vec<f64> = range.iter().map(|s| s / max_abs).collect();
    let negated: Vec<f64> = normalized.iter().map(|s| -s).collect();

    let first_pos = first_local_maximum(&normalized, peak_height);
    let first_neg = first_local_maximum(&negated, peak_height);

    match (first_pos, first_neg) {
        (Some(p), Some(n)) => start + p.min(n),
        (Some(i), None) | (None, Some(i)) => start + i,
        (None, None) => {
            log::debug!("locate_peak: no peak above {peak_height}, using absolute maximum");
            start + argmax_abs(&normalized)
        }
    }
}

/// Earliest local maximum with height >= `height`
///
/// Flat peaks report their middle sample (rounded down). Samples at either
/// end of the slice are never peaks.
fn first_local_maximum(x: &[f64], height: f64) -> Option<usize> {
    let n = x.len();
    if n < 3 {
        return None;
    }

    let mut i = 1;
    while i < n - 1 {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let peak = (i + ahead - 1) / 2;
                if x[peak] >= height {
                    return Some(peak);
                }
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    None
}

fn argmax_abs(x: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in x.iter().enumerate() {
        if v.abs() > x[best].abs() {
            best = i;
        }
    }
    best
}

/// Drop everything earlier than `head_ms` before the first peak
pub fn crop_head(ir: &mut ImpulseResponse, head_ms: f64, peak_height: f64) {
    if ir.is_empty() {
        return;
    }
    let peak = locate_peak(&ir.samples, peak_height);
    let head = (ir.sample_rate_f64() * head_ms / 1000.0).max(0.0) as usize;
    let crop_start = peak.saturating_sub(head);
    if crop_start > 0 {
        ir.samples.drain(..crop_start);
        log::debug!("crop_head: removed {crop_start} samples");
    }
}
