//! Single-bin spectrum magnitude

use brir_core::Sample;
use realfft::RealFftPlanner;

/// Index of the real-FFT bin closest to `freq`, lower bin on ties
pub fn nearest_bin(freq: f64, sample_rate: f64, len: usize) -> usize {
    if len == 0 || sample_rate <= 0.0 {
        return 0;
    }
    let exact = (freq * len as f64 / sample_rate).max(0.0);
    let lower = exact.floor();
    let bin = if exact - lower > 0.5 { lower + 1.0 } else { lower };
    (bin as usize).min(len / 2)
}

/// Magnitude of the full-buffer real FFT of `samples` at the bin nearest `freq`
///
/// Unscaled, so a unit impulse has magnitude 1 in every bin. Empty input is 0.
pub fn magnitude_at(freq: f64, sample_rate: u32, samples: &[Sample]) -> f64 {
    let n = samples.len();
    if n == 0 {
        return 0.0;
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let mut input = samples.to_vec();
    let mut spectrum = fft.make_output_vec();

    if let Err(e) = fft.process(&mut input, &mut spectrum) {
        log::warn!("magnitude_at: FFT of {n} samples failed: {e}");
        return 0.0;
    }

    spectrum[nearest_bin(freq, sample_rate as f64, n)].norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_nearest_bin() {
        assert_eq!(nearest_bin(250.0, 48000.0, 48000), 250);
        // 1024-point bins are 46.875 Hz apart
        assert_eq!(nearest_bin(250.0, 48000.0, 1024), 5);
        assert_eq!(nearest_bin(30000.0, 48000.0, 1024), 512);
        // 0.5 bin lands on the lower one
        assert_eq!(nearest_bin(1.5, 4.0, 4), 1);
        assert_eq!(nearest_bin(100.0, 48000.0, 0), 0);
    }

    #[test]
    fn test_impulse_is_flat() {
        let mut x = vec![0.0; 4800];
        x[0] = 1.0;
        for freq in [0.0, 250.0, 12000.0] {
            assert!((magnitude_at(freq, 48000, &x) - 1.0).abs() < 1e-9);
        }
        assert_eq!(magnitude_at(250.0, 48000, &[]), 0.0);
    }

    #[test]
    fn test_sine_magnitude() {
        let n = 4800;
        let x: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * 250.0 * i as f64 / 48000.0).sin())
            .collect();
        // Bin-centered sine: N/2
        assert!((magnitude_at(250.0, 48000, &x) - n as f64 / 2.0).abs() < 1e-6);
        assert!(magnitude_at(1000.0, 48000, &x) < 1e-6);
    }
}
