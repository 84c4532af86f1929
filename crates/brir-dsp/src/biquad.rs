//! Second-order sections using Transposed Direct Form II
//!
//! TDF-II is numerically optimal for floating-point arithmetic,
//! minimizing quantization noise and ensuring stability.

use brir_core::Sample;
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

use crate::{MonoProcessor, Processor};

/// One second-order IIR stage
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2),
/// stored with `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSection {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl FilterSection {
    /// Build from raw coefficients, normalizing to a unit leading denominator
    pub fn from_coeffs(b: [f64; 3], a: [f64; 3]) -> Self {
        let a0 = a[0];
        Self {
            b: [b[0] / a0, b[1] / a0, b[2] / a0],
            a: [1.0, a[1] / a0, a[2] / a0],
        }
    }

    /// Calculate lowpass filter coefficients
    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        Self::from_coeffs(
            [
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
            ],
            [1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha],
        )
    }

    /// Calculate highpass filter coefficients
    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        Self::from_coeffs(
            [
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
            ],
            [1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha],
        )
    }

    /// Calculate high shelf filter coefficients (Audio EQ Cookbook)
    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        Self::from_coeffs(
            [
                a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha),
            ],
            [
                (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha,
            ],
        )
    }

    /// Bypass (unity gain, no filtering)
    pub fn bypass() -> Self {
        Self {
            b: [1.0, 0.0, 0.0],
            a: [1.0, 0.0, 0.0],
        }
    }

    /// Complex frequency response at `freq` Hz
    pub fn response(&self, freq: f64, sample_rate: f64) -> Complex<f64> {
        let omega = 2.0 * PI * freq / sample_rate;
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let num = self.b[0] + z1 * self.b[1] + z2 * self.b[2];
        let den = self.a[0] + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }
}

/// Transposed Direct Form II runner for one section
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    section: FilterSection,
    z1: f64,
    z2: f64,
}

impl BiquadTDF2 {
    pub fn new(section: FilterSection) -> Self {
        Self {
            section,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn section(&self) -> &FilterSection {
        &self.section
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let [b0, b1, b2] = self.section.b;
        let [_, a1, a2] = self.section.a;
        let output = b0 * input + self.z1;
        self.z1 = b1 * input - a1 * output + self.z2;
        self.z2 = b2 * input - a2 * output;
        output
    }
}

/// Ordered sections applied in series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCascade {
    sections: Vec<FilterSection>,
}

impl FilterCascade {
    pub fn new(sections: Vec<FilterSection>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[FilterSection] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn push(&mut self, section: FilterSection) {
        self.sections.push(section);
    }

    /// This cascade followed by `other`
    pub fn then(mut self, other: &FilterCascade) -> Self {
        self.sections.extend_from_slice(&other.sections);
        self
    }

    /// The whole cascade stacked `times` times
    pub fn repeated(&self, times: usize) -> Self {
        let mut sections = Vec::with_capacity(self.sections.len() * times);
        for _ in 0..times {
            sections.extend_from_slice(&self.sections);
        }
        Self { sections }
    }

    /// Filter from zero initial state, section by section
    pub fn process_in_place(&self, buffer: &mut [Sample]) {
        for section in &self.sections {
            BiquadTDF2::new(*section).process_block(buffer);
        }
    }

    /// Filtered copy of `input`
    pub fn filter(&self, input: &[Sample]) -> Vec<Sample> {
        let mut output = input.to_vec();
        self.process_in_place(&mut output);
        output
    }

    /// Complex frequency response at `freq` Hz
    pub fn response(&self, freq: f64, sample_rate: f64) -> Complex<f64> {
        self.sections
            .iter()
            .fold(Complex::new(1.0, 0.0), |acc, s| acc * s.response(freq, sample_rate))
    }

    /// Linear magnitude at `freq` Hz
    pub fn magnitude(&self, freq: f64, sample_rate: f64) -> f64 {
        self.response(freq, sample_rate).norm()
    }
}

impl FromIterator<FilterSection> for FilterCascade {
    fn from_iter<I: IntoIterator<Item = FilterSection>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f64 = 48000.0;

    #[test]
    fn test_bypass() {
        let mut filter = BiquadTDF2::new(FilterSection::bypass());
        let output = filter.process_sample(0.5);
        assert!((output - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_lowpass_dc() {
        let mut filter = BiquadTDF2::new(FilterSection::lowpass(1000.0, 0.707, SAMPLE_RATE));

        // DC signal should pass through lowpass
        for _ in 0..1000 {
            filter.process_sample(1.0);
        }
        let output = filter.process_sample(1.0);
        assert!((output - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_dc() {
        let mut filter = BiquadTDF2::new(FilterSection::highpass(1000.0, 0.707, SAMPLE_RATE));

        // DC signal should be blocked by highpass
        for _ in 0..1000 {
            filter.process_sample(1.0);
        }
        let output = filter.process_sample(1.0);
        assert!(output.abs() < 0.01);
    }

    #[test]
    fn test_reset() {
        let mut filter = BiquadTDF2::new(FilterSection::lowpass(1000.0, 0.707, SAMPLE_RATE));
        for _ in 0..100 {
            filter.process_sample(1.0);
        }

        filter.reset();

        assert_eq!(filter.z1, 0.0);
        assert_eq!(filter.z2, 0.0);
    }

    #[test]
    fn test_normalized_denominator() {
        let section = FilterSection::from_coeffs([2.0, 4.0, 6.0], [2.0, 1.0, 0.5]);
        assert_eq!(section.a, [1.0, 0.5, 0.25]);
        assert_eq!(section.b, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_response_matches_filtering() {
        let section = FilterSection::lowpass(500.0, 0.707, SAMPLE_RATE);
        let mut impulse = vec![0.0; 8192];
        impulse[0] = 1.0;
        let h = FilterCascade::new(vec![section]).filter(&impulse);

        // DC gain of the impulse response equals |H(0)|
        let dc: f64 = h.iter().sum();
        assert!((dc - section.response(0.0, SAMPLE_RATE).norm()).abs() < 1e-6);
    }

    #[test]
    fn test_repeated_cascade() {
        let base: FilterCascade = [
            FilterSection::highpass(100.0, 0.54, SAMPLE_RATE),
            FilterSection::highpass(100.0, 1.31, SAMPLE_RATE),
        ]
        .into_iter()
        .collect();
        let doubled = base.repeated(2);

        assert_eq!(doubled.len(), 4);
        assert_eq!(doubled.sections()[2], base.sections()[0]);
        let single = base.magnitude(100.0, SAMPLE_RATE);
        assert!((doubled.magnitude(100.0, SAMPLE_RATE) - single * single).abs() < 1e-12);
    }
}
