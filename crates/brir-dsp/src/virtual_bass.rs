//! Virtual bass synthesis
//!
//! Replaces everything below the crossover in every buffer with a shared,
//! minimum-phase bass impulse. The near ear gets the direct bass after the
//! head delay; the far ear gets an ILD-shelved copy delayed further by the
//! pair's measured ITD.

use brir_core::{BrirResult, ChannelMap, CrossoverConfig, EarPair, Sample, Speaker};
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::crossover::CrossoverFilterBank;
use crate::gain::calibrate;
use crate::peak::{DEFAULT_PEAK_HEIGHT, locate_peak};

/// Default delay of the synthesized bass after the buffer start
pub const DEFAULT_HEAD_DELAY_MS: f64 = 1.0;

/// Synthesized bass for one speaker, before delays are applied
#[derive(Debug, Clone, PartialEq)]
pub struct PairBass {
    /// Scaled, polarity-matched reference bass for the near ear
    pub direct: Vec<Sample>,
    /// `direct` through the ILD shelves, for the far ear
    pub cross: Vec<Sample>,
    /// Right-ear peak index minus left-ear peak index
    pub itd_samples: isize,
    /// Sign of the larger of the two ear peaks
    pub polarity: f64,
    pub direct_delay: isize,
    pub cross_delay: isize,
}

/// Zero-padded shift to exactly `len` samples; negative delays advance
pub fn shift(signal: &[Sample], delay: isize, len: usize) -> Vec<Sample> {
    let mut out = vec![0.0; len];
    if delay >= 0 {
        let delay = delay as usize;
        if delay < len {
            let avail = (len - delay).min(signal.len());
            out[delay..delay + avail].copy_from_slice(&signal[..avail]);
        }
    } else {
        let advance = delay.unsigned_abs();
        if advance < signal.len() {
            let avail = len.min(signal.len() - advance);
            out[..avail].copy_from_slice(&signal[advance..advance + avail]);
        }
    }
    out
}

/// Sign of whichever ear peak has the larger magnitude, left on ties
fn shared_polarity(left: Sample, right: Sample) -> f64 {
    let dominant = if left.abs() >= right.abs() { left } else { right };
    if dominant >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Virtual bass processor for a whole channel map
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualBassSynthesizer {
    pub config: CrossoverConfig,
    pub head_delay_ms: f64,
    pub invert_polarity: bool,
    pub peak_height: f64,
}

impl Default for VirtualBassSynthesizer {
    fn default() -> Self {
        Self {
            config: CrossoverConfig::default(),
            head_delay_ms: DEFAULT_HEAD_DELAY_MS,
            invert_polarity: false,
            peak_height: DEFAULT_PEAK_HEIGHT,
        }
    }
}

impl VirtualBassSynthesizer {
    pub fn new(crossover_hz: f64) -> Self {
        Self {
            config: CrossoverConfig::new(crossover_hz),
            ..Default::default()
        }
    }

    pub fn with_config(mut self, config: CrossoverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_head_delay_ms(mut self, ms: f64) -> Self {
        self.head_delay_ms = ms;
        self
    }

    pub fn with_inverted_polarity(mut self, invert: bool) -> Self {
        self.invert_polarity = invert;
        self
    }

    /// Head delay in whole samples
    pub fn head_delay_samples(&self, sample_rate: u32) -> isize {
        (self.head_delay_ms * sample_rate as f64 / 1000.0).round() as isize
    }

    /// Validate the map and configuration, then [`process`](Self::process)
    pub fn try_process(&self, map: &mut ChannelMap) -> BrirResult<()> {
        map.validate()?;
        if let Some(sample_rate) = map.sample_rate() {
            self.config.validate(sample_rate)?;
        }
        self.process(map);
        Ok(())
    }

    /// Synthesize the bass band of every buffer in place
    ///
    /// Buffers keep their original lengths. Empty maps and maps of empty
    /// buffers are left untouched.
    pub fn process(&self, map: &mut ChannelMap) {
        let Some(sample_rate) = map.sample_rate() else {
            return;
        };

        let lengths: BTreeMap<Speaker, (usize, usize)> = map
            .iter()
            .map(|(speaker, pair)| (speaker, (pair.left.len(), pair.right.len())))
            .collect();
        let n = map.pad_to_max_len();
        if n == 0 {
            return;
        }

        let bank = CrossoverFilterBank::new(&self.config, sample_rate);
        let reference = bank.reference_bass_impulse(n);
        let gain = calibrate(map, &bank, &reference);
        let head = self.head_delay_samples(sample_rate);
        log::info!(
            "virtual bass: {} speakers, {n} samples, crossover {} Hz, gain {gain:.4}",
            map.len(),
            self.config.crossover_hz
        );

        map.pairs_mut().par_iter_mut().for_each(|(speaker, pair)| {
            let bass = self.pair_bass(*speaker, pair, &reference, gain, &bank, head);
            log::debug!(
                "{speaker}: itd {} samples, polarity {:+}",
                bass.itd_samples,
                bass.polarity
            );
            self.apply(*speaker, pair, &bass, &bank);

            let (left_len, right_len) = lengths.get(speaker).copied().unwrap_or((n, n));
            pair.left.truncate(left_len);
            pair.right.truncate(right_len);
        });
    }

    /// Direct and cross bass for one pair of equal-length buffers
    pub fn pair_bass(
        &self,
        speaker: Speaker,
        pair: &EarPair,
        reference: &[Sample],
        gain: f64,
        bank: &CrossoverFilterBank,
        head: isize,
    ) -> PairBass {
        let left_peak = locate_peak(&pair.left.samples, self.peak_height);
        let right_peak = locate_peak(&pair.right.samples, self.peak_height);
        let itd_samples = right_peak as isize - left_peak as isize;

        let value = |samples: &[Sample], i: usize| samples.get(i).copied().unwrap_or(0.0);
        let polarity = shared_polarity(
            value(&pair.left.samples, left_peak),
            value(&pair.right.samples, right_peak),
        );

        let scale = if self.invert_polarity {
            -gain * polarity
        } else {
            gain * polarity
        };
        let direct: Vec<Sample> = reference.iter().map(|s| s * scale).collect();
        let cross = bank.ild.filter(&direct);

        let cross_delay = if speaker.is_left() {
            head + itd_samples
        } else {
            head - itd_samples
        };

        PairBass {
            direct,
            cross,
            itd_samples,
            polarity,
            direct_delay: head,
            cross_delay,
        }
    }

    /// High-pass both ears and add the delayed bass, near ear direct
    fn apply(
        &self,
        speaker: Speaker,
        pair: &mut EarPair,
        bass: &PairBass,
        bank: &CrossoverFilterBank,
    ) {
        let n = pair.max_len();
        let direct = shift(&bass.direct, bass.direct_delay, n);
        let cross = shift(&bass.cross, bass.cross_delay, n);
        let (to_left, to_right) = if speaker.is_left() {
            (direct, cross)
        } else {
            (cross, direct)
        };

        for (ir, synth) in [(&mut pair.left, to_left), (&mut pair.right, to_right)] {
            let mut high = bank.high_pass(&ir.samples);
            high.iter_mut().zip(&synth).for_each(|(h, s)| *h += s);
            ir.samples = high;
        }
    }
}

/// Virtual bass with default filters at `crossover_hz`
pub fn synthesize_virtual_bass(
    map: &mut ChannelMap,
    crossover_hz: f64,
    head_delay_ms: f64,
    invert_polarity: bool,
) {
    VirtualBassSynthesizer::new(crossover_hz)
        .with_head_delay_ms(head_delay_ms)
        .with_inverted_polarity(invert_polarity)
        .process(map);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_signals::{binaural_pair, generate_impulse};
    use brir_core::{BrirError, ImpulseResponse};

    const FS: u32 = 48000;

    fn map_of(pairs: Vec<(Speaker, EarPair)>) -> ChannelMap {
        pairs.into_iter().collect()
    }

    #[test]
    fn test_shift() {
        let x = [1.0, 2.0, 3.0];
        assert_eq!(shift(&x, 0, 3), vec![1.0, 2.0, 3.0]);
        assert_eq!(shift(&x, 2, 4), vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(shift(&x, -1, 4), vec![2.0, 3.0, 0.0, 0.0]);
        assert_eq!(shift(&x, 5, 3), vec![0.0; 3]);
        assert_eq!(shift(&x, -3, 3), vec![0.0; 3]);
    }

    #[test]
    fn test_shared_polarity() {
        assert_eq!(shared_polarity(0.5, -0.4), 1.0);
        assert_eq!(shared_polarity(0.3, -0.4), -1.0);
        assert_eq!(shared_polarity(-0.5, 0.5), -1.0);
        assert_eq!(shared_polarity(0.0, 0.0), 1.0);
    }

    #[test]
    fn test_head_delay_rounds() {
        let vb = VirtualBassSynthesizer::default().with_head_delay_ms(1.01);
        assert_eq!(vb.head_delay_samples(48000), 48);
        assert_eq!(vb.head_delay_samples(44100), 45);
    }

    #[test]
    fn test_empty_buffers_stay_empty() {
        let empty = || EarPair::new(ImpulseResponse::zeros(0, FS), ImpulseResponse::zeros(0, FS));
        let mut map = map_of(vec![(Speaker::Fl, empty()), (Speaker::Fr, empty())]);
        synthesize_virtual_bass(&mut map, 250.0, 1.0, false);
        assert!(map.responses().all(|ir| ir.is_empty()));

        let mut empty = ChannelMap::new();
        synthesize_virtual_bass(&mut empty, 250.0, 1.0, false);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_lengths_preserved() {
        let mut short = binaural_pair(Speaker::Fr, 9000, 200, 20, FS);
        short.right.truncate(7000);
        let mut map = map_of(vec![
            (Speaker::Fl, binaural_pair(Speaker::Fl, 12000, 200, 20, FS)),
            (Speaker::Fr, short),
        ]);

        synthesize_virtual_bass(&mut map, 250.0, 1.0, false);

        let fl = map.get(Speaker::Fl).unwrap();
        let fr = map.get(Speaker::Fr).unwrap();
        assert_eq!((fl.left.len(), fl.right.len()), (12000, 12000));
        assert_eq!((fr.left.len(), fr.right.len()), (9000, 7000));
        assert!(map.responses().flat_map(|ir| &ir.samples).all(|s| s.is_finite()));
    }

    #[test]
    fn test_deterministic() {
        let build = || {
            map_of(vec![
                (Speaker::Fl, binaural_pair(Speaker::Fl, 9600, 300, 25, FS)),
                (Speaker::Fr, binaural_pair(Speaker::Fr, 9600, 300, 25, FS)),
                (Speaker::Fc, binaural_pair(Speaker::Fc, 9600, 300, 0, FS)),
            ])
        };
        let mut a = build();
        let mut b = build();
        synthesize_virtual_bass(&mut a, 120.0, 1.0, false);
        synthesize_virtual_bass(&mut b, 120.0, 1.0, false);
        assert_eq!(a, b);
        assert_ne!(a, build());
    }

    #[test]
    fn test_zero_itd_cross_is_shelved_direct() {
        let pair = EarPair::new(
            ImpulseResponse::new(generate_impulse(4800, 100), FS),
            ImpulseResponse::new(generate_impulse(4800, 100), FS),
        );
        let vb = VirtualBassSynthesizer::default();
        let bank = CrossoverFilterBank::new(&vb.config, FS);
        let reference = bank.reference_bass_impulse(4800);

        let bass = vb.pair_bass(Speaker::Fc, &pair, &reference, 0.8, &bank, 48);

        assert_eq!(bass.itd_samples, 0);
        assert_eq!(bass.polarity, 1.0);
        assert_eq!(bass.direct_delay, bass.cross_delay);
        assert_eq!(bass.cross, bank.ild.filter(&bass.direct));
    }

    #[test]
    fn test_itd_delays_far_ear() {
        let vb = VirtualBassSynthesizer::default();
        let bank = CrossoverFilterBank::new(&vb.config, FS);
        let reference = bank.reference_bass_impulse(4800);

        let left = vb.pair_bass(
            Speaker::Fl,
            &binaural_pair(Speaker::Fl, 4800, 100, 30, FS),
            &reference,
            1.0,
            &bank,
            48,
        );
        assert_eq!(left.itd_samples, 30);
        assert_eq!(left.cross_delay, 78);

        let right = vb.pair_bass(
            Speaker::Fr,
            &binaural_pair(Speaker::Fr, 4800, 100, 30, FS),
            &reference,
            1.0,
            &bank,
            48,
        );
        assert_eq!(right.itd_samples, -30);
        assert_eq!(right.cross_delay, 78);
    }

    #[test]
    fn test_negative_peak_flips_bass() {
        let vb = VirtualBassSynthesizer::default();
        let bank = CrossoverFilterBank::new(&vb.config, FS);
        let reference = bank.reference_bass_impulse(4800);

        let mut pair = binaural_pair(Speaker::Fl, 4800, 100, 10, FS);
        pair.left.samples.iter_mut().for_each(|s| *s = -*s);

        let bass = vb.pair_bass(Speaker::Fl, &pair, &reference, 1.0, &bank, 0);
        assert_eq!(bass.polarity, -1.0);
        assert_eq!(bass.direct[0], -reference[0]);
    }

    #[test]
    fn test_inverted_polarity_negates_synthesized_band() {
        let build = || map_of(vec![(Speaker::Fl, binaural_pair(Speaker::Fl, 4800, 100, 10, FS))]);
        let original = build();
        let bank = CrossoverFilterBank::new(&CrossoverConfig::default(), FS);

        let mut normal = build();
        let mut inverted = build();
        synthesize_virtual_bass(&mut normal, 250.0, 1.0, false);
        synthesize_virtual_bass(&mut inverted, 250.0, 1.0, true);

        let responses = original
            .responses()
            .zip(normal.responses())
            .zip(inverted.responses());
        for ((orig, a), b) in responses {
            let high = bank.high_pass(&orig.samples);
            for i in 0..high.len() {
                let synth = a.samples[i] - high[i];
                assert!((b.samples[i] - high[i] + synth).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_try_process_rejects_mixed_rates() {
        let mut map = map_of(vec![(
            Speaker::Fl,
            EarPair::new(ImpulseResponse::zeros(100, 48000), ImpulseResponse::zeros(100, 44100)),
        )]);
        let result = VirtualBassSynthesizer::default().try_process(&mut map);
        assert!(matches!(result, Err(BrirError::SampleRateMismatch { .. })));
        assert_eq!(map.get(Speaker::Fl).unwrap().left.len(), 100);

        assert_eq!(
            VirtualBassSynthesizer::default().try_process(&mut ChannelMap::new()),
            Err(BrirError::EmptyChannelMap)
        );
    }
}
