//! BRIR Integration Tests
//!
//! Complete flow over a channel map:
//! - decay analysis of degenerate buffers (empty, silent)
//! - decay shortening followed by re-analysis
//! - virtual bass synthesis across several speakers
//! - diagnostics of the processed map

use brir_core::{ChannelMap, CrossoverConfig, DecayConfig, EarPair, ImpulseResponse, Speaker};
use brir_dsp::test_signals::{binaural_pair, decaying_sine};
use brir_dsp::virtual_bass::shift;
use brir_dsp::{
    DecayMetric, VirtualBassSynthesizer, adjust_decay, compute_decay_times, diagnose,
    estimate_decay, locate_peak, synthesize_virtual_bass,
};

const FS: u32 = 48000;

/// Decaying sine on the near ear, half-level copy `itd` samples later on the far ear
fn reverberant_pair(speaker: Speaker, rt60: f64, itd: isize) -> EarPair {
    let near = decaying_sine(rt60, 1e-5, 1.5, FS);
    let far: Vec<f64> = shift(&near.samples, itd, near.len())
        .into_iter()
        .map(|s| s * 0.5)
        .collect();
    let far = ImpulseResponse::new(far, FS);
    if speaker.is_left() {
        EarPair::new(near, far)
    } else {
        EarPair::new(far, near)
    }
}

#[test]
fn test_empty_pair_end_to_end() {
    let empty = || ImpulseResponse::zeros(0, FS);
    let mut map: ChannelMap = [
        (Speaker::Fl, EarPair::new(empty(), empty())),
        (Speaker::Fr, EarPair::new(empty(), empty())),
    ]
    .into_iter()
    .collect();

    let params = estimate_decay(&map.get(Speaker::Fl).unwrap().left, &DecayConfig::default());
    assert_eq!(params.peak_index, 0);
    assert_eq!(params.knee_point_index, 0);
    assert_eq!(params.noise_floor_db, -200.0);
    assert_eq!(params.window_size, 1);

    synthesize_virtual_bass(&mut map, 250.0, 1.0, false);
    assert!(map.responses().all(|ir| ir.is_empty()));
}

#[test]
fn test_impulse_peak_in_two_second_buffer() {
    let mut samples = vec![0.0; 2 * FS as usize];
    samples[1000] = 1.0;
    assert_eq!(locate_peak(&samples, 0.12589), 1000);
}

#[test]
fn test_silent_buffer_fallbacks() {
    let config = DecayConfig::default();
    let ir = ImpulseResponse::zeros(FS as usize, FS);

    assert_eq!(locate_peak(&ir.samples, config.peak_height), 0);
    let params = estimate_decay(&ir, &config);
    assert_eq!(params.noise_floor_db, -200.0);
    assert!(compute_decay_times(&ir, &params, &config).is_empty());
}

#[test]
fn test_reshape_then_virtual_bass() {
    let config = DecayConfig::default();
    let mut map: ChannelMap = [
        (Speaker::Fl, reverberant_pair(Speaker::Fl, 0.5, 20)),
        (Speaker::Fr, reverberant_pair(Speaker::Fr, 0.5, 20)),
    ]
    .into_iter()
    .collect();
    let before = diagnose(&map, &config);

    for (_, pair) in map.iter_mut() {
        for ir in [&mut pair.left, &mut pair.right] {
            assert!(adjust_decay(ir, 0.3, &config).is_some());
        }
    }

    let reshaped = diagnose(&map, &config);
    for (old, new) in before.channels.iter().zip(&reshaped.channels) {
        assert_eq!(old.decay_metric, Some(DecayMetric::Rt60));
        assert_eq!(new.decay_metric, Some(DecayMetric::Rt60));
        let (old_rt, new_rt) = (old.decay_time_s.unwrap(), new.decay_time_s.unwrap());
        assert!(new_rt < old_rt * 0.95, "{}: {old_rt} -> {new_rt}", old.speaker);
    }
    // 20 samples at 48 kHz, on the far ear
    let fl_right = &reshaped.channels[1];
    assert_eq!((fl_right.speaker, fl_right.ear), (Speaker::Fl, brir_core::Ear::Right));
    assert!((fl_right.itd_us - 416.666).abs() < 0.01);

    VirtualBassSynthesizer::new(120.0)
        .with_head_delay_ms(1.0)
        .try_process(&mut map)
        .unwrap();

    assert_eq!(map.len(), 2);
    for ir in map.responses() {
        assert_eq!(ir.len(), (1.5 * FS as f64) as usize);
        assert!(ir.samples.iter().all(|s| s.is_finite()));
    }

    let report = diagnose(&map, &config);
    assert_eq!(report.channels.len(), 4);
    assert_eq!(report.reflections.len(), 2);
    assert!(report.to_json().unwrap().contains("\"decay_metric\""));
}

#[test]
fn test_virtual_bass_matches_free_function() {
    let build = || -> ChannelMap {
        [Speaker::Fl, Speaker::Fr, Speaker::Fc]
            .into_iter()
            .map(|sp| (sp, binaural_pair(sp, 9600, 240, 12, FS)))
            .collect()
    };

    let mut a = build();
    let mut b = build();
    synthesize_virtual_bass(&mut a, 250.0, 1.0, true);
    VirtualBassSynthesizer::default()
        .with_config(CrossoverConfig::new(250.0))
        .with_inverted_polarity(true)
        .process(&mut b);
    assert_eq!(a, b);
}

#[test]
fn test_config_from_partial_json() {
    let config: DecayConfig =
        serde_json::from_str(r#"{ "max_iterations": 3, "taper_delay_ms": 4.0 }"#).unwrap();
    assert_eq!(config.max_iterations, 3);
    assert_eq!(config.taper_delay_ms, 4.0);
    assert_eq!(config.analysis_span_s, DecayConfig::default().analysis_span_s);
    assert!(config.validate().is_ok());

    let crossover: CrossoverConfig = serde_json::from_str(r#"{ "crossover_hz": 80.0 }"#).unwrap();
    assert_eq!(crossover.ild_shelves.len(), 3);
    assert!(crossover.validate(FS).is_ok());
}
