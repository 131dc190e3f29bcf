use compressor_diagnosis::{
    AudioSample, DiagnosisEngine, EngineConfig, FeatureExtractor, FeatureMode, Provenance,
    RefrigerantLevel, UrgencyTier,
};

fn sine(freq: f64, amplitude: f32, sample_rate: u32, secs: f64) -> AudioSample {
    let n = (sample_rate as f64 * secs) as usize;
    let samples: Vec<f32> = (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            amplitude * (2.0 * std::f64::consts::PI * freq * t).sin() as f32
        })
        .collect();
    AudioSample::new(samples, sample_rate).unwrap()
}

#[test]
fn fifty_hertz_scenario_end_to_end() {
    // 50 Hz, 22050 Hz sample rate, amplitude 0.01, one second.
    let audio = sine(50.0, 0.01, 22050, 1.0);
    let fv = FeatureExtractor::new()
        .extract(&audio, FeatureMode::Compact)
        .unwrap();

    let values = fv.as_slice();
    assert_eq!(values.len(), 12);

    // The tone sits in [10,100): that band ratio dominates the other four.
    let bands = &values[5..10];
    assert!(bands[1..].iter().all(|&b| bands[0] > b));

    // Sine RMS is amplitude / sqrt(2); crest factor is sqrt(2).
    assert!((values[10] - 0.00707).abs() < 1e-4);
    assert!((values[11] - 1.414).abs() < 1e-2);
}

#[test]
fn engine_without_models_reports_mock_provenance() {
    let mut engine = DiagnosisEngine::new(EngineConfig::default());
    let audio = sine(440.0, 0.1, 22050, 1.0);

    let prediction = engine.predict(&audio).unwrap();
    assert_eq!(prediction.provenance, Provenance::Mock);
    assert!(prediction.confidence > 0.0 && prediction.confidence <= 1.0);
}

#[test]
fn refrigerant_path_is_deterministic() {
    let engine = DiagnosisEngine::new(EngineConfig::default());
    let audio = sine(250.0, 0.04, 22050, 2.0);

    let a = engine.score_refrigerant(&audio, None).unwrap();
    let b = engine.score_refrigerant(&audio, None).unwrap();

    assert_eq!(a.total_score, b.total_score);
    assert_eq!(a.urgency, b.urgency);
    assert_eq!(a.refrigerant_level, b.refrigerant_level);
    assert_eq!(a.breakdown, b.breakdown);
}

#[test]
fn quiet_high_flow_audio_scores_low() {
    let engine = DiagnosisEngine::new(EngineConfig::default());
    // Strong flow tone at 800 Hz, tiny amplitude: none of the audio
    // thresholds should trip.
    let audio = sine(800.0, 0.01, 22050, 1.0);

    let verdict = engine.score_refrigerant(&audio, None).unwrap();
    assert_eq!(verdict.refrigerant_level, RefrigerantLevel::Normal);
    assert_eq!(verdict.urgency, UrgencyTier::Normal);
}

#[test]
fn low_rumble_scores_higher_than_healthy_flow() {
    let engine = DiagnosisEngine::new(EngineConfig::default());

    // Healthy unit: energy concentrated in the flow band.
    let healthy = sine(800.0, 0.01, 22050, 1.0);
    // Struggling unit: heavy low-frequency rumble, loud overall.
    let n = 22050usize;
    let samples: Vec<f32> = (0..n)
        .map(|i| {
            let t = i as f64 / 22050.0;
            (0.06 * (2.0 * std::f64::consts::PI * 60.0 * t).sin()
                + 0.01 * (2.0 * std::f64::consts::PI * 250.0 * t).sin()) as f32
        })
        .collect();
    let struggling = AudioSample::new(samples, 22050).unwrap();

    let healthy_verdict = engine.score_refrigerant(&healthy, None).unwrap();
    let struggling_verdict = engine.score_refrigerant(&struggling, None).unwrap();

    assert!(struggling_verdict.total_score > healthy_verdict.total_score);
    assert!(struggling_verdict.urgency >= healthy_verdict.urgency);
}
