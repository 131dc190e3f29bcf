use log::{debug, info, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::AudioSample;
use crate::features::{FeatureExtractor, FeatureMode};
use crate::labels::FaultLabel;
use crate::model::Classify;
use crate::rules::{DiagnosisVerdict, FieldObservation, RuleConfig, RuleScorer};
use crate::{DiagnosisError, Result};

/// Which prediction paths the engine is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// Basic classifier over compact features only.
    Legacy,
    /// Enhanced classifier only; a below-threshold answer is still
    /// returned rather than discarded.
    Enhanced,
    /// Enhanced first, fall back to the basic path below the
    /// confidence threshold.
    Hybrid,
}

impl PredictionMode {
    fn uses_enhanced(self) -> bool {
        matches!(self, PredictionMode::Enhanced | PredictionMode::Hybrid)
    }

    fn uses_legacy(self) -> bool {
        matches!(self, PredictionMode::Legacy | PredictionMode::Hybrid)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: PredictionMode,
    /// Minimum enhanced-classifier confidence accepted in hybrid mode.
    /// Hand-tuned; gates only the hybrid fallback decision.
    pub confidence_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: PredictionMode::Hybrid,
            confidence_threshold: 0.6,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| DiagnosisError::Config(format!("bad engine config: {}", e)))
    }
}

/// Where a prediction came from. Mock output must never be mistaken
/// for an audio-derived inference downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    EnhancedClassifier,
    BasicClassifier,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: FaultLabel,
    pub confidence: f32,
    pub provenance: Provenance,
}

/// Demo-mode stand-in when no trained model is available. Draws from a
/// fixed candidate table with a non-uniform weight distribution -
/// normal-state outcomes are the most likely.
pub struct MockGenerator {
    candidates: [(FaultLabel, f32); 5],
    weights: [f32; 5],
    dist: WeightedIndex<f32>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        let candidates = [
            (FaultLabel::CompressorNormal, 0.85),
            (FaultLabel::CompressorOverload, 0.78),
            (FaultLabel::FanImbalance, 0.73),
            (FaultLabel::RefrigerantLow, 0.82),
            (FaultLabel::VibrationMount, 0.76),
        ];
        let weights = [0.40, 0.20, 0.15, 0.15, 0.10];
        let dist = WeightedIndex::new(weights).expect("static mock weight table");
        Self {
            candidates,
            weights,
            dist,
        }
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn candidates(&self) -> &[(FaultLabel, f32)] {
        &self.candidates
    }

    pub fn generate(&self) -> Prediction {
        self.generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Prediction {
        let (label, confidence) = self.candidates[self.dist.sample(rng)];
        Prediction {
            label,
            confidence,
            provenance: Provenance::Mock,
        }
    }
}

/// The diagnosis engine. Classifier handles are constructed once at
/// process start and injected here; the engine itself keeps no global
/// state and owns no I/O beyond what the classifiers loaded up front.
pub struct DiagnosisEngine {
    extractor: FeatureExtractor,
    enhanced: Option<Box<dyn Classify>>,
    basic: Option<Box<dyn Classify>>,
    rules: RuleScorer,
    mock: MockGenerator,
    config: EngineConfig,
}

impl DiagnosisEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            enhanced: None,
            basic: None,
            rules: RuleScorer::default(),
            mock: MockGenerator::new(),
            config,
        }
    }

    pub fn with_enhanced(mut self, classifier: Box<dyn Classify>) -> Self {
        debug_assert_eq!(classifier.feature_mode(), FeatureMode::Extended);
        self.enhanced = Some(classifier);
        self
    }

    pub fn with_basic(mut self, classifier: Box<dyn Classify>) -> Self {
        debug_assert_eq!(classifier.feature_mode(), FeatureMode::Compact);
        self.basic = Some(classifier);
        self
    }

    pub fn with_rules(mut self, config: RuleConfig) -> Self {
        self.rules = RuleScorer::new(config);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fused prediction over the general fault taxonomy. The returned
    /// provenance always tells the caller whether this was a real
    /// inference or the mock fallback.
    pub fn predict(&mut self, audio: &AudioSample) -> Result<Prediction> {
        if self.config.mode.uses_enhanced() {
            if let Some(classifier) = self.enhanced.as_mut() {
                match self.extractor.extract(audio, FeatureMode::Extended) {
                    Ok(features) => {
                        if let Some((label, confidence)) = classifier.classify(&features) {
                            if confidence >= self.config.confidence_threshold
                                || self.config.mode == PredictionMode::Enhanced
                            {
                                return Ok(Prediction {
                                    label,
                                    confidence,
                                    provenance: Provenance::EnhancedClassifier,
                                });
                            }
                            debug!(
                                "enhanced confidence {:.2} below threshold {:.2}, falling back",
                                confidence, self.config.confidence_threshold
                            );
                        }
                    }
                    Err(e) => warn!("extended feature extraction failed: {}", e),
                }
            }
        }

        if self.config.mode.uses_legacy() {
            if let Some(classifier) = self.basic.as_mut() {
                match self.extractor.extract(audio, FeatureMode::Compact) {
                    Ok(features) => {
                        if let Some((label, confidence)) = classifier.classify(&features) {
                            return Ok(Prediction {
                                label,
                                confidence,
                                provenance: Provenance::BasicClassifier,
                            });
                        }
                    }
                    Err(e) => warn!("compact feature extraction failed: {}", e),
                }
            }
        }

        info!("no trained classifier answered; returning mock prediction");
        Ok(self.mock.generate())
    }

    /// Refrigerant-shortage rule scoring over audio plus optional field
    /// observations.
    pub fn score_refrigerant(
        &self,
        audio: &AudioSample,
        observations: Option<&FieldObservation>,
    ) -> Result<DiagnosisVerdict> {
        let features = self.extractor.analyze_refrigerant(audio)?;
        Ok(self.rules.score(&features, observations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct StubClassifier {
        mode: FeatureMode,
        result: Option<(FaultLabel, f32)>,
    }

    impl Classify for StubClassifier {
        fn classify(
            &mut self,
            _features: &crate::features::FeatureVector,
        ) -> Option<(FaultLabel, f32)> {
            self.result
        }

        fn feature_mode(&self) -> FeatureMode {
            self.mode
        }
    }

    fn test_audio() -> AudioSample {
        let samples: Vec<f32> = (0..22050)
            .map(|i| {
                let t = i as f64 / 22050.0;
                (0.05 * (2.0 * std::f64::consts::PI * 120.0 * t).sin()) as f32
            })
            .collect();
        AudioSample::new(samples, 22050).unwrap()
    }

    fn stub(mode: FeatureMode, result: Option<(FaultLabel, f32)>) -> Box<dyn Classify> {
        Box::new(StubClassifier { mode, result })
    }

    #[test]
    fn hybrid_falls_back_below_threshold() {
        let mut engine = DiagnosisEngine::new(EngineConfig::default())
            .with_enhanced(stub(
                FeatureMode::Extended,
                Some((FaultLabel::CompressorOverload, 0.4)),
            ))
            .with_basic(stub(
                FeatureMode::Compact,
                Some((FaultLabel::FanImbalance, 0.9)),
            ));

        let prediction = engine.predict(&test_audio()).unwrap();
        assert_eq!(prediction.provenance, Provenance::BasicClassifier);
        assert_eq!(prediction.label, FaultLabel::FanImbalance);
    }

    #[test]
    fn hybrid_accepts_confident_enhanced_result() {
        let mut engine = DiagnosisEngine::new(EngineConfig::default())
            .with_enhanced(stub(
                FeatureMode::Extended,
                Some((FaultLabel::RefrigerantLeak, 0.85)),
            ))
            .with_basic(stub(
                FeatureMode::Compact,
                Some((FaultLabel::CompressorNormal, 0.9)),
            ));

        let prediction = engine.predict(&test_audio()).unwrap();
        assert_eq!(prediction.provenance, Provenance::EnhancedClassifier);
        assert_eq!(prediction.label, FaultLabel::RefrigerantLeak);
    }

    #[test]
    fn enhanced_only_mode_keeps_low_confidence_result() {
        let config = EngineConfig {
            mode: PredictionMode::Enhanced,
            confidence_threshold: 0.6,
        };
        let mut engine = DiagnosisEngine::new(config).with_enhanced(stub(
            FeatureMode::Extended,
            Some((FaultLabel::CompressorOverload, 0.4)),
        ));

        let prediction = engine.predict(&test_audio()).unwrap();
        assert_eq!(prediction.provenance, Provenance::EnhancedClassifier);
        assert!((prediction.confidence - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn silent_classifiers_fall_through_to_mock() {
        let mut engine = DiagnosisEngine::new(EngineConfig::default())
            .with_enhanced(stub(FeatureMode::Extended, None))
            .with_basic(stub(FeatureMode::Compact, None));

        let prediction = engine.predict(&test_audio()).unwrap();
        assert_eq!(prediction.provenance, Provenance::Mock);
    }

    #[test]
    fn mock_distribution_matches_weights() {
        let generator = MockGenerator::new();
        let mut rng = StdRng::seed_from_u64(7);

        let n = 10_000usize;
        let mut counts = [0usize; 5];
        for _ in 0..n {
            let prediction = generator.generate_with(&mut rng);
            assert_eq!(prediction.provenance, Provenance::Mock);
            let idx = generator
                .candidates()
                .iter()
                .position(|(label, _)| *label == prediction.label)
                .unwrap();
            counts[idx] += 1;
        }

        for (idx, &weight) in generator.weights().iter().enumerate() {
            let empirical = counts[idx] as f32 / n as f32;
            assert!(
                (empirical - weight).abs() < 0.03,
                "candidate {} at {} vs configured {}",
                idx,
                empirical,
                weight
            );
        }

        // Normal state must be the most common draw.
        assert_eq!(
            counts.iter().enumerate().max_by_key(|(_, &c)| c).unwrap().0,
            0
        );
    }
}
