pub mod audio;
pub mod engine;
pub mod features;
pub mod labels;
pub mod model;
pub mod rules;
pub mod scaler;

pub use audio::{AudioProcessor, AudioSample};
pub use engine::{
    DiagnosisEngine, EngineConfig, MockGenerator, Prediction, PredictionMode, Provenance,
};
pub use features::{FeatureExtractor, FeatureMode, FeatureVector, RefrigerantFeatures};
pub use labels::{FaultLabel, LabelTable};
pub use model::{Classify, FaultClassifier};
pub use rules::{
    CompressorTemperature, CoolingPerformance, CyclingFrequency, DiagnosisVerdict,
    FieldObservation, Finding, FrostFormation, RefrigerantLevel, RuleConfig, RuleScorer, Severity,
    UrgencyTier,
};
pub use scaler::StandardScaler;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagnosisError {
    /// Empty or malformed audio buffer; callers must not proceed to extraction.
    #[error("invalid audio: {0}")]
    InvalidAudio(String),

    /// Extraction produced a wrong-shaped or non-finite vector.
    #[error("feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// No trained model loaded, or a model/scaler/label-table mismatch.
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("audio decode failed: {0}")]
    AudioDecode(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiagnosisError>;
