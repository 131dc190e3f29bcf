use log::{info, warn};
use ndarray::{Array1, ArrayD};
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session,
    },
    value::Value,
};
use std::path::Path;

use crate::features::{FeatureMode, FeatureVector};
use crate::labels::{FaultLabel, LabelTable};
use crate::scaler::StandardScaler;
use crate::{DiagnosisError, Result};

/// Confidence reported when the exported model only emits hard labels
/// and no probability output.
const HARD_LABEL_CONFIDENCE: f32 = 0.75;

/// Inference seam the engine depends on. Returning `None` means "no
/// answer" (unavailable model, mismatched features, runtime failure) -
/// never a fabricated confident result.
pub trait Classify {
    fn classify(&mut self, features: &FeatureVector) -> Option<(FaultLabel, f32)>;

    fn feature_mode(&self) -> FeatureMode;
}

/// A trained ensemble classifier exported to ONNX, together with the
/// feature scaler and label table it was fitted with. Loaded once at
/// startup and read-only afterwards.
#[derive(Debug)]
pub struct FaultClassifier {
    session: Session,
    scaler: StandardScaler,
    labels: LabelTable,
    mode: FeatureMode,
}

impl FaultClassifier {
    /// Load a bundle directory: `model.onnx` (required), `scaler.json`
    /// and `labels.json` (optional; identity scaler and the canonical
    /// table stand in). The label table and scaler dimension are
    /// validated here so inference can't silently mislabel.
    pub fn load<P: AsRef<Path>>(bundle_dir: P, mode: FeatureMode) -> Result<Self> {
        let dir = bundle_dir.as_ref();

        let model_path = dir.join("model.onnx");
        if !model_path.is_file() {
            return Err(DiagnosisError::ClassifierUnavailable(format!(
                "no model at {}",
                model_path.display()
            )));
        }

        let session = SessionBuilder::new()
            .map_err(|e| DiagnosisError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DiagnosisError::ModelLoad(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e| DiagnosisError::ModelLoad(e.to_string()))?;

        info!(
            "loaded {} model from {} ({} inputs, {} outputs)",
            match mode {
                FeatureMode::Compact => "basic",
                FeatureMode::Extended => "enhanced",
            },
            model_path.display(),
            session.inputs().len(),
            session.outputs().len()
        );

        let scaler_path = dir.join("scaler.json");
        let scaler = if scaler_path.is_file() {
            StandardScaler::from_json_file(&scaler_path)?
        } else {
            warn!("bundle has no scaler.json, features pass through unscaled");
            StandardScaler::identity(mode.dim())
        };
        if scaler.dim() != mode.dim() {
            return Err(DiagnosisError::ClassifierUnavailable(format!(
                "scaler fitted for {} features but model expects {}",
                scaler.dim(),
                mode.dim()
            )));
        }

        let labels_path = dir.join("labels.json");
        let labels = if labels_path.is_file() {
            let raw = std::fs::read_to_string(&labels_path)?;
            let keys: Vec<String> = serde_json::from_str(&raw)
                .map_err(|e| DiagnosisError::ModelLoad(format!("bad labels file: {}", e)))?;
            LabelTable::from_keys(&keys)?
        } else {
            LabelTable::builtin()
        };

        Ok(Self {
            session,
            scaler,
            labels,
            mode,
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    fn run_inference(&mut self, scaled: &Array1<f64>) -> Result<(FaultLabel, f32)> {
        // ONNX models exported from the training pipeline expect f32.
        let data: Vec<f32> = scaled.iter().map(|&x| x as f32).collect();
        let shape = vec![1usize, data.len()];
        let input_tensor = Value::from_array((shape, data))
            .map_err(|e| DiagnosisError::ClassifierUnavailable(format!("input tensor: {}", e)))?;

        let n_outputs = self.session.outputs().len();
        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| DiagnosisError::ClassifierUnavailable(format!("inference: {}", e)))?;

        // Classifier exports carry (label, probabilities); prefer the
        // probability output so confidence is the max class probability.
        if n_outputs > 1 {
            if let Ok(probabilities) = outputs[1].try_extract_tensor::<f32>() {
                let (shape, data) = probabilities;
                let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
                let array = ArrayD::from_shape_vec(shape_vec, data.to_vec())
                    .map_err(|e| DiagnosisError::ClassifierUnavailable(e.to_string()))?;
                if array.ndim() == 2 {
                    let probs = array
                        .view()
                        .into_dimensionality::<ndarray::Ix2>()
                        .map_err(|e| DiagnosisError::ClassifierUnavailable(e.to_string()))?;
                    if probs.nrows() > 0 {
                        if let Some((idx, confidence)) = argmax(probs.row(0).iter().copied()) {
                            return Ok((self.labels.label_for(idx as i64), confidence));
                        }
                    }
                }
            }
        }

        let output = &outputs[0];

        if let Ok(labels_i64) = output.try_extract_tensor::<i64>() {
            let (_, data) = labels_i64;
            let raw = data.first().copied().ok_or_else(|| {
                DiagnosisError::ClassifierUnavailable("empty label output".into())
            })?;
            return Ok((self.labels.label_for(raw), HARD_LABEL_CONFIDENCE));
        }

        if let Ok(predictions_f32) = output.try_extract_tensor::<f32>() {
            let (shape, data) = predictions_f32;
            let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
            let array = ArrayD::from_shape_vec(shape_vec, data.to_vec())
                .map_err(|e| DiagnosisError::ClassifierUnavailable(e.to_string()))?;

            if array.ndim() == 2 {
                let probs = array
                    .view()
                    .into_dimensionality::<ndarray::Ix2>()
                    .map_err(|e| DiagnosisError::ClassifierUnavailable(e.to_string()))?;
                if probs.nrows() > 0 {
                    if let Some((idx, confidence)) = argmax(probs.row(0).iter().copied()) {
                        return Ok((self.labels.label_for(idx as i64), confidence));
                    }
                }
            } else if array.ndim() == 1 {
                if let Some(&raw) = array.iter().next() {
                    let idx = raw.round() as i64;
                    return Ok((self.labels.label_for(idx), HARD_LABEL_CONFIDENCE));
                }
            }
        }

        Err(DiagnosisError::ClassifierUnavailable(
            "unsupported output tensor type".into(),
        ))
    }
}

impl Classify for FaultClassifier {
    fn classify(&mut self, features: &FeatureVector) -> Option<(FaultLabel, f32)> {
        if features.mode() != self.mode {
            warn!(
                "feature mode mismatch: classifier expects {:?}, got {:?}",
                self.mode,
                features.mode()
            );
            return None;
        }

        let scaled = match self.scaler.transform(features.values()) {
            Ok(v) => v,
            Err(e) => {
                warn!("feature scaling failed: {}", e);
                return None;
            }
        };

        match self.run_inference(&scaled) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("classifier gave no answer: {}", e);
                None
            }
        }
    }

    fn feature_mode(&self) -> FeatureMode {
        self.mode
    }
}

fn argmax<I: Iterator<Item = f32>>(values: I) -> Option<(usize, f32)> {
    values
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}
