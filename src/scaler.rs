use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{DiagnosisError, Result};

/// Feature standardization with parameters fitted offline at training
/// time: `(x - mean) / scale` per dimension. The persisted form mirrors
/// the training pipeline's scaler so inference sees identically scaled
/// inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// A pass-through scaler for the given dimension.
    pub fn identity(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        }
    }

    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(DiagnosisError::Config(format!(
                "scaler mean/scale length mismatch: {} vs {}",
                mean.len(),
                scale.len()
            )));
        }
        Ok(Self { mean, scale })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let scaler: StandardScaler = serde_json::from_str(&raw)
            .map_err(|e| DiagnosisError::ModelLoad(format!("bad scaler file: {}", e)))?;
        if scaler.mean.len() != scaler.scale.len() {
            return Err(DiagnosisError::ModelLoad(
                "scaler mean/scale length mismatch".into(),
            ));
        }
        Ok(scaler)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &Array1<f64>) -> Result<Array1<f64>> {
        if features.len() != self.mean.len() {
            return Err(DiagnosisError::ClassifierUnavailable(format!(
                "scaler fitted for {} features, got {}",
                self.mean.len(),
                features.len()
            )));
        }

        let scaled: Vec<f64> = features
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                // Zero-variance dimensions pass through unscaled, matching
                // the training-side convention.
                let s = if self.scale[i] != 0.0 { self.scale[i] } else { 1.0 };
                (x - self.mean[i]) / s
            })
            .collect();

        Ok(Array1::from(scaled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_standardizes() {
        let scaler = StandardScaler::new(vec![1.0, 2.0], vec![2.0, 4.0]).unwrap();
        let out = scaler.transform(&Array1::from(vec![3.0, 10.0])).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn zero_scale_passes_through() {
        let scaler = StandardScaler::new(vec![1.0], vec![0.0]).unwrap();
        let out = scaler.transform(&Array1::from(vec![4.0])).unwrap();
        assert_eq!(out[0], 3.0);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let scaler = StandardScaler::identity(12);
        let err = scaler.transform(&Array1::from(vec![0.0; 21])).unwrap_err();
        assert!(matches!(err, DiagnosisError::ClassifierUnavailable(_)));
    }

    #[test]
    fn round_trips_through_json() {
        let scaler = StandardScaler::new(vec![0.5, -0.5], vec![1.5, 2.5]).unwrap();
        let json = serde_json::to_string(&scaler).unwrap();
        let back: StandardScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dim(), 2);
    }
}
