//! Logistic-regression classifier loaded from a small serialized
//! artifact: a weight vector plus bias. Scoring is a dot product
//! followed by a sigmoid, kept inside `serde_json` for the artifact
//! format rather than pulling in a full ML-runtime dependency for an
//! artifact this small; `ndarray` carries just the dot product.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::features::RequestFeatures;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl ClassifierArtifact {
    pub fn load(path: &str) -> defense_common::error::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| defense_common::error::DefenseError::Config(format!("reading model artifact {path}: {e}")))?;
        let artifact: Self = serde_json::from_str(&raw)?;
        if artifact.weights.len() != RequestFeatures::FEATURE_COUNT {
            return Err(defense_common::error::DefenseError::Config(format!(
                "model artifact at {path} has {} weights, expected {}",
                artifact.weights.len(),
                RequestFeatures::FEATURE_COUNT
            )));
        }
        Ok(artifact)
    }

    /// Predicted positive-class probability in [0, 1].
    pub fn predict(&self, features: &RequestFeatures) -> f64 {
        let weights = Array1::from_vec(self.weights.clone());
        let vector = Array1::from_vec(features.to_vector());
        let dot = weights.dot(&vector);
        sigmoid(dot + self.bias)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_features() -> RequestFeatures {
        RequestFeatures {
            request_count_in_window: 10.0,
            ua_length: 20.0,
            has_accept_language: 1.0,
            has_accept: 1.0,
            has_referer: 0.0,
            path_depth: 2.0,
            query_param_count: 0.0,
            hour_of_day: 12.0,
            is_known_bad_ua: 0.0,
            is_known_benign_ua: 0.0,
        }
    }

    #[test]
    fn test_sigmoid_bounds() {
        assert!(sigmoid(100.0) > 0.99);
        assert!(sigmoid(-100.0) < 0.01);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_predict_zero_weights_yields_bias_sigmoid() {
        let artifact = ClassifierArtifact {
            weights: vec![0.0; RequestFeatures::FEATURE_COUNT],
            bias: 0.0,
        };
        let prob = artifact.predict(&sample_features());
        assert!((prob - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_load_rejects_wrong_weight_count() {
        let dir = std::env::temp_dir().join(format!("artifact-test-{}", std::process::id()));
        std::fs::write(&dir, r#"{"weights": [1.0, 2.0], "bias": 0.0}"#).unwrap();
        let result = ClassifierArtifact::load(dir.to_str().unwrap());
        std::fs::remove_file(&dir).ok();
        assert!(result.is_err());
    }
}
