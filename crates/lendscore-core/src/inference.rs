//! Inference boundary: feature vectors in, prediction results out.

use serde::Serialize;

use crate::assemble::FeatureVector;
use crate::error::InferenceError;
use crate::model::Classifier;

/// Positive-class probability at or below which a binary result is low risk.
pub const LOW_RISK_MAX: f64 = 0.3;
/// Positive-class probability at or below which a binary result is medium risk.
pub const MEDIUM_RISK_MAX: f64 = 0.7;

/// Coarse band over the positive-class probability of a binary model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// Band for a probability in [0, 1]. Scoring never yields NaN.
    pub fn from_probability(p: f64) -> Self {
        debug_assert!(!p.is_nan(), "risk band of NaN probability");
        if p <= LOW_RISK_MAX {
            RiskBand::Low
        } else if p <= MEDIUM_RISK_MAX {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }
}

/// Outcome of one prediction.
///
/// `probability` is the positive-class probability for binary models and
/// the predicted class's probability for multiclass models. It is absent
/// when the model has no calibrated probabilities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub prediction: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskBand>,
}

/// Run the model on one feature vector.
///
/// `model` is `None` when no model is loaded. The dimension check guards
/// against drift between the deployed metadata and the deployed model.
pub fn predict(
    vector: &FeatureVector,
    model: Option<&dyn Classifier>,
) -> Result<PredictionResult, InferenceError> {
    let model = model.ok_or(InferenceError::ModelNotLoaded)?;
    let expected = model.n_features();
    if vector.len() != expected {
        return Err(InferenceError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }

    let scored = model.score(vector.as_slice())?;
    let prediction = model.classes()[scored.class_index];
    let binary = model.classes().len() == 2;

    let probability = scored.probabilities.map(|probs| {
        let p = if binary { probs[1] } else { probs[scored.class_index] };
        p.clamp(0.0, 1.0)
    });
    let risk_level = probability
        .filter(|_| binary)
        .map(RiskBand::from_probability);

    Ok(PredictionResult {
        prediction,
        probability,
        risk_level,
    })
}

/// Run the model on every vector, preserving order.
///
/// A batch over `max_batch_size` is rejected before any inference runs.
/// Any failing element fails the whole batch.
pub fn predict_batch(
    vectors: &[FeatureVector],
    model: Option<&dyn Classifier>,
    max_batch_size: usize,
) -> Result<Vec<PredictionResult>, InferenceError> {
    let model = model.ok_or(InferenceError::ModelNotLoaded)?;
    check_batch_size(vectors.len(), max_batch_size)?;
    vectors.iter().map(|v| predict(v, Some(model))).collect()
}

/// Reject a batch larger than `max`.
pub fn check_batch_size(size: usize, max: usize) -> Result<(), InferenceError> {
    if size > max {
        Err(InferenceError::BatchTooLarge { size, max })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearClassifier, ModelArtifact};

    fn model() -> LinearClassifier {
        LinearClassifier::from_artifact(ModelArtifact {
            model_type: "LogisticRegression".into(),
            classes: vec![0, 1],
            feature_names: vec!["age".into(), "salary".into()],
            coefficients: vec![vec![0.05, 0.00003]],
            intercept: vec![-3.1],
            probability: true,
        })
        .unwrap()
    }

    #[test]
    fn risk_band_thresholds() {
        assert_eq!(RiskBand::from_probability(0.3), RiskBand::Low);
        assert_eq!(RiskBand::from_probability(0.31), RiskBand::Medium);
        assert_eq!(RiskBand::from_probability(0.7), RiskBand::Medium);
        assert_eq!(RiskBand::from_probability(0.71), RiskBand::High);
    }

    #[test]
    fn predict_without_model_fails_fast() {
        let v = FeatureVector::new(vec![30.0, 60000.0]);
        assert_eq!(predict(&v, None), Err(InferenceError::ModelNotLoaded));
    }

    #[test]
    fn predict_checks_dimension() {
        let m = model();
        let v = FeatureVector::new(vec![30.0]);
        assert_eq!(
            predict(&v, Some(&m)),
            Err(InferenceError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn predict_returns_label_and_probability() {
        let m = model();
        let result = predict(&FeatureVector::new(vec![30.0, 60000.0]), Some(&m)).unwrap();
        assert_eq!(result.prediction, 1);
        let p = result.probability.unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(result.risk_level, Some(RiskBand::Medium));
    }

    #[test]
    fn opposing_overflow_is_an_error_not_nan() {
        let m = LinearClassifier::from_artifact(ModelArtifact {
            model_type: "LogisticRegression".into(),
            classes: vec![0, 1],
            feature_names: vec!["a".into(), "b".into()],
            coefficients: vec![vec![10.0, -10.0]],
            intercept: vec![0.0],
            probability: true,
        })
        .unwrap();
        let v = FeatureVector::new(vec![1e308, 1e308]);
        assert_eq!(predict(&v, Some(&m)), Err(InferenceError::NonFiniteScore));

        // One side overflowing still has a defined answer.
        let v = FeatureVector::new(vec![1e308, 0.0]);
        let result = predict(&v, Some(&m)).unwrap();
        assert_eq!(result.prediction, 1);
        let p = result.probability.unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(result.risk_level, Some(RiskBand::High));
    }

    #[test]
    fn batch_preserves_order() {
        let m = model();
        let vectors = vec![
            FeatureVector::new(vec![20.0, 20000.0]),
            FeatureVector::new(vec![60.0, 140000.0]),
            FeatureVector::new(vec![30.0, 60000.0]),
        ];
        let batch = predict_batch(&vectors, Some(&m), 100).unwrap();
        let single: Vec<_> = vectors
            .iter()
            .map(|v| predict(v, Some(&m)).unwrap())
            .collect();
        assert_eq!(batch, single);
    }

    #[test]
    fn batch_at_limit_succeeds_and_over_limit_fails() {
        let m = model();
        let vectors = vec![FeatureVector::new(vec![30.0, 60000.0]); 3];
        assert_eq!(predict_batch(&vectors, Some(&m), 3).unwrap().len(), 3);
        assert_eq!(
            predict_batch(&vectors, Some(&m), 2),
            Err(InferenceError::BatchTooLarge { size: 3, max: 2 })
        );
    }

    #[test]
    fn one_bad_vector_fails_batch() {
        let m = model();
        let vectors = vec![
            FeatureVector::new(vec![30.0, 60000.0]),
            FeatureVector::new(vec![30.0]),
        ];
        assert!(matches!(
            predict_batch(&vectors, Some(&m), 10),
            Err(InferenceError::DimensionMismatch { .. })
        ));
    }
}
