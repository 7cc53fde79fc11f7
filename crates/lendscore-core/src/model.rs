//! Model artifact format and the linear classifier built from it.
//!
//! The training job exports a fitted linear model as JSON:
//!
//! ```json
//! {
//!   "model_type": "LogisticRegression",
//!   "classes": [0, 1],
//!   "feature_names": ["age", "salary"],
//!   "coefficients": [[0.05, 0.00003]],
//!   "intercept": [-3.1],
//!   "probability": true
//! }
//! ```
//!
//! Binary models carry one coefficient row and score through a sigmoid;
//! multiclass models carry one row per class and score through a softmax.
//! `probability: false` marks a decision-function-only model whose results
//! carry no probability.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{InferenceError, LoadError, LoadResult};

fn default_true() -> bool {
    true
}

/// Serialized linear classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_type: String,
    pub classes: Vec<i64>,
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    /// Whether the model produces calibrated class probabilities.
    #[serde(default = "default_true")]
    pub probability: bool,
}

/// Output of scoring one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    /// Index into [`Classifier::classes`].
    pub class_index: usize,
    /// Per-class probabilities, when the model exposes them.
    pub probabilities: Option<Vec<f64>>,
}

/// A loaded classifier.
///
/// Implementations are immutable after construction and shared across
/// request handlers without locking.
pub trait Classifier: Send + Sync {
    fn model_type(&self) -> &str;

    /// Expected input dimensionality.
    fn n_features(&self) -> usize;

    /// Declared class labels.
    fn classes(&self) -> &[i64];

    /// Feature names recorded in the artifact; empty when not recorded.
    fn feature_names(&self) -> &[String];

    fn has_probabilities(&self) -> bool;

    /// Score one row. `row.len()` must equal [`n_features`](Self::n_features);
    /// callers check this at the inference boundary.
    ///
    /// Returned probabilities are always finite. A row whose decision
    /// function is undefined fails with [`InferenceError::NonFiniteScore`].
    fn score(&self, row: &[f64]) -> Result<Scored, InferenceError>;
}

/// Logistic regression (or any linear decision function) over dense rows.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    model_type: String,
    classes: Vec<i64>,
    feature_names: Vec<String>,
    coefficients: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    probability: bool,
    n_features: usize,
}

impl LinearClassifier {
    /// Build a classifier, checking the artifact is internally consistent.
    pub fn from_artifact(artifact: ModelArtifact) -> LoadResult<Self> {
        let n_classes = artifact.classes.len();
        if n_classes < 2 {
            return Err(mismatch(format!(
                "a classifier needs at least 2 classes, artifact declares {}",
                n_classes
            )));
        }
        let unique: HashSet<_> = artifact.classes.iter().collect();
        if unique.len() != n_classes {
            return Err(mismatch("artifact declares duplicate classes"));
        }

        let expected_rows = if n_classes == 2 { 1 } else { n_classes };
        if artifact.coefficients.len() != expected_rows {
            return Err(mismatch(format!(
                "{} classes need {} coefficient row(s), artifact has {}",
                n_classes,
                expected_rows,
                artifact.coefficients.len()
            )));
        }
        if artifact.intercept.len() != expected_rows {
            return Err(mismatch(format!(
                "{} coefficient row(s) but {} intercept(s)",
                expected_rows,
                artifact.intercept.len()
            )));
        }

        let n_features = artifact.coefficients[0].len();
        if n_features == 0 {
            return Err(mismatch("coefficient rows are empty"));
        }
        if artifact.coefficients.iter().any(|row| row.len() != n_features) {
            return Err(mismatch("coefficient rows have different lengths"));
        }
        if !artifact.feature_names.is_empty() && artifact.feature_names.len() != n_features {
            return Err(mismatch(format!(
                "artifact names {} features but coefficients cover {}",
                artifact.feature_names.len(),
                n_features
            )));
        }
        let all_finite = artifact
            .coefficients
            .iter()
            .flatten()
            .chain(artifact.intercept.iter())
            .all(|x| x.is_finite());
        if !all_finite {
            return Err(mismatch("artifact contains non-finite weights"));
        }

        Ok(Self {
            model_type: artifact.model_type,
            classes: artifact.classes,
            feature_names: artifact.feature_names,
            coefficients: artifact.coefficients,
            intercept: artifact.intercept,
            probability: artifact.probability,
            n_features,
        })
    }

    /// Decision function per coefficient row. Overflow saturates to
    /// `±inf`; opposing infinities have no defined margin.
    fn margins(&self, row: &[f64]) -> Result<Vec<f64>, InferenceError> {
        self.coefficients
            .iter()
            .zip(&self.intercept)
            .map(|(weights, bias)| {
                let m = weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias;
                if m.is_nan() {
                    Err(InferenceError::NonFiniteScore)
                } else {
                    Ok(m)
                }
            })
            .collect()
    }
}

impl Classifier for LinearClassifier {
    fn model_type(&self) -> &str {
        &self.model_type
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn has_probabilities(&self) -> bool {
        self.probability
    }

    fn score(&self, row: &[f64]) -> Result<Scored, InferenceError> {
        let mut margins = self.margins(row)?;

        if self.classes.len() == 2 {
            let margin = margins[0];
            let class_index = usize::from(margin > 0.0);
            let probabilities = self.probability.then(|| {
                let p = sigmoid(margin);
                vec![1.0 - p, p]
            });
            return Ok(Scored {
                class_index,
                probabilities,
            });
        }

        let class_index = argmax(&margins);
        let probabilities = self.probability.then(|| {
            softmax_inplace(&mut margins);
            margins
        });
        Ok(Scored {
            class_index,
            probabilities,
        })
    }
}

/// Numerically stable sigmoid. Clamps input to [-500, 500].
#[inline]
fn sigmoid(x: f64) -> f64 {
    let clamped = x.clamp(-500.0, 500.0);
    if clamped >= 0.0 {
        1.0 / (1.0 + (-clamped).exp())
    } else {
        let e = clamped.exp();
        e / (1.0 + e)
    }
}

/// Softmax in place, subtracting the row max before exponentiating.
///
/// An infinite max splits the mass evenly across the entries equal to it.
/// Input must not contain NaN.
#[inline]
fn softmax_inplace(row: &mut [f64]) {
    if row.is_empty() {
        return;
    }
    let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        let top = row.iter().filter(|x| **x == max).count() as f64;
        for x in row.iter_mut() {
            *x = if *x == max { 1.0 / top } else { 0.0 };
        }
        return;
    }
    let mut sum = 0.0;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }
    if sum > 0.0 {
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
}

/// First index of the largest value.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn mismatch(message: impl Into<String>) -> LoadError {
    LoadError::SchemaMismatch(message.into())
}
