//! Prediction service: the request-scoped pipeline from raw payload to
//! result, plus health and introspection.
//!
//! ```text
//! payload ─▶ validate ─▶ assemble ─▶ predict ─▶ PredictionResult
//! ```
//!
//! All per-request values live on the stack of the calling handler. The
//! only shared state is the write-once [`ModelSlot`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{InferenceError, ServeError, ValidationError};
use crate::inference::{self, PredictionResult};
use crate::loader::{ModelHandle, ModelSlot, ModelStatus};
use crate::validate::validate;
use crate::FeatureVector;

/// Default upper bound on requests per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Log failures that point at the deployed artifacts or unscorable input.
fn log_inference_failure(e: InferenceError) -> InferenceError {
    if matches!(
        e,
        InferenceError::DimensionMismatch { .. } | InferenceError::NonFiniteScore
    ) {
        error!("Inference failed: {}", e);
    }
    e
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Liveness summary. Always producible, even without a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub model_loaded: bool,
    pub preprocessing_loaded: bool,
}

/// Read-only description of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub feature_count: usize,
    pub classes: Vec<i64>,
    pub feature_names: Vec<String>,
    pub probability: bool,
    pub categorical_encoders: usize,
    pub schema_fields: usize,
    pub metadata_version: String,
    pub model_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_path: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// Validates, assembles and predicts against the process's model slot.
#[derive(Debug, Clone)]
pub struct PredictionService {
    slot: Arc<ModelSlot>,
    max_batch_size: usize,
}

impl PredictionService {
    pub fn new(slot: Arc<ModelSlot>, max_batch_size: usize) -> Self {
        Self {
            slot,
            max_batch_size,
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn status(&self) -> ModelStatus {
        self.slot.status()
    }

    fn handle(&self) -> Result<ModelHandle, InferenceError> {
        self.slot.handle().ok_or(InferenceError::ModelNotLoaded)
    }

    fn prepare(handle: &ModelHandle, payload: &Value) -> Result<FeatureVector, ValidationError> {
        let request = validate(handle.schema(), payload)?;
        Ok(handle.assembler().assemble(&request)?)
    }

    /// Predict one raw payload.
    pub fn predict(&self, payload: &Value) -> Result<PredictionResult, ServeError> {
        let handle = self.handle()?;
        let vector = Self::prepare(&handle, payload)?;
        let result = inference::predict(&vector, Some(handle.classifier()))
            .map_err(log_inference_failure)?;
        info!(
            prediction = result.prediction,
            probability = ?result.probability,
            "Prediction"
        );
        Ok(result)
    }

    /// Predict a batch of raw payloads, preserving order.
    ///
    /// Oversized batches are rejected before any validation. Violations
    /// from every invalid element are reported together, tagged with the
    /// element index, and no element is predicted.
    pub fn predict_batch(&self, payloads: &[Value]) -> Result<Vec<PredictionResult>, ServeError> {
        let handle = self.handle()?;
        inference::check_batch_size(payloads.len(), self.max_batch_size)?;

        let mut vectors = Vec::with_capacity(payloads.len());
        let mut violations = Vec::new();
        for (index, payload) in payloads.iter().enumerate() {
            match Self::prepare(&handle, payload) {
                Ok(v) => vectors.push(v),
                Err(e) => violations.extend(e.at(index).violations),
            }
        }
        if !violations.is_empty() {
            return Err(ValidationError::new(violations).into());
        }

        let results =
            inference::predict_batch(&vectors, Some(handle.classifier()), self.max_batch_size)
                .map_err(log_inference_failure)?;
        info!(size = results.len(), "Batch prediction");
        Ok(results)
    }

    pub fn health(&self) -> HealthReport {
        match self.slot.handle() {
            Some(handle) => HealthReport {
                status: HealthStatus::Healthy,
                model_loaded: true,
                preprocessing_loaded: handle.metadata_path().is_some(),
            },
            None => HealthReport {
                status: HealthStatus::Degraded,
                model_loaded: false,
                preprocessing_loaded: false,
            },
        }
    }

    pub fn model_info(&self) -> Result<ModelInfo, InferenceError> {
        let handle = self.handle()?;
        let classifier = handle.classifier();
        let assembler = handle.assembler();
        Ok(ModelInfo {
            model_type: classifier.model_type().to_string(),
            feature_count: classifier.n_features(),
            classes: classifier.classes().to_vec(),
            feature_names: assembler.feature_names().to_vec(),
            probability: classifier.has_probabilities(),
            categorical_encoders: assembler.encoders().len(),
            schema_fields: assembler.schema().len(),
            metadata_version: assembler.version().to_string(),
            model_path: handle.model_path().display().to_string(),
            metadata_path: handle.metadata_path().map(|p| p.display().to_string()),
            loaded_at: handle.loaded_at(),
        })
    }
}
