//! # LendScore Core
//!
//! Scoring pipeline for pre-trained binary loan-default classifiers.
//!
//! A request moves through four stages:
//!
//! - [`validate`](mod@validate): raw JSON payload → [`FeatureRequest`], collecting every
//!   violation against the [`FeatureSchema`]
//! - [`assemble`]: [`FeatureRequest`] → ordered [`FeatureVector`] using the
//!   encoders recorded at training time
//! - [`inference`]: [`FeatureVector`] → [`PredictionResult`]
//! - [`service`]: the composition of the above against a [`ModelSlot`]
//!
//! The model and its preprocessing metadata are loaded once at startup by a
//! [`ModelLoader`] and shared read-only afterwards.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lendscore_core::{ModelLoader, ModelSlot, PredictionService};
//! use serde_json::json;
//!
//! let slot = Arc::new(ModelSlot::new());
//! slot.initialize(&ModelLoader::new("model.json").with_metadata("preprocessing.json"))
//!     .expect("model should load");
//!
//! let service = PredictionService::new(slot, 100);
//! let result = service.predict(&json!({"age": 30, "salary": 60000}));
//! ```

pub mod assemble;
pub mod error;
pub mod inference;
pub mod loader;
pub mod model;
pub mod schema;
pub mod service;
pub mod suggest;
pub mod validate;
pub mod value;

pub use assemble::{Encoder, FeatureAssembler, FeatureVector, Preprocessing, METADATA_VERSION};
pub use error::{
    AssembleError, InferenceError, LoadError, LoadResult, ServeError, UnknownCategory,
    ValidationError, Violation, ViolationKind,
};
pub use inference::{check_batch_size, predict, predict_batch, PredictionResult, RiskBand};
pub use loader::{LoadedModel, ModelHandle, ModelLoader, ModelSlot, ModelStatus};
pub use model::{Classifier, LinearClassifier, ModelArtifact, Scored};
pub use schema::{Charset, FeatureSchema, FieldKind, FieldSpec};
pub use service::{
    HealthReport, HealthStatus, ModelInfo, PredictionService, DEFAULT_MAX_BATCH_SIZE,
};
pub use validate::validate;
pub use value::{FeatureRequest, FieldValue};
