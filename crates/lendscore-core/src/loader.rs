//! Model loading and the process-wide model slot.
//!
//! Loading happens exactly once, before the service accepts traffic. The
//! outcome is written into a [`ModelSlot`]: either a ready handle or the
//! failure that prevented it. Nothing retries a failed load.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{error, info};

use crate::assemble::{FeatureAssembler, Preprocessing};
use crate::error::{LoadError, LoadResult};
use crate::model::{Classifier, LinearClassifier, ModelArtifact};
use crate::schema::FeatureSchema;

/// Shared, immutable handle to a loaded model.
pub type ModelHandle = Arc<LoadedModel>;

/// A classifier together with the assembler that feeds it.
pub struct LoadedModel {
    classifier: Box<dyn Classifier>,
    assembler: FeatureAssembler,
    model_path: PathBuf,
    metadata_path: Option<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    /// Pair a classifier with its assembler, checking they agree on the
    /// feature vector layout.
    pub fn new(
        classifier: Box<dyn Classifier>,
        assembler: FeatureAssembler,
        model_path: PathBuf,
        metadata_path: Option<PathBuf>,
    ) -> LoadResult<Self> {
        if assembler.dimension() != classifier.n_features() {
            return Err(LoadError::SchemaMismatch(format!(
                "metadata produces {} features but the model expects {}",
                assembler.dimension(),
                classifier.n_features()
            )));
        }
        let recorded = classifier.feature_names();
        if !recorded.is_empty() && recorded != assembler.feature_names() {
            return Err(LoadError::SchemaMismatch(
                "feature order in metadata differs from the order recorded in the model".into(),
            ));
        }

        Ok(Self {
            classifier,
            assembler,
            model_path,
            metadata_path,
            loaded_at: Utc::now(),
        })
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn assembler(&self) -> &FeatureAssembler {
        &self.assembler
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.assembler.schema()
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn metadata_path(&self) -> Option<&Path> {
        self.metadata_path.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model_type", &self.classifier.model_type())
            .field("n_features", &self.classifier.n_features())
            .field("model_path", &self.model_path)
            .field("metadata_path", &self.metadata_path)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

/// Read a model artifact from disk.
pub fn load_artifact(path: &Path) -> LoadResult<ModelArtifact> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|e| LoadError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read preprocessing metadata (JSON or YAML, by extension) from disk.
pub fn load_preprocessing(path: &Path) -> LoadResult<Preprocessing> {
    let content = read_file(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let parsed = match extension.as_str() {
        "yaml" | "yml" => Preprocessing::from_yaml(&content),
        "json" => Preprocessing::from_json(&content),
        _ => Preprocessing::from_json(&content).or_else(|_| Preprocessing::from_yaml(&content)),
    };

    parsed.map_err(|reason| LoadError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason,
    })
}

fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::ArtifactNotFound {
            path: path.to_path_buf(),
        },
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Loads a model artifact and its optional preprocessing metadata.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    model_path: PathBuf,
    metadata_path: Option<PathBuf>,
}

impl ModelLoader {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            metadata_path: None,
        }
    }

    pub fn with_metadata(mut self, metadata_path: impl Into<PathBuf>) -> Self {
        self.metadata_path = Some(metadata_path.into());
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn metadata_path(&self) -> Option<&Path> {
        self.metadata_path.as_deref()
    }

    /// Load and cross-check both artifacts.
    ///
    /// Without metadata the model's recorded feature names become an
    /// unconstrained numeric schema.
    pub fn load(&self) -> LoadResult<LoadedModel> {
        let model_path = resolve(&self.model_path);
        let artifact = load_artifact(&model_path)?;

        let (preprocessing, metadata_path) = match &self.metadata_path {
            Some(path) => {
                let path = resolve(path);
                (load_preprocessing(&path)?, Some(path))
            }
            None => {
                if artifact.feature_names.is_empty() {
                    return Err(LoadError::SchemaMismatch(
                        "model records no feature names and no preprocessing metadata was given"
                            .into(),
                    ));
                }
                (Preprocessing::numeric(artifact.feature_names.clone()), None)
            }
        };

        let classifier = LinearClassifier::from_artifact(artifact)?;
        let assembler = FeatureAssembler::new(&preprocessing)?;
        LoadedModel::new(Box::new(classifier), assembler, model_path, metadata_path)
    }
}

/// Canonical path when it exists, the given path otherwise.
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Point-in-time view of the model slot, safe to serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum SlotState {
    Ready(ModelHandle),
    Failed { path: PathBuf, error: String },
}

/// Write-once holder of the process's model.
///
/// Empty until [`initialize`](Self::initialize) runs; afterwards it holds
/// either the handle or the load failure for the rest of the process.
#[derive(Debug, Default)]
pub struct ModelSlot {
    state: OnceLock<SlotState>,
}

impl ModelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot already holding `model`.
    pub fn ready(model: LoadedModel) -> Self {
        let slot = Self::new();
        let _ = slot.state.set(SlotState::Ready(Arc::new(model)));
        slot
    }

    /// Run the one-shot load and record its outcome.
    ///
    /// A second call returns [`LoadError::AlreadyInitialized`] and leaves
    /// the recorded outcome untouched.
    pub fn initialize(&self, loader: &ModelLoader) -> LoadResult<ModelHandle> {
        if self.state.get().is_some() {
            return Err(LoadError::AlreadyInitialized);
        }

        let (state, result) = match loader.load() {
            Ok(model) => {
                let handle = Arc::new(model);
                info!(
                    model_type = handle.classifier().model_type(),
                    features = handle.classifier().n_features(),
                    path = %handle.model_path().display(),
                    "Model loaded"
                );
                (SlotState::Ready(handle.clone()), Ok(handle))
            }
            Err(e) => {
                error!(path = %loader.model_path().display(), "Model load failed: {}", e);
                (
                    SlotState::Failed {
                        path: loader.model_path().to_path_buf(),
                        error: e.to_string(),
                    },
                    Err(e),
                )
            }
        };

        self.state
            .set(state)
            .map_err(|_| LoadError::AlreadyInitialized)?;
        result
    }

    /// The model handle, if loading succeeded.
    pub fn handle(&self) -> Option<ModelHandle> {
        match self.state.get() {
            Some(SlotState::Ready(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state.get(), Some(SlotState::Ready(_)))
    }

    pub fn status(&self) -> ModelStatus {
        match self.state.get() {
            Some(SlotState::Ready(handle)) => ModelStatus {
                loaded: true,
                path: Some(handle.model_path().display().to_string()),
                error: None,
                loaded_at: Some(handle.loaded_at()),
            },
            Some(SlotState::Failed { path, error }) => ModelStatus {
                loaded: false,
                path: Some(path.display().to_string()),
                error: Some(error.clone()),
                loaded_at: None,
            },
            None => ModelStatus {
                loaded: false,
                path: None,
                error: Some("model load not attempted".into()),
                loaded_at: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const MODEL: &str = r#"{
        "model_type": "LogisticRegression",
        "classes": [0, 1],
        "feature_names": ["age", "salary"],
        "coefficients": [[0.05, 0.00003]],
        "intercept": [-3.1]
    }"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_without_metadata_uses_model_feature_names() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "model.json", MODEL);
        let model = ModelLoader::new(&path).load().unwrap();
        assert_eq!(model.assembler().feature_names(), &["age", "salary"]);
        assert!(model.metadata_path().is_none());
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = ModelLoader::new(dir.path().join("absent.json"))
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::ArtifactNotFound { .. }));
    }

    #[test]
    fn garbage_artifact_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "model.json", "\u{80}pickle\x00");
        let err = ModelLoader::new(&path).load().unwrap_err();
        assert!(matches!(err, LoadError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn metadata_dimension_must_match_model() {
        let dir = TempDir::new().unwrap();
        let model = write(&dir, "model.json", MODEL);
        let meta = write(
            &dir,
            "prep.yaml",
            "schema:\n  fields:\n    - {name: age, type: float}\nfeature_names: [age]\n",
        );
        let err = ModelLoader::new(&model)
            .with_metadata(&meta)
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch(_)));
    }

    #[test]
    fn metadata_order_must_match_model() {
        let dir = TempDir::new().unwrap();
        let model = write(&dir, "model.json", MODEL);
        let meta = write(
            &dir,
            "prep.yaml",
            "schema:\n  fields:\n    - {name: age, type: float}\n    - {name: salary, type: float}\nfeature_names: [salary, age]\n",
        );
        let err = ModelLoader::new(&model)
            .with_metadata(&meta)
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("feature order"));
    }

    #[test]
    fn empty_slot_reports_not_attempted() {
        let slot = ModelSlot::new();
        assert!(slot.handle().is_none());
        let status = slot.status();
        assert!(!status.loaded);
        assert!(status.path.is_none());
        assert!(status.error.is_some());
    }

    #[test]
    fn failed_load_recorded_once() {
        let dir = TempDir::new().unwrap();
        let loader = ModelLoader::new(dir.path().join("absent.json"));
        let slot = ModelSlot::new();
        assert!(slot.initialize(&loader).is_err());
        let status = slot.status();
        assert!(!status.loaded);
        assert!(status.error.unwrap().contains("not found"));

        let again = slot.initialize(&loader).unwrap_err();
        assert!(matches!(again, LoadError::AlreadyInitialized));
    }

    #[test]
    fn successful_load_sets_handle() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "model.json", MODEL);
        let slot = ModelSlot::new();
        let handle = slot.initialize(&ModelLoader::new(&path)).unwrap();
        assert!(slot.is_loaded());
        assert!(Arc::ptr_eq(&handle, &slot.handle().unwrap()));
        let status = slot.status();
        assert!(status.loaded);
        assert!(status.loaded_at.is_some());
    }
}
