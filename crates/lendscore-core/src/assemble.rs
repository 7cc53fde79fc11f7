//! Feature assembly: validated request → ordered numeric feature vector.
//!
//! The column order comes from the preprocessing metadata shipped with the
//! model (`feature_names`), never from payload or map iteration order.
//! Categorical fields are encoded with the tables recorded at training time:
//!
//! - `label`: value → position in `classes`
//! - `one_hot`: one `{field}_{category}` column per category, the first
//!   category dropped when `drop_first` is set
//!
//! A value missing from a trained table is rejected with
//! [`AssembleError::UnknownCategories`]; it never falls back to a default
//! code.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{AssembleError, LoadError, LoadResult, UnknownCategory};
use crate::schema::FeatureSchema;
use crate::suggest::suggest;
use crate::value::FeatureRequest;

/// Current preprocessing metadata format version.
pub const METADATA_VERSION: &str = "1";

fn default_version() -> String {
    METADATA_VERSION.to_string()
}

fn default_drop_first() -> bool {
    true
}

/// Encoding applied to one categorical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Encoder {
    /// Ordinal code: the value's position in `classes`.
    Label { classes: Vec<String> },
    /// Indicator columns named `{field}_{category}`.
    OneHot {
        categories: Vec<String>,
        #[serde(default = "default_drop_first")]
        drop_first: bool,
    },
}

impl Encoder {
    /// Every value the encoder was trained on, including a dropped first
    /// one-hot level.
    pub fn categories(&self) -> &[String] {
        match self {
            Encoder::Label { classes } => classes,
            Encoder::OneHot { categories, .. } => categories,
        }
    }
}

/// Preprocessing metadata written by the training job next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    #[serde(default = "default_version")]
    pub version: String,

    /// Request schema. The mortgage schema applies when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<FeatureSchema>,

    /// Model input columns, in training order.
    pub feature_names: Vec<String>,

    /// Categorical encoders keyed by request field.
    #[serde(default)]
    pub encoders: IndexMap<String, Encoder>,
}

impl Preprocessing {
    /// Metadata for a purely numeric model whose inputs are its feature
    /// names.
    pub fn numeric(feature_names: Vec<String>) -> Self {
        Self {
            version: default_version(),
            schema: Some(FeatureSchema::numeric(feature_names.as_slice())),
            feature_names,
            encoders: IndexMap::new(),
        }
    }

    /// Parse metadata from JSON.
    pub fn from_json(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    /// Parse metadata from YAML.
    pub fn from_yaml(content: &str) -> Result<Self, String> {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }
}

/// Ordered numeric input for the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How one output column is produced.
#[derive(Debug, Clone)]
enum Column {
    Numeric { field: String },
    Label { field: String },
    Indicator { field: String, category: String },
}

/// Compiled encoding plan for one schema and metadata pair.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    schema: FeatureSchema,
    feature_names: Vec<String>,
    columns: Vec<Column>,
    /// field → (category → code), for every encoded field.
    tables: IndexMap<String, HashMap<String, usize>>,
    encoders: IndexMap<String, Encoder>,
    version: String,
}

impl FeatureAssembler {
    /// Compile the encoding plan.
    ///
    /// Fails with [`LoadError::SchemaMismatch`] when a feature name cannot
    /// be produced from the schema or an encoder refers to a field the
    /// schema does not declare.
    pub fn new(preprocessing: &Preprocessing) -> LoadResult<Self> {
        let schema = preprocessing.schema.clone().unwrap_or_default();
        schema.check().map_err(LoadError::SchemaMismatch)?;

        if preprocessing.feature_names.is_empty() {
            return Err(mismatch("metadata declares no feature names"));
        }

        let mut tables = IndexMap::new();
        for (field, encoder) in &preprocessing.encoders {
            let spec = schema.field(field).ok_or_else(|| {
                mismatch(format!("encoder for '{}' has no matching schema field", field))
            })?;
            if spec.kind.is_numeric() {
                return Err(mismatch(format!(
                    "encoder for '{}' targets a numeric field",
                    field
                )));
            }
            let categories = encoder.categories();
            if categories.is_empty() {
                return Err(mismatch(format!("encoder for '{}' has no categories", field)));
            }
            let mut table = HashMap::with_capacity(categories.len());
            for (code, category) in categories.iter().enumerate() {
                if table.insert(category.clone(), code).is_some() {
                    return Err(mismatch(format!(
                        "encoder for '{}' lists '{}' twice",
                        field, category
                    )));
                }
            }
            tables.insert(field.clone(), table);
        }

        let indicators = indicator_columns(&preprocessing.encoders);

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(preprocessing.feature_names.len());
        for name in &preprocessing.feature_names {
            if !seen.insert(name.as_str()) {
                return Err(mismatch(format!("feature '{}' listed twice", name)));
            }

            let column = match preprocessing.encoders.get(name) {
                Some(Encoder::Label { .. }) => Column::Label {
                    field: name.clone(),
                },
                Some(Encoder::OneHot { .. }) => {
                    return Err(mismatch(format!(
                        "one-hot field '{}' cannot be a feature column",
                        name
                    )))
                }
                None => match schema.field(name) {
                    Some(spec) if spec.kind.is_numeric() => Column::Numeric {
                        field: name.clone(),
                    },
                    Some(_) => {
                        return Err(mismatch(format!(
                            "feature '{}' is a string field without an encoder",
                            name
                        )))
                    }
                    None => match indicators.get(name.as_str()) {
                        Some((field, category)) => Column::Indicator {
                            field: field.to_string(),
                            category: category.to_string(),
                        },
                        None => {
                            return Err(mismatch(format!(
                                "feature '{}' cannot be derived from the request schema",
                                name
                            )))
                        }
                    },
                },
            };
            columns.push(column);
        }

        Ok(Self {
            schema,
            feature_names: preprocessing.feature_names.clone(),
            columns,
            tables,
            encoders: preprocessing.encoders.clone(),
            version: preprocessing.version.clone(),
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Length of every vector this assembler produces.
    pub fn dimension(&self) -> usize {
        self.columns.len()
    }

    pub fn encoders(&self) -> &IndexMap<String, Encoder> {
        &self.encoders
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Map a validated request to its feature vector.
    pub fn assemble(&self, request: &FeatureRequest) -> Result<FeatureVector, AssembleError> {
        let mut unknown = Vec::new();
        for (field, table) in &self.tables {
            let Some(value) = request.get(field) else {
                continue;
            };
            let text = value.to_string();
            if !table.contains_key(&text) {
                let categories = self.encoders[field].categories();
                unknown.push(UnknownCategory {
                    field: field.clone(),
                    suggestion: suggest(&text, categories),
                    value: text,
                });
            }
        }
        if !unknown.is_empty() {
            return Err(AssembleError::UnknownCategories(unknown));
        }

        let values = self
            .columns
            .iter()
            .map(|column| match column {
                Column::Numeric { field } => {
                    request.get(field).and_then(|v| v.as_f64()).unwrap_or(0.0)
                }
                Column::Label { field } => request
                    .get(field)
                    .and_then(|v| self.tables[field.as_str()].get(&v.to_string()))
                    .map(|code| *code as f64)
                    .unwrap_or(0.0),
                Column::Indicator { field, category } => {
                    match request.get(field).and_then(|v| v.as_str()) {
                        Some(v) if v == category => 1.0,
                        _ => 0.0,
                    }
                }
            })
            .collect();

        Ok(FeatureVector(values))
    }
}

/// Indicator column name → (field, category) for every one-hot encoder.
fn indicator_columns(encoders: &IndexMap<String, Encoder>) -> HashMap<String, (&str, &str)> {
    let mut out = HashMap::new();
    for (field, encoder) in encoders {
        if let Encoder::OneHot {
            categories,
            drop_first,
        } = encoder
        {
            let skip = usize::from(*drop_first);
            for category in categories.iter().skip(skip) {
                out.insert(
                    format!("{}_{}", field, category),
                    (field.as_str(), category.as_str()),
                );
            }
        }
    }
    out
}

fn mismatch(message: impl Into<String>) -> LoadError {
    LoadError::SchemaMismatch(message.into())
}
