//! Request schema: the declared fields of a feature request and the
//! constraints each one carries.
//!
//! A schema is data. It normally ships inside the preprocessing metadata
//! next to the model artifact, so training and serving read the same field
//! list. [`FeatureSchema::mortgage`] is the built-in default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Character class accepted by a fixed-length code field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Charset {
    Digits,
    Letters,
    Alphanumeric,
}

impl Charset {
    pub fn accepts(&self, c: char) -> bool {
        match self {
            Charset::Digits => c.is_ascii_digit(),
            Charset::Letters => c.is_ascii_alphabetic(),
            Charset::Alphanumeric => c.is_ascii_alphanumeric(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Charset::Digits => "digits",
            Charset::Letters => "letters",
            Charset::Alphanumeric => "letters or digits",
        }
    }
}

/// Type and constraint of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Whole number within an inclusive range.
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// Finite real number; `min` may be exclusive.
    Float {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default)]
        min_exclusive: bool,
    },
    /// One of an enumerated set of strings.
    Category { values: Vec<String> },
    /// Fixed-length identifier such as a postal or state code.
    Code { length: usize, charset: Charset },
    /// Free-form non-empty string.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
}

impl FieldKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldKind::Integer { .. } | FieldKind::Float { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Integer { .. } => "integer",
            FieldKind::Float { .. } => "number",
            FieldKind::Category { .. } | FieldKind::Code { .. } | FieldKind::Text { .. } => "string",
        }
    }
}

/// A named field with its constraint and optional default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Value used when the field is absent or null. Fields without a
    /// default are required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Ordered list of request fields.
///
/// Field order here is the order of the validated request, regardless of
/// payload key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub fields: Vec<FieldSpec>,
}

fn int(min: Option<i64>, max: Option<i64>) -> FieldKind {
    FieldKind::Integer { min, max }
}

fn category(values: &[&str]) -> FieldKind {
    FieldKind::Category {
        values: values.iter().map(|s| s.to_string()).collect(),
    }
}

fn text() -> FieldKind {
    FieldKind::Text { max_length: None }
}

impl FeatureSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Unconstrained float fields, one per name.
    ///
    /// Used when a model ships without preprocessing metadata and its
    /// inputs are taken verbatim from the model's feature names.
    pub fn numeric<S: AsRef<str>>(names: &[S]) -> Self {
        Self::new(
            names
                .iter()
                .map(|n| {
                    FieldSpec::new(
                        n.as_ref(),
                        FieldKind::Float {
                            min: None,
                            max: None,
                            min_exclusive: false,
                        },
                    )
                })
                .collect(),
        )
    }

    /// The mortgage application schema (loan export layout).
    pub fn mortgage() -> Self {
        use serde_json::json;

        Self::new(vec![
            FieldSpec::new("CreditScore", int(Some(300), Some(850))),
            FieldSpec::new(
                "OrigUPB",
                FieldKind::Float {
                    min: Some(0.0),
                    max: None,
                    min_exclusive: true,
                },
            ),
            FieldSpec::new(
                "OrigInterestRate",
                FieldKind::Float {
                    min: Some(0.0),
                    max: Some(20.0),
                    min_exclusive: true,
                },
            ),
            FieldSpec::new("OrigLoanTerm", int(Some(60), Some(480))),
            FieldSpec::new("DTI", int(Some(0), Some(100))),
            FieldSpec::new("LTV", int(Some(1), Some(150))),
            FieldSpec::new("OCLTV", int(Some(1), Some(150))),
            FieldSpec::new("MIP", int(Some(0), Some(100))),
            FieldSpec::new("Units", int(Some(1), Some(4))).with_default(json!(1)),
            FieldSpec::new("NumBorrowers", int(Some(1), Some(8))),
            FieldSpec::new(
                "PropertyState",
                FieldKind::Code {
                    length: 2,
                    charset: Charset::Letters,
                },
            ),
            FieldSpec::new("PropertyType", category(&["SF", "PU", "CO", "MH"])),
            FieldSpec::new(
                "PostalCode",
                FieldKind::Code {
                    length: 5,
                    charset: Charset::Digits,
                },
            ),
            FieldSpec::new("MSA", text()),
            FieldSpec::new("FirstTimeHomebuyer", category(&["Y", "N", "X"])),
            FieldSpec::new("Occupancy", category(&["O", "S", "I"])),
            FieldSpec::new("LoanPurpose", category(&["P", "C", "N", "U"])),
            FieldSpec::new("Channel", category(&["R", "B", "C", "T"])),
            FieldSpec::new("PPM", category(&["Y", "N", "X"])),
            FieldSpec::new("ProductType", category(&["FRM"])),
            FieldSpec::new("FirstPaymentDate", int(Some(199001), Some(209912))),
            FieldSpec::new("MaturityDate", int(Some(199001), Some(209912))),
            FieldSpec::new("SellerName", text()),
            FieldSpec::new("ServicerName", text()),
            FieldSpec::new("MonthsDelinquent", int(Some(0), None)).with_default(json!(0)),
            FieldSpec::new("MonthsInRepayment", int(Some(0), None)).with_default(json!(0)),
        ])
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check the schema is internally consistent.
    ///
    /// Rejects duplicate names, inverted ranges, empty category lists,
    /// zero-length codes and defaults that violate their own field.
    pub fn check(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err("schema declares no fields".to_string());
        }

        let mut seen = HashSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.name.as_str()) {
                return Err(format!("field '{}' declared twice", spec.name));
            }
            match &spec.kind {
                FieldKind::Integer {
                    min: Some(lo),
                    max: Some(hi),
                } if lo > hi => {
                    return Err(format!("field '{}' has min {} > max {}", spec.name, lo, hi));
                }
                FieldKind::Float {
                    min: Some(lo),
                    max: Some(hi),
                    ..
                } if lo > hi => {
                    return Err(format!("field '{}' has min {} > max {}", spec.name, lo, hi));
                }
                FieldKind::Category { values } if values.is_empty() => {
                    return Err(format!("field '{}' has no allowed values", spec.name));
                }
                FieldKind::Code { length: 0, .. } => {
                    return Err(format!("field '{}' has a zero-length code", spec.name));
                }
                _ => {}
            }
            if let Some(ref default) = spec.default {
                if let Err(v) = crate::validate::check_value(spec, default) {
                    return Err(format!("default for '{}' is invalid: {}", spec.name, v.message));
                }
            }
        }
        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::mortgage()
    }
}
