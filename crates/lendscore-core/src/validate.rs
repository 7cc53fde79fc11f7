//! Request validation against a [`FeatureSchema`].
//!
//! Every field is checked, and every violation is collected before the
//! request is rejected, so a caller can fix all problems in one round trip.
//! Unknown payload keys are ignored.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ValidationError, Violation, ViolationKind};
use crate::schema::{FeatureSchema, FieldKind, FieldSpec};
use crate::suggest::suggest;
use crate::value::{FeatureRequest, FieldValue};

/// Internal validator state.
struct Validator<'a> {
    schema: &'a FeatureSchema,
    violations: Vec<Violation>,
}

impl<'a> Validator<'a> {
    fn new(schema: &'a FeatureSchema) -> Self {
        Self {
            schema,
            violations: Vec::new(),
        }
    }

    fn emit(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    fn run(mut self, payload: &Value) -> Result<FeatureRequest, ValidationError> {
        let object = match payload.as_object() {
            Some(obj) => obj,
            None => {
                return Err(ValidationError::new(vec![Violation::new(
                    "body",
                    ViolationKind::InvalidType,
                    format!("expected a JSON object, got {}", json_type(payload)),
                )]))
            }
        };

        let schema = self.schema;
        let mut values = IndexMap::with_capacity(schema.len());
        for spec in &schema.fields {
            let raw = match object.get(&spec.name) {
                Some(Value::Null) | None => match spec.default {
                    Some(ref default) => default,
                    None => {
                        self.emit(Violation::new(
                            &spec.name,
                            ViolationKind::Missing,
                            "field required",
                        ));
                        continue;
                    }
                },
                Some(v) => v,
            };

            match check_value(spec, raw) {
                Ok(value) => {
                    values.insert(spec.name.clone(), value);
                }
                Err(v) => self.emit(v),
            }
        }

        if self.violations.is_empty() {
            Ok(FeatureRequest::from_values(values))
        } else {
            Err(ValidationError::new(self.violations))
        }
    }
}

/// Validate a raw JSON payload into a [`FeatureRequest`].
pub fn validate(schema: &FeatureSchema, payload: &Value) -> Result<FeatureRequest, ValidationError> {
    Validator::new(schema).run(payload)
}

/// Check and coerce one raw value against its field specification.
pub(crate) fn check_value(spec: &FieldSpec, raw: &Value) -> Result<FieldValue, Violation> {
    let name = spec.name.as_str();
    match &spec.kind {
        FieldKind::Integer { min, max } => {
            let i = coerce_int(raw).ok_or_else(|| type_error(name, "an integer", raw))?;
            if let Some(lo) = min {
                if i < *lo {
                    return Err(out_of_range(name, format!("must be >= {}, got {}", lo, i)));
                }
            }
            if let Some(hi) = max {
                if i > *hi {
                    return Err(out_of_range(name, format!("must be <= {}, got {}", hi, i)));
                }
            }
            Ok(FieldValue::Int(i))
        }

        FieldKind::Float {
            min,
            max,
            min_exclusive,
        } => {
            let x = coerce_float(raw).ok_or_else(|| type_error(name, "a number", raw))?;
            if let Some(lo) = min {
                if *min_exclusive && x <= *lo {
                    return Err(out_of_range(name, format!("must be > {}, got {}", lo, x)));
                }
                if !*min_exclusive && x < *lo {
                    return Err(out_of_range(name, format!("must be >= {}, got {}", lo, x)));
                }
            }
            if let Some(hi) = max {
                if x > *hi {
                    return Err(out_of_range(name, format!("must be <= {}, got {}", hi, x)));
                }
            }
            Ok(FieldValue::Float(x))
        }

        FieldKind::Category { values } => {
            let s = raw
                .as_str()
                .ok_or_else(|| type_error(name, "a string", raw))?
                .trim();
            if values.iter().any(|v| v == s) {
                return Ok(FieldValue::Text(s.to_string()));
            }
            let mut message = format!("'{}' is not one of [{}]", s, values.join(", "));
            if let Some(hint) = suggest(s, values.as_slice()) {
                message.push_str(&format!("; did you mean '{}'?", hint));
            }
            Err(Violation::new(name, ViolationKind::NotAllowed, message))
        }

        FieldKind::Code { length, charset } => {
            let s = raw
                .as_str()
                .ok_or_else(|| type_error(name, "a string", raw))?
                .trim();
            let count = s.chars().count();
            if count != *length || !s.chars().all(|c| charset.accepts(c)) {
                return Err(Violation::new(
                    name,
                    ViolationKind::InvalidFormat,
                    format!("must be exactly {} {}, got '{}'", length, charset.describe(), s),
                ));
            }
            Ok(FieldValue::Text(s.to_string()))
        }

        FieldKind::Text { max_length } => {
            let s = raw
                .as_str()
                .ok_or_else(|| type_error(name, "a string", raw))?
                .trim();
            if s.is_empty() {
                return Err(Violation::new(
                    name,
                    ViolationKind::InvalidFormat,
                    "must not be empty",
                ));
            }
            if let Some(max) = max_length {
                if s.chars().count() > *max {
                    return Err(Violation::new(
                        name,
                        ViolationKind::InvalidFormat,
                        format!("must be at most {} characters", max),
                    ));
                }
            }
            Ok(FieldValue::Text(s.to_string()))
        }
    }
}

/// Integers, integral floats and numeric strings coerce to `i64`.
fn coerce_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Numbers and numeric strings coerce to a finite `f64`.
fn coerce_float(raw: &Value) -> Option<f64> {
    let x = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

fn type_error(field: &str, expected: &str, raw: &Value) -> Violation {
    Violation::new(
        field,
        ViolationKind::InvalidType,
        format!("expected {}, got {}", expected, json_type(raw)),
    )
}

fn out_of_range(field: &str, message: String) -> Violation {
    Violation::new(field, ViolationKind::OutOfRange, message)
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn age_salary() -> FeatureSchema {
        FeatureSchema::new(vec![
            FieldSpec::new(
                "age",
                FieldKind::Float {
                    min: Some(0.0),
                    max: Some(120.0),
                    min_exclusive: false,
                },
            ),
            FieldSpec::new(
                "salary",
                FieldKind::Float {
                    min: Some(0.0),
                    max: None,
                    min_exclusive: false,
                },
            ),
        ])
    }

    fn mortgage_payload() -> Value {
        json!({
            "CreditScore": 750,
            "OrigUPB": 250000,
            "OrigInterestRate": 3.75,
            "OrigLoanTerm": 360,
            "DTI": 28,
            "LTV": 80,
            "OCLTV": 80,
            "MIP": 0,
            "NumBorrowers": 2,
            "PropertyState": "CA",
            "PropertyType": "SF",
            "PostalCode": "90210",
            "MSA": "31080",
            "FirstTimeHomebuyer": "N",
            "Occupancy": "O",
            "LoanPurpose": "P",
            "Channel": "R",
            "PPM": "N",
            "ProductType": "FRM",
            "FirstPaymentDate": 202301,
            "MaturityDate": 205212,
            "SellerName": "WELLS",
            "ServicerName": "WELLS"
        })
    }

    #[test]
    fn valid_payload_passes() {
        let req = validate(&age_salary(), &json!({"age": 30, "salary": 60000})).unwrap();
        assert_eq!(req.get("age"), Some(&FieldValue::Float(30.0)));
        assert_eq!(req.get("salary"), Some(&FieldValue::Float(60000.0)));
    }

    #[test]
    fn negative_age_cites_age() {
        let err = validate(&age_salary(), &json!({"age": -1, "salary": 60000})).unwrap_err();
        assert_eq!(err.fields(), vec!["age"]);
        assert_eq!(err.violations[0].kind, ViolationKind::OutOfRange);
    }

    #[test]
    fn two_violations_both_reported() {
        let err = validate(&age_salary(), &json!({"age": -1, "salary": "lots"})).unwrap_err();
        assert_eq!(err.fields(), vec!["age", "salary"]);
        assert_eq!(err.violations[1].kind, ViolationKind::InvalidType);
    }

    #[test]
    fn field_order_follows_schema() {
        let req = validate(&age_salary(), &json!({"salary": 1, "age": 2})).unwrap();
        let names: Vec<&str> = req.names().collect();
        assert_eq!(names, vec!["age", "salary"]);
    }

    #[test]
    fn numeric_strings_coerce() {
        let req = validate(&age_salary(), &json!({"age": " 41 ", "salary": "55000.5"})).unwrap();
        assert_eq!(req.get("age"), Some(&FieldValue::Float(41.0)));
        assert_eq!(req.get("salary"), Some(&FieldValue::Float(55000.5)));
    }

    #[test]
    fn non_object_payload_rejected() {
        let err = validate(&age_salary(), &json!([1, 2])).unwrap_err();
        assert_eq!(err.fields(), vec!["body"]);
    }

    #[test]
    fn missing_field_reported() {
        let err = validate(&age_salary(), &json!({"age": 30})).unwrap_err();
        assert_eq!(err.violations[0].kind, ViolationKind::Missing);
        assert_eq!(err.fields(), vec!["salary"]);
    }

    #[test]
    fn null_counts_as_missing() {
        let err = validate(&age_salary(), &json!({"age": 30, "salary": null})).unwrap_err();
        assert_eq!(err.violations[0].kind, ViolationKind::Missing);
    }

    #[test]
    fn mortgage_defaults_applied() {
        let req = validate(&FeatureSchema::mortgage(), &mortgage_payload()).unwrap();
        assert_eq!(req.len(), 26);
        assert_eq!(req.get("Units"), Some(&FieldValue::Int(1)));
        assert_eq!(req.get("MonthsDelinquent"), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn integral_float_accepted_for_integer() {
        let mut payload = mortgage_payload();
        payload["CreditScore"] = json!(700.0);
        let req = validate(&FeatureSchema::mortgage(), &payload).unwrap();
        assert_eq!(req.get("CreditScore"), Some(&FieldValue::Int(700)));
    }

    #[test]
    fn fractional_float_rejected_for_integer() {
        let mut payload = mortgage_payload();
        payload["CreditScore"] = json!(700.5);
        let err = validate(&FeatureSchema::mortgage(), &payload).unwrap_err();
        assert_eq!(err.violations[0].kind, ViolationKind::InvalidType);
    }

    #[test]
    fn exclusive_minimum_enforced() {
        let mut payload = mortgage_payload();
        payload["OrigUPB"] = json!(0);
        let err = validate(&FeatureSchema::mortgage(), &payload).unwrap_err();
        assert_eq!(err.fields(), vec!["OrigUPB"]);
        assert!(err.violations[0].message.contains("> 0"));
    }

    #[test]
    fn enum_violation_suggests_match() {
        let mut payload = mortgage_payload();
        payload["PropertyType"] = json!("sf");
        let err = validate(&FeatureSchema::mortgage(), &payload).unwrap_err();
        assert_eq!(err.violations[0].kind, ViolationKind::NotAllowed);
        assert!(err.violations[0].message.contains("did you mean 'SF'"));
    }

    #[test]
    fn postal_code_format_checked() {
        let mut payload = mortgage_payload();
        payload["PostalCode"] = json!("9021A");
        payload["PropertyState"] = json!("C1");
        let err = validate(&FeatureSchema::mortgage(), &payload).unwrap_err();
        assert_eq!(err.fields(), vec!["PropertyState", "PostalCode"]);
        assert!(err
            .violations
            .iter()
            .all(|v| v.kind == ViolationKind::InvalidFormat));
    }

    #[test]
    fn postal_code_as_number_rejected() {
        let mut payload = mortgage_payload();
        payload["PostalCode"] = json!(2139);
        let err = validate(&FeatureSchema::mortgage(), &payload).unwrap_err();
        assert_eq!(err.violations[0].kind, ViolationKind::InvalidType);
    }

    #[test]
    fn categorical_values_trimmed() {
        let mut payload = mortgage_payload();
        payload["Channel"] = json!("R ");
        let req = validate(&FeatureSchema::mortgage(), &payload).unwrap();
        assert_eq!(req.get("Channel"), Some(&FieldValue::Text("R".into())));
    }

    #[test]
    fn empty_text_rejected() {
        let mut payload = mortgage_payload();
        payload["SellerName"] = json!("   ");
        let err = validate(&FeatureSchema::mortgage(), &payload).unwrap_err();
        assert_eq!(err.fields(), vec!["SellerName"]);
    }

    #[test]
    fn unknown_keys_ignored() {
        let req = validate(
            &age_salary(),
            &json!({"age": 30, "salary": 60000, "nickname": "bob"}),
        )
        .unwrap();
        assert!(req.get("nickname").is_none());
    }
}
