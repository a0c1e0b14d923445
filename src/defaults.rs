//! Type-directed comparison of observed values against declared defaults.
//!
//! The question "does this instance value equal the schema's default" decides
//! whether generated construction code must mention the value at all. The
//! comparator is a pure function: no I/O, no global state. Callers get the
//! verdict plus a structured trace of what was compared and decide for
//! themselves whether to log it.

use ordered_float::OrderedFloat;
use serde_json::Value;

use crate::spec::Schema;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Kind of a JSON value, or its absence. Closed set so every comparator
/// branch matches exhaustively; an error can only come from an unhandled
/// *combination* of kinds, never an unknown kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Absent,
    Null,
    Boolean,
    Number,
    Text,
    Sequence,
    Mapping,
}

/// One comparator run, with both sides rendered canonically. Diagnostic
/// only; the verdict is `is_default`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub property: String,
    pub declared: String,
    pub observed: String,
    pub is_default: bool,
}

/// A comparison the rules cannot decide. Never folded into a boolean: a
/// wrong "is default" would silently drop a property from generated
/// constructor calls.
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("{property}: no comparison rule for {candidate} value against {declared} default")]
    Unhandled {
        property: String,
        declared: ValueKind,
        candidate: ValueKind,
    },
    #[error("{property}: cannot encode compared value: {source}")]
    Encode {
        property: String,
        #[source]
        source: serde_json::Error,
    },
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ValueKind {
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None => Self::Absent,
            Some(Value::Null) => Self::Null,
            Some(Value::Bool(_)) => Self::Boolean,
            Some(Value::Number(_)) => Self::Number,
            Some(Value::String(_)) => Self::Text,
            Some(Value::Array(_)) => Self::Sequence,
            Some(Value::Object(_)) => Self::Mapping,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Text => "text",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Schema {
    /// Does `candidate` equal this schema's declared default?
    ///
    /// Dispatch is on the candidate's kind. Cross-type rules that are
    /// deliberate, not accidents:
    /// - a text candidate matches numeric and boolean defaults by their
    ///   textual form ("5" is the default when the default is 5);
    /// - an absent or null default vacuously matches any numeric or boolean
    ///   candidate;
    /// - composites compare by canonical compact-JSON encoding, byte for
    ///   byte.
    ///
    /// `candidate` is `None` when the property is absent from the instance.
    pub fn is_default(
        &self,
        property: &str,
        candidate: Option<&Value>,
    ) -> Result<Comparison, CompareError> {
        let declared = self.default.as_ref();
        let unhandled = || CompareError::Unhandled {
            property: property.to_string(),
            declared: ValueKind::of(declared),
            candidate: ValueKind::of(candidate),
        };

        let is_default = match candidate {
            Some(Value::String(observed)) => match declared {
                Some(Value::String(default)) => default == observed,
                Some(Value::Number(default)) => default.to_string() == *observed,
                Some(Value::Bool(default)) => default.to_string() == *observed,
                // No default to render: an explicitly set string is not it.
                None | Some(Value::Null) => false,
                Some(Value::Array(_) | Value::Object(_)) => return Err(unhandled()),
            },
            Some(Value::Number(observed)) => match declared {
                Some(Value::Number(default)) => {
                    OrderedFloat(lossy_f64(default)) == OrderedFloat(lossy_f64(observed))
                }
                None | Some(Value::Null) => true,
                Some(_) => return Err(unhandled()),
            },
            Some(Value::Bool(observed)) => match declared {
                Some(Value::Bool(default)) => default == observed,
                Some(Value::Number(default)) => (lossy_f64(default) != 0.0) == *observed,
                None | Some(Value::Null) => true,
                Some(_) => return Err(unhandled()),
            },
            None | Some(Value::Null) => matches!(declared, None | Some(Value::Null)),
            Some(observed @ (Value::Array(_) | Value::Object(_))) => {
                let declared_text = encode(property, declared.unwrap_or(&Value::Null))?;
                let observed_text = encode(property, observed)?;
                declared_text == observed_text
            }
        };

        Ok(Comparison {
            property: property.to_string(),
            declared: canonical(declared),
            observed: canonical(candidate),
            is_default,
        })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Numeric comparison domain. 5 and 5.0 are the same value; u64s beyond
/// 2^53 lose precision on both sides alike.
fn lossy_f64(n: &serde_json::Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

fn encode(property: &str, value: &Value) -> Result<String, CompareError> {
    serde_json::to_string(value).map_err(|source| CompareError::Encode {
        property: property.to_string(),
        source,
    })
}

fn canonical(value: Option<&Value>) -> String {
    match value {
        None => "(absent)".to_string(),
        Some(v) => serde_json::to_string(v).unwrap_or_else(|_| "(unencodable)".to_string()),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_default(default: Value) -> Schema {
        serde_json::from_value(json!({ "default": default })).unwrap()
    }

    fn no_default() -> Schema {
        Schema::default()
    }

    #[test]
    fn integer_default_matches_float_candidate() {
        let s = with_default(json!(5));
        let cmp = s.is_default("id", Some(&json!(5.0))).unwrap();
        assert!(cmp.is_default);
    }

    #[test]
    fn absent_default_vacuously_matches_any_number() {
        let cmp = no_default().is_default("weight", Some(&json!(42))).unwrap();
        assert!(cmp.is_default);
    }

    #[test]
    fn null_default_vacuously_matches_any_boolean() {
        let s = with_default(Value::Null);
        assert!(s.is_default("editable", Some(&json!(true))).unwrap().is_default);
    }

    #[test]
    fn numeric_default_coerces_to_text_for_text_candidates() {
        let s = with_default(json!(5));
        assert!(s.is_default("limit", Some(&json!("5"))).unwrap().is_default);
        assert!(!s.is_default("limit", Some(&json!("6"))).unwrap().is_default);
    }

    #[test]
    fn boolean_default_coerces_to_text_for_text_candidates() {
        let s = with_default(json!(true));
        assert!(s.is_default("shared", Some(&json!("true"))).unwrap().is_default);
    }

    #[test]
    fn text_candidate_with_no_default_is_not_default() {
        let cmp = no_default().is_default("title", Some(&json!("x"))).unwrap();
        assert!(!cmp.is_default);
    }

    #[test]
    fn numeric_default_coerces_to_boolean_by_zeroness() {
        assert!(with_default(json!(0))
            .is_default("hide", Some(&json!(false)))
            .unwrap()
            .is_default);
        assert!(with_default(json!(2))
            .is_default("hide", Some(&json!(true)))
            .unwrap()
            .is_default);
        assert!(!with_default(json!(0))
            .is_default("hide", Some(&json!(true)))
            .unwrap()
            .is_default);
    }

    #[test]
    fn null_candidate_matches_only_null_or_absent_default() {
        assert!(no_default().is_default("repeat", Some(&Value::Null)).unwrap().is_default);
        assert!(no_default().is_default("repeat", None).unwrap().is_default);
        assert!(with_default(Value::Null)
            .is_default("repeat", None)
            .unwrap()
            .is_default);
        assert!(!with_default(json!(5)).is_default("repeat", None).unwrap().is_default);
    }

    #[test]
    fn composites_compare_by_canonical_encoding() {
        let s = with_default(json!([1, 2]));
        assert!(s.is_default("tags", Some(&json!([1, 2]))).unwrap().is_default);
        // order matters: the encoding is compared byte for byte
        assert!(!s.is_default("tags", Some(&json!([2, 1]))).unwrap().is_default);
        assert!(!no_default().is_default("tags", Some(&json!([]))).unwrap().is_default);
    }

    #[test]
    fn mismatched_kinds_error_instead_of_guessing() {
        let err = with_default(json!("x")).is_default("id", Some(&json!(7))).unwrap_err();
        match err {
            CompareError::Unhandled {
                property,
                declared,
                candidate,
            } => {
                assert_eq!(property, "id");
                assert_eq!(declared, ValueKind::Text);
                assert_eq!(candidate, ValueKind::Number);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn composite_default_against_text_candidate_errors() {
        let err = with_default(json!({ "a": 1 }))
            .is_default("options", Some(&json!("a")))
            .unwrap_err();
        assert!(err.to_string().contains("options"));
    }

    #[test]
    fn trace_carries_canonical_renderings() {
        let cmp = with_default(json!(5)).is_default("id", Some(&json!(5.0))).unwrap();
        assert_eq!(cmp.property, "id");
        assert_eq!(cmp.declared, "5");
        assert_eq!(cmp.observed, "5.0");
    }
}
