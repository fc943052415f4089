//! Validation of incoming request params.
//!
//! A service deserializes params through [`from_value`] which reports
//! unknown fields by name and points at the property that failed to parse.
//! The errors convert into LSPS0 compliant `-32602 Invalid params` data.

use crate::json_rpc::ErrorData;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ParamValidationError {
    Custom { message: String },
    Unrecognized { unrecognized: Vec<String> },
    InvalidParam { property: String, message: String },
}

impl ParamValidationError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    pub fn unrecognized(unrecognized: Vec<String>) -> Self {
        Self::Unrecognized { unrecognized }
    }

    pub fn invalid_param(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParam {
            property: property.into(),
            message: message.into(),
        }
    }
}

impl From<ParamValidationError> for ErrorData<Value> {
    fn from(err: ParamValidationError) -> Self {
        match serde_json::to_value(err) {
            Ok(data) => ErrorData::invalid_params(data),
            Err(err) => ErrorData::internalize(err),
        }
    }
}

/// Lists the fields a params object may contain.
///
/// Nested fields are joined by a `.`, e.g. `order.lsp_balance_loki`.
pub trait ExpectedFields {
    fn expected_fields() -> Vec<String>;
}

/// Parses params from a json value
pub fn from_value<T: DeserializeOwned + ExpectedFields>(
    value: Value,
) -> Result<T, ParamValidationError> {
    if !matches!(value, Value::Object(_) | Value::Null) {
        return Err(ParamValidationError::custom(
            "Arguments should be passed by name",
        ));
    }

    let expected_fields = T::expected_fields();
    let unrecognized = list_unrecognized_fields(&expected_fields, &value);
    if !unrecognized.is_empty() {
        return Err(ParamValidationError::unrecognized(unrecognized));
    }

    serde_path_to_error::deserialize::<_, T>(value)
        .map_err(|e| ParamValidationError::invalid_param(e.path().to_string(), e.to_string()))
}

fn list_unrecognized_fields(expected: &[String], value: &Value) -> Vec<String> {
    let mut result = Vec::new();
    if let Value::Object(map) = value {
        let mut prefix = Vec::new();
        collect_unrecognized(expected, map, &mut prefix, &mut result);
    }
    result
}

fn collect_unrecognized<'a>(
    expected: &[String],
    map: &'a Map<String, Value>,
    prefix: &mut Vec<&'a str>,
    result: &mut Vec<String>,
) {
    for (name, value) in map {
        prefix.push(name);
        match value {
            Value::Object(inner) if !inner.is_empty() => {
                collect_unrecognized(expected, inner, prefix, result)
            }
            _ => {
                let field = prefix.join(".");
                if !expected.iter().any(|e| e == &field) {
                    result.push(field);
                }
            }
        }
        prefix.pop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_find_unrecognized_arguments() {
        let cases = vec![
            (json!({}), strings(&[]), strings(&[])),
            (json!({"param_a": "a"}), strings(&[]), strings(&["param_a"])),
            (json!({"param_a" : "a"}), strings(&["param_a"]), strings(&[])),
            (
                json!({"param_a" : {"field_a" : "a"}}),
                strings(&[]),
                strings(&["param_a.field_a"]),
            ),
            (
                json!({"param_a" : {"field_a" : "a"}}),
                strings(&["param_a.field_a"]),
                strings(&[]),
            ),
            (
                json!({"param_a" : "a", "param_b" : "b"}),
                strings(&["f1", "f2"]),
                strings(&["param_a", "param_b"]),
            ),
        ];

        for (value, expected, unrecognized) in cases {
            assert_eq!(list_unrecognized_fields(&expected, &value), unrecognized);
        }
    }

    #[test]
    fn serialize_error_data() {
        assert_eq!(
            serde_json::to_value(ParamValidationError::custom("arg by name")).unwrap(),
            json!({"type" : "custom", "message" : "arg by name"})
        );

        assert_eq!(
            serde_json::to_value(ParamValidationError::invalid_param("param_a", "Not an integer"))
                .unwrap(),
            json!({"type" : "invalid_param", "property" : "param_a", "message" : "Not an integer"})
        );
    }

    #[test]
    fn convert_invalid_params_to_error_data() {
        let error = ParamValidationError::unrecognized(vec!["param_a".to_string()]);
        let error_data: ErrorData<Value> = error.into();

        assert_eq!(error_data.code, -32602);
        assert_eq!(error_data.data.unwrap()["unrecognized"][0], "param_a");
    }

    #[test]
    fn positional_arguments_are_rejected() {
        let result = from_value::<crate::json_rpc::NoParams>(json!([1, 2]));
        assert_eq!(
            result.unwrap_err(),
            ParamValidationError::custom("Arguments should be passed by name")
        );
    }
}
