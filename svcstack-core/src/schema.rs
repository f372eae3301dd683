//! Object schemas for validating invocation arguments

use crate::error::ServiceError;
use serde_json::{Map, Value};

/// Expected JSON type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
}

impl TypeCode {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Any => "Any",
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::Object => "Object",
            Self::Array => "Array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    pub name: String,
    pub type_code: TypeCode,
    pub required: bool,
}

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub path: String,
    pub code: &'static str,
    pub message: String,
}

/// Schema of a JSON object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    properties: Vec<PropertySchema>,
    allow_undefined: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            allow_undefined: true,
        }
    }

    pub fn with_required_property(mut self, name: &str, type_code: TypeCode) -> Self {
        self.properties.push(PropertySchema {
            name: name.to_string(),
            type_code,
            required: true,
        });
        self
    }

    pub fn with_optional_property(mut self, name: &str, type_code: TypeCode) -> Self {
        self.properties.push(PropertySchema {
            name: name.to_string(),
            type_code,
            required: false,
        });
        self
    }

    /// Whether properties not declared in the schema are accepted
    pub fn allow_undefined(mut self, allow: bool) -> Self {
        self.allow_undefined = allow;
        self
    }

    pub fn properties(&self) -> &[PropertySchema] {
        &self.properties
    }

    pub fn validate(&self, value: &Value) -> Vec<ValidationResult> {
        let Some(object) = value.as_object() else {
            return vec![ValidationResult {
                path: String::new(),
                code: "INVALID_TYPE",
                message: "Value must be an object".to_string(),
            }];
        };

        let mut results = self.validate_properties(object);

        if !self.allow_undefined {
            for key in object.keys() {
                if !self.properties.iter().any(|p| &p.name == key) {
                    results.push(ValidationResult {
                        path: key.clone(),
                        code: "UNEXPECTED_PROPERTY",
                        message: format!("Property {} is not defined in the schema", key),
                    });
                }
            }
        }

        results
    }

    fn validate_properties(&self, object: &Map<String, Value>) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        for property in &self.properties {
            match object.get(&property.name) {
                None | Some(Value::Null) => {
                    if property.required {
                        results.push(ValidationResult {
                            path: property.name.clone(),
                            code: "VALUE_IS_NULL",
                            message: format!("Property {} must not be null", property.name),
                        });
                    }
                }
                Some(value) if !property.type_code.matches(value) => {
                    results.push(ValidationResult {
                        path: property.name.clone(),
                        code: "TYPE_MISMATCH",
                        message: format!(
                            "Property {} must be of type {}",
                            property.name,
                            property.type_code.as_str()
                        ),
                    });
                }
                Some(_) => {}
            }
        }
        results
    }

    /// Validate and turn any problem into a `Validation` error
    pub fn validate_and_fail(&self, trace_id: Option<&str>, value: &Value) -> Result<(), ServiceError> {
        let results = self.validate(value);
        if results.is_empty() {
            return Ok(());
        }

        let message = results
            .iter()
            .map(|r| r.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let problems: Vec<Value> = results
            .iter()
            .map(|r| serde_json::json!({ "path": r.path, "code": r.code }))
            .collect();

        Err(ServiceError::validation("INVALID_DATA", message)
            .with_detail("results", problems)
            .with_trace_id(trace_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .with_required_property("name", TypeCode::String)
            .with_optional_property("count", TypeCode::Integer)
    }

    #[test]
    fn test_valid_object() {
        assert!(schema().validate(&json!({ "name": "x", "count": 3 })).is_empty());
        assert!(schema().validate(&json!({ "name": "x", "extra": true })).is_empty());
    }

    #[test]
    fn test_missing_and_mismatched() {
        let results = schema().validate(&json!({ "count": "three" }));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].code, "VALUE_IS_NULL");
        assert_eq!(results[1].code, "TYPE_MISMATCH");
    }

    #[test]
    fn test_undefined_properties() {
        let strict = schema().allow_undefined(false);
        let results = strict.validate(&json!({ "name": "x", "extra": 1 }));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].code, "UNEXPECTED_PROPERTY");
    }

    #[test]
    fn test_validate_and_fail() {
        let err = schema().validate_and_fail(Some("t1"), &json!([1, 2])).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Validation);
        assert_eq!(err.code, "INVALID_DATA");
        assert_eq!(err.trace_id.as_deref(), Some("t1"));
    }
}
