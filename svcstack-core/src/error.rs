//! Error taxonomy shared by all svcstack components

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Boxed error used as the cause of a [`ServiceError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Unknown,
    Internal,
    /// Resolution or registration cannot produce a usable component
    Configuration,
    /// Missing or malformed command at call time
    InvalidAction,
    /// Remote call transport failure
    Invocation,
    /// Remote call succeeded but its payload could not be decoded
    Deserialization,
    /// Dispatcher received an unroutable event
    BadRequest,
    /// Operation attempted on a component that is not open
    NotOpened,
    /// Arguments failed schema validation
    Validation,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Internal => "Internal",
            Self::Configuration => "Configuration",
            Self::InvalidAction => "InvalidAction",
            Self::Invocation => "Invocation",
            Self::Deserialization => "Deserialization",
            Self::BadRequest => "BadRequest",
            Self::NotOpened => "NotOpened",
            Self::Validation => "Validation",
        }
    }

    /// Parse a category name, falling back to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "Internal" => Self::Internal,
            "Configuration" => Self::Configuration,
            "InvalidAction" => Self::InvalidAction,
            "Invocation" => Self::Invocation,
            "Deserialization" => Self::Deserialization,
            "BadRequest" => Self::BadRequest,
            "NotOpened" => Self::NotOpened,
            "Validation" => Self::Validation,
            _ => Self::Unknown,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest | Self::InvalidAction | Self::Validation => 400,
            Self::NotOpened => 409,
            Self::Invocation => 502,
            Self::Unknown
            | Self::Internal
            | Self::Configuration
            | Self::Deserialization => 500,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toolkit error carried through every component boundary
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
    pub details: Map<String, Value>,
    pub cause: Option<String>,
    #[source]
    pub source: Option<BoxError>,
}

impl ServiceError {
    pub fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            trace_id: None,
            details: Map::new(),
            cause: None,
            source: None,
        }
    }

    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, code, message)
    }

    pub fn invalid_action(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::InvalidAction, code, message)
    }

    pub fn invocation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Invocation, code, message)
    }

    pub fn deserialization(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Deserialization, code, message)
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::BadRequest, code, message)
    }

    pub fn not_opened(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotOpened, code, message)
    }

    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    pub fn with_trace_id(mut self, trace_id: Option<&str>) -> Self {
        self.trace_id = trace_id.map(str::to_string);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details.extend(details);
        self
    }

    /// Attach the underlying error, keeping its message for serialization
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(cause.to_string());
        self.source = Some(Box::new(cause));
        self
    }

    pub fn with_boxed_cause(mut self, cause: BoxError) -> Self {
        self.cause = Some(cause.to_string());
        self.source = Some(cause);
        self
    }

    pub fn is(&self, category: ErrorCategory, code: &str) -> bool {
        self.category == category && self.code == code
    }

    pub fn to_description(&self) -> ErrorDescription {
        ErrorDescription {
            category: self.category.as_str().to_string(),
            code: self.code.clone(),
            message: self.message.clone(),
            status: self.category.status(),
            trace_id: self.trace_id.clone(),
            details: if self.details.is_empty() {
                None
            } else {
                Some(self.details.clone())
            },
            cause: self.cause.clone(),
        }
    }

    /// Format as a JSON error description
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.to_description()).unwrap_or_else(|_| {
            format!(
                r#"{{"category":"{}","code":"{}","message":"{}"}}"#,
                self.category.as_str(),
                self.code,
                self.message
            )
        })
    }
}

impl From<ErrorDescription> for ServiceError {
    fn from(description: ErrorDescription) -> Self {
        Self {
            category: ErrorCategory::parse(&description.category),
            code: description.code,
            message: description.message,
            trace_id: description.trace_id,
            details: description.details.unwrap_or_default(),
            cause: description.cause,
            source: None,
        }
    }
}

/// Serializable form of a [`ServiceError`], used on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescription {
    pub category: String,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ServiceError::bad_request("NO_ACTION", "Action not found");
        assert_eq!(error.to_string(), "NO_ACTION: Action not found");
    }

    #[test]
    fn test_error_json_format() {
        let error = ServiceError::bad_request("NO_ACTION", "Action not found")
            .with_detail("command", "ping")
            .with_trace_id(Some("trace-123"));

        let json = error.to_json();
        assert!(json.contains("\"category\":\"BadRequest\""));
        assert!(json.contains("\"traceId\":\"trace-123\""));
        assert!(json.contains("\"command\":\"ping\""));
    }

    #[test]
    fn test_description_restores_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let error = ServiceError::invocation("CALL_FAILED", "Call failed").with_cause(io);
        assert!(std::error::Error::source(&error).is_some());

        let restored = ServiceError::from(error.to_description());
        assert!(restored.is(ErrorCategory::Invocation, "CALL_FAILED"));
        assert_eq!(restored.cause.as_deref(), Some("socket closed"));
        assert!(restored.source.is_none());
    }

    #[test]
    fn test_unknown_category() {
        assert_eq!(ErrorCategory::parse("Bogus"), ErrorCategory::Unknown);
        assert_eq!(ErrorCategory::Validation.status(), 400);
    }
}
