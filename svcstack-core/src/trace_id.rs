//! Trace (correlation) id generation

use uuid::Uuid;

/// Opaque token propagated through a call chain for log correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(String);

impl TraceId {
    /// Generate a new random trace id
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing value
    pub fn with_id(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Use the supplied id, or generate one when absent or blank
    pub fn or_generate(id: Option<&str>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => Self::with_id(id),
            _ => Self::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short random id used for generated stream and instance names
pub fn short_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    uuid[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_generation() {
        let id1 = TraceId::new();
        let id2 = TraceId::new();

        // IDs should be unique
        assert_ne!(id1, id2);

        assert!(id1.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_or_generate() {
        assert_eq!(TraceId::or_generate(Some("abc")).as_str(), "abc");
        assert_eq!(TraceId::or_generate(Some("  ")).as_str().len(), 32);
        assert_eq!(TraceId::or_generate(None).as_str().len(), 32);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id().len(), 12);
    }
}
