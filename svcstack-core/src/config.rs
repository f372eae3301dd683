//! Flat, dotted-key configuration parameters
//!
//! Components receive their settings as a [`ConfigParams`] map, e.g.
//! `connection.region = us-east-1`. Nested files and environment variables are
//! flattened into that shape by [`ConfigParams::load`].

use crate::error::ServiceError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Ordered map of dotted keys to string values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigParams {
    values: BTreeMap<String, String>,
}

impl ConfigParams {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Build from key/value pairs
    pub fn from_tuples<K, V>(tuples: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: tuples
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Flatten a JSON document into dotted keys
    pub fn from_json(value: &Value) -> Self {
        let mut params = Self::new();
        flatten_into(&mut params.values, None, value);
        params
    }

    /// Load configuration from an optional file and prefixed environment variables
    ///
    /// `PREFIX__CONNECTION__REGION=us-east-1` becomes `connection.region`.
    pub fn load(path: Option<&Path>, env_prefix: &str) -> Result<Self, ServiceError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix(env_prefix).separator("__"));

        let settings = builder.build().map_err(|e| {
            ServiceError::configuration("CONFIG_LOAD_FAILED", "Failed to load configuration")
                .with_cause(e)
        })?;
        let document: Value = settings.try_deserialize().map_err(|e| {
            ServiceError::configuration("CONFIG_LOAD_FAILED", "Failed to read configuration")
                .with_cause(e)
        })?;

        Ok(Self::from_json(&document))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value for `key`, or `None` when absent or blank
    pub fn get_as_nullable_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    }

    pub fn get_as_string(&self, key: &str) -> String {
        self.get_as_nullable_string(key).unwrap_or_default()
    }

    pub fn get_as_string_with_default(&self, key: &str, default: &str) -> String {
        self.get_as_nullable_string(key)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_as_nullable_long(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse::<i64>().ok())
    }

    pub fn get_as_long_with_default(&self, key: &str, default: i64) -> i64 {
        self.get_as_nullable_long(key).unwrap_or(default)
    }

    pub fn get_as_boolean_with_default(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "t" | "y") => true,
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "f" | "n") => false,
            _ => default,
        }
    }

    /// Millisecond value of `key` as a duration; negative values clamp to zero
    pub fn get_as_millis_with_default(&self, key: &str, default_ms: u64) -> Duration {
        let millis = self
            .get_as_nullable_long(key)
            .map_or(default_ms, |v| u64::try_from(v).unwrap_or(0));
        Duration::from_millis(millis)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Keys under `name.` with the prefix stripped
    pub fn get_section(&self, name: &str) -> ConfigParams {
        let prefix = format!("{}.", name);
        Self {
            values: self
                .values
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(&prefix)
                        .map(|rest| (rest.to_string(), v.clone()))
                })
                .collect(),
        }
    }

    pub fn add_section(&mut self, name: &str, section: &ConfigParams) {
        for (k, v) in &section.values {
            self.values.insert(format!("{}.{}", name, k), v.clone());
        }
    }

    /// Copy of `self` with values from `other` layered on top
    pub fn merge(&self, other: &ConfigParams) -> ConfigParams {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { values }
    }

    /// Copy of `self` with any keys it lacks filled from `defaults`
    pub fn with_defaults(&self, defaults: &ConfigParams) -> ConfigParams {
        defaults.merge(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten_into(values: &mut BTreeMap<String, String>, prefix: Option<&str>, value: &Value) {
    let key_for = |name: &str| match prefix {
        Some(p) => format!("{}.{}", p, name),
        None => name.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (name, child) in map {
                flatten_into(values, Some(&key_for(name)), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(values, Some(&key_for(&index.to_string())), child);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            if let Some(p) = prefix {
                values.insert(p.to_string(), s.clone());
            }
        }
        other => {
            if let Some(p) = prefix {
                values.insert(p.to_string(), other.to_string());
            }
        }
    }
}

/// A component configured from [`ConfigParams`]
pub trait Configurable {
    fn configure(&mut self, config: &ConfigParams);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_typed_getters() {
        let config = ConfigParams::from_tuples([
            ("options.connect_timeout", "2500"),
            ("options.enabled", "true"),
            ("name", "  "),
        ]);

        assert_eq!(config.get_as_long_with_default("options.connect_timeout", 10), 2500);
        assert_eq!(config.get_as_long_with_default("options.missing", 10), 10);
        assert!(config.get_as_boolean_with_default("options.enabled", false));
        assert_eq!(config.get_as_nullable_string("name"), None);
        assert_eq!(
            config.get_as_millis_with_default("options.connect_timeout", 0),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_sections() {
        let mut config = ConfigParams::from_tuples([
            ("connection.region", "us-east-1"),
            ("connection.arn", "arn:aws:lambda:us-east-1:1:function:f"),
            ("credential.access_id", "A"),
        ]);

        let connection = config.get_section("connection");
        assert_eq!(connection.len(), 2);
        assert_eq!(connection.get("region"), Some("us-east-1"));

        config.add_section("backup", &connection);
        assert_eq!(config.get("backup.region"), Some("us-east-1"));
    }

    #[test]
    fn test_merge_and_defaults() {
        let explicit = ConfigParams::from_tuples([("region", "eu-west-1")]);
        let discovered = ConfigParams::from_tuples([("region", "us-east-1"), ("account", "1")]);

        let merged = explicit.with_defaults(&discovered);
        assert_eq!(merged.get("region"), Some("eu-west-1"));
        assert_eq!(merged.get("account"), Some("1"));
    }

    #[test]
    fn test_from_json_flattens() {
        let config = ConfigParams::from_json(&json!({
            "connection": { "region": "us-east-1", "port": 443 },
            "options": { "interval": 5000, "enabled": true, "skip": null },
            "tags": ["a", "b"]
        }));

        assert_eq!(config.get("connection.region"), Some("us-east-1"));
        assert_eq!(config.get("connection.port"), Some("443"));
        assert_eq!(config.get("options.interval"), Some("5000"));
        assert_eq!(config.get("options.enabled"), Some("true"));
        assert!(!config.contains_key("options.skip"));
        assert_eq!(config.get("tags.1"), Some("b"));
    }
}
