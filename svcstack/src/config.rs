//! Configuration management

use anyhow::Context;
use std::path::Path;
use svcstack_core::ConfigParams;

/// Prefix of environment variables, e.g. `SVCSTACK__CLIENT__CONNECTION__REGION`
pub const ENV_PREFIX: &str = "SVCSTACK";

/// Per-component sections of the configuration
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// `client.*`: the remote function called by `invoke`
    pub client: ConfigParams,
    /// `function.*`: the function hosted by `serve`
    pub function: ConfigParams,
    /// `logger.*`: CloudWatch Logs sink
    pub logger: ConfigParams,
    /// `counters.*`: CloudWatch metrics sink
    pub counters: ConfigParams,
}

impl Settings {
    /// Load from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = ConfigParams::load(path, ENV_PREFIX).with_context(|| match path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration from the environment".to_string(),
        })?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &ConfigParams) -> Self {
        Self {
            client: config.get_section("client"),
            function: config.get_section("function"),
            logger: config.get_section("logger"),
            counters: config.get_section("counters"),
        }
    }

    /// Logs are shipped only when a log group is configured
    pub fn logger_enabled(&self) -> bool {
        self.logger.get_as_nullable_string("group").is_some()
    }

    /// Metrics are published only when a namespace is configured
    pub fn counters_enabled(&self) -> bool {
        self.counters.get_as_nullable_string("source").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections() {
        let settings = Settings::from_config(&ConfigParams::from_tuples([
            ("client.connection.arn", "arn:aws:lambda:us-east-1:123456789012:function:orders"),
            ("function.name", "orders"),
            ("logger.group", "orders-logs"),
        ]));

        assert_eq!(
            settings.client.get("connection.arn"),
            Some("arn:aws:lambda:us-east-1:123456789012:function:orders")
        );
        assert_eq!(settings.function.get("name"), Some("orders"));
        assert!(settings.logger_enabled());
        assert!(!settings.counters_enabled());
    }

    #[test]
    fn test_blank_group_disables_logger() {
        let settings = Settings::from_config(&ConfigParams::from_tuples([("logger.group", " ")]));
        assert!(!settings.logger_enabled());
    }
}
