//! AWS connection parameters
//!
//! A flat set of string keys describing how to reach a remote function or log
//! group: region, ARN (or its parts) and a credential pair.

use crate::arn::Arn;
use crate::config::ConfigParams;
use crate::error::ServiceError;

pub const DEFAULT_PARTITION: &str = "aws";
pub const AWS_PROTOCOL: &str = "aws";

/// What a consumer needs from a resolved connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// A full ARN (explicit or synthesized) must be available
    pub require_arn: bool,
    /// An access id / access key pair must be available
    pub require_credentials: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            require_arn: true,
            require_credentials: true,
        }
    }
}

/// Connection and credential parameters for an AWS resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsConnectionParams {
    params: ConfigParams,
}

impl AwsConnectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap flat parameters (`region`, `arn`, `access_id`, ...)
    pub fn from_params(params: ConfigParams) -> Self {
        Self { params }
    }

    /// Read the `credential.*` and `connection.*` sections of a component config
    pub fn from_config(config: &ConfigParams) -> Self {
        let credential = config.get_section("credential");
        let connection = config.get_section("connection");
        Self {
            params: credential.merge(&connection),
        }
    }

    pub fn params(&self) -> &ConfigParams {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.params.get_as_nullable_string(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.params.set(key, value);
    }

    /// Fill keys that are absent here from `other`; present keys are kept
    pub fn merge_missing(&mut self, other: &ConfigParams) {
        self.params = self.params.with_defaults(other);
    }

    pub fn protocol(&self) -> Option<String> {
        self.get("protocol")
    }

    pub fn partition(&self) -> String {
        self.get("partition")
            .or_else(|| self.explicit_arn().map(|a| a.partition))
            .unwrap_or_else(|| DEFAULT_PARTITION.to_string())
    }

    pub fn service(&self) -> Option<String> {
        self.get("service")
            .or_else(|| self.explicit_arn().map(|a| a.service))
    }

    /// Explicit region, or the region embedded in an explicit ARN
    pub fn region(&self) -> Option<String> {
        self.get("region").or_else(|| {
            self.explicit_arn()
                .map(|a| a.region)
                .filter(|r| !r.is_empty())
        })
    }

    pub fn set_region(&mut self, region: impl Into<String>) {
        self.set("region", region);
    }

    pub fn account(&self) -> Option<String> {
        self.get("account")
            .or_else(|| self.explicit_arn().map(|a| a.account).filter(|a| !a.is_empty()))
    }

    pub fn resource_type(&self) -> Option<String> {
        self.get("resource_type")
            .or_else(|| self.explicit_arn().and_then(|a| a.resource_type))
    }

    pub fn resource(&self) -> Option<String> {
        self.get("resource")
            .or_else(|| self.explicit_arn().map(|a| a.resource))
    }

    /// Explicit ARN, or one synthesized from account, region and resource
    pub fn arn(&self) -> Option<String> {
        if let Some(arn) = self.get("arn") {
            return Some(arn);
        }

        let (Some(region), Some(account), Some(resource)) =
            (self.get("region"), self.get("account"), self.get("resource"))
        else {
            return None;
        };

        let arn = Arn::new(
            self.partition(),
            self.service().unwrap_or_default(),
            region,
            account,
            self.get("resource_type"),
            resource,
        );
        Some(arn.to_string())
    }

    /// Store an ARN; the region it carries never replaces an explicit one
    pub fn set_arn(&mut self, arn: impl Into<String>) {
        self.set("arn", arn);
    }

    pub fn access_id(&self) -> Option<String> {
        self.get("access_id")
    }

    pub fn set_access_id(&mut self, access_id: impl Into<String>) {
        self.set("access_id", access_id);
    }

    pub fn access_key(&self) -> Option<String> {
        self.get("access_key")
    }

    pub fn set_access_key(&mut self, access_key: impl Into<String>) {
        self.set("access_key", access_key);
    }

    pub fn session_token(&self) -> Option<String> {
        self.get("session_token")
    }

    /// Endpoint override, e.g. a local emulator
    pub fn endpoint(&self) -> Option<String> {
        self.get("endpoint")
    }

    pub fn discovery_key(&self) -> Option<String> {
        self.get("discovery_key")
    }

    pub fn store_key(&self) -> Option<String> {
        self.get("store_key")
    }

    pub fn has_connection(&self) -> bool {
        self.arn().is_some()
    }

    pub fn has_credentials(&self) -> bool {
        self.access_id().is_some() && self.access_key().is_some()
    }

    fn explicit_arn(&self) -> Option<Arn> {
        self.get("arn").and_then(|a| Arn::parse(&a).ok())
    }

    /// Check the parameters can reach a resource
    pub fn validate(&self, trace_id: Option<&str>, options: ResolveOptions) -> Result<(), ServiceError> {
        if let Some(protocol) = self.protocol() {
            if protocol != AWS_PROTOCOL {
                return Err(ServiceError::configuration(
                    "UNSUPPORTED_PROTOCOL",
                    format!("Protocol {} is not supported", protocol),
                )
                .with_detail("protocol", protocol)
                .with_trace_id(trace_id));
            }
        }

        if let Some(arn) = self.get("arn") {
            Arn::parse(&arn).map_err(|e| e.with_trace_id(trace_id))?;
        }

        let connected = if options.require_arn {
            self.arn().is_some()
        } else {
            self.arn().is_some() || self.region().is_some()
        };
        if !connected {
            return Err(ServiceError::configuration(
                "NO_AWS_CONNECTION",
                "no connection configured",
            )
            .with_trace_id(trace_id));
        }

        if options.require_credentials {
            if self.access_id().is_none() {
                return Err(ServiceError::configuration(
                    "NO_ACCESS_ID",
                    "No access_id is configured in AWS credential",
                )
                .with_trace_id(trace_id));
            }
            if self.access_key().is_none() {
                return Err(ServiceError::configuration(
                    "NO_ACCESS_KEY",
                    "No access_key is configured in AWS credential",
                )
                .with_trace_id(trace_id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lambda_config() -> ConfigParams {
        ConfigParams::from_tuples([
            ("connection.arn", "arn:aws:lambda:us-east-1:123456789012:function:myFunc"),
            ("credential.access_id", "A"),
            ("credential.access_key", "B"),
        ])
    }

    #[test]
    fn test_from_config_reads_sections() {
        let params = AwsConnectionParams::from_config(&lambda_config());
        assert_eq!(params.access_id().as_deref(), Some("A"));
        assert_eq!(params.access_key().as_deref(), Some("B"));
        assert_eq!(
            params.arn().as_deref(),
            Some("arn:aws:lambda:us-east-1:123456789012:function:myFunc")
        );
    }

    #[test]
    fn test_region_derived_from_arn() {
        let params = AwsConnectionParams::from_config(&lambda_config());
        assert_eq!(params.region().as_deref(), Some("us-east-1"));
        assert_eq!(params.account().as_deref(), Some("123456789012"));
        assert_eq!(params.resource_type().as_deref(), Some("function"));
        assert_eq!(params.resource().as_deref(), Some("myFunc"));
    }

    #[test]
    fn test_explicit_region_wins() {
        let mut config = lambda_config();
        config.set("connection.region", "eu-west-1");
        let params = AwsConnectionParams::from_config(&config);
        assert_eq!(params.region().as_deref(), Some("eu-west-1"));
        // The ARN itself is left untouched
        assert!(params.arn().unwrap().contains("us-east-1"));
    }

    #[test]
    fn test_synthesized_arn() {
        let params = AwsConnectionParams::from_params(ConfigParams::from_tuples([
            ("service", "lambda"),
            ("region", "us-east-1"),
            ("account", "123456789012"),
            ("resource_type", "function"),
            ("resource", "myFunc"),
        ]));
        assert_eq!(
            params.arn().as_deref(),
            Some("arn:aws:lambda:us-east-1:123456789012:function:myFunc")
        );
    }

    #[test]
    fn test_incomplete_tuple_has_no_arn() {
        let params = AwsConnectionParams::from_params(ConfigParams::from_tuples([
            ("region", "us-east-1"),
            ("resource", "myFunc"),
        ]));
        assert!(params.arn().is_none());
        assert!(!params.has_connection());
    }

    #[test]
    fn test_validate_errors() {
        let empty = AwsConnectionParams::new();
        let err = empty.validate(Some("t1"), ResolveOptions::default()).unwrap_err();
        assert_eq!(err.code, "NO_AWS_CONNECTION");
        assert_eq!(err.message, "no connection configured");
        assert_eq!(err.trace_id.as_deref(), Some("t1"));

        let mut params = AwsConnectionParams::from_config(&lambda_config());
        params.set("access_key", "");
        let err = params.validate(None, ResolveOptions::default()).unwrap_err();
        assert_eq!(err.code, "NO_ACCESS_KEY");

        let relaxed = ResolveOptions {
            require_arn: true,
            require_credentials: false,
        };
        assert!(params.validate(None, relaxed).is_ok());
    }

    #[test]
    fn test_validate_region_only_when_arn_optional() {
        let params = AwsConnectionParams::from_params(ConfigParams::from_tuples([
            ("region", "us-east-1"),
            ("access_id", "A"),
            ("access_key", "B"),
        ]));
        let options = ResolveOptions {
            require_arn: false,
            require_credentials: true,
        };
        assert!(params.validate(None, options).is_ok());
        assert!(params.validate(None, ResolveOptions::default()).is_err());
    }

    #[test]
    fn test_unsupported_protocol() {
        let mut params = AwsConnectionParams::from_config(&lambda_config());
        params.set("protocol", "http");
        let err = params.validate(None, ResolveOptions::default()).unwrap_err();
        assert_eq!(err.code, "UNSUPPORTED_PROTOCOL");
    }
}
