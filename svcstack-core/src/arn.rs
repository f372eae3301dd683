//! Amazon Resource Name parsing and composition
//!
//! Parsing is purely lexical: `arn:partition:service:region:account:resource`,
//! where the resource suffix may be qualified by a type separated with `:` or `/`.

use crate::error::ServiceError;
use std::fmt;
use std::str::FromStr;

/// Decomposed Amazon Resource Name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource_type: Option<String>,
    pub resource: String,
    /// Delimiter between resource type and resource (`:` or `/`)
    pub separator: char,
}

impl Arn {
    /// Compose an ARN from parts, joining type and resource with `:`
    pub fn new(
        partition: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
        account: impl Into<String>,
        resource_type: Option<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            service: service.into(),
            region: region.into(),
            account: account.into(),
            resource_type,
            resource: resource.into(),
            separator: ':',
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Lambda function ARN in the default partition
    pub fn lambda_function(region: &str, account: &str, function_name: &str) -> Self {
        Self::new(
            "aws",
            "lambda",
            region,
            account,
            Some("function".to_string()),
            function_name,
        )
    }

    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        value.parse()
    }
}

fn invalid_arn(value: &str, reason: &str) -> ServiceError {
    ServiceError::configuration("INVALID_ARN", format!("Invalid ARN '{}': {}", value, reason))
        .with_detail("arn", value)
}

impl FromStr for Arn {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.splitn(6, ':');

        if parts.next() != Some("arn") {
            return Err(invalid_arn(value, "missing 'arn:' prefix"));
        }

        let (Some(partition), Some(service), Some(region), Some(account), Some(rest)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(invalid_arn(value, "expected six colon-delimited segments"));
        };

        if partition.is_empty() || service.is_empty() {
            return Err(invalid_arn(value, "partition and service are required"));
        }
        if rest.is_empty() {
            return Err(invalid_arn(value, "resource is required"));
        }

        let (resource_type, resource, separator) = match rest.find([':', '/']) {
            Some(pos) => {
                let separator = rest[pos..].chars().next().unwrap_or(':');
                (
                    Some(rest[..pos].to_string()),
                    rest[pos + 1..].to_string(),
                    separator,
                )
            }
            None => (None, rest.to_string(), ':'),
        };

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account: account.to_string(),
            resource_type,
            resource,
            separator,
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:",
            self.partition, self.service, self.region, self.account
        )?;
        if let Some(resource_type) = &self.resource_type {
            write!(f, "{}{}", resource_type, self.separator)?;
        }
        f.write_str(&self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_parse_lambda_arn() {
        let arn: Arn = "arn:aws:lambda:us-east-1:123456789012:function:myFunc"
            .parse()
            .unwrap();

        assert_eq!(arn.partition, "aws");
        assert_eq!(arn.service, "lambda");
        assert_eq!(arn.region, "us-east-1");
        assert_eq!(arn.account, "123456789012");
        assert_eq!(arn.resource_type.as_deref(), Some("function"));
        assert_eq!(arn.resource, "myFunc");
    }

    #[test]
    fn test_parse_slash_resource() {
        let arn: Arn = "arn:aws:iam::123456789012:role/lambda-role".parse().unwrap();
        assert_eq!(arn.region, "");
        assert_eq!(arn.resource_type.as_deref(), Some("role"));
        assert_eq!(arn.resource, "lambda-role");
        assert_eq!(arn.separator, '/');
    }

    #[test]
    fn test_parse_untyped_resource() {
        let arn: Arn = "arn:aws:s3:::my-bucket".parse().unwrap();
        assert!(arn.resource_type.is_none());
        assert_eq!(arn.resource, "my-bucket");
    }

    #[test]
    fn test_round_trip_strings() {
        for value in [
            "arn:aws:lambda:us-east-1:123456789012:function:myFunc",
            "arn:aws:lambda:us-east-1:123456789012:function:myFunc:prod",
            "arn:aws:logs:eu-west-1:123456789012:log-group:/aws/lambda/x",
            "arn:aws-cn:iam::123456789012:role/path/to/role",
            "arn:aws:s3:::my-bucket",
        ] {
            let arn = Arn::parse(value).unwrap();
            assert_eq!(arn.to_string(), value);
        }
    }

    #[test]
    fn test_round_trip_parts() {
        let arn = Arn::lambda_function("us-west-2", "000000000000", "echo");
        let parsed = Arn::parse(&arn.to_string()).unwrap();
        assert_eq!(parsed, arn);

        let slashed = Arn::new("aws", "ecs", "us-west-2", "1", Some("task".into()), "abc")
            .with_separator('/');
        assert_eq!(Arn::parse(&slashed.to_string()).unwrap(), slashed);
    }

    #[test]
    fn test_malformed_arns() {
        for value in [
            "",
            "aws:lambda:us-east-1:1:function:x",
            "arn:aws:lambda:us-east-1",
            "arn::lambda:us-east-1:1:function:x",
            "arn:aws:lambda:us-east-1:1:",
        ] {
            let err = Arn::parse(value).unwrap_err();
            assert_eq!(err.category, ErrorCategory::Configuration);
            assert_eq!(err.code, "INVALID_ARN");
        }
    }
}
