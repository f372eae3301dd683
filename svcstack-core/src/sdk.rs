//! AWS SDK configuration from resolved connection parameters

use crate::connection::AwsConnectionParams;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_smithy_types::timeout::TimeoutConfig;
use std::time::Duration;

const CREDENTIALS_PROVIDER: &str = "svcstack";

/// Transport timeouts applied to an SDK client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub connect: Duration,
    /// Bound on a whole operation, including retries
    pub operation: Option<Duration>,
}

impl ClientTimeouts {
    pub fn connect(connect: Duration) -> Self {
        Self {
            connect,
            operation: None,
        }
    }

    #[must_use]
    pub fn with_operation(mut self, operation: Option<Duration>) -> Self {
        self.operation = operation;
        self
    }
}

/// Build a shared SDK config for `connection`
///
/// Static credentials are used when the connection carries them; otherwise the
/// default provider chain applies.
pub async fn load_sdk_config(connection: &AwsConnectionParams, timeouts: ClientTimeouts) -> SdkConfig {
    let mut timeout = TimeoutConfig::builder().connect_timeout(timeouts.connect);
    if let Some(operation) = timeouts.operation {
        timeout = timeout.operation_timeout(operation);
    }

    let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeout.build());

    if let Some(region) = connection.region() {
        loader = loader.region(Region::new(region));
    }

    if let (Some(access_id), Some(access_key)) = (connection.access_id(), connection.access_key()) {
        loader = loader.credentials_provider(Credentials::new(
            access_id,
            access_key,
            connection.session_token(),
            None,
            CREDENTIALS_PROVIDER,
        ));
    }

    if let Some(endpoint) = connection.endpoint() {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}
