//! Hosting a dispatcher under the AWS Lambda runtime

use crate::function::LambdaFunction;
use lambda_runtime::{service_fn, Diagnostic, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use svcstack_core::ServiceError;
use tracing::{debug, warn};

/// Runtime error for a failed invocation
///
/// `errorType` carries the error code and `errorMessage` the JSON error
/// description, which `LambdaClient` turns back into a `ServiceError`.
pub fn to_diagnostic(err: &ServiceError) -> Diagnostic {
    Diagnostic {
        error_type: err.code.clone(),
        error_message: err.to_json(),
    }
}

/// Serve `function` until the runtime shuts down
pub async fn serve(function: Arc<LambdaFunction>) -> Result<(), lambda_runtime::Error> {
    if let Err(err) = function.initialize(None).await {
        warn!(function = %function.name(), error = %err, "Initialization deferred to first event");
    }

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let function = function.clone();
        async move {
            let (payload, context) = event.into_parts();
            debug!(request_id = %context.request_id, "Received lambda event");
            function.handle(payload).await.map_err(|err| to_diagnostic(&err))
        }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcstack_core::{ErrorDescription, ServiceError};

    #[test]
    fn test_diagnostic_carries_description() {
        let err = ServiceError::bad_request("NO_ACTION", "Action ping was not found").with_detail("command", "ping");
        let diagnostic = to_diagnostic(&err);
        assert_eq!(diagnostic.error_type, "NO_ACTION");

        let description: ErrorDescription = serde_json::from_str(&diagnostic.error_message).unwrap();
        assert_eq!(description.category, "BadRequest");
        assert_eq!(description.code, "NO_ACTION");
    }
}
