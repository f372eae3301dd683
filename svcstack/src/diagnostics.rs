//! Built-in actions of the hosted function

use chrono::Utc;
use serde_json::{json, Value};
use svcstack_core::{Schema, ServiceError, TypeCode};
use svcstack_lambda::LambdaFunction;

/// Register `ping` and `echo` on `function`
pub fn register(function: &LambdaFunction) -> Result<(), ServiceError> {
    let name = function.name().to_string();
    function.register_action("ping", None, move |_event: Value| {
        let name = name.clone();
        async move {
            Ok(json!({
                "status": "ok",
                "function": name,
                "time": Utc::now().to_rfc3339(),
            }))
        }
    })?;

    function.register_action(
        "echo",
        Some(Schema::new().with_required_property("message", TypeCode::String)),
        |event: Value| async move { Ok(json!({ "message": event["message"].clone() })) },
    )?;
    Ok(())
}
