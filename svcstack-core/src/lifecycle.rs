//! Open/close lifecycle shared by components with remote resources

use crate::error::ServiceError;
use async_trait::async_trait;

/// A component that acquires resources on `open` and releases them on `close`
///
/// Both operations are idempotent.
#[async_trait]
pub trait Openable: Send + Sync {
    fn is_open(&self) -> bool;

    async fn open(&self, trace_id: Option<&str>) -> Result<(), ServiceError>;

    async fn close(&self, trace_id: Option<&str>) -> Result<(), ServiceError>;
}
