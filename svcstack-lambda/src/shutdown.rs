//! Shutdown hooks owned by the hosting process

use futures::future::BoxFuture;
use std::future::Future;
use svcstack_core::ServiceError;
use tracing::{info, warn};

type HookFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ServiceError>> + Send>;

/// Ordered registry of cleanup actions run when the host exits
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Vec<(String, HookFn)>,
}

impl ShutdownHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: &str, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        self.hooks.push((name.to_string(), Box::new(move || Box::pin(hook()))));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in reverse registration order; failures are logged
    pub async fn run_all(self) -> usize {
        let mut failed = 0;
        for (name, hook) in self.hooks.into_iter().rev() {
            match hook().await {
                Ok(()) => info!(hook = %name, "Shutdown hook completed"),
                Err(err) => {
                    failed += 1;
                    warn!(hook = %name, error = %err, "Shutdown hook failed");
                }
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_hooks_run_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = ShutdownHooks::new();

        for name in ["logger", "counters", "function"] {
            let order = order.clone();
            hooks.register(name, move || async move {
                order.lock().push(name);
                Ok(())
            });
        }
        hooks.register("broken", || async { Err(ServiceError::internal("CLOSE_FAILED", "boom")) });
        assert_eq!(hooks.len(), 4);

        assert_eq!(hooks.run_all().await, 1);
        assert_eq!(*order.lock(), vec!["function", "counters", "logger"]);
    }
}
