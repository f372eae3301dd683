//! Lambda adapters for svcstack
//!
//! Provides a client that calls actions on remote functions and a dispatcher
//! that routes Lambda events to registered actions.

pub mod client;
pub mod commandable;
pub mod function;
pub mod invocation;
pub mod runtime;
pub mod shutdown;

pub use client::LambdaClient;
pub use commandable::CommandRegistration;
pub use function::{ActionHandler, Initializer, LambdaFunction};
pub use invocation::{
    FunctionInvoker, InvocationRequest, InvocationResult, InvocationType, InvokerError, InvokerFactory,
    SdkInvoker, SdkInvokerFactory,
};
pub use shutdown::ShutdownHooks;
