//! Core types and traits for svcstack
//!
//! This crate provides the pieces shared by every AWS adapter: configuration,
//! ARN handling, connection resolution, the error taxonomy, and the logger,
//! counters and command capabilities components plug into.

pub mod arn;
pub mod commands;
pub mod config;
pub mod connection;
pub mod counters;
pub mod error;
pub mod lifecycle;
pub mod log;
pub mod resolver;
pub mod schema;
pub mod sdk;
pub mod trace_id;

pub use arn::Arn;
pub use commands::{Command, CommandSet, Commandable, FnCommand, Parameters};
pub use config::{ConfigParams, Configurable};
pub use connection::{AwsConnectionParams, ResolveOptions};
pub use counters::{CachedCounters, Counter, CounterSink, CounterTiming, CounterType};
pub use error::{BoxError, ErrorCategory, ErrorDescription, ServiceError};
pub use lifecycle::Openable;
pub use log::{LogLevel, LogMessage, Logger};
pub use resolver::{
    AwsConnectionResolver, CredentialStore, Discovery, MemoryCredentialStore, MemoryDiscovery,
};
pub use schema::{Schema, TypeCode, ValidationResult};
pub use sdk::{load_sdk_config, ClientTimeouts};
pub use trace_id::TraceId;
