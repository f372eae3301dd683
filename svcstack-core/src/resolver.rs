//! Connection and credential resolution
//!
//! Merges explicit configuration, ARN decomposition and optional discovery /
//! credential-store lookups into one validated [`AwsConnectionParams`].

use crate::config::{ConfigParams, Configurable};
use crate::connection::{AwsConnectionParams, ResolveOptions};
use crate::error::ServiceError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Looks up connection parameters by name
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn resolve_one(
        &self,
        trace_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConfigParams>, ServiceError>;
}

/// Looks up credential parameters by name
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(
        &self,
        trace_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConfigParams>, ServiceError>;
}

/// Named parameter sets held in memory
#[derive(Default)]
struct MemoryRegistry {
    items: RwLock<HashMap<String, ConfigParams>>,
}

impl MemoryRegistry {
    /// Every top-level section becomes one named entry
    fn configure(&self, config: &ConfigParams) {
        let names: BTreeSet<&str> = config
            .iter()
            .filter_map(|(k, _)| k.split_once('.').map(|(name, _)| name))
            .collect();

        let mut items = self.items.write();
        for name in names {
            items.insert(name.to_string(), config.get_section(name));
        }
    }

    fn register(&self, key: &str, params: ConfigParams) {
        self.items.write().insert(key.to_string(), params);
    }

    fn get(&self, key: &str) -> Option<ConfigParams> {
        self.items.read().get(key).cloned()
    }
}

/// In-memory discovery service, configured as `<key>.<param> = <value>`
#[derive(Default)]
pub struct MemoryDiscovery {
    registry: MemoryRegistry,
}

impl MemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ConfigParams) -> Self {
        let discovery = Self::new();
        discovery.registry.configure(config);
        discovery
    }

    pub fn register(&self, key: &str, connection: ConfigParams) {
        self.registry.register(key, connection);
    }
}

#[async_trait]
impl Discovery for MemoryDiscovery {
    async fn resolve_one(
        &self,
        _trace_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConfigParams>, ServiceError> {
        Ok(self.registry.get(key))
    }
}

/// In-memory credential store, configured as `<key>.access_id = ...`
#[derive(Default)]
pub struct MemoryCredentialStore {
    registry: MemoryRegistry,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ConfigParams) -> Self {
        let store = Self::new();
        store.registry.configure(config);
        store
    }

    pub fn store(&self, key: &str, credential: ConfigParams) {
        self.registry.register(key, credential);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(
        &self,
        _trace_id: Option<&str>,
        key: &str,
    ) -> Result<Option<ConfigParams>, ServiceError> {
        Ok(self.registry.get(key))
    }
}

/// Resolves AWS connection parameters for a component
#[derive(Clone, Default)]
pub struct AwsConnectionResolver {
    connection: AwsConnectionParams,
    options: ResolveOptions,
    default_service: Option<String>,
    discovery: Option<Arc<dyn Discovery>>,
    credential_store: Option<Arc<dyn CredentialStore>>,
}

impl AwsConnectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service name used when synthesizing an ARN from its parts
    pub fn with_service(mut self, service: &str) -> Self {
        self.default_service = Some(service.to_string());
        self
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    pub fn set_discovery(&mut self, discovery: Arc<dyn Discovery>) {
        self.discovery = Some(discovery);
    }

    pub fn set_credential_store(&mut self, store: Arc<dyn CredentialStore>) {
        self.credential_store = Some(store);
    }

    fn is_connected(&self, params: &AwsConnectionParams) -> bool {
        params.arn().is_some() || (!self.options.require_arn && params.region().is_some())
    }

    fn is_complete(&self, params: &AwsConnectionParams) -> bool {
        self.is_connected(params) && (!self.options.require_credentials || params.has_credentials())
    }

    /// Produce one validated parameter set
    ///
    /// Collaborators are only consulted for what the configuration lacks, and
    /// explicit values always win over looked-up ones.
    pub async fn resolve(&self, trace_id: Option<&str>) -> Result<AwsConnectionParams, ServiceError> {
        let mut params = self.connection.clone();

        if params.get("service").is_none() {
            if let Some(service) = &self.default_service {
                params.set("service", service.clone());
            }
        }

        if !self.is_complete(&params) {
            if !self.is_connected(&params) {
                if let Some(key) = params.discovery_key() {
                    let discovery = self.discovery.as_ref().ok_or_else(|| {
                        ServiceError::configuration(
                            "CANNOT_RESOLVE",
                            "Discovery wasn't found to make resolution",
                        )
                        .with_detail("discovery_key", key.clone())
                        .with_trace_id(trace_id)
                    })?;

                    let found = discovery.resolve_one(trace_id, &key).await?.ok_or_else(|| {
                        ServiceError::configuration(
                            "NO_CONNECTION",
                            format!("Connection for {} was not found", key),
                        )
                        .with_detail("discovery_key", key.clone())
                        .with_trace_id(trace_id)
                    })?;
                    debug!(discovery_key = %key, "Resolved connection through discovery");
                    params.merge_missing(&found);
                }
            }

            if !params.has_credentials() {
                if let Some(key) = params.store_key() {
                    let store = self.credential_store.as_ref().ok_or_else(|| {
                        ServiceError::configuration(
                            "CANNOT_RESOLVE",
                            "Credential store wasn't found to make lookup",
                        )
                        .with_detail("store_key", key.clone())
                        .with_trace_id(trace_id)
                    })?;

                    let found = store.lookup(trace_id, &key).await?.ok_or_else(|| {
                        ServiceError::configuration(
                            "NO_CREDENTIAL",
                            format!("Credential for {} was not found", key),
                        )
                        .with_detail("store_key", key.clone())
                        .with_trace_id(trace_id)
                    })?;
                    debug!(store_key = %key, "Resolved credential through credential store");
                    params.merge_missing(&found);
                }
            }
        }

        params.validate(trace_id, self.options)?;
        Ok(params)
    }
}

impl Configurable for AwsConnectionResolver {
    fn configure(&mut self, config: &ConfigParams) {
        self.connection = AwsConnectionParams::from_config(config);
    }
}
