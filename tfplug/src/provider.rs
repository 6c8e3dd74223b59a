//! Provider, Resource, and DataSource traits
//!
//! Providers are factories: after `configure`, the framework asks the
//! provider to build a fresh resource or data source instance for each
//! operation. Schemas are served separately so they stay available before
//! configuration.

use crate::request::{
    ConfigureRequest, ConfigureResponse, CreateRequest, CreateResponse, DeleteRequest,
    DeleteResponse, ReadRequest, ReadResponse, UpdateRequest, UpdateResponse,
};
use crate::schema::Attribute;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Schema of the provider's own configuration block
#[derive(Debug, Clone)]
pub struct ProviderSchema {
    pub version: i64,
    pub attributes: HashMap<String, Attribute>,
}

/// Schema of a managed resource
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub version: i64,
    pub attributes: HashMap<String, Attribute>,
}

/// Schema of a data source
#[derive(Debug, Clone)]
pub struct DataSourceSchema {
    pub version: i64,
    pub attributes: HashMap<String, Attribute>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Called once with the provider block's configuration before any
    /// resource or data source operation.
    async fn configure(&mut self, request: ConfigureRequest) -> ConfigureResponse;

    /// Build a resource instance for the given type name.
    /// Fails if the provider is not configured or the name is unknown.
    async fn create_resource(&self, name: &str) -> Result<Box<dyn Resource>>;

    /// Build a data source instance for the given type name.
    async fn create_data_source(&self, name: &str) -> Result<Box<dyn DataSource>>;

    /// Schema of the provider configuration block
    async fn provider_schema(&self) -> ProviderSchema;

    /// Schemas of all resource types, keyed by type name
    async fn resource_schemas(&self) -> HashMap<String, ResourceSchema>;

    /// Schemas of all data source types, keyed by type name
    async fn data_source_schemas(&self) -> HashMap<String, DataSourceSchema>;
}

/// CRUD operations for a managed resource.
/// `read` returns `None` state when the remote object no longer exists.
#[async_trait]
pub trait Resource: Send + Sync {
    async fn create(&self, request: CreateRequest) -> CreateResponse;

    async fn read(&self, request: ReadRequest) -> ReadResponse;

    async fn update(&self, request: UpdateRequest) -> UpdateResponse;

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse;
}

/// Read-only data sources. The framework passes the decoded config as
/// `current_state` in the read request.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn read(&self, request: ReadRequest) -> ReadResponse;
}
