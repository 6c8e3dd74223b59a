//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust, implementing the
//! Terraform Plugin Protocol v6.

// Core modules
pub mod attribute_type;
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod request;

// Framework implementation modules
pub mod grpc;
pub mod proto;

// Re-exports for convenience
pub use attribute_type::AttributeType;
pub use context::Context;
pub use error::{Result, TfplugError};
pub use grpc::ProviderServer;
pub use provider::{
    DataSource, DataSourceSchema, Provider, ProviderSchema, Resource, ResourceSchema,
};
pub use schema::{Attribute, AttributeBuilder, SchemaBuilder};
pub use types::{Config, Diagnostic, Diagnostics, Dynamic, State};
