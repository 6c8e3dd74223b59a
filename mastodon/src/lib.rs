pub mod api;
pub mod data_sources;
pub mod resources;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::provider::{DataSourceSchema, ProviderSchema, ResourceSchema};
use tfplug::request::{ConfigureRequest, ConfigureResponse};
use tfplug::{AttributeBuilder, DataSource, Diagnostics, Provider, Resource, SchemaBuilder};

pub struct MastodonProvider {
    config: Option<Arc<api::ProviderConfig>>,
}

impl Default for MastodonProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MastodonProvider {
    pub fn new() -> Self {
        Self { config: None }
    }

    fn shared_config(&self) -> tfplug::Result<Arc<api::ProviderConfig>> {
        self.config
            .as_ref()
            .cloned()
            .ok_or(tfplug::TfplugError::ProviderNotConfigured)
    }
}

#[async_trait]
impl Provider for MastodonProvider {
    async fn configure(&mut self, request: ConfigureRequest) -> ConfigureResponse {
        let domain = request
            .config
            .get_string("domain")
            .map(|s| s.to_string())
            .or_else(|| std::env::var("MASTODON_DOMAIN").ok());

        let use_https = request
            .config
            .get_bool("use_https")
            .or_else(|| {
                std::env::var("MASTODON_USE_HTTPS")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok())
            })
            .unwrap_or(true);

        let mut diags = Diagnostics::new();

        match domain {
            Some(domain) => match api::ProviderConfig::new(&domain, use_https) {
                Ok(config) => {
                    self.config = Some(config);
                }
                Err(e) => {
                    diags.add_error(
                        format!("Failed to create API client: {}", e),
                        None::<String>,
                    );
                }
            },
            None => {
                diags.add_error(
                    "domain is required (set in provider config or MASTODON_DOMAIN env var)",
                    None::<String>,
                );
            }
        }

        ConfigureResponse { diagnostics: diags }
    }

    async fn create_resource(&self, name: &str) -> tfplug::Result<Box<dyn Resource>> {
        let config = self.shared_config()?;

        match name {
            "mastodon_register_app" => {
                Ok(Box::new(resources::RegisterAppResource::new(config)))
            }
            _ => Err(format!("Unknown resource: {}", name).into()),
        }
    }

    async fn create_data_source(&self, name: &str) -> tfplug::Result<Box<dyn DataSource>> {
        let config = self.shared_config()?;

        match name {
            "mastodon_account" => Ok(Box::new(data_sources::AccountDataSource::new(config))),
            "mastodon_instance_self" => Ok(Box::new(
                data_sources::InstanceSelfDataSource::new(config),
            )),
            _ => Err(format!("Unknown data source: {}", name).into()),
        }
    }

    async fn provider_schema(&self) -> ProviderSchema {
        SchemaBuilder::new()
            .attribute(
                "domain",
                AttributeBuilder::string("domain")
                    .required()
                    .description("Mastodon server domain (can also be set via MASTODON_DOMAIN env var)"),
            )
            .attribute(
                "use_https",
                AttributeBuilder::bool("use_https")
                    .optional()
                    .description("Use https to connect to the server, defaults to true"),
            )
            .build_provider(0)
    }

    async fn resource_schemas(&self) -> HashMap<String, ResourceSchema> {
        static SCHEMAS: std::sync::OnceLock<HashMap<String, ResourceSchema>> =
            std::sync::OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                let mut schemas = HashMap::new();
                schemas.insert(
                    "mastodon_register_app".to_string(),
                    resources::RegisterAppResource::schema_static(),
                );
                schemas
            })
            .clone()
    }

    async fn data_source_schemas(&self) -> HashMap<String, DataSourceSchema> {
        static SCHEMAS: std::sync::OnceLock<HashMap<String, DataSourceSchema>> =
            std::sync::OnceLock::new();

        SCHEMAS
            .get_or_init(|| {
                let mut schemas = HashMap::new();
                schemas.insert(
                    "mastodon_account".to_string(),
                    data_sources::AccountDataSource::schema_static(),
                );
                schemas.insert(
                    "mastodon_instance_self".to_string(),
                    data_sources::InstanceSelfDataSource::schema_static(),
                );
                schemas
            })
            .clone()
    }
}
