use crate::api::ProviderConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::provider::DataSourceSchema;
use tfplug::request::{ReadRequest, ReadResponse};
use tfplug::{AttributeBuilder, DataSource, Diagnostics, Dynamic, SchemaBuilder, State};

pub struct InstanceSelfDataSource {
    config: Arc<ProviderConfig>,
}

impl InstanceSelfDataSource {
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self { config }
    }

    pub fn schema_static() -> DataSourceSchema {
        SchemaBuilder::new()
            .attribute("id", AttributeBuilder::string("id").computed())
            .attribute(
                "email",
                AttributeBuilder::string("email")
                    .computed()
                    .description("Instance contact email"),
            )
            .attribute(
                "thumbnail",
                AttributeBuilder::string("thumbnail")
                    .computed()
                    .description("Instance thumbnail"),
            )
            .attribute(
                "title",
                AttributeBuilder::string("title")
                    .computed()
                    .description("Instance title"),
            )
            .attribute(
                "uri",
                AttributeBuilder::string("uri")
                    .computed()
                    .description("Instance URI"),
            )
            .attribute(
                "version",
                AttributeBuilder::string("version")
                    .computed()
                    .description("Instance version"),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for InstanceSelfDataSource {
    async fn read(&self, _request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();

        let client = self.config.unauthenticated_client();
        let instance = match client.get_instance().await {
            Ok(instance) => instance,
            Err(e) => {
                diags.add_error(format!("Unable to read instance: {}", e), None::<String>);
                return ReadResponse {
                    state: None,
                    diagnostics: diags,
                };
            }
        };

        let mut values = HashMap::new();
        // The instance URI doubles as the data source id
        values.insert("id".to_string(), Dynamic::String(instance.uri.clone()));
        values.insert("email".to_string(), Dynamic::String(instance.email));
        values.insert(
            "thumbnail".to_string(),
            match instance.thumbnail {
                Some(thumbnail) => Dynamic::String(thumbnail),
                None => Dynamic::Null,
            },
        );
        values.insert("title".to_string(), Dynamic::String(instance.title));
        values.insert("uri".to_string(), Dynamic::String(instance.uri));
        values.insert("version".to_string(), Dynamic::String(instance.version));

        ReadResponse {
            state: Some(State { values }),
            diagnostics: diags,
        }
    }
}
