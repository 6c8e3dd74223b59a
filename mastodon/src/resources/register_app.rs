use crate::api::{AppConfig, ProviderConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::attribute_type::AttributeType;
use tfplug::provider::ResourceSchema;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    UpdateRequest, UpdateResponse,
};
use tfplug::types::Config;
use tfplug::{AttributeBuilder, Diagnostics, Dynamic, Resource, SchemaBuilder, State};

const DEFAULT_CLIENT_NAME: &str = "terraform-provider-mastodon";
const DEFAULT_REDIRECT_URIS: &str = "urn:ietf:wg:oauth:2.0:oob";
const DEFAULT_SCOPES: &str = "read write follow admin:read admin:write";

pub struct RegisterAppResource {
    config: Arc<ProviderConfig>,
}

impl RegisterAppResource {
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self { config }
    }

    pub fn schema_static() -> ResourceSchema {
        let mut app_config_fields = HashMap::new();
        app_config_fields.insert("client_id".to_string(), AttributeType::String);
        app_config_fields.insert("client_secret".to_string(), AttributeType::String);
        app_config_fields.insert("redirect_uri".to_string(), AttributeType::String);

        SchemaBuilder::new()
            .attribute(
                "client_name",
                AttributeBuilder::string("client_name")
                    .optional()
                    .description("Name to register application with"),
            )
            .attribute(
                "redirect_uris",
                AttributeBuilder::string("redirect_uris")
                    .optional()
                    .description("Redirect URI to register application with"),
            )
            .attribute(
                "scopes",
                AttributeBuilder::string_list("scopes")
                    .optional()
                    .description("OAuth scopes"),
            )
            .attribute(
                "website",
                AttributeBuilder::string("website")
                    .optional()
                    .description("Website for registered application"),
            )
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .description("Application identifier"),
            )
            .attribute(
                "app_config",
                AttributeBuilder::object("app_config", app_config_fields)
                    .computed()
                    .sensitive()
                    .description("Application auth config"),
            )
            .build_resource(0)
    }

    /// Collect registration inputs from config, falling back to defaults
    fn registration_from(config: &Config) -> AppConfig {
        let client_name = config
            .get_string("client_name")
            .unwrap_or(DEFAULT_CLIENT_NAME)
            .to_string();

        let redirect_uris = config
            .get_string("redirect_uris")
            .unwrap_or(DEFAULT_REDIRECT_URIS)
            .to_string();

        let scopes = match config.values.get("scopes").and_then(|v| v.as_list()) {
            Some(list) => list
                .iter()
                .filter_map(|v| v.as_string())
                .collect::<Vec<_>>()
                .join(" "),
            None => DEFAULT_SCOPES.to_string(),
        };

        let website = config.get_string("website").map(|s| s.to_string());

        AppConfig {
            client_name,
            redirect_uris,
            scopes,
            website,
        }
    }

    async fn register(&self, config: &Config, diags: &mut Diagnostics) -> Option<State> {
        let registration = Self::registration_from(config);

        let client = self.config.unauthenticated_client();
        let app = match client.register_app(&registration).await {
            Ok(app) => app,
            Err(e) => {
                diags.add_error(
                    format!("Unable to register application: {}", e),
                    None::<String>,
                );
                return None;
            }
        };

        // State carries the config inputs as given plus the computed outputs
        let mut values = config.values.clone();

        values.insert("id".to_string(), Dynamic::String(app.id));

        let mut app_config = HashMap::new();
        app_config.insert("client_id".to_string(), Dynamic::String(app.client_id));
        app_config.insert(
            "client_secret".to_string(),
            Dynamic::String(app.client_secret),
        );
        app_config.insert(
            "redirect_uri".to_string(),
            Dynamic::String(app.redirect_uri),
        );
        values.insert("app_config".to_string(), Dynamic::Map(app_config));

        Some(State { values })
    }
}

fn app_credentials_from(state: &State) -> Option<(String, String)> {
    let app_config = state.values.get("app_config")?.as_map()?;
    let client_id = app_config.get("client_id")?.as_string()?.to_string();
    let client_secret = app_config.get("client_secret")?.as_string()?.to_string();
    Some((client_id, client_secret))
}

#[async_trait]
impl Resource for RegisterAppResource {
    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();

        let state = self.register(&request.config, &mut diags).await;
        tracing::trace!("created application registration");

        CreateResponse {
            state: state.unwrap_or_default(),
            diagnostics: diags,
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();

        let (client_id, client_secret) = match app_credentials_from(&request.current_state) {
            Some(credentials) => credentials,
            None => {
                diags.add_error(
                    "app_config with client_id and client_secret is required in state",
                    None::<String>,
                );
                return ReadResponse {
                    state: None,
                    diagnostics: diags,
                };
            }
        };

        let client = match self
            .config
            .authenticated_client(&client_id, &client_secret, "")
            .await
        {
            Ok(client) => client,
            Err(e) if e.is_unauthorized() => {
                // Credentials were revoked server-side, drop from state
                return ReadResponse {
                    state: None,
                    diagnostics: diags,
                };
            }
            Err(e) => {
                diags.add_error(format!("Unable to create new client: {}", e), None::<String>);
                return ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                };
            }
        };

        match client.verify_app_credentials().await {
            Ok(_) => ReadResponse {
                state: Some(request.current_state),
                diagnostics: diags,
            },
            Err(e) if e.is_unauthorized() => ReadResponse {
                state: None,
                diagnostics: diags,
            },
            Err(e) => {
                diags.add_error(
                    format!("Unable to verify application credentials: {}", e),
                    None::<String>,
                );
                ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                }
            }
        }
    }

    async fn update(&self, request: UpdateRequest) -> UpdateResponse {
        let mut diags = Diagnostics::new();

        // Changed inputs mean a fresh registration, the server keeps no
        // handle we could mutate in place
        let state = self.register(&request.config, &mut diags).await;

        UpdateResponse {
            state: state.unwrap_or(request.current_state),
            diagnostics: diags,
        }
    }

    async fn delete(&self, _request: DeleteRequest) -> DeleteResponse {
        // Mastodon has no endpoint to unregister an application
        DeleteResponse {
            diagnostics: Diagnostics::new(),
        }
    }
}
