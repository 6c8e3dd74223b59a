use crate::api::ProviderConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::provider::DataSourceSchema;
use tfplug::request::{ReadRequest, ReadResponse};
use tfplug::{AttributeBuilder, DataSource, Diagnostics, Dynamic, SchemaBuilder, State};

pub struct AccountDataSource {
    config: Arc<ProviderConfig>,
}

impl AccountDataSource {
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self { config }
    }

    pub fn schema_static() -> DataSourceSchema {
        SchemaBuilder::new()
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .required()
                    .description("Account identifier"),
            )
            .attribute(
                "username",
                AttributeBuilder::string("username")
                    .computed()
                    .description("Local username"),
            )
            .attribute(
                "account",
                AttributeBuilder::string("account")
                    .computed()
                    .description("Webfinger account (user or user@domain)"),
            )
            .attribute(
                "display_name",
                AttributeBuilder::string("display_name")
                    .computed()
                    .description("Profile display name"),
            )
            .attribute(
                "created_at",
                AttributeBuilder::string("created_at")
                    .computed()
                    .description("When the account was created"),
            )
            .attribute(
                "url",
                AttributeBuilder::string("url")
                    .computed()
                    .description("Profile URL"),
            )
            .attribute(
                "discoverable",
                AttributeBuilder::bool("discoverable")
                    .computed()
                    .description("Whether the account opted into discovery"),
            )
            .build_data_source(0)
    }
}

#[async_trait]
impl DataSource for AccountDataSource {
    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();

        let id = match request.current_state.get_string("id") {
            Some(id) => id.to_string(),
            None => {
                diags.add_error("id is required", None::<String>);
                return ReadResponse {
                    state: None,
                    diagnostics: diags,
                };
            }
        };

        let client = self.config.unauthenticated_client();
        let account = match client.get_account(&id).await {
            Ok(account) => account,
            Err(e) => {
                diags.add_error(format!("Unable to read account: {}", e), None::<String>);
                return ReadResponse {
                    state: None,
                    diagnostics: diags,
                };
            }
        };

        let mut values = HashMap::new();
        values.insert("id".to_string(), Dynamic::String(account.id));
        values.insert("username".to_string(), Dynamic::String(account.username));
        values.insert("account".to_string(), Dynamic::String(account.acct));
        values.insert(
            "display_name".to_string(),
            Dynamic::String(account.display_name),
        );
        values.insert(
            "created_at".to_string(),
            Dynamic::String(account.created_at),
        );
        values.insert("url".to_string(), Dynamic::String(account.url));
        values.insert(
            "discoverable".to_string(),
            Dynamic::Bool(account.discoverable.unwrap_or(false)),
        );

        ReadResponse {
            state: Some(State { values }),
            diagnostics: diags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tfplug::Context;

    fn config_for(server: &Server) -> Arc<ProviderConfig> {
        let domain = server.url().trim_start_matches("http://").to_string();
        ProviderConfig::new(&domain, false).unwrap()
    }

    fn read_request(id: &str) -> ReadRequest {
        let mut values = HashMap::new();
        values.insert("id".to_string(), Dynamic::String(id.to_string()));
        ReadRequest {
            context: Context::new(),
            current_state: State { values },
        }
    }

    #[test]
    fn schema_requires_id_and_computes_the_rest() {
        let schema = AccountDataSource::schema_static();

        assert!(schema.attributes["id"].required);
        for computed in [
            "username",
            "account",
            "display_name",
            "created_at",
            "url",
            "discoverable",
        ] {
            assert!(schema.attributes[computed].computed, "{}", computed);
        }
    }

    #[tokio::test]
    async fn read_populates_account_attributes() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/accounts/1")
            .with_body(
                r#"{
                    "id": "1",
                    "username": "admin",
                    "acct": "admin",
                    "display_name": "The Admin",
                    "created_at": "2022-05-01T00:00:00.000Z",
                    "url": "https://fedi.example/@admin",
                    "discoverable": true
                }"#,
            )
            .create_async()
            .await;

        let data_source = AccountDataSource::new(config_for(&server));
        let response = data_source.read(read_request("1")).await;

        assert!(response.diagnostics.errors.is_empty());
        let state = response.state.unwrap();
        assert_eq!(state.get_string("username"), Some("admin"));
        assert_eq!(state.get_string("account"), Some("admin"));
        assert_eq!(state.get_string("display_name"), Some("The Admin"));
        assert_eq!(
            state.get_string("url"),
            Some("https://fedi.example/@admin")
        );
        assert_eq!(
            state.values.get("discoverable"),
            Some(&Dynamic::Bool(true))
        );
    }

    #[tokio::test]
    async fn read_reports_api_errors_as_diagnostics() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/accounts/999")
            .with_status(404)
            .with_body(r#"{"error":"Record not found"}"#)
            .create_async()
            .await;

        let data_source = AccountDataSource::new(config_for(&server));
        let response = data_source.read(read_request("999")).await;

        assert!(response.state.is_none());
        assert!(response.diagnostics.has_errors());
        assert!(response.diagnostics.errors[0]
            .summary
            .contains("Unable to read account"));
    }

    #[tokio::test]
    async fn read_requires_id_in_config() {
        let data_source = AccountDataSource::new(ProviderConfig::new("fedi.example", true).unwrap());
        let response = data_source
            .read(ReadRequest {
                context: Context::new(),
                current_state: State::new(),
            })
            .await;

        assert!(response.state.is_none());
        assert!(response.diagnostics.has_errors());
    }
}
