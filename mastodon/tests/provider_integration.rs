use mastodon::MastodonProvider;
use mockito::Server;
use serial_test::serial;
use std::collections::HashMap;
use tfplug::request::{ConfigureRequest, CreateRequest, DeleteRequest, ReadRequest};
use tfplug::types::Config;
use tfplug::{Context, DataSource as _, Dynamic, Provider, Resource as _, State};

fn config_for_server(server: &Server) -> Config {
    let domain = server.url().trim_start_matches("http://").to_string();

    let mut values = HashMap::new();
    values.insert("domain".to_string(), Dynamic::String(domain));
    values.insert("use_https".to_string(), Dynamic::Bool(false));
    Config { values }
}

async fn configured_provider(server: &Server) -> MastodonProvider {
    let mut provider = MastodonProvider::new();
    let response = provider
        .configure(ConfigureRequest {
            context: Context::new(),
            config: config_for_server(server),
        })
        .await;
    assert!(!response.diagnostics.has_errors());
    provider
}

#[tokio::test]
async fn account_data_source_reads_through_provider() {
    let mut server = Server::new_async().await;

    let _account_mock = server
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

    let provider = configured_provider(&server).await;
    let data_source = provider
        .create_data_source("mastodon_account")
        .await
        .unwrap();

    let mut values = HashMap::new();
    values.insert("id".to_string(), Dynamic::String("1".to_string()));

    let response = data_source
        .read(ReadRequest {
            context: Context::new(),
            current_state: State { values },
        })
        .await;

    assert!(!response.diagnostics.has_errors());
    let state = response.state.unwrap();
    assert_eq!(state.get_string("username"), Some("admin"));
    assert_eq!(state.get_string("url"), Some("https://fedi.example/@admin"));
}

#[tokio::test]
async fn instance_self_data_source_reads_through_provider() {
    let mut server = Server::new_async().await;

    let _instance_mock = server
        .mock("GET", "/api/v1/instance")
        .with_body(
            r#"{
                "uri": "fedi.example",
                "title": "Example Fediverse",
                "email": "admin@fedi.example",
                "version": "4.2.0",
                "thumbnail": null
            }"#,
        )
        .create_async()
        .await;

    let provider = configured_provider(&server).await;
    let data_source = provider
        .create_data_source("mastodon_instance_self")
        .await
        .unwrap();

    let response = data_source
        .read(ReadRequest {
            context: Context::new(),
            current_state: State::new(),
        })
        .await;

    assert!(!response.diagnostics.has_errors());
    let state = response.state.unwrap();
    assert_eq!(state.get_string("id"), Some("fedi.example"));
    assert_eq!(state.get_string("version"), Some("4.2.0"));
}

#[tokio::test]
async fn register_app_full_lifecycle() {
    let mut server = Server::new_async().await;

    let _register_mock = server
        .mock("POST", "/api/v1/apps")
        .with_body(
            r#"{
                "id": "563419",
                "client_id": "abc123",
                "client_secret": "shhh",
                "redirect_uri": "urn:ietf:wg:oauth:2.0:oob"
            }"#,
        )
        .create_async()
        .await;

    // The read path runs the OAuth exchange once and caches the token
    let token_mock = server
        .mock("POST", "/oauth/token")
        .with_body(r#"{"access_token":"tok","token_type":"Bearer","scope":"read","created_at":1}"#)
        .expect(1)
        .create_async()
        .await;

    let _verify_mock = server
        .mock("GET", "/api/v1/apps/verify_credentials")
        .match_header("authorization", "Bearer tok")
        .with_body(r#"{"name":"terraform-provider-mastodon","website":null}"#)
        .expect(2)
        .create_async()
        .await;

    let provider = configured_provider(&server).await;
    let resource = provider
        .create_resource("mastodon_register_app")
        .await
        .unwrap();

    let create_response = resource
        .create(CreateRequest {
            context: Context::new(),
            config: Config::new(),
            planned_state: State::new(),
        })
        .await;
    assert!(!create_response.diagnostics.has_errors());

    let created_state = create_response.state;
    assert_eq!(created_state.get_string("id"), Some("563419"));

    // Two reads share the cached token, only one exchange happens
    for _ in 0..2 {
        let read_response = resource
            .read(ReadRequest {
                context: Context::new(),
                current_state: created_state.clone(),
            })
            .await;
        assert!(!read_response.diagnostics.has_errors());
        assert!(read_response.state.is_some());
    }
    token_mock.assert_async().await;

    let delete_response = resource
        .delete(DeleteRequest {
            context: Context::new(),
            current_state: created_state,
        })
        .await;
    assert!(!delete_response.diagnostics.has_errors());
}

#[tokio::test]
async fn register_app_read_drops_revoked_registration() {
    let mut server = Server::new_async().await;

    let _token_mock = server
        .mock("POST", "/oauth/token")
        .with_status(401)
        .with_body(r#"{"error":"invalid_client"}"#)
        .create_async()
        .await;

    let provider = configured_provider(&server).await;
    let resource = provider
        .create_resource("mastodon_register_app")
        .await
        .unwrap();

    let mut app_config = HashMap::new();
    app_config.insert(
        "client_id".to_string(),
        Dynamic::String("gone".to_string()),
    );
    app_config.insert(
        "client_secret".to_string(),
        Dynamic::String("gone".to_string()),
    );
    let mut values = HashMap::new();
    values.insert("id".to_string(), Dynamic::String("563419".to_string()));
    values.insert("app_config".to_string(), Dynamic::Map(app_config));

    let response = resource
        .read(ReadRequest {
            context: Context::new(),
            current_state: State { values },
        })
        .await;

    assert!(!response.diagnostics.has_errors());
    assert!(response.state.is_none());
}

#[tokio::test]
#[serial]
async fn provider_configures_from_env_vars() {
    let mut server = Server::new_async().await;

    let _instance_mock = server
        .mock("GET", "/api/v1/instance")
        .with_body(
            r#"{
                "uri": "fedi.example",
                "title": "Example Fediverse",
                "email": "admin@fedi.example",
                "version": "4.2.0"
            }"#,
        )
        .create_async()
        .await;

    let domain = server.url().trim_start_matches("http://").to_string();
    std::env::set_var("MASTODON_DOMAIN", &domain);
    std::env::set_var("MASTODON_USE_HTTPS", "false");

    let mut provider = MastodonProvider::new();
    let response = provider
        .configure(ConfigureRequest {
            context: Context::new(),
            config: Config::new(),
        })
        .await;
    assert!(!response.diagnostics.has_errors());

    let data_source = provider
        .create_data_source("mastodon_instance_self")
        .await
        .unwrap();
    let read_response = data_source
        .read(ReadRequest {
            context: Context::new(),
            current_state: State::new(),
        })
        .await;
    assert!(read_response.state.is_some());

    std::env::remove_var("MASTODON_DOMAIN");
    std::env::remove_var("MASTODON_USE_HTTPS");
}

#[tokio::test]
#[serial]
async fn provider_requires_domain() {
    std::env::remove_var("MASTODON_DOMAIN");

    let mut provider = MastodonProvider::new();
    let response = provider
        .configure(ConfigureRequest {
            context: Context::new(),
            config: Config::new(),
        })
        .await;

    assert!(response.diagnostics.has_errors());
    assert!(response.diagnostics.errors[0]
        .summary
        .contains("domain is required"));
}

#[tokio::test]
async fn provider_schemas_available_without_configuration() {
    let provider = MastodonProvider::new();

    let provider_schema = provider.provider_schema().await;
    assert!(provider_schema.attributes.contains_key("domain"));
    assert!(provider_schema.attributes.contains_key("use_https"));

    let resource_schemas = provider.resource_schemas().await;
    assert!(resource_schemas.contains_key("mastodon_register_app"));

    let data_source_schemas = provider.data_source_schemas().await;
    assert!(data_source_schemas.contains_key("mastodon_account"));
    assert!(data_source_schemas.contains_key("mastodon_instance_self"));
}
