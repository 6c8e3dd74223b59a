use super::client::{check_response, Client};
use super::error::ApiError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub acct: String,
    pub display_name: String,
    pub created_at: String,
    pub url: String,
    #[serde(default)]
    pub discoverable: Option<bool>,
}

impl Client {
    pub async fn get_account(&self, id: &str) -> Result<Account, ApiError> {
        let response = self.get(&format!("/api/v1/accounts/{}", id)).send().await?;
        let response = check_response(response).await?;

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::client::ProviderConfig;
    use super::*;
    use mockito::Server;

    fn client_for(server: &Server) -> Client {
        let domain = server.url().trim_start_matches("http://").to_string();
        ProviderConfig::new(&domain, false)
            .unwrap()
            .unauthenticated_client()
    }

    #[tokio::test]
    async fn get_account_parses_response() {
        let mut server = Server::new_async().await;
        let mock = server
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

        let client = client_for(&server);
        let account = client.get_account("1").await.unwrap();

        assert_eq!(account.id, "1");
        assert_eq!(account.username, "admin");
        assert_eq!(account.acct, "admin");
        assert_eq!(account.display_name, "The Admin");
        assert_eq!(account.url, "https://fedi.example/@admin");
        assert_eq!(account.discoverable, Some(true));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_account_surfaces_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/accounts/999")
            .with_status(404)
            .with_body(r#"{"error":"Record not found"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client.get_account("999").await;

        match result {
            Err(ApiError::Api { status: 404, .. }) => {}
            other => panic!("Expected 404 Api error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn get_account_tolerates_missing_discoverable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/accounts/2")
            .with_body(
                r#"{
                    "id": "2",
                    "username": "bot",
                    "acct": "bot",
                    "display_name": "",
                    "created_at": "2022-05-01T00:00:00.000Z",
                    "url": "https://fedi.example/@bot"
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let account = client.get_account("2").await.unwrap();
        assert_eq!(account.discoverable, None);
    }
}
