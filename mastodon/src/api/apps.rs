use super::client::{check_response, Client};
use super::error::ApiError;
use serde::Deserialize;

/// Registration request for a new OAuth application
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_name: String,
    pub redirect_uris: String,
    pub scopes: String,
    pub website: Option<String>,
}

/// A registered OAuth application with its credentials
#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Response of the credential verification endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AppCredentials {
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
}

impl Client {
    pub async fn register_app(&self, app: &AppConfig) -> Result<Application, ApiError> {
        tracing::debug!(client_name = %app.client_name, "registering application");

        let mut params = vec![
            ("client_name", app.client_name.as_str()),
            ("redirect_uris", app.redirect_uris.as_str()),
            ("scopes", app.scopes.as_str()),
        ];
        if let Some(website) = &app.website {
            params.push(("website", website.as_str()));
        }

        let response = self.post("/api/v1/apps").form(&params).send().await?;
        let response = check_response(response).await?;

        Ok(response.json().await?)
    }

    /// Confirm the client's access token is still valid. Requires auth.
    pub async fn verify_app_credentials(&self) -> Result<AppCredentials, ApiError> {
        let response = self.get("/api/v1/apps/verify_credentials").send().await?;
        let response = check_response(response).await?;

        Ok(response.json().await?)
    }
}
