use super::client::{check_response, Client};
use super::error::ApiError;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Instance {
    pub uri: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub email: String,
    pub version: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl Client {
    pub async fn get_instance(&self) -> Result<Instance, ApiError> {
        let response = self.get("/api/v1/instance").send().await?;
        let response = check_response(response).await?;

        Ok(response.json().await?)
    }
}
