use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Authentication failed: {status}: {message}")]
    AuthenticationFailed { status: u16, message: String },

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ApiError {
    /// True when the server rejected the request credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::AuthenticationFailed { status: 401, .. } | ApiError::Api { status: 401, .. }
        )
    }
}
