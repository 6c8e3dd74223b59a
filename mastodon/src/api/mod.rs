//! Mastodon REST API client

mod accounts;
mod apps;
mod client;
mod error;
mod instance;

pub use accounts::Account;
pub use apps::{AppConfig, AppCredentials, Application};
pub use client::{Client, ProviderConfig};
pub use error::ApiError;
pub use instance::Instance;
