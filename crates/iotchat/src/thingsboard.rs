//! ThingsBoard REST access: configuration, the login token cache and a thin
//! authenticated client used by the device tools.
pub mod auth;
pub mod client;
pub mod config;

pub use auth::ThingsBoardAuth;
pub use client::ThingsBoardClient;
pub use config::ThingsBoardConfig;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThingsBoardError {
    #[error("Failed to authenticate with ThingsBoard: {0}")]
    Auth(String),

    #[error("ThingsBoard API error: {status}. {body}")]
    Api { status: StatusCode, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not decode ThingsBoard response: {0}")]
    Decode(String),
}
