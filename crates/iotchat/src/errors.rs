use thiserror::Error;

use crate::thingsboard::ThingsBoardError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("Could not extract structured output: {0}")]
    Extraction(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures raised inside a device tool before they are folded into a `ToolResult`
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Entity ID is required and no default entity ID configured")]
    MissingEntityId,

    #[error(transparent)]
    ThingsBoard(#[from] ThingsBoardError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
