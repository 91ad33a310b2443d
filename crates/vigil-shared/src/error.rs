//! Error types for Vigil.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Access denied opening log '{0}'. Re-run with elevated privileges to read protected logs.")]
    AccessDenied(String),

    #[error("Log read error: {0}")]
    LogRead(String),

    #[error("Reasoning service error: {0}")]
    Service(String),

    #[error("Malformed plan: {0}")]
    Parse(String),

    #[error("Plan is missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VigilError {
    /// Render this error as a terminal assistant turn. Errors never abort
    /// the session; they come back as a marked chat message so the user
    /// can retry.
    pub fn user_message(&self) -> String {
        format!("⚠️ {}", self)
    }
}
