use thiserror::Error;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Session expired")]
    SessionExpired,
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Connection error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Export error: {0}")]
    Export(#[from] csv::Error),
    #[error("{0}")]
    Invalid(String),
}

impl ClientError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// True for errors that end the current session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
