use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed; check the connection and try again.";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered 401. The session has already been cleared when this is returned.
    #[error("session expired; sign in again")]
    Unauthorized,
    /// The backend answered `success:false`.
    #[error("{0}")]
    Rejected(ApiError),
    /// Network failure, timeout, or a body that is not a valid envelope.
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("not signed in")]
    NotSignedIn,
    #[error("only administrators may sign in")]
    NotAdmin,
    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}

impl ClientError {
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Rejected(ApiError::new(code, message))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }

    /// Text shown to the operator. Business rejections pass through untouched.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Rejected(err) => err.message.clone(),
            ClientError::Transport(_) => GENERIC_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        ClientError::Transport(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store holds an unreadable session: {0}")]
    Encoding(#[from] serde_json::Error),
}
