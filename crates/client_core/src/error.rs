use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("API response body is empty")]
    EmptyBody,
    #[error("invalid API base url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("session cookie contains characters not allowed in a header")]
    InvalidSessionCookie,
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Builds a status error, preferring the server-provided message.
    pub fn from_status(status: StatusCode, server_message: Option<String>) -> Self {
        let message = server_message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "API request failed: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                )
                .trim_end()
                .to_string()
            });
        Self::Status { status, message }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
