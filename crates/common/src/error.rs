use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Upstream provider rejected the request or returned an error payload.
    /// `status` is forwarded to API clients.
    #[error("{message}")]
    Provider { status: u16, message: String },

    #[error("Twelve Data integration is disabled")]
    ProviderDisabled,

    #[error("Unsupported symbol: {0}")]
    UnsupportedSymbol(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Notify(String),

    #[error("{0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Error::Provider {
            status,
            message: message.into(),
        }
    }

    /// HTTP status an API handler should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Provider { status, .. } => *status,
            Error::ProviderDisabled => 503,
            Error::UnsupportedSymbol(_) => 400,
            Error::Json(_) => 502,
            _ => 500,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
