// Error types shared by every layer of the bot
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    /// The server answered with a non-success HTTP status.
    #[error("{endpoint} failed with status {status}")]
    Transport { status: u16, endpoint: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A response was missing a field we depend on, or had the wrong shape.
    #[error("Unexpected response shape: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    Socket(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Combat script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for BotError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BotError::Socket(err.to_string())
    }
}

impl BotError {
    pub fn protocol(message: impl Into<String>) -> Self {
        BotError::Protocol(message.into())
    }
}
