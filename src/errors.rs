/// Domain-specific error types for the wheel analytics engine.
///
/// Validation errors are the caller's problem and propagate out of `analyze()`.
/// Model errors are downgraded to warnings by the analyzers.
/// Everything else comes from the brokerage collaborators.
#[derive(Debug, thiserror::Error)]
pub enum WheelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("probability model error: {0}")]
    Model(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("broker API error: {status} {body}")]
    BrokerApi { status: u16, body: String },

    #[error("auth error: {0}")]
    Auth(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for WheelError {
    fn from(e: reqwest::Error) -> Self {
        WheelError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for WheelError {
    fn from(e: serde_json::Error) -> Self {
        WheelError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for WheelError {
    fn from(e: std::io::Error) -> Self {
        WheelError::Storage(e.to_string())
    }
}

pub type WheelResult<T> = Result<T, WheelError>;
