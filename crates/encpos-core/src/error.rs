use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed parameter: {0}")]
    MalformedParameter(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid aggregation cap: {0}")]
    AggregationCapParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self { Self::MalformedParameter(msg.into()) }

    pub fn backend(msg: impl Into<String>) -> Self { Self::Backend(msg.into()) }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self { Self::Backend(format!("unexpected response shape: {}", e)) }
}

pub type Result<T> = std::result::Result<T, Error>;
