use thiserror::Error;

/// Fatal gateway failures. Per-call problems never surface here; they are
/// carried inside the result envelope so the caller always receives a
/// well-formed response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("session initialization failed: {0}")]
    SessionInit(String),
}

/// Argument rejected before any network call was attempted.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Remote call failed: network error or Bot API rejection.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
