use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed inbound payload: {0}")]
    Payload(String),

    #[error("Conversions endpoint rejected event (status {status}): {body}")]
    Delivery { status: u16, body: String },

    #[error("Delivery failed after {attempts} attempts: {message}")]
    DeliveryExhausted { attempts: u32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
