use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("student {student} already owns lesson {lesson} of course {course}")]
    AlreadyOwned {
        student: String,
        course: String,
        lesson: String,
    },

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Payment gateway timed out for reference {reference}")]
    GatewayTimeout { reference: String },

    #[error("Payment gateway rejected reference {reference}: {reason}")]
    GatewayRejected { reference: String, reason: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Write conflict on {entity} {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Errors worth retrying with a fresh attempt or a fresh read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayTimeout { .. } | Self::Conflict { .. })
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
