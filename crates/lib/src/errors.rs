use core_access::CoreAccessError;
use thiserror::Error;

/// Errors raised by the domain operations of the take-back workflow.
///
/// Any of these returned from inside a write transaction causes the whole
/// transaction to roll back.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed or inconsistent input (bad dates, unknown references, negative counts).
    #[error("{0}")]
    Validation(String),
    /// An unrecognised tag, such as an unknown reviewer action.
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    /// The entity is not in a state that allows the requested transition.
    #[error("{0}")]
    Conflict(String),
    #[error("Voucher đã hết hạn")]
    Expired,
    #[error("Voucher đã hết")]
    Depleted,
    #[error("Không đủ điểm")]
    InsufficientPoints { required: i64, available: i64 },
    #[error(transparent)]
    Access(#[from] CoreAccessError),
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Nobody is around to handle the request, e.g. no support staff to chat with.
    #[error("{0}")]
    NoOneAvailable(String),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
    #[error("Failed to serialize data: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }
}

/// Errors from the external chatbot service. Callers turn these into
/// apology text for the user; they never surface as request failures.
#[derive(Error, Debug)]
pub enum ChatbotError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Chatbot request timed out")]
    Timeout,
    #[error("Failed to send request to chatbot: {0}")]
    Request(reqwest::Error),
    #[error("Chatbot returned HTTP {0}")]
    Status(u16),
    #[error("Failed to deserialize chatbot response: {0}")]
    Deserialization(reqwest::Error),
    #[error("Chatbot response did not contain a reply")]
    EmptyReply,
}
