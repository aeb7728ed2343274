//! Error types for the paper trading client

use solana_sdk::signature::Signature;

/// Errors surfaced by the client engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No signing capability is attached to the session
    #[error("No signing capability available")]
    NoSigner,

    /// A signing capability exists but refused or failed to sign
    #[error("Signing failed: {0}")]
    SigningUnavailable(String),

    /// Client-side balance pre-check failed before submission
    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: f64, available: f64 },

    /// Operation needs a trading account that has not been initialized
    #[error("Trading account not initialized for pair index {pair_index}")]
    AccountNotInitialized { pair_index: u8 },

    /// Pair symbol or index outside the fixed catalog
    #[error("Unknown trading pair: {0}")]
    UnknownPair(String),

    /// On-chain record bytes do not match the expected fixed layout
    #[error("Malformed {record} record: {reason}")]
    MalformedRecord {
        record: &'static str,
        reason: String,
    },

    /// A record the operation depends on does not exist on either venue
    #[error("No {record} record at {address}")]
    RecordNotFound {
        record: &'static str,
        address: String,
    },

    /// Value cannot be represented as a scaled u64
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    /// Instruction arguments could not be serialized
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Venue rejected the broadcast because the signature was seen before
    #[error("Transaction already processed by {venue}")]
    DuplicateSubmission { venue: String },

    /// Duplicate rejection with no visible confirmation for the signature.
    /// The transaction may still land; the caller decides when to retry.
    #[error("Submission {signature} is ambiguous, wait before retrying")]
    RetryableAmbiguous { signature: Signature },

    /// Transport-level venue fault (connection, timeout, RPC failure)
    #[error("Venue {venue} unavailable: {reason}")]
    VenueUnavailable { venue: String, reason: String },

    /// The program rejected the transaction; the reason passes through unchanged
    #[error("Transaction rejected: {reason}")]
    Rejected { reason: String },

    /// Session keypair could not be loaded or persisted
    #[error("Key store error: {0}")]
    KeyStore(String),

    /// Configuration problem
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl EngineError {
    /// Stable machine-readable code for logs and callers
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::NoSigner => "NO_SIGNER",
            EngineError::SigningUnavailable(_) => "SIGNING_UNAVAILABLE",
            EngineError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            EngineError::AccountNotInitialized { .. } => "ACCOUNT_NOT_INITIALIZED",
            EngineError::UnknownPair(_) => "UNKNOWN_PAIR",
            EngineError::MalformedRecord { .. } => "MALFORMED_RECORD",
            EngineError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            EngineError::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            EngineError::Encoding(_) => "ENCODING_ERROR",
            EngineError::DuplicateSubmission { .. } => "DUPLICATE_SUBMISSION",
            EngineError::RetryableAmbiguous { .. } => "RETRYABLE_AMBIGUOUS",
            EngineError::VenueUnavailable { .. } => "VENUE_UNAVAILABLE",
            EngineError::Rejected { .. } => "TRANSACTION_REJECTED",
            EngineError::KeyStore(_) => "KEY_STORE_ERROR",
            EngineError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the same call may succeed if repeated later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::RetryableAmbiguous { .. } | EngineError::VenueUnavailable { .. }
        )
    }
}

// Convenient type alias
pub type Result<T> = std::result::Result<T, EngineError>;
