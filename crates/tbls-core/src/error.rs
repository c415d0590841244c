//! Error types for threshold BLS orchestration

use crate::PartyId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating, storing, signing with or
/// aggregating threshold key material
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid party/threshold configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persisted record does not exist
    #[error("Record not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Persisted record could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted record does not parse
    #[error("Malformed record: {0}")]
    Format(String),

    /// Persisted record parsed but carries no shares/signatures
    #[error("Record has no entries: {0}")]
    EmptyRecord(String),

    /// Required input sequence is empty or has an empty entry
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Signature shares and party ids are not positionally paired
    #[error("Length mismatch: {sigs} signature shares, {ids} party ids")]
    LengthMismatch { sigs: usize, ids: usize },

    /// The same party id appears twice in an aggregation request
    #[error("Duplicate party ID: {0}")]
    DuplicatePartyId(PartyId),

    /// Party id outside the configured set
    #[error("Invalid party ID: {0}")]
    InvalidPartyId(PartyId),

    /// Threshold requirements not met
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: usize, actual: usize },

    /// Message could not be routed to its recipient
    #[error("Addressing error: {0}")]
    Addressing(String),

    /// A party's protocol run failed
    #[error("Protocol error at party {party}: {reason}")]
    Protocol { party: PartyId, reason: String },

    /// Cryptographic operation failed inside the provider
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Key generation finished with parties that produced no share
    #[error("DKG incomplete: no share from parties {missing:?}")]
    DkgIncomplete { missing: Vec<PartyId> },

    /// Parties disagree on the threshold public key
    #[error("Threshold public key of party {party} differs from party {reference}")]
    PublicKeyMismatch { party: PartyId, reference: PartyId },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Timeout waiting for a protocol run
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Protocol run was cancelled by the caller
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error comes from a persisted record being missing,
    /// unreadable or malformed
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_)
                | Error::NotFound(_)
                | Error::Io(_)
                | Error::Format(_)
                | Error::EmptyRecord(_)
        )
    }

    /// Whether the error comes from malformed caller input, as opposed to a
    /// protocol or cryptographic failure
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput(_)
                | Error::LengthMismatch { .. }
                | Error::DuplicatePartyId(_)
                | Error::InvalidPartyId(_)
                | Error::ThresholdNotMet { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Format(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Format(format!("invalid base64: {}", e))
    }
}

impl From<ark_serialize::SerializationError> for Error {
    fn from(e: ark_serialize::SerializationError) -> Self {
        Error::Crypto(e.to_string())
    }
}
