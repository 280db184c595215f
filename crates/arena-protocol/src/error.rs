//! Error types for the protocol layer.

use crate::ProtocolFamily;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a packet into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a packet).
    ///
    /// Common causes: malformed JSON, a missing `type` tag, or a
    /// truncated message.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A packet lacks a field its handler requires.
    #[error("{kind} packet is missing field `{field}`")]
    MissingField { kind: String, field: String },

    /// A packet field is present but has the wrong shape.
    #[error("{kind} packet has invalid field `{field}`: {source}")]
    InvalidField {
        kind: String,
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// A packet kind was registered under two different families.
    #[error(
        "packet kind {kind} already registered as {existing}, not {requested}"
    )]
    ConflictingRegistration {
        kind: String,
        existing: ProtocolFamily,
        requested: ProtocolFamily,
    },
}
