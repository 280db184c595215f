//! Packets and the protocol families they belong to.
//!
//! Every message on the wire is a JSON object whose `type` tag names the
//! packet kind. The remaining fields are the packet body, which the
//! dispatch layer moves without looking inside:
//!
//! ```text
//! { "type": "CastSpell", "spell": "fireball", "x": 120, "y": 48 }
//!    └── kind ───────┘    └────────────── body ──────────────┘
//! ```
//!
//! Only the handler that owns a kind reads its fields, through
//! [`Packet::field`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// ProtocolFamily
// ---------------------------------------------------------------------------

/// The three disjoint groups of packets, one per domain manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    /// Session establishment: login, logout, keep-alive.
    Connection,
    /// Matchmaking: lobbies, map selection, game start.
    Lobby,
    /// Traffic inside a running game.
    Game,
}

impl ProtocolFamily {
    /// All families, in disconnect-notification order.
    pub const ALL: [ProtocolFamily; 3] = [Self::Connection, Self::Lobby, Self::Game];
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Lobby => write!(f, "lobby"),
            Self::Game => write!(f, "game"),
        }
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A single protocol message: a kind tag plus an opaque JSON body.
///
/// `#[serde(flatten)]` keeps the body at the same level as the tag, so the
/// wire shape is a flat object rather than `{ "type": .., "body": {..} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// The packet kind, e.g. `"Login"` or `"CastSpell"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// All other fields of the message.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Packet {
    /// Creates a packet of the given kind with an empty body.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            body: Map::new(),
        }
    }

    /// Adds a field to the body, replacing any previous value.
    ///
    /// The key `type` is reserved for the kind tag and is ignored here.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != "type" {
            self.body.insert(key.to_string(), value.into());
        }
        self
    }

    /// Returns the raw value of a field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Reads a required field and converts it to `T`.
    ///
    /// # Errors
    /// - [`ProtocolError::MissingField`] when the field is absent
    /// - [`ProtocolError::InvalidField`] when it cannot be converted
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<T, ProtocolError> {
        let value = self.body.get(key).ok_or_else(|| ProtocolError::MissingField {
            kind: self.kind.clone(),
            field: key.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|source| {
            ProtocolError::InvalidField {
                kind: self.kind.clone(),
                field: key.to_string(),
                source,
            }
        })
    }

    /// Reads an optional field; absent and `null` both yield `None`.
    pub fn optional_field<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, ProtocolError> {
        match self.body.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.field(key).map(Some),
        }
    }
}
