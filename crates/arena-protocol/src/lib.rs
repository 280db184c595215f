//! Wire protocol for the arena server.
//!
//! - **Packets** ([`Packet`], [`ProtocolFamily`]): what travels on the
//!   wire and which of the three families it belongs to.
//! - **Registry** ([`PacketRegistry`]): the static kind → family table
//!   the dispatch core routes by.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes ↔ packets.
//! - **Managers** ([`Manager`], [`Peer`]): the contract the dispatch core
//!   drives and the handle managers use to reply.
//!
//! ```text
//! Transport (bytes) → Codec (Packet) → Registry (family) → Manager
//! ```

mod codec;
mod error;
mod manager;
mod packet;
mod registry;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use manager::{Manager, Peer};
pub use packet::{Packet, ProtocolFamily};
pub use registry::{PacketRegistry, STANDARD_PACKETS, kinds};
