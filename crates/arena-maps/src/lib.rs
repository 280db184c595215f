//! Arena geometry: TMX map loading and the map catalog.
//!
//! - [`parse_map`] turns one TMX document into a [`MapDescriptor`] holding
//!   the map's properties and object layers (spawn points, obstacles,
//!   bounds). Tile graphics are discarded.
//! - [`MapDirectory`] reads documents from disk for the registry.
//! - [`MapRegistry`] materializes every map in [`MAP_CATALOG`] at startup
//!   and answers random-map queries for new game sessions.

mod catalog;
mod error;
mod parser;
mod registry;
mod types;

pub use catalog::{MAP_CATALOG, MapChoice, MapEntry, RANDOM_INDEX, RANDOM_NO_REPEAT_INDEX};
pub use error::MapError;
pub use parser::{UNIT_SCALE, parse_map};
pub use registry::{MapDirectory, MapInfo, MapRegistry, MapSource};
pub use types::{MapDescriptor, MapObject, ObjectLayer, Orientation, Point, Properties, Shape};
