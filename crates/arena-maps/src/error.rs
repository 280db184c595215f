//! Error types for map loading.

use std::path::PathBuf;

/// Errors that can occur while loading map documents or building the
/// registry.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// The document file could not be read.
    #[error("cannot read map document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("map document is not well-formed: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The document is well-formed but violates the map format, e.g. a
    /// non-numeric width or a broken vertex list.
    #[error("malformed map: {0}")]
    Malformed(String),

    /// A map source has no document for the requested name.
    #[error("no document for map {0}")]
    NotFound(String),

    /// Two catalog entries share an index.
    #[error("duplicate map index {0} in catalog")]
    DuplicateIndex(i32),

    /// Loading one catalog entry failed.
    #[error("failed to load map {name}: {source}")]
    Load {
        name: String,
        #[source]
        source: Box<MapError>,
    },
}
