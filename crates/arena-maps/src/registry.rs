//! The map registry: the catalog with every playable map materialized.
//!
//! Built once at startup and read-only afterwards, so it is shared as
//! `Arc<MapRegistry>` between any number of readers without locking.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use rand::Rng;

use crate::{MAP_CATALOG, MapDescriptor, MapEntry, MapError, parse_map};

// ---------------------------------------------------------------------------
// MapSource
// ---------------------------------------------------------------------------

/// Resolves a catalog name to the text of its map document.
pub trait MapSource {
    fn read_document(&self, name: &str) -> Result<String, MapError>;
}

/// Reads `<root>/<name>.tmx` from disk.
#[derive(Debug, Clone)]
pub struct MapDirectory {
    root: PathBuf,
}

impl MapDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MapSource for MapDirectory {
    fn read_document(&self, name: &str) -> Result<String, MapError> {
        let path = self.root.join(format!("{name}.tmx"));
        std::fs::read_to_string(&path).map_err(|source| MapError::Io { path, source })
    }
}

/// In-memory documents keyed by map name.
impl MapSource for HashMap<String, String> {
    fn read_document(&self, name: &str) -> Result<String, MapError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| MapError::NotFound(name.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MapInfo
// ---------------------------------------------------------------------------

/// A catalog entry plus its geometry, once bound.
#[derive(Debug)]
pub struct MapInfo {
    index: i32,
    name: &'static str,
    player_limit: u32,
    descriptor: OnceLock<Arc<MapDescriptor>>,
}

impl MapInfo {
    /// Creates an unbound entry.
    pub fn new(entry: &MapEntry) -> Self {
        Self {
            index: entry.index,
            name: entry.name,
            player_limit: entry.player_limit,
            descriptor: OnceLock::new(),
        }
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn player_limit(&self) -> u32 {
        self.player_limit
    }

    pub fn is_reserved(&self) -> bool {
        self.index < 0
    }

    /// Binds the entry's geometry.
    ///
    /// The slot is set-once: returns `false` and keeps the existing
    /// descriptor if one was already bound.
    pub fn bind(&self, descriptor: MapDescriptor) -> bool {
        let bound = self.descriptor.set(Arc::new(descriptor)).is_ok();
        if !bound {
            tracing::debug!(map = self.name, "descriptor already bound, ignoring rebind");
        }
        bound
    }

    /// Returns the bound geometry, if any.
    pub fn descriptor(&self) -> Option<&Arc<MapDescriptor>> {
        self.descriptor.get()
    }
}

// ---------------------------------------------------------------------------
// MapRegistry
// ---------------------------------------------------------------------------

/// All playable maps with their geometry, plus the reserved sentinels.
#[derive(Debug)]
pub struct MapRegistry {
    /// Playable entries (index >= 0) in catalog order.
    maps: Vec<MapInfo>,
    /// Sentinel entries; visible to `lookup` only.
    reserved: Vec<MapInfo>,
}

impl MapRegistry {
    /// Builds the registry from [`MAP_CATALOG`].
    pub fn initialize(source: &impl MapSource) -> Result<Self, MapError> {
        Self::from_entries(MAP_CATALOG, source)
    }

    /// Builds a registry from an arbitrary catalog table.
    ///
    /// Every non-reserved entry is read from `source` and parsed. The
    /// first failure aborts the whole build.
    ///
    /// # Errors
    /// - [`MapError::DuplicateIndex`] if two entries share an index
    /// - [`MapError::Load`] wrapping the read or parse failure of an entry
    pub fn from_entries(
        entries: &[MapEntry],
        source: &impl MapSource,
    ) -> Result<Self, MapError> {
        let mut seen = HashSet::new();
        let mut maps = Vec::new();
        let mut reserved = Vec::new();

        for entry in entries {
            if !seen.insert(entry.index) {
                return Err(MapError::DuplicateIndex(entry.index));
            }
            let info = MapInfo::new(entry);
            if entry.is_reserved() {
                reserved.push(info);
                continue;
            }

            let descriptor = source
                .read_document(entry.name)
                .and_then(|text| parse_map(&text))
                .map_err(|e| MapError::Load {
                    name: entry.name.to_string(),
                    source: Box::new(e),
                })?;
            tracing::debug!(
                map = entry.name,
                index = entry.index,
                layers = descriptor.layers.len(),
                "map loaded"
            );
            info.bind(descriptor);
            maps.push(info);
        }

        tracing::info!(maps = maps.len(), "map registry initialized");
        Ok(Self { maps, reserved })
    }

    /// Number of playable maps.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Playable maps in catalog order.
    pub fn maps(&self) -> &[MapInfo] {
        &self.maps
    }

    /// Picks a playable map uniformly at random.
    ///
    /// Returns `None` only for an empty registry.
    pub fn random_map<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&MapInfo> {
        if self.maps.is_empty() {
            return None;
        }
        Some(&self.maps[rng.random_range(0..self.maps.len())])
    }

    /// Picks a playable map that is not `excluding_index` and supports at
    /// least `minimum_capacity` players.
    ///
    /// Starts at a uniformly random entry and scans forward in catalog
    /// order, wrapping around, until an entry qualifies. The scan stops
    /// after one full lap and returns `None` if nothing qualifies.
    pub fn random_map_excluding<R: Rng + ?Sized>(
        &self,
        excluding_index: i32,
        minimum_capacity: u32,
        rng: &mut R,
    ) -> Option<&MapInfo> {
        let len = self.maps.len();
        if len == 0 {
            return None;
        }
        let start = rng.random_range(0..len);
        (0..len)
            .map(|step| &self.maps[(start + step) % len])
            .find(|m| m.index != excluding_index && m.player_limit >= minimum_capacity)
    }

    /// Finds an entry by index, sentinels included.
    pub fn lookup(&self, index: i32) -> Option<&MapInfo> {
        self.maps
            .iter()
            .chain(self.reserved.iter())
            .find(|m| m.index == index)
    }
}
