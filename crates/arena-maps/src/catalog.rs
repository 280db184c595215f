//! The fixed table of maps the server knows about.

/// Index of the "pick any map at random" sentinel.
pub const RANDOM_INDEX: i32 = -2;

/// Index of the "pick at random, but not the map just played" sentinel.
pub const RANDOM_NO_REPEAT_INDEX: i32 = -1;

/// One row of the map catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntry {
    /// Logical index; negative values are reserved sentinels.
    pub index: i32,
    /// Canonical file stem; the document is `<name>.tmx`.
    pub name: &'static str,
    /// Maximum number of players the map supports.
    pub player_limit: u32,
}

impl MapEntry {
    /// Returns `true` for the sentinel rows, which have no document.
    pub const fn is_reserved(&self) -> bool {
        self.index < 0
    }
}

/// Every map the server ships, sentinels first.
pub const MAP_CATALOG: &[MapEntry] = &[
    MapEntry {
        index: RANDOM_INDEX,
        name: "random",
        player_limit: 8,
    },
    MapEntry {
        index: RANDOM_NO_REPEAT_INDEX,
        name: "random_no_repeat",
        player_limit: 8,
    },
    MapEntry {
        index: 0,
        name: "arena",
        player_limit: 4,
    },
    MapEntry {
        index: 1,
        name: "islands",
        player_limit: 6,
    },
    MapEntry {
        index: 2,
        name: "crossroads",
        player_limit: 8,
    },
    MapEntry {
        index: 3,
        name: "pillars",
        player_limit: 4,
    },
];

/// How a lobby wants its next map picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapChoice {
    /// Any playable map.
    Random,
    /// Any playable map except the one played last.
    #[default]
    RandomNoRepeat,
    /// A specific catalog index.
    Fixed(i32),
}

impl MapChoice {
    /// Interprets a client-supplied map index, mapping the sentinels.
    pub fn from_index(index: i32) -> Self {
        match index {
            RANDOM_INDEX => Self::Random,
            RANDOM_NO_REPEAT_INDEX => Self::RandomNoRepeat,
            other => Self::Fixed(other),
        }
    }

    /// The catalog index this choice corresponds to.
    pub fn index(self) -> i32 {
        match self {
            Self::Random => RANDOM_INDEX,
            Self::RandomNoRepeat => RANDOM_NO_REPEAT_INDEX,
            Self::Fixed(index) => index,
        }
    }
}
