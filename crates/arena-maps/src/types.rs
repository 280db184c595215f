//! The in-memory object model of a map document.
//!
//! Only vector data survives loading: map dimensions, properties, and the
//! object layers with their shapes. Tile layers and tileset images are
//! never materialized.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::MapError;

/// String properties attached to a map, layer, or object.
pub type Properties = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Orientation
// ---------------------------------------------------------------------------

/// How the map's tile grid is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Orthogonal,
    Isometric,
    Staggered,
    Hexagonal,
}

impl FromStr for Orientation {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orthogonal" => Ok(Self::Orthogonal),
            "isometric" => Ok(Self::Isometric),
            "staggered" => Ok(Self::Staggered),
            "hexagonal" => Ok(Self::Hexagonal),
            other => Err(MapError::Malformed(format!(
                "unknown orientation \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orthogonal => write!(f, "orthogonal"),
            Self::Isometric => write!(f, "isometric"),
            Self::Staggered => write!(f, "staggered"),
            Self::Hexagonal => write!(f, "hexagonal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// A 2D point in scaled map units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The geometry of a map object. Exactly one variant per object.
///
/// Polygon and polyline vertices are relative to `origin`, as authored.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rectangle {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Ellipse {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Polygon {
        origin: Point,
        points: Vec<Point>,
    },
    Polyline {
        origin: Point,
        points: Vec<Point>,
    },
}

impl Shape {
    /// The object's anchor: top-left for boxes, origin for vertex shapes.
    pub fn origin(&self) -> Point {
        match self {
            Self::Rectangle { x, y, .. } | Self::Ellipse { x, y, .. } => {
                Point::new(*x, *y)
            }
            Self::Polygon { origin, .. } | Self::Polyline { origin, .. } => {
                *origin
            }
        }
    }

    /// The geometric center in map coordinates.
    ///
    /// Boxes use their midpoint; vertex shapes use the mean of their
    /// vertices offset by the origin.
    pub fn center(&self) -> Point {
        match self {
            Self::Rectangle {
                x,
                y,
                width,
                height,
            }
            | Self::Ellipse {
                x,
                y,
                width,
                height,
            } => Point::new(x + width / 2.0, y + height / 2.0),
            Self::Polygon { origin, points } | Self::Polyline { origin, points } => {
                if points.is_empty() {
                    return *origin;
                }
                let n = points.len() as f32;
                let (sx, sy) = points
                    .iter()
                    .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
                Point::new(origin.x + sx / n, origin.y + sy / n)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Objects and layers
// ---------------------------------------------------------------------------

/// One object from an object layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub name: Option<String>,
    /// The object's `type` tag, e.g. `"spawn"` or `"wall"`.
    pub kind: Option<String>,
    pub visible: bool,
    /// Tile-graphic reference, kept for consumers that care.
    pub gid: Option<u32>,
    /// Document properties merged over the synthesized `x`/`y`/`type`/`gid`.
    pub properties: Properties,
    pub shape: Shape,
}

impl MapObject {
    /// Returns `true` if the object's type tag equals `kind`.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
}

/// A named, ordered group of objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectLayer {
    pub name: Option<String>,
    pub properties: Properties,
    pub objects: Vec<MapObject>,
}

/// Everything the server keeps from one map document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapDescriptor {
    pub orientation: Option<Orientation>,
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    pub background_color: Option<String>,
    pub properties: Properties,
    /// Object layers in document order.
    pub layers: Vec<ObjectLayer>,
}

impl MapDescriptor {
    /// Map width in pixels. Widened so any `u32` pair fits.
    pub fn pixel_width(&self) -> u64 {
        u64::from(self.width) * u64::from(self.tile_width)
    }

    /// Map height in pixels.
    pub fn pixel_height(&self) -> u64 {
        u64::from(self.height) * u64::from(self.tile_height)
    }

    /// Returns the first layer with the given name.
    pub fn layer(&self, name: &str) -> Option<&ObjectLayer> {
        self.layers.iter().find(|l| l.name.as_deref() == Some(name))
    }

    /// Iterates over objects of the given type across all layers, in
    /// layer order then document order.
    pub fn objects_of_kind<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = &'a MapObject> + 'a {
        self.layers
            .iter()
            .flat_map(|l| l.objects.iter())
            .filter(move |o| o.is_kind(kind))
    }
}
