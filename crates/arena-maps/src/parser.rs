//! TMX (Tiled XML) document parser.
//!
//! Reads the `<map>` root attributes, the map's `<properties>`, and every
//! top-level `<objectgroup>`. Everything else in the document (tilesets,
//! tile layers, image layers) is skipped.

use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::{
    MapDescriptor, MapError, MapObject, ObjectLayer, Orientation, Point,
    Properties, Shape,
};

/// Uniform factor applied to every coordinate read from a document.
///
/// Kept at 1.0 so maps stay in source pixel units; change it here to move
/// the whole server to another unit.
pub const UNIT_SCALE: f32 = 1.0;

/// Parses a map document held in memory.
///
/// # Errors
/// - [`MapError::Xml`] if the text is not well-formed XML
/// - [`MapError::Malformed`] if a numeric attribute does not parse, a
///   vertex list is broken, or the root is not `<map>`
pub fn parse_map(document: &str) -> Result<MapDescriptor, MapError> {
    let doc = Document::parse(document)?;
    let root = doc.root_element();
    if !root.has_tag_name("map") {
        return Err(MapError::Malformed(format!(
            "root element is <{}>, expected <map>",
            root.tag_name().name()
        )));
    }

    let orientation = root
        .attribute("orientation")
        .map(Orientation::from_str)
        .transpose()?;

    let layers = root
        .children()
        .filter(|n| n.has_tag_name("objectgroup"))
        .map(parse_layer)
        .collect::<Result<Vec<_>, _>>()?;

    let map = MapDescriptor {
        orientation,
        width: numeric_attr(root, "width")?,
        height: numeric_attr(root, "height")?,
        tile_width: numeric_attr(root, "tilewidth")?,
        tile_height: numeric_attr(root, "tileheight")?,
        background_color: root.attribute("backgroundcolor").map(str::to_string),
        properties: properties_of(root)?,
        layers,
    };

    tracing::debug!(
        layers = map.layers.len(),
        objects = map.layers.iter().map(|l| l.objects.len()).sum::<usize>(),
        "parsed map document"
    );
    Ok(map)
}

fn parse_layer(group: Node<'_, '_>) -> Result<ObjectLayer, MapError> {
    let objects = group
        .children()
        .filter(|n| n.has_tag_name("object"))
        .map(parse_object)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ObjectLayer {
        name: group.attribute("name").map(str::to_string),
        properties: properties_of(group)?,
        objects,
    })
}

fn parse_object(node: Node<'_, '_>) -> Result<MapObject, MapError> {
    let x = numeric_attr::<i32>(node, "x")? as f32 * UNIT_SCALE;
    let y = numeric_attr::<i32>(node, "y")? as f32 * UNIT_SCALE;
    let width = numeric_attr::<i32>(node, "width")? as f32 * UNIT_SCALE;
    let height = numeric_attr::<i32>(node, "height")? as f32 * UNIT_SCALE;

    let shape = if let Some(polygon) = child(node, "polygon") {
        Shape::Polygon {
            origin: Point::new(x, y),
            points: parse_points(polygon)?,
        }
    } else if let Some(polyline) = child(node, "polyline") {
        Shape::Polyline {
            origin: Point::new(x, y),
            points: parse_points(polyline)?,
        }
    } else if child(node, "ellipse").is_some() {
        Shape::Ellipse {
            x,
            y,
            width,
            height,
        }
    } else {
        Shape::Rectangle {
            x,
            y,
            width,
            height,
        }
    };

    let kind = node.attribute("type").map(str::to_string);
    let gid = node
        .attribute("gid")
        .map(|raw| {
            raw.trim().parse::<u32>().map_err(|_| {
                MapError::Malformed(format!("object gid \"{raw}\" is not an integer"))
            })
        })
        .transpose()?;
    // Only the literal "1" counts as visible once the attribute is present.
    let visible = node.attribute("visible").is_none_or(|v| v == "1");

    let mut properties = Properties::new();
    properties.insert("x".to_string(), x.to_string());
    properties.insert("y".to_string(), y.to_string());
    if let Some(kind) = &kind {
        properties.insert("type".to_string(), kind.clone());
    }
    if let Some(gid) = gid {
        properties.insert("gid".to_string(), gid.to_string());
    }
    // Document properties are merged last and win.
    properties.extend(properties_of(node)?);

    Ok(MapObject {
        name: node.attribute("name").map(str::to_string),
        kind,
        visible,
        gid,
        properties,
        shape,
    })
}

/// Parses a `points="x,y x,y ..."` attribute into scaled vertices.
fn parse_points(node: Node<'_, '_>) -> Result<Vec<Point>, MapError> {
    let tag = node.tag_name().name();
    let raw = node.attribute("points").ok_or_else(|| {
        MapError::Malformed(format!("<{tag}> has no points attribute"))
    })?;

    let points = raw
        .split_whitespace()
        .map(|token| -> Result<Point, MapError> {
            let (px, py) = token.split_once(',').ok_or_else(|| {
                MapError::Malformed(format!("<{tag}> vertex \"{token}\" is not an x,y pair"))
            })?;
            let coord = |v: &str| {
                v.parse::<i32>().map_err(|_| {
                    MapError::Malformed(format!("<{tag}> vertex \"{token}\" is not numeric"))
                })
            };
            Ok(Point::new(
                coord(px)? as f32 * UNIT_SCALE,
                coord(py)? as f32 * UNIT_SCALE,
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if points.is_empty() {
        return Err(MapError::Malformed(format!("<{tag}> has no vertices")));
    }
    Ok(points)
}

/// Reads the `<properties>` child of `node`, if any.
///
/// A property's value comes from its `value` attribute, falling back to
/// the element text. Repeated names keep the last value.
fn properties_of(node: Node<'_, '_>) -> Result<Properties, MapError> {
    let mut properties = Properties::new();
    let Some(block) = child(node, "properties") else {
        return Ok(properties);
    };

    for property in block.children().filter(|n| n.has_tag_name("property")) {
        let name = property.attribute("name").ok_or_else(|| {
            MapError::Malformed("property without a name".to_string())
        })?;
        let value = property
            .attribute("value")
            .or_else(|| property.text())
            .unwrap_or_default();
        properties.insert(name.to_string(), value.to_string());
    }
    Ok(properties)
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

/// Reads a numeric attribute, defaulting to zero when absent.
fn numeric_attr<T>(node: Node<'_, '_>, name: &str) -> Result<T, MapError>
where
    T: FromStr + Default,
{
    match node.attribute(name) {
        None => Ok(T::default()),
        Some(raw) => raw.trim().parse().map_err(|_| {
            MapError::Malformed(format!(
                "<{}> attribute {name}=\"{raw}\" is not an integer",
                node.tag_name().name()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wraps object-group XML in a minimal map root.
    fn map_with(groups: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.2" orientation="orthogonal" width="30" height="20" tilewidth="32" tileheight="32">
{groups}
</map>"#
        )
    }

    fn single_object(object: &str) -> MapObject {
        let doc = map_with(&format!("<objectgroup name=\"g\">{object}</objectgroup>"));
        let mut map = parse_map(&doc).expect("should parse");
        map.layers.remove(0).objects.remove(0)
    }

    // =====================================================================
    // Root attributes and properties
    // =====================================================================

    #[test]
    fn test_parse_map_reads_root_attributes() {
        let doc = r##"<map orientation="orthogonal" width="30" height="20"
            tilewidth="32" tileheight="16" backgroundcolor="#1d1d1d"/>"##;
        let map = parse_map(doc).unwrap();

        assert_eq!(map.orientation, Some(Orientation::Orthogonal));
        assert_eq!((map.width, map.height), (30, 20));
        assert_eq!((map.tile_width, map.tile_height), (32, 16));
        assert_eq!(map.background_color.as_deref(), Some("#1d1d1d"));
        assert!(map.layers.is_empty());
    }

    #[test]
    fn test_parse_map_missing_attributes_use_defaults() {
        let map = parse_map("<map/>").unwrap();

        assert_eq!(map.orientation, None);
        assert_eq!(map.width, 0);
        assert_eq!(map.tile_height, 0);
        // Absent, not empty.
        assert_eq!(map.background_color, None);
    }

    #[test]
    fn test_parse_map_non_numeric_width_is_malformed() {
        let result = parse_map(r#"<map width="wide" height="10"/>"#);
        assert!(matches!(result, Err(MapError::Malformed(_))));
    }

    #[test]
    fn test_parse_map_wrong_root_is_malformed() {
        let result = parse_map("<tileset/>");
        assert!(matches!(result, Err(MapError::Malformed(_))));
    }

    #[test]
    fn test_parse_map_broken_xml_is_xml_error() {
        let result = parse_map("<map><objectgroup></map>");
        assert!(matches!(result, Err(MapError::Xml(_))));
    }

    #[test]
    fn test_property_value_attribute_beats_inner_text() {
        let doc = r#"<map><properties>
            <property name="music" value="attr">text</property>
            <property name="motd">Welcome to the arena</property>
        </properties></map>"#;
        let map = parse_map(doc).unwrap();

        assert_eq!(map.properties["music"], "attr");
        assert_eq!(map.properties["motd"], "Welcome to the arena");
    }

    #[test]
    fn test_property_repeated_name_last_write_wins() {
        let doc = r#"<map><properties>
            <property name="rounds" value="3"/>
            <property name="rounds" value="5"/>
        </properties></map>"#;
        let map = parse_map(doc).unwrap();
        assert_eq!(map.properties["rounds"], "5");
    }

    #[test]
    fn test_property_without_name_is_malformed() {
        let doc = r#"<map><properties><property value="x"/></properties></map>"#;
        assert!(matches!(parse_map(doc), Err(MapError::Malformed(_))));
    }

    // =====================================================================
    // Layers
    // =====================================================================

    #[test]
    fn test_layers_keep_document_order_and_skip_tile_layers() {
        let doc = map_with(
            r#"<objectgroup name="spawns"/>
               <layer name="ground"><data encoding="csv">1,1,1</data></layer>
               <objectgroup name="walls">
                 <properties><property name="solid" value="true"/></properties>
               </objectgroup>
               <objectgroup name="bounds"/>"#,
        );
        let map = parse_map(&doc).unwrap();

        let names: Vec<_> = map.layers.iter().map(|l| l.name.as_deref()).collect();
        assert_eq!(names, vec![Some("spawns"), Some("walls"), Some("bounds")]);
        assert_eq!(map.layers[1].properties["solid"], "true");
    }

    #[test]
    fn test_layer_objects_keep_document_order() {
        let doc = map_with(
            r#"<objectgroup>
                 <object id="1" name="a" x="1" y="1"/>
                 <object id="2" name="b" x="2" y="2"/>
                 <object id="3" name="c" x="3" y="3"/>
               </objectgroup>"#,
        );
        let map = parse_map(&doc).unwrap();
        let names: Vec<_> = map.layers[0]
            .objects
            .iter()
            .map(|o| o.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    // =====================================================================
    // Shapes
    // =====================================================================

    #[test]
    fn test_object_without_shape_child_is_rectangle() {
        let object = single_object(r#"<object id="1" x="10" y="20" width="5" height="5"/>"#);

        assert_eq!(
            object.shape,
            Shape::Rectangle {
                x: 10.0,
                y: 20.0,
                width: 5.0,
                height: 5.0
            }
        );
        assert!(object.visible);
        assert_eq!(object.gid, None);
        assert_eq!(object.name, None);
        assert_eq!(object.kind, None);
    }

    #[test]
    fn test_object_with_ellipse_child_is_ellipse() {
        let object = single_object(
            r#"<object id="1" x="4" y="8" width="16" height="12"><ellipse/></object>"#,
        );
        assert_eq!(
            object.shape,
            Shape::Ellipse {
                x: 4.0,
                y: 8.0,
                width: 16.0,
                height: 12.0
            }
        );
    }

    #[test]
    fn test_polygon_vertices_in_order_with_object_origin() {
        let object = single_object(
            r#"<object id="1" x="50" y="60"><polygon points="0,0 10,0 10,10 0,10"/></object>"#,
        );

        match object.shape {
            Shape::Polygon { origin, points } => {
                assert_eq!(origin, Point::new(50.0, 60.0));
                assert_eq!(
                    points,
                    vec![
                        Point::new(0.0, 0.0),
                        Point::new(10.0, 0.0),
                        Point::new(10.0, 10.0),
                        Point::new(0.0, 10.0),
                    ]
                );
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn test_polyline_vertices_accept_negative_coordinates() {
        let object = single_object(
            r#"<object id="1" x="5" y="5"><polyline points="0,0 -4,7  12,-3"/></object>"#,
        );
        match object.shape {
            Shape::Polyline { points, .. } => {
                assert_eq!(
                    points,
                    vec![
                        Point::new(0.0, 0.0),
                        Point::new(-4.0, 7.0),
                        Point::new(12.0, -3.0),
                    ]
                );
            }
            other => panic!("expected polyline, got {other:?}"),
        }
    }

    #[test]
    fn test_polygon_malformed_points_is_error() {
        let doc = map_with(
            r#"<objectgroup><object id="1"><polygon points="0,0 10;0"/></object></objectgroup>"#,
        );
        assert!(matches!(parse_map(&doc), Err(MapError::Malformed(_))));
    }

    #[test]
    fn test_polygon_non_numeric_vertex_is_error() {
        let doc = map_with(
            r#"<objectgroup><object id="1"><polygon points="0,0 a,b"/></object></objectgroup>"#,
        );
        assert!(matches!(parse_map(&doc), Err(MapError::Malformed(_))));
    }

    #[test]
    fn test_polyline_without_points_is_error() {
        let doc = map_with(
            r#"<objectgroup><object id="1"><polyline/></object></objectgroup>"#,
        );
        assert!(matches!(parse_map(&doc), Err(MapError::Malformed(_))));
    }

    // =====================================================================
    // Object attributes
    // =====================================================================

    #[test]
    fn test_visible_zero_is_hidden() {
        let object = single_object(r#"<object id="1" visible="0"/>"#);
        assert!(!object.visible);
    }

    #[test]
    fn test_visible_one_is_visible() {
        let object = single_object(r#"<object id="1" visible="1"/>"#);
        assert!(object.visible);
    }

    #[test]
    fn test_visible_other_values_are_hidden() {
        for value in ["true", "2", "yes", "", " 1"] {
            let object = single_object(&format!(r#"<object id="1" visible="{value}"/>"#));
            assert!(!object.visible, "visible=\"{value}\" should be hidden");
        }
    }

    #[test]
    fn test_gid_present_is_stored() {
        let object = single_object(r#"<object id="1" gid="17" x="3" y="4"/>"#);
        assert_eq!(object.gid, Some(17));
        assert_eq!(object.properties["gid"], "17");
    }

    #[test]
    fn test_gid_non_numeric_is_malformed() {
        let doc = map_with(r#"<objectgroup><object id="1" gid="tree"/></objectgroup>"#);
        assert!(matches!(parse_map(&doc), Err(MapError::Malformed(_))));
    }

    #[test]
    fn test_object_name_and_type_are_kept() {
        let object = single_object(r#"<object id="1" name="north" type="spawn"/>"#);
        assert_eq!(object.name.as_deref(), Some("north"));
        assert_eq!(object.kind.as_deref(), Some("spawn"));
        assert!(object.is_kind("spawn"));
    }

    #[test]
    fn test_object_non_numeric_x_is_malformed() {
        let doc = map_with(r#"<objectgroup><object id="1" x="left"/></objectgroup>"#);
        assert!(matches!(parse_map(&doc), Err(MapError::Malformed(_))));
    }

    // =====================================================================
    // Object properties
    // =====================================================================

    #[test]
    fn test_object_properties_synthesize_position() {
        let object = single_object(r#"<object id="1" x="10" y="-20" type="wall"/>"#);
        assert_eq!(object.properties["x"], "10");
        assert_eq!(object.properties["y"], "-20");
        assert_eq!(object.properties["type"], "wall");
        assert!(!object.properties.contains_key("gid"));
    }

    #[test]
    fn test_document_properties_override_synthesized_keys() {
        let object = single_object(
            r#"<object id="1" x="10" y="20" type="spawn">
                 <properties>
                   <property name="x" value="999"/>
                   <property name="team" value="red"/>
                 </properties>
               </object>"#,
        );
        assert_eq!(object.properties["x"], "999");
        assert_eq!(object.properties["y"], "20");
        assert_eq!(object.properties["team"], "red");
        // The shape keeps the attribute position.
        assert_eq!(object.shape.origin(), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_parse_map_is_repeatable() {
        let doc = map_with(
            r#"<objectgroup name="g"><object id="1" x="1" y="2" width="3" height="4"/></objectgroup>"#,
        );
        assert_eq!(parse_map(&doc).unwrap(), parse_map(&doc).unwrap());
    }
}
