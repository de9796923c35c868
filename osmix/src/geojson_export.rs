//! GeoJSON conversion: a thin external-interface helper built
//! directly on `get_line`/`tags_of`. Not part of the columnar core itself
//! — its whole contract is that the core exposes those two accessors.

use crate::dataset::Osm;
use crate::error::Result;
use crate::geometry::way_is_area;
use geo::{Geometry as GeoGeometry, LineString, Point, Polygon};
use geojson::{Feature, FeatureCollection};
use serde_json::Map;
use wkt::ToWkt;

fn tags_to_properties(tags: &std::collections::BTreeMap<String, String>) -> Map<String, serde_json::Value> {
    let mut props = Map::new();
    for (k, v) in tags {
        props.insert(k.clone(), serde_json::Value::String(v.clone()));
    }
    props
}

fn line_string_of(coords: &[f64]) -> LineString<f64> {
    coords.chunks(2).map(|p| (p[0], p[1])).collect()
}

/// One `Feature<Point>` per node, `{id, ...tags}` as properties.
pub fn nodes_to_geojson(osm: &Osm) -> Result<FeatureCollection> {
    let mut features = Vec::with_capacity(osm.node_count());
    for i in 0..osm.node_count() {
        let id = osm.nodes().id_of(i)?;
        let (lon, lat) = osm.nodes().coord_of(i)?;
        let tags = osm.nodes().tags_of(i, osm.strings())?;

        let mut properties = tags_to_properties(&tags);
        properties.insert("id".to_string(), serde_json::Value::from(id));

        let point = GeoGeometry::Point(Point::new(lon, lat));
        features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::from(&point)),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(FeatureCollection { bbox: None, features, foreign_members: None })
}

/// One `Feature<LineString>` per way, or `Feature<Polygon>` when
/// `way_is_area` classifies it as an area (single-ring, unclosed-hole
/// polygon — this layer does not resolve multipolygon relations).
pub fn ways_to_geojson(osm: &Osm) -> Result<FeatureCollection> {
    let mut features = Vec::with_capacity(osm.way_count());
    for i in 0..osm.way_count() {
        let id = osm.ways().id_of(i)?;
        let refs = osm.ways().refs_of(i)?;
        let tags = osm.ways().tags_of(i, osm.strings())?;
        let line = osm.ways().line_of(i, osm.nodes())?;
        let line_string = line_string_of(&line);

        let geometry = if way_is_area(refs, &tags) {
            GeoGeometry::Polygon(Polygon::new(line_string, vec![]))
        } else {
            GeoGeometry::LineString(line_string)
        };

        let mut properties = tags_to_properties(&tags);
        properties.insert("id".to_string(), serde_json::Value::from(id));

        features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::from(&geometry)),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(FeatureCollection { bbox: None, features, foreign_members: None })
}

/// Renders a single way's geometry as a WKT string, for debug output and
/// test fixtures (`LINESTRING`/`POLYGON` depending on `way_is_area`).
pub fn way_to_wkt(osm: &Osm, way_index: usize) -> Result<String> {
    let refs = osm.ways().refs_of(way_index)?;
    let tags = osm.ways().tags_of(way_index, osm.strings())?;
    let line = osm.ways().line_of(way_index, osm.nodes())?;
    let line_string = line_string_of(&line);

    if way_is_area(refs, &tags) {
        Ok(Polygon::new(line_string, vec![]).to_wkt().to_string())
    } else {
        Ok(line_string.to_wkt().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Osm;
    use geojson::Value;

    #[test]
    fn way_becomes_a_linestring_feature() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(2, 1.0, 1.0, std::iter::empty()).unwrap();
        osm.add_way(100, &[1, 2], [("highway", "residential")]).unwrap();
        osm.finish().unwrap();

        let collection = ways_to_geojson(&osm).unwrap();
        assert_eq!(collection.features.len(), 1);
        assert!(matches!(collection.features[0].geometry.as_ref().unwrap().value, Value::LineString(_)));
    }

    #[test]
    fn closed_area_way_becomes_a_polygon_feature() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(2, 1.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(3, 1.0, 1.0, std::iter::empty()).unwrap();
        osm.add_way(100, &[1, 2, 3, 1], [("building", "yes")]).unwrap();
        osm.finish().unwrap();

        let collection = ways_to_geojson(&osm).unwrap();
        assert!(matches!(collection.features[0].geometry.as_ref().unwrap().value, Value::Polygon(_)));
    }

    #[test]
    fn node_feature_carries_id_and_tags_as_properties() {
        let mut osm = Osm::new();
        osm.add_node(42, 7.4, 43.7, [("name", "Monaco")]).unwrap();
        osm.finish().unwrap();

        let collection = nodes_to_geojson(&osm).unwrap();
        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props.get("id").unwrap(), &serde_json::Value::from(42));
        assert_eq!(props.get("name").unwrap(), &serde_json::Value::String("Monaco".to_string()));
    }

    #[test]
    fn way_to_wkt_renders_a_linestring() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(2, 1.0, 1.0, std::iter::empty()).unwrap();
        osm.add_way(100, &[1, 2], [("highway", "residential")]).unwrap();
        osm.finish().unwrap();

        let wkt = way_to_wkt(&osm, 0).unwrap();
        assert!(wkt.starts_with("LINESTRING"));
    }

    #[test]
    fn way_to_wkt_renders_a_closed_area_as_a_polygon() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(2, 1.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(3, 1.0, 1.0, std::iter::empty()).unwrap();
        osm.add_way(100, &[1, 2, 3, 1], [("building", "yes")]).unwrap();
        osm.finish().unwrap();

        let wkt = way_to_wkt(&osm, 0).unwrap();
        assert!(wkt.starts_with("POLYGON"));
    }
}
