//! GeoJSON road network loading.
//!
//! Accepts a `FeatureCollection` of `LineString` and `MultiLineString` features
//! with `[lon, lat]` positions. Segment ids come from the feature's own
//! attributes when present, else from its position in the file.

use log::{info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, RoadSnapError};
use crate::network::{RoadNetwork, RoadSegment};
use crate::GpsPoint;

/// Property names checked, in order, for a segment id.
const ID_PROPERTIES: [&str; 2] = ["segmentId", "id"];

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    #[serde(other)]
    Unsupported,
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Feature {
    fn segment_id(&self, index: usize) -> String {
        self.properties
            .as_ref()
            .and_then(|props| ID_PROPERTIES.iter().find_map(|k| props.get(*k).and_then(id_string)))
            .or_else(|| self.id.as_ref().and_then(id_string))
            .unwrap_or_else(|| index.to_string())
    }
}

fn to_points(positions: &[Vec<f64>], segment_id: &str) -> Result<Vec<GpsPoint>> {
    positions
        .iter()
        .map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Ok(GpsPoint::new(*lat, *lon)),
            _ => Err(RoadSnapError::NetworkParse {
                message: format!("segment '{}' has a position with fewer than 2 values", segment_id),
            }),
        })
        .collect()
}

fn push_segment(segments: &mut Vec<RoadSegment>, segment_id: String, points: Vec<GpsPoint>) {
    match RoadSegment::new(segment_id, points) {
        Ok(segment) => segments.push(segment),
        Err(err) => warn!("[GeoJson] Skipping segment: {}", err),
    }
}

impl RoadNetwork {
    /// Parse a GeoJSON `FeatureCollection` into a road network.
    ///
    /// Segment ids come from `properties.segmentId`, `properties.id`, the feature
    /// `id`, or the feature's index, in that order.
    ///
    /// # MultiLineString ids
    /// Each part of a `MultiLineString` becomes its own segment with id
    /// `<id>:<part>`, where `<part>` is the zero-based part index. Reports snapped
    /// to such a segment carry the suffixed id, not the bare feature id. A part
    /// with fewer than two vertices is skipped but keeps its index, so the
    /// remaining ids stay stable.
    ///
    /// Non-line geometries are skipped.
    ///
    /// # Example
    /// ```
    /// use road_snap::RoadNetwork;
    ///
    /// let json = r#"{"type": "FeatureCollection", "features": [
    ///     {"type": "Feature", "properties": {"id": "hwy-1"},
    ///      "geometry": {"type": "LineString", "coordinates": [[-99.75, 48.84], [-99.74, 48.84]]}}
    /// ]}"#;
    /// let network = RoadNetwork::from_geojson_str(json).unwrap();
    /// assert_eq!(network.segments()[0].segment_id(), "hwy-1");
    /// ```
    pub fn from_geojson_str(json: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(json)?;

        let mut segments = Vec::with_capacity(collection.features.len());
        let mut skipped = 0usize;
        for (index, feature) in collection.features.iter().enumerate() {
            let segment_id = feature.segment_id(index);
            match &feature.geometry {
                Some(Geometry::LineString { coordinates }) => {
                    let points = to_points(coordinates, &segment_id)?;
                    push_segment(&mut segments, segment_id, points);
                }
                Some(Geometry::MultiLineString { coordinates }) => {
                    for (part, line) in coordinates.iter().enumerate() {
                        let part_id = format!("{}:{}", segment_id, part);
                        let points = to_points(line, &part_id)?;
                        push_segment(&mut segments, part_id, points);
                    }
                }
                Some(Geometry::Unsupported) | None => skipped += 1,
            }
        }

        info!(
            "[GeoJson] Loaded {} segments from {} features ({} non-line features skipped)",
            segments.len(),
            collection.features.len(),
            skipped
        );

        Ok(RoadNetwork::new(segments))
    }
}
