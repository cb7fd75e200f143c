//! Road network geometry and nearest-road search.
//!
//! A [`RoadNetwork`] is loaded once and never mutated; a reload replaces it
//! wholesale. Search goes through the [`NearestRoad`] trait so the reference
//! linear scan and the R-tree backed [`IndexedRoadNetwork`] are interchangeable
//! for the snap policy and the session.

use std::fmt;

use geo::{BoundingRect, Coord, LineString, Rect};
use log::{debug, info};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoadSnapError};
use crate::geo_utils::{
    closest_point_on_segment, meters_to_degrees, project_point, unproject_point, PlanarPoint,
};
use crate::{GpsPoint, SnapResult};

/// Nearest-point-on-network queries.
pub trait NearestRoad {
    /// Closest point on any road to `point`, or `None` if the network has no
    /// usable (non-degenerate) geometry.
    fn nearest(&self, point: GpsPoint) -> Option<SnapResult>;
}

// ============================================================================
// Geometry
// ============================================================================

/// A road centerline polyline with a stable id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadSegment {
    segment_id: String,
    points: Vec<GpsPoint>,
}

impl RoadSegment {
    /// Create a segment. Fails if fewer than two vertices are given.
    pub fn new(segment_id: impl Into<String>, points: Vec<GpsPoint>) -> Result<Self> {
        let segment_id = segment_id.into();
        if points.len() < 2 {
            return Err(RoadSnapError::InvalidSegment {
                segment_id,
                vertex_count: points.len(),
            });
        }
        Ok(Self { segment_id, points })
    }

    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    /// Consecutive-vertex sub-segments.
    pub fn sub_segments(&self) -> impl Iterator<Item = (&GpsPoint, &GpsPoint)> {
        self.points.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Bounding box in lon/lat degrees.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.line_string().bounding_rect()
    }

    fn line_string(&self) -> LineString<f64> {
        LineString::new(
            self.points
                .iter()
                .map(|p| Coord {
                    x: p.longitude,
                    y: p.latitude,
                })
                .collect(),
        )
    }
}

/// Summary of a loaded network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub segment_count: u32,
    pub vertex_count: u32,
    /// Sub-segments with non-zero length
    pub usable_sub_segments: u32,
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lng: Option<f64>,
    pub max_lng: Option<f64>,
}

/// Distance from `query` (already projected around `ref_lat`) to sub-segment `a`-`b`.
///
/// Shared by every search strategy so they agree to the last bit.
fn evaluate_sub_segment(
    query: PlanarPoint,
    a: &GpsPoint,
    b: &GpsPoint,
    ref_lat: f64,
) -> Option<(GpsPoint, f64)> {
    let pa = project_point(a, ref_lat);
    let pb = project_point(b, ref_lat);
    let (closest, distance) = closest_point_on_segment(query, pa, pb)?;
    Some((unproject_point(&closest, ref_lat), distance))
}

/// The full road network, searched by linear scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoadNetwork {
    segments: Vec<RoadSegment>,
}

impl RoadNetwork {
    /// Create a network. Segment order defines tie-breaking between equidistant roads.
    pub fn new(segments: Vec<RoadSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[RoadSegment] {
        &self.segments
    }

    pub fn segment(&self, segment_id: &str) -> Option<&RoadSegment> {
        self.segments.iter().find(|s| s.segment_id == segment_id)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn stats(&self) -> NetworkStats {
        let vertex_count: usize = self.segments.iter().map(|s| s.points.len()).sum();
        let usable_sub_segments = self
            .segments
            .iter()
            .flat_map(|s| s.sub_segments())
            .filter(|(a, b)| {
                evaluate_sub_segment(project_point(a, a.latitude), a, b, a.latitude).is_some()
            })
            .count();

        let bounds = self
            .segments
            .iter()
            .filter_map(|s| s.bounds())
            .reduce(|acc, r| {
                Rect::new(
                    Coord {
                        x: acc.min().x.min(r.min().x),
                        y: acc.min().y.min(r.min().y),
                    },
                    Coord {
                        x: acc.max().x.max(r.max().x),
                        y: acc.max().y.max(r.max().y),
                    },
                )
            });

        NetworkStats {
            segment_count: self.segments.len() as u32,
            vertex_count: vertex_count as u32,
            usable_sub_segments: usable_sub_segments as u32,
            min_lat: bounds.map(|b| b.min().y),
            max_lat: bounds.map(|b| b.max().y),
            min_lng: bounds.map(|b| b.min().x),
            max_lng: bounds.map(|b| b.max().x),
        }
    }
}

impl NearestRoad for RoadNetwork {
    /// Linear scan over every sub-segment; `O(total vertices)`.
    ///
    /// Each sub-segment is projected into a frame centred on the query latitude.
    /// On equal distances the first sub-segment in definition order wins.
    fn nearest(&self, point: GpsPoint) -> Option<SnapResult> {
        let ref_lat = point.latitude;
        let query = project_point(&point, ref_lat);

        let mut best: Option<(usize, GpsPoint, f64)> = None;
        for (seg_idx, segment) in self.segments.iter().enumerate() {
            for (a, b) in segment.sub_segments() {
                if let Some((snapped, distance)) = evaluate_sub_segment(query, a, b, ref_lat) {
                    if best.map_or(true, |(_, _, d)| distance < d) {
                        best = Some((seg_idx, snapped, distance));
                    }
                }
            }
        }

        best.map(|(seg_idx, snapped, distance_meters)| SnapResult {
            segment_id: self.segments[seg_idx].segment_id.clone(),
            snapped,
            distance_meters,
        })
    }
}

// ============================================================================
// R-tree index
// ============================================================================

/// Configuration for the R-tree backed index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Radius of the indexed candidate search (meters). Queries with no road
    /// inside this radius fall back to a full linear scan.
    /// Default: 250.0 meters
    pub search_radius_meters: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            search_radius_meters: 250.0,
        }
    }
}

/// Relative padding applied to the candidate box against rounding at its edges.
const SEARCH_BOX_PADDING: f64 = 1.01;

/// Bounding box of one sub-segment, tagged with its position in definition order.
#[derive(Debug, Clone)]
struct IndexedSubSegment {
    order: usize,
    segment_idx: usize,
    vertex_idx: usize,
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
}

impl RTreeObject for IndexedSubSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.min_lng, self.min_lat], [self.max_lng, self.max_lat])
    }
}

/// A road network with an R-tree over sub-segment bounding boxes.
///
/// Returns exactly what the linear scan returns, including tie-breaking:
/// candidates are evaluated in definition order, and any sub-segment outside the
/// candidate box is provably further than the search radius.
#[derive(Clone)]
pub struct IndexedRoadNetwork {
    network: RoadNetwork,
    tree: RTree<IndexedSubSegment>,
    config: IndexConfig,
}

impl fmt::Debug for IndexedRoadNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedRoadNetwork")
            .field("segments", &self.network.len())
            .field("sub_segments", &self.tree.size())
            .field("config", &self.config)
            .finish()
    }
}

impl IndexedRoadNetwork {
    pub fn new(network: RoadNetwork) -> Self {
        Self::with_config(network, IndexConfig::default())
    }

    pub fn with_config(network: RoadNetwork, config: IndexConfig) -> Self {
        let mut entries = Vec::new();
        for (segment_idx, segment) in network.segments.iter().enumerate() {
            for (vertex_idx, (a, b)) in segment.sub_segments().enumerate() {
                entries.push(IndexedSubSegment {
                    order: entries.len(),
                    segment_idx,
                    vertex_idx,
                    min_lat: a.latitude.min(b.latitude),
                    max_lat: a.latitude.max(b.latitude),
                    min_lng: a.longitude.min(b.longitude),
                    max_lng: a.longitude.max(b.longitude),
                });
            }
        }

        info!(
            "[RoadIndex] Indexed {} sub-segments from {} segments",
            entries.len(),
            network.len()
        );

        Self {
            network,
            tree: RTree::bulk_load(entries),
            config,
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }
}

impl NearestRoad for IndexedRoadNetwork {
    fn nearest(&self, point: GpsPoint) -> Option<SnapResult> {
        let radius = self.config.search_radius_meters;
        let ref_lat = point.latitude;
        let (dlat, dlng) = meters_to_degrees(radius * SEARCH_BOX_PADDING, ref_lat);
        let search_box = AABB::from_corners(
            [point.longitude - dlng, point.latitude - dlat],
            [point.longitude + dlng, point.latitude + dlat],
        );

        let mut candidates: Vec<&IndexedSubSegment> =
            self.tree.locate_in_envelope_intersecting(&search_box).collect();
        candidates.sort_unstable_by_key(|c| c.order);

        let query = project_point(&point, ref_lat);
        let mut best: Option<(usize, GpsPoint, f64)> = None;
        for c in &candidates {
            let points = self.network.segments[c.segment_idx].points();
            let (a, b) = (&points[c.vertex_idx], &points[c.vertex_idx + 1]);
            if let Some((snapped, distance)) = evaluate_sub_segment(query, a, b, ref_lat) {
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((c.segment_idx, snapped, distance));
                }
            }
        }

        match best {
            Some((segment_idx, snapped, distance_meters)) if distance_meters <= radius => {
                Some(SnapResult {
                    segment_id: self.network.segments[segment_idx].segment_id.clone(),
                    snapped,
                    distance_meters,
                })
            }
            _ => {
                debug!(
                    "[RoadIndex] No road within {:.0}m of ({:.6}, {:.6}), scanning all {} segments",
                    radius,
                    point.latitude,
                    point.longitude,
                    self.network.len()
                );
                self.network.nearest(point)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::project;

    fn segment(id: &str, coords: &[(f64, f64)]) -> RoadSegment {
        RoadSegment::new(
            id,
            coords.iter().map(|&(lat, lng)| GpsPoint::new(lat, lng)).collect(),
        )
        .unwrap()
    }

    /// A small grid of roads around Langdon, ND.
    fn town_network() -> RoadNetwork {
        RoadNetwork::new(vec![
            segment("main", &[(48.7600, -98.3800), (48.7600, -98.3600)]),
            segment(
                "3rd-ave",
                &[(48.7550, -98.3700), (48.7600, -98.3700), (48.7650, -98.3700)],
            ),
            segment(
                "hwy-5",
                &[(48.7500, -98.4000), (48.7520, -98.3900), (48.7560, -98.3750), (48.7580, -98.3600)],
            ),
        ])
    }

    /// Brute force distance by dense sampling along every sub-segment.
    fn sampled_min_distance(network: &RoadNetwork, p: GpsPoint) -> f64 {
        let q = project(p.latitude, p.longitude, p.latitude);
        let mut best = f64::INFINITY;
        for s in network.segments() {
            for (a, b) in s.sub_segments() {
                for i in 0..=1000 {
                    let t = i as f64 / 1000.0;
                    let lat = a.latitude + t * (b.latitude - a.latitude);
                    let lng = a.longitude + t * (b.longitude - a.longitude);
                    let sample = project(lat, lng, p.latitude);
                    best = best.min(q.distance_to(&sample));
                }
            }
        }
        best
    }

    #[test]
    fn test_segment_requires_two_vertices() {
        let err = RoadSegment::new("x", vec![GpsPoint::new(48.0, -98.0)]).unwrap_err();
        assert!(matches!(
            err,
            RoadSnapError::InvalidSegment { vertex_count: 1, .. }
        ));
    }

    #[test]
    fn test_nearest_snaps_onto_road() {
        let network = town_network();
        // Just north of Main St, away from the other roads
        let result = network.nearest(GpsPoint::new(48.7601, -98.3780)).unwrap();
        assert_eq!(result.segment_id, "main");
        assert!((result.snapped.latitude - 48.7600).abs() < 1e-9);
        assert!((result.snapped.longitude + 98.3780).abs() < 1e-9);
        assert!((result.distance_meters - 11.12).abs() < 0.05);
    }

    #[test]
    fn test_nearest_never_exceeds_sampled_minimum() {
        let network = town_network();
        let queries = [
            GpsPoint::new(48.7601, -98.3780),
            GpsPoint::new(48.7580, -98.3705),
            GpsPoint::new(48.7530, -98.3850),
            GpsPoint::new(48.7700, -98.3500),
            GpsPoint::new(48.7400, -98.4100),
        ];
        for q in queries {
            let nearest = network.nearest(q).unwrap();
            let sampled = sampled_min_distance(&network, q);
            assert!(
                nearest.distance_meters <= sampled + 1e-6,
                "nearest {} > sampled {}",
                nearest.distance_meters,
                sampled
            );
        }
    }

    #[test]
    fn test_degenerate_sub_segments_are_skipped() {
        let network = RoadNetwork::new(vec![
            segment("stub", &[(48.7600, -98.3700), (48.7600, -98.3700)]),
            segment(
                "dupes",
                &[(48.7600, -98.3800), (48.7600, -98.3800), (48.7600, -98.3600)],
            ),
        ]);
        let result = network.nearest(GpsPoint::new(48.7601, -98.3700)).unwrap();
        assert_eq!(result.segment_id, "dupes");
        assert_eq!(network.stats().usable_sub_segments, 1);
    }

    #[test]
    fn test_only_degenerate_geometry_returns_none() {
        let network = RoadNetwork::new(vec![segment(
            "stub",
            &[(48.7600, -98.3700), (48.7600, -98.3700)],
        )]);
        assert!(network.nearest(GpsPoint::new(48.7601, -98.3700)).is_none());
        assert!(RoadNetwork::default().nearest(GpsPoint::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_tie_goes_to_first_segment() {
        let network = RoadNetwork::new(vec![
            segment("first", &[(48.7600, -98.3800), (48.7600, -98.3600)]),
            segment("second", &[(48.7600, -98.3800), (48.7600, -98.3600)]),
        ]);
        let result = network.nearest(GpsPoint::new(48.7605, -98.3700)).unwrap();
        assert_eq!(result.segment_id, "first");
    }

    #[test]
    fn test_indexed_matches_linear_scan() {
        let network = town_network();
        let indexed = IndexedRoadNetwork::new(network.clone());
        let queries = [
            GpsPoint::new(48.7601, -98.3780),
            GpsPoint::new(48.7580, -98.3705),
            GpsPoint::new(48.7530, -98.3850),
            GpsPoint::new(48.7600, -98.3700),
            // Far outside the search radius, exercises the fallback
            GpsPoint::new(48.9000, -98.0000),
        ];
        for q in queries {
            assert_eq!(indexed.nearest(q), network.nearest(q));
        }
    }

    #[test]
    fn test_indexed_tie_breaking_matches_linear_scan() {
        let network = RoadNetwork::new(vec![
            segment("first", &[(48.7600, -98.3800), (48.7600, -98.3600)]),
            segment("second", &[(48.7600, -98.3800), (48.7600, -98.3600)]),
        ]);
        let indexed = IndexedRoadNetwork::new(network);
        let result = indexed.nearest(GpsPoint::new(48.7605, -98.3700)).unwrap();
        assert_eq!(result.segment_id, "first");
    }

    #[test]
    fn test_stats() {
        let stats = town_network().stats();
        assert_eq!(stats.segment_count, 3);
        assert_eq!(stats.vertex_count, 9);
        assert_eq!(stats.usable_sub_segments, 6);
        assert_eq!(stats.min_lat, Some(48.7500));
        assert_eq!(stats.max_lng, Some(-98.3600));
    }
}
