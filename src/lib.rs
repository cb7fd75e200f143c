//! # Road Snap
//!
//! GPS road snapping and per-segment aggregation of crowd-sourced road
//! condition reports.
//!
//! This library provides:
//! - Nearest-point search over a road network (linear scan or R-tree backed)
//! - A snap policy that accepts or rejects a position fix against the network
//! - Aggregation of live reports into one display state per road segment
//!
//! ## Quick Start
//!
//! ```rust
//! use road_snap::{GpsPoint, PositionFix, RoadNetwork, RoadSegment, RoadSession};
//!
//! let network = RoadNetwork::new(vec![RoadSegment::new(
//!     "main-st",
//!     vec![GpsPoint::new(48.8390, -99.7500), GpsPoint::new(48.8390, -99.7400)],
//! )
//! .unwrap()]);
//!
//! let mut session = RoadSession::new();
//! session.load_network(network);
//!
//! // ~11m north of Main St with a ±15m fix
//! let fix = PositionFix::new(48.8391, -99.7450, 15.0);
//! let submission = session.prepare_submission("scatteredIce", &fix).unwrap();
//! assert_eq!(submission.segment_id.as_deref(), Some("main-st"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, RoadSnapError};

// Geographic utilities (local projection, point-to-segment projection)
pub mod geo_utils;

// Road network geometry and nearest-road search
pub mod network;
pub use network::{
    IndexConfig, IndexedRoadNetwork, NearestRoad, NetworkStats, RoadNetwork, RoadSegment,
};

// GeoJSON road network loading
pub mod geojson;

// Snap accept/reject policy
pub mod snap;
pub use snap::{decide, SnapConfig, SnapDecision, SnapRejection};

// Condition vocabulary
pub mod conditions;
pub use conditions::{all_conditions, condition, default_condition, Condition, StrokeStyle};

// Per-segment aggregation of live reports
pub mod aggregate;
pub use aggregate::{aggregate, aggregate_live, is_live, live_reports, AggregationConfig};

// Best-of-window position fix selection
pub mod fix;
pub use fix::{FixConfig, FixProgress, FixSelector};

// Session context owning the loaded network and last aggregation
pub mod session;
pub use session::{NetworkState, ReportSubmission, RoadSession, SessionStats};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use road_snap::GpsPoint;
/// let point = GpsPoint::new(48.839428, -99.744865);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A device position fix with its reported uncertainty radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Uncertainty radius in meters (>= 0)
    pub accuracy_meters: f64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
        }
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Finite coordinates in range and a finite, non-negative accuracy.
    pub fn is_valid(&self) -> bool {
        self.point().is_valid() && self.accuracy_meters.is_finite() && self.accuracy_meters >= 0.0
    }

    /// `Ok` for a valid fix, `InvalidFix` otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            return Ok(());
        }
        Err(RoadSnapError::InvalidFix {
            message: format!(
                "({}, {}) ±{}m",
                self.latitude, self.longitude, self.accuracy_meters
            ),
        })
    }
}

/// Nearest point on the road network to a query position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapResult {
    pub segment_id: String,
    /// Closest point on the segment
    pub snapped: GpsPoint,
    /// Distance from the query to `snapped`, meters
    pub distance_meters: f64,
}

/// Report severity, ordered from mildest to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Severity {
    Low = 1,
    Moderate = 2,
    High = 3,
}

impl Severity {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Severity::Low),
            2 => Ok(Severity::Moderate),
            3 => Ok(Severity::High),
            other => Err(format!("severity must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.level()
    }
}

/// A submitted road condition report, as delivered by the report stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub condition_key: String,
    pub severity: Severity,
    /// Server-assigned creation time; `None` while the server timestamp is pending
    pub created_at: Option<DateTime<Utc>>,
    /// Segment the report was snapped to; `None` for unsnapped reports
    pub segment_id: Option<String>,
}

/// Current display state of one road segment.
///
/// Derived from the live report set on every aggregation pass, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentState {
    pub segment_id: String,
    /// Condition of the most recent live report
    pub condition_key: String,
    /// Highest severity across all live reports
    pub severity: Severity,
    /// Number of live reports on this segment
    pub count: u32,
    /// Creation time of the most recent live report
    pub latest_at: DateTime<Utc>,
}

// ============================================================================
// Tests
// ============================================================================
