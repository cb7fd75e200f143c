//! Snap policy: accept or reject a position fix against the road network.
//!
//! Checks run in a fixed order and the first failing one decides:
//! 1. network availability (when road geometry is required)
//! 2. fix accuracy ceiling, independent of road distance
//! 3. presence of any road
//! 4. distance to road against `max(min_snap_distance, accuracy)`
//!
//! An accepted fix records the snapped coordinate, not the raw one.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::RoadSnapError;
use crate::{GpsPoint, PositionFix, SnapResult};

/// Configuration for the snap policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Fixes less accurate than this are rejected outright (meters).
    /// Default: 100.0 meters
    pub max_accuracy_meters: f64,

    /// Allowed snap distance never shrinks below this, however good the fix (meters).
    /// Default: 20.0 meters
    pub min_snap_distance_meters: f64,

    /// Reject every fix while the road network is unavailable. When false, fixes
    /// are accepted unsnapped instead.
    /// Default: true
    pub require_road_geometry: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            max_accuracy_meters: 100.0,
            min_snap_distance_meters: 20.0,
            require_road_geometry: true,
        }
    }
}

impl SnapConfig {
    /// Load a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Largest distance from the road a fix with this accuracy may snap across.
    pub fn snap_bound(&self, accuracy_meters: f64) -> f64 {
        self.min_snap_distance_meters.max(accuracy_meters)
    }
}

/// Why a fix was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SnapRejection {
    NetworkUnavailable,
    LowAccuracy { accuracy_meters: f64, max_meters: f64 },
    NoRoadFound,
    TooFarFromRoad { distance_meters: f64, bound_meters: f64 },
}

impl SnapRejection {
    /// Short user-facing reason.
    pub fn reason(&self) -> &'static str {
        match self {
            SnapRejection::NetworkUnavailable => "network unavailable",
            SnapRejection::LowAccuracy { .. } => "low accuracy",
            SnapRejection::NoRoadFound => "no road found",
            SnapRejection::TooFarFromRoad { .. } => "too far from road",
        }
    }

    /// Full message including the measured values.
    pub fn message(&self) -> String {
        match self {
            SnapRejection::LowAccuracy {
                accuracy_meters,
                max_meters,
            } => format!(
                "{} (±{:.0}m, need ±{:.0}m or better)",
                self.reason(),
                accuracy_meters,
                max_meters
            ),
            SnapRejection::TooFarFromRoad {
                distance_meters,
                bound_meters,
            } => format!(
                "{} ({:.0}m away, limit {:.0}m)",
                self.reason(),
                distance_meters,
                bound_meters
            ),
            _ => self.reason().to_string(),
        }
    }

    /// Convert into the crate error, with `network_reason` for the unavailable case.
    pub fn into_error(self, network_reason: &str) -> RoadSnapError {
        match self {
            SnapRejection::NetworkUnavailable => RoadSnapError::NetworkUnavailable {
                reason: network_reason.to_string(),
            },
            SnapRejection::LowAccuracy {
                accuracy_meters,
                max_meters,
            } => RoadSnapError::LowAccuracyFix {
                accuracy_meters,
                max_meters,
            },
            SnapRejection::NoRoadFound => RoadSnapError::NoRoadFound,
            SnapRejection::TooFarFromRoad {
                distance_meters,
                bound_meters,
            } => RoadSnapError::TooFarFromRoad {
                distance_meters,
                bound_meters,
            },
        }
    }
}

/// Outcome of the snap policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum SnapDecision {
    /// Fix placed on a road; `point` is the coordinate of record.
    Accept {
        segment_id: String,
        point: GpsPoint,
        /// Raw fix to road distance, kept for audit
        distance_meters: f64,
    },
    /// No network loaded and geometry not required: the raw fix is recorded.
    AcceptRaw { point: GpsPoint },
    Reject(SnapRejection),
}

impl SnapDecision {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, SnapDecision::Reject(_))
    }
}

/// Decide whether `fix` may be recorded, given the nearest road to it.
///
/// Pure: the outcome depends only on the arguments.
pub fn decide(
    fix: &PositionFix,
    nearest: Option<&SnapResult>,
    network_available: bool,
    config: &SnapConfig,
) -> SnapDecision {
    if !network_available && config.require_road_geometry {
        return SnapDecision::Reject(SnapRejection::NetworkUnavailable);
    }

    if fix.accuracy_meters > config.max_accuracy_meters {
        return SnapDecision::Reject(SnapRejection::LowAccuracy {
            accuracy_meters: fix.accuracy_meters,
            max_meters: config.max_accuracy_meters,
        });
    }

    if !network_available {
        return SnapDecision::AcceptRaw { point: fix.point() };
    }

    let Some(nearest) = nearest else {
        return SnapDecision::Reject(SnapRejection::NoRoadFound);
    };

    let bound = config.snap_bound(fix.accuracy_meters);
    if nearest.distance_meters > bound {
        debug!(
            "[Snap] Rejected: {:.1}m from '{}', bound {:.1}m",
            nearest.distance_meters, nearest.segment_id, bound
        );
        return SnapDecision::Reject(SnapRejection::TooFarFromRoad {
            distance_meters: nearest.distance_meters,
            bound_meters: bound,
        });
    }

    SnapDecision::Accept {
        segment_id: nearest.segment_id.clone(),
        point: nearest.snapped,
        distance_meters: nearest.distance_meters,
    }
}
