//! Unified error handling for the road-snap library.
//!
//! Snap rejections that the user can fix (poor accuracy, standing too far from a
//! road) share this type with data and programmer defects so callers can
//! propagate everything with `?` and still branch on the kind.

use thiserror::Error;

/// Unified error type for road-snap operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoadSnapError {
    /// Road geometry failed to load and the snap gate requires it
    #[error("Road network unavailable: {reason}")]
    NetworkUnavailable { reason: String },

    /// Position fix is too uncertain to place on a road
    #[error("GPS accuracy too low: ±{accuracy_meters:.0}m, maximum ±{max_meters:.0}m allowed")]
    LowAccuracyFix { accuracy_meters: f64, max_meters: f64 },

    /// No usable road geometry near the fix
    #[error("No road found near this position")]
    NoRoadFound,

    /// Nearest road is further away than the fix uncertainty allows
    #[error("Too far from road: {distance_meters:.0}m away, limit {bound_meters:.0}m")]
    TooFarFromRoad {
        distance_meters: f64,
        bound_meters: f64,
    },

    /// Condition key missing from the vocabulary
    #[error("Unknown road condition '{key}'")]
    InvalidCondition { key: String },

    /// Road segment with fewer than two vertices
    #[error("Segment '{segment_id}' has {vertex_count} vertices, minimum 2 required")]
    InvalidSegment {
        segment_id: String,
        vertex_count: usize,
    },

    /// Position fix with non-finite coordinates or negative accuracy
    #[error("Invalid position fix: {message}")]
    InvalidFix { message: String },

    /// No position fix could be obtained within the wait window
    #[error("Position unavailable: {message}")]
    PositionUnavailable { message: String },

    /// Road network file could not be parsed
    #[error("Road network parse error: {message}")]
    NetworkParse { message: String },
}

impl RoadSnapError {
    /// Whether the user can resolve this by moving or waiting for a better fix.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            RoadSnapError::LowAccuracyFix { .. }
                | RoadSnapError::NoRoadFound
                | RoadSnapError::TooFarFromRoad { .. }
                | RoadSnapError::PositionUnavailable { .. }
        )
    }
}

impl From<serde_json::Error> for RoadSnapError {
    fn from(err: serde_json::Error) -> Self {
        RoadSnapError::NetworkParse {
            message: err.to_string(),
        }
    }
}

/// Result type alias for road-snap operations.
pub type Result<T> = std::result::Result<T, RoadSnapError>;

/// Extension trait for converting Option to RoadSnapError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an unknown-condition error.
    fn ok_or_invalid_condition(self, key: &str) -> Result<T>;

    /// Convert Option to Result with a position-unavailable error.
    fn ok_or_position_unavailable(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid_condition(self, key: &str) -> Result<T> {
        self.ok_or_else(|| RoadSnapError::InvalidCondition {
            key: key.to_string(),
        })
    }

    fn ok_or_position_unavailable(self, message: &str) -> Result<T> {
        self.ok_or_else(|| RoadSnapError::PositionUnavailable {
            message: message.to_string(),
        })
    }
}
