//! Road condition vocabulary.
//!
//! The set of reportable conditions is fixed. Each key maps to its legend label,
//! display color, stroke style and the severity a report of that kind carries.
//! "Scattered" variants share their parent's color and are drawn striped.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{OptionExt, Result};
use crate::Severity;

/// How a condition is drawn on the map and in the legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    Solid,
    Striped,
}

/// One entry of the condition vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub key: &'static str,
    pub label: &'static str,
    /// CSS hex color
    pub color: &'static str,
    pub stroke: StrokeStyle,
    pub severity: Severity,
}

const fn entry(
    key: &'static str,
    label: &'static str,
    color: &'static str,
    stroke: StrokeStyle,
    severity: Severity,
) -> Condition {
    Condition {
        key,
        label,
        color,
        stroke,
        severity,
    }
}

/// Key of the condition preselected when reporting.
pub const DEFAULT_CONDITION_KEY: &str = "seasonalGood";

/// All conditions in legend order.
static CONDITIONS: [Condition; 11] = [
    entry("closedBlocked", "Closed / Blocked", "#e53935", StrokeStyle::Solid, Severity::High),
    entry("noTravelAdvised", "No Travel Advised", "#e53935", StrokeStyle::Striped, Severity::High),
    entry("iceCompactedSnow", "Ice / Compacted Snow", "#f4d000", StrokeStyle::Solid, Severity::High),
    entry("scatteredIce", "Scattered Ice", "#f4d000", StrokeStyle::Striped, Severity::Low),
    entry("snowCovered", "Snow Covered", "#b000ff", StrokeStyle::Solid, Severity::Moderate),
    entry("scatteredSnowDrifts", "Scattered Snow Drifts", "#b000ff", StrokeStyle::Striped, Severity::Low),
    entry("frost", "Frost", "#28c8ff", StrokeStyle::Solid, Severity::Moderate),
    entry("scatteredFrost", "Scattered Frost", "#28c8ff", StrokeStyle::Striped, Severity::Low),
    entry("wetSlush", "Wet / Slush", "#1565c0", StrokeStyle::Solid, Severity::Moderate),
    entry("scatteredWetSlush", "Scattered Wet / Slush", "#1565c0", StrokeStyle::Striped, Severity::Low),
    entry("seasonalGood", "Seasonal / Good", "#00c853", StrokeStyle::Solid, Severity::Low),
];

static BY_KEY: Lazy<HashMap<&'static str, &'static Condition>> =
    Lazy::new(|| CONDITIONS.iter().map(|c| (c.key, c)).collect());

/// All conditions in legend order.
pub fn all_conditions() -> &'static [Condition] {
    &CONDITIONS
}

/// Look up a condition by key.
///
/// # Example
/// ```
/// use road_snap::{condition, Severity};
/// assert_eq!(condition("frost").unwrap().severity, Severity::Moderate);
/// assert!(condition("lava").is_err());
/// ```
pub fn condition(key: &str) -> Result<&'static Condition> {
    BY_KEY.get(key).copied().ok_or_invalid_condition(key)
}

/// The condition preselected in the report form.
pub fn default_condition() -> &'static Condition {
    BY_KEY[DEFAULT_CONDITION_KEY]
}

pub fn is_known(key: &str) -> bool {
    BY_KEY.contains_key(key)
}
