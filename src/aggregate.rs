//! Per-segment aggregation of live road condition reports.
//!
//! Every pass recomputes the full segment map from the current snapshot; nothing
//! is patched incrementally and liveness is never cached. For each segment the
//! display fields follow the most recent report while the severity only ever
//! widens to the worst live report.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::conditions;
use crate::{Report, SegmentState};

/// Configuration for the live report window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Reports older than this stop contributing (seconds).
    /// Default: 86400 (24 hours)
    pub ttl_seconds: i64,

    /// Only the newest reports of a snapshot are considered.
    /// Default: 500
    pub max_reports: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 24 * 60 * 60,
            max_reports: 500,
        }
    }
}

impl AggregationConfig {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_seconds)
    }
}

/// Whether `report` is inside the TTL window at `now`.
///
/// A report whose server timestamp is still pending was just written and is live.
pub fn is_live(report: &Report, now: DateTime<Utc>, ttl: Duration) -> bool {
    match report.created_at {
        Some(created_at) => now - created_at <= ttl,
        None => true,
    }
}

/// The live subset of a snapshot, newest first.
///
/// The snapshot is ordered by creation time (pending timestamps first) and cut to
/// `max_reports` before the TTL filter, mirroring the count-bounded report query.
pub fn live_reports<'a>(
    snapshot: &'a [Report],
    now: DateTime<Utc>,
    config: &AggregationConfig,
) -> Vec<&'a Report> {
    let mut ordered: Vec<&Report> = snapshot.iter().collect();
    ordered.sort_by(|a, b| match (a.created_at, b.created_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(&x),
    });
    ordered.truncate(config.max_reports);

    let ttl = config.ttl();
    ordered.retain(|r| is_live(r, now, ttl));
    ordered
}

/// Fold live reports into one state per segment.
///
/// `now` stands in for the creation time of reports whose timestamp is pending.
/// Reports without a segment are skipped. Condition keys outside the vocabulary
/// are counted and folded like any other. On equal timestamps the later report
/// in iteration order supplies the display fields.
pub fn aggregate<'a, I>(reports: I, now: DateTime<Utc>) -> BTreeMap<String, SegmentState>
where
    I: IntoIterator<Item = &'a Report>,
{
    let mut states: BTreeMap<String, SegmentState> = BTreeMap::new();

    for report in reports {
        let Some(segment_id) = report.segment_id.as_ref() else {
            continue;
        };
        if !conditions::is_known(&report.condition_key) {
            warn!(
                "[Aggregate] Report '{}' has unknown condition '{}'",
                report.id, report.condition_key
            );
        }
        let created_at = report.created_at.unwrap_or(now);

        match states.entry(segment_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(SegmentState {
                    segment_id: segment_id.clone(),
                    condition_key: report.condition_key.clone(),
                    severity: report.severity,
                    count: 1,
                    latest_at: created_at,
                });
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                state.count += 1;
                if created_at >= state.latest_at {
                    state.condition_key = report.condition_key.clone();
                    state.latest_at = created_at;
                }
                state.severity = state.severity.max(report.severity);
            }
        }
    }

    states
}

/// Filter a snapshot to its live reports and aggregate them.
pub fn aggregate_live(
    snapshot: &[Report],
    now: DateTime<Utc>,
    config: &AggregationConfig,
) -> BTreeMap<String, SegmentState> {
    let live = live_reports(snapshot, now, config);
    let states = aggregate(live.iter().copied(), now);
    debug!(
        "[Aggregate] {} of {} reports live across {} segments",
        live.len(),
        snapshot.len(),
        states.len()
    );
    states
}
