//! # Road Session
//!
//! Owns everything a running map session needs between calls: the loaded road
//! network, the snap and aggregation configuration, and the segment states from
//! the last report snapshot. Callers hold the session and pass it around
//! explicitly; there is no global instance.
//!
//! ## Lifecycle
//!
//! - The network is loaded once, or recorded as unavailable when loading fails.
//!   A reload replaces it wholesale.
//! - Each position fix is snapped on demand; nothing is retained per fix.
//! - Each report snapshot replaces the previous one and the segment states are
//!   recomputed from scratch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate_live, AggregationConfig};
use crate::conditions;
use crate::error::Result;
use crate::network::{IndexConfig, IndexedRoadNetwork, NearestRoad, NetworkStats, RoadNetwork};
use crate::snap::{decide, SnapConfig, SnapDecision};
use crate::{PositionFix, Report, SegmentState, Severity};

/// Load state of the road network.
#[derive(Debug, Clone)]
pub enum NetworkState {
    /// Nothing loaded yet
    NotLoaded,
    Loaded(IndexedRoadNetwork),
    /// Loading failed; the snap gate stays closed until a reload succeeds
    Unavailable { reason: String },
}

impl NetworkState {
    pub fn is_available(&self) -> bool {
        matches!(self, NetworkState::Loaded(_))
    }

    fn unavailable_reason(&self) -> &str {
        match self {
            NetworkState::NotLoaded => "road network not loaded",
            NetworkState::Unavailable { reason } => reason,
            NetworkState::Loaded(_) => "",
        }
    }
}

/// A report ready to be written to the report store.
///
/// The store assigns `createdAt` on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    pub condition_key: String,
    pub severity: Severity,
    /// Coordinate of record: the snapped point, or the raw fix when unsnapped
    pub snapped_lat: f64,
    pub snapped_lon: f64,
    pub raw_accuracy_meters: f64,
    /// Distance from the raw fix to the road, `None` when unsnapped
    pub snap_distance_meters: Option<f64>,
    pub segment_id: Option<String>,
}

/// Session statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub network_available: bool,
    pub network: Option<NetworkStats>,
    pub segment_state_count: u32,
    pub live_report_count: u32,
}

/// The snapping and aggregation session.
pub struct RoadSession {
    network: NetworkState,
    snap_config: SnapConfig,
    aggregation_config: AggregationConfig,
    index_config: IndexConfig,
    segment_states: BTreeMap<String, SegmentState>,
}

impl Default for RoadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RoadSession {
    /// Create a session with default configuration and no network loaded.
    pub fn new() -> Self {
        Self {
            network: NetworkState::NotLoaded,
            snap_config: SnapConfig::default(),
            aggregation_config: AggregationConfig::default(),
            index_config: IndexConfig::default(),
            segment_states: BTreeMap::new(),
        }
    }

    /// Create a session with custom configuration.
    pub fn with_config(snap_config: SnapConfig, aggregation_config: AggregationConfig) -> Self {
        Self {
            snap_config,
            aggregation_config,
            ..Self::new()
        }
    }

    // ========================================================================
    // Network
    // ========================================================================

    /// Install a road network, replacing any previous one.
    pub fn load_network(&mut self, network: RoadNetwork) {
        let stats = network.stats();
        info!(
            "[RoadSession] Loaded network: {} segments, {} vertices, {} usable sub-segments",
            stats.segment_count, stats.vertex_count, stats.usable_sub_segments
        );
        self.network = NetworkState::Loaded(IndexedRoadNetwork::with_config(
            network,
            self.index_config.clone(),
        ));
    }

    /// Parse and install a GeoJSON road network.
    ///
    /// On failure the network is recorded as unavailable and the error returned.
    pub fn load_geojson(&mut self, json: &str) -> Result<()> {
        match RoadNetwork::from_geojson_str(json) {
            Ok(network) => {
                self.load_network(network);
                Ok(())
            }
            Err(err) => {
                self.mark_network_unavailable(err.to_string());
                Err(err)
            }
        }
    }

    /// Record that the road network could not be loaded.
    pub fn mark_network_unavailable(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("[RoadSession] Road network unavailable: {}", reason);
        self.network = NetworkState::Unavailable { reason };
    }

    pub fn network_state(&self) -> &NetworkState {
        &self.network
    }

    pub fn network(&self) -> Option<&RoadNetwork> {
        match &self.network {
            NetworkState::Loaded(indexed) => Some(indexed.network()),
            _ => None,
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn snap_config(&self) -> &SnapConfig {
        &self.snap_config
    }

    pub fn set_snap_config(&mut self, config: SnapConfig) {
        self.snap_config = config;
    }

    pub fn aggregation_config(&self) -> &AggregationConfig {
        &self.aggregation_config
    }

    /// Takes effect from the next snapshot.
    pub fn set_aggregation_config(&mut self, config: AggregationConfig) {
        self.aggregation_config = config;
    }

    /// Takes effect from the next network load.
    pub fn set_index_config(&mut self, config: IndexConfig) {
        self.index_config = config;
    }

    // ========================================================================
    // Snapping
    // ========================================================================

    /// Run the snap policy for `fix` against the current network.
    pub fn snap(&self, fix: &PositionFix) -> SnapDecision {
        let nearest = match &self.network {
            NetworkState::Loaded(indexed) => indexed.nearest(fix.point()),
            _ => None,
        };
        decide(
            fix,
            nearest.as_ref(),
            self.network.is_available(),
            &self.snap_config,
        )
    }

    /// Validate and snap a new report.
    ///
    /// Fails with `InvalidCondition` for keys outside the vocabulary, `InvalidFix`
    /// for malformed fixes, and the matching rejection error when the snap policy
    /// rejects the fix. Nothing is retained by the session.
    pub fn prepare_submission(
        &self,
        condition_key: &str,
        fix: &PositionFix,
    ) -> Result<ReportSubmission> {
        let condition = conditions::condition(condition_key)?;
        fix.validate()?;

        let submission = match self.snap(fix) {
            SnapDecision::Accept {
                segment_id,
                point,
                distance_meters,
            } => ReportSubmission {
                condition_key: condition.key.to_string(),
                severity: condition.severity,
                snapped_lat: point.latitude,
                snapped_lon: point.longitude,
                raw_accuracy_meters: fix.accuracy_meters,
                snap_distance_meters: Some(distance_meters),
                segment_id: Some(segment_id),
            },
            SnapDecision::AcceptRaw { point } => ReportSubmission {
                condition_key: condition.key.to_string(),
                severity: condition.severity,
                snapped_lat: point.latitude,
                snapped_lon: point.longitude,
                raw_accuracy_meters: fix.accuracy_meters,
                snap_distance_meters: None,
                segment_id: None,
            },
            SnapDecision::Reject(rejection) => {
                info!("[RoadSession] Report rejected: {}", rejection.message());
                return Err(rejection.into_error(self.network.unavailable_reason()));
            }
        };

        info!(
            "[RoadSession] Prepared '{}' report on segment {:?}",
            submission.condition_key, submission.segment_id
        );
        Ok(submission)
    }

    // ========================================================================
    // Aggregation
    // ========================================================================

    /// Replace the report snapshot and recompute every segment state.
    pub fn apply_snapshot(
        &mut self,
        reports: &[Report],
        now: DateTime<Utc>,
    ) -> &BTreeMap<String, SegmentState> {
        self.segment_states = aggregate_live(reports, now, &self.aggregation_config);
        info!(
            "[RoadSession] Snapshot of {} reports -> {} segment states",
            reports.len(),
            self.segment_states.len()
        );
        &self.segment_states
    }

    /// Segment states from the last snapshot.
    pub fn segment_states(&self) -> &BTreeMap<String, SegmentState> {
        &self.segment_states
    }

    pub fn segment_state(&self, segment_id: &str) -> Option<&SegmentState> {
        self.segment_states.get(segment_id)
    }

    /// Segment states from the last snapshot as a JSON object keyed by segment id.
    pub fn segment_states_json(&self) -> String {
        serde_json::to_string(&self.segment_states).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            network_available: self.network.is_available(),
            network: self.network().map(RoadNetwork::stats),
            segment_state_count: self.segment_states.len() as u32,
            live_report_count: self.segment_states.values().map(|s| s.count).sum(),
        }
    }
}
