//! End-to-end pipeline tests: GeoJSON roads -> snap -> reports -> segment states.

use chrono::{DateTime, Duration, TimeZone, Utc};
use road_snap::geo_utils::meters_to_degrees;
use road_snap::{
    FixConfig, FixProgress, FixSelector, NearestRoad, PositionFix, Report, RoadSession,
    RoadSnapError, Severity,
};

const ROADS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "properties": {"segmentId": "hwy-5"},
         "geometry": {"type": "LineString", "coordinates": [[-99.80, 48.84], [-99.70, 48.84]]}},
        {"type": "Feature", "properties": {"segmentId": "county-12"},
         "geometry": {"type": "LineString", "coordinates": [[-99.75, 48.80], [-99.75, 48.83], [-99.75, 48.83]]}}
    ]
}"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap()
}

fn session() -> RoadSession {
    init_logging();
    let mut session = RoadSession::new();
    session.load_geojson(ROADS).expect("roads should parse");
    session
}

/// Fix `meters` north of hwy-5, well away from county-12.
fn fix_north_of_highway(meters: f64, accuracy: f64) -> PositionFix {
    let (dlat, _) = meters_to_degrees(meters, 48.84);
    PositionFix::new(48.84 + dlat, -99.72, accuracy)
}

#[test]
fn test_snap_bound_follows_accuracy() {
    let session = session();

    let near = session
        .prepare_submission("snowCovered", &fix_north_of_highway(45.0, 50.0))
        .unwrap();
    assert_eq!(near.segment_id.as_deref(), Some("hwy-5"));
    assert!((near.snapped_lat - 48.84).abs() < 1e-9);
    assert!((near.snap_distance_meters.unwrap() - 45.0).abs() < 1e-6);

    let far = session
        .prepare_submission("snowCovered", &fix_north_of_highway(55.0, 50.0))
        .unwrap_err();
    match far {
        RoadSnapError::TooFarFromRoad {
            distance_meters,
            bound_meters,
        } => {
            assert!((distance_meters - 55.0).abs() < 1e-6);
            assert_eq!(bound_meters, 50.0);
        }
        other => panic!("expected TooFarFromRoad, got {:?}", other),
    }
}

#[test]
fn test_low_accuracy_rejected_on_top_of_road() {
    let session = session();
    let err = session
        .prepare_submission("frost", &PositionFix::new(48.84, -99.72, 140.0))
        .unwrap_err();
    assert!(matches!(err, RoadSnapError::LowAccuracyFix { .. }));
    assert!(err.is_user_correctable());
}

#[test]
fn test_degenerate_tail_does_not_break_search() {
    let session = session();
    let network = session.network().unwrap();
    // county-12 ends in a duplicated vertex
    let nearest = network.nearest(road_snap::GpsPoint::new(48.82, -99.751)).unwrap();
    assert_eq!(nearest.segment_id, "county-12");
    assert_eq!(network.stats().usable_sub_segments, 2);
}

#[test]
fn test_fix_selection_feeds_submission() {
    let session = session();
    let mut selector = FixSelector::new(FixConfig::default());

    let readings = [
        (fix_north_of_highway(30.0, 90.0), 400),
        (fix_north_of_highway(12.0, 35.0), 2_000),
        (fix_north_of_highway(8.0, 18.0), 3_500),
    ];
    let mut resolved = None;
    for (fix, ms) in readings {
        if let FixProgress::Resolved(best) = selector
            .offer(fix, std::time::Duration::from_millis(ms))
            .unwrap()
        {
            resolved = Some(best);
            break;
        }
    }

    let best = resolved.expect("18m fix should resolve the selection");
    assert_eq!(best.accuracy_meters, 18.0);
    let submission = session.prepare_submission("scatteredIce", &best).unwrap();
    assert_eq!(submission.segment_id.as_deref(), Some("hwy-5"));
}

#[test]
fn test_submissions_aggregate_per_segment() {
    let mut session = session();

    let mild = session
        .prepare_submission("scatteredFrost", &fix_north_of_highway(5.0, 10.0))
        .unwrap();
    let severe = session
        .prepare_submission("iceCompactedSnow", &fix_north_of_highway(9.0, 10.0))
        .unwrap();

    // The store echoes submissions back with ids and server timestamps
    let snapshot = vec![
        Report {
            id: "a".to_string(),
            condition_key: mild.condition_key.clone(),
            severity: mild.severity,
            created_at: Some(now() - Duration::minutes(10)),
            segment_id: mild.segment_id.clone(),
        },
        Report {
            id: "b".to_string(),
            condition_key: severe.condition_key.clone(),
            severity: severe.severity,
            created_at: Some(now() - Duration::hours(3)),
            segment_id: severe.segment_id.clone(),
        },
        Report {
            id: "expired".to_string(),
            condition_key: "closedBlocked".to_string(),
            severity: Severity::High,
            created_at: Some(now() - Duration::hours(25)),
            segment_id: Some("county-12".to_string()),
        },
    ];

    let states = session.apply_snapshot(&snapshot, now()).clone();
    assert_eq!(states.len(), 1);
    let hwy = &states["hwy-5"];
    assert_eq!(hwy.count, 2);
    assert_eq!(hwy.condition_key, "scatteredFrost");
    assert_eq!(hwy.severity, Severity::High);

    // Same snapshot, same answer
    assert_eq!(session.apply_snapshot(&snapshot, now()), &states);

    // Once the severe report ages out the segment relaxes to the mild one
    let later = now() + Duration::hours(23);
    let states = session.apply_snapshot(&snapshot, later);
    assert_eq!(states["hwy-5"].count, 1);
    assert_eq!(states["hwy-5"].condition_key, "scatteredFrost");
    assert_eq!(states["hwy-5"].severity, Severity::Low);
}
