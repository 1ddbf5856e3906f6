//! End-to-end tests for the acquisition pipeline

use motion_recorder::collector::{
    LegacySensorSource, LegacyStream, NativeSensorSource, RawReading, RawSample, RawVector,
    SensorPlatform, SensorSource, SensorType, SimulatedPlatform,
};
use motion_recorder::config::{Config, SensorSelection};
use motion_recorder::core::{
    export, ExportError, ExportFormat, LiveWindow, Session, SessionEntry, StopOutcome,
};
use motion_recorder::pipeline::Pipeline;
use motion_recorder::relay::{ConnectionState, RelayError, RelayTransport};
use motion_recorder::CanonicalEvent;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn idle_pipeline() -> Pipeline {
    Pipeline::new(Config::default(), Box::new(SimulatedPlatform::none()))
}

fn accel(x: f64, y: f64, z: f64) -> RawSample {
    RawSample::new(
        SensorType::Accelerometer,
        RawReading::Vector(RawVector::new(x, y, z)),
    )
}

fn pump_until(pipeline: &mut Pipeline, entries: usize) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while pipeline.status().open_entries < entries && Instant::now() < deadline {
        pipeline.pump(Duration::from_millis(20));
    }
}

#[test]
fn test_live_window_keeps_most_recent_in_order() {
    let mut window = LiveWindow::new(100);
    for i in 0..250 {
        window.push(i);
    }
    let all = window.snapshot(1_000);
    assert_eq!(all.len(), 100);
    assert_eq!(all.first(), Some(&150));
    assert_eq!(all.last(), Some(&249));
}

#[test]
fn test_stop_while_idle_leaves_archive_unchanged() {
    let mut pipeline = idle_pipeline();
    assert_eq!(pipeline.stop_recording(), StopOutcome::AlreadyIdle);
    assert_eq!(pipeline.archive().count(), 0);
}

#[test]
fn test_start_then_immediate_stop_is_discarded() {
    let mut pipeline = idle_pipeline();
    pipeline.start_recording(Some("Walking")).unwrap();
    assert_eq!(pipeline.stop_recording(), StopOutcome::Discarded);
    assert_eq!(pipeline.archive().count(), 0);
    assert_eq!(pipeline.stats().snapshot().sessions_discarded, 1);
}

#[test]
fn test_activity_switch_is_ordered_within_session() {
    let mut pipeline = idle_pipeline();
    pipeline.start_recording(Some("Walking")).unwrap();
    for i in 0..3 {
        pipeline.handle_sample(&accel(i as f64, 0.0, 9.8));
    }
    assert!(pipeline.switch_activity("Running"));
    for i in 3..5 {
        pipeline.handle_sample(&accel(i as f64, 0.0, 9.8));
    }
    pipeline.stop_recording();

    let session = &pipeline.archive().all()[0];
    assert_eq!(session.events.len(), 6);
    assert_eq!(session.activity, "Walking");

    let SessionEntry::Switch(marker) = &session.events[3] else {
        panic!("4th entry should be a switch marker");
    };
    assert_eq!(marker.previous_activity, "Walking");
    assert_eq!(marker.activity, "Running");
    assert!(marker.activity_switch);

    let labels: Vec<&str> = session.events.iter().map(|e| e.activity()).collect();
    assert_eq!(
        labels,
        vec!["Walking", "Walking", "Walking", "Running", "Running", "Running"]
    );
    let xs: Vec<f64> = session
        .events
        .iter()
        .filter_map(|e| e.as_reading())
        .filter_map(|e| e.payload.x())
        .collect();
    assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_export_round_trip_and_row_count() {
    let mut pipeline = idle_pipeline();

    pipeline.start_recording(Some("Walking")).unwrap();
    pipeline.handle_sample(&accel(0.1, 0.2, 9.7));
    pipeline.handle_sample(&RawSample::new(
        SensorType::AbsoluteOrientation,
        RawReading::Quaternion(None),
    ));
    pipeline.switch_activity("Sitting");
    pipeline.handle_sample(&RawSample::new(
        SensorType::AmbientLight,
        RawReading::Illuminance(Some(0.0)),
    ));
    pipeline.stop_recording();

    pipeline.start_recording(Some("Biking")).unwrap();
    pipeline.handle_sample(&accel(1.0, 1.0, 1.0));
    pipeline.stop_recording();

    let archive = pipeline.archive();
    assert_eq!(archive.count(), 2);

    let json = export(archive, ExportFormat::Json).unwrap();
    let parsed: Vec<Session> = serde_json::from_str(&json.content).unwrap();
    assert_eq!(parsed.as_slice(), archive.all());

    let csv = export(archive, ExportFormat::Csv).unwrap();
    let rows = csv.content.lines().count();
    assert_eq!(rows, 1 + archive.entry_count());
    assert_eq!(rows, 1 + 4 + 1);
}

#[test]
fn test_empty_archive_export_is_reported() {
    let pipeline = idle_pipeline();
    for format in ExportFormat::ALL {
        assert!(matches!(
            pipeline.export(format),
            Err(ExportError::EmptyArchive)
        ));
    }
}

#[test]
fn test_running_accelerometer_csv_scenario() {
    let mut config = Config::default();
    config.sampling_rate = 50;
    let mut pipeline = Pipeline::new(config, Box::new(SimulatedPlatform::none()));

    pipeline.start_recording(Some("Running")).unwrap();
    pipeline.handle_sample(&accel(1.0, 0.0, 9.8));
    pipeline.handle_sample(&accel(1.1, 0.0, 9.8));
    pipeline.stop_recording();

    let csv = pipeline.export(ExportFormat::Csv).unwrap().content;
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let col = |name: &str| headers.iter().position(|h| h == name).unwrap();

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);

    let expected = [("1", "0", "9.8"), ("1.1", "0", "9.8")];
    for (row, (x, y, z)) in rows.iter().zip(expected) {
        assert_eq!(&row[col("X")], x);
        assert_eq!(&row[col("Y")], y);
        assert_eq!(&row[col("Z")], z);
        assert_eq!(&row[col("SensorType")], "accelerometer");
        assert_eq!(&row[col("Activity")], "Running");
        assert_eq!(&row[col("SamplingRate")], "50");
        assert_eq!(&row[col("Alpha")], "");
        assert_eq!(&row[col("Quaternion")], "");
    }
}

#[test]
fn test_source_stop_is_idempotent() {
    let platform = SimulatedPlatform::all_native();
    let driver = platform.native_driver(SensorType::Gyroscope).unwrap();
    let (tx, rx) = crossbeam_channel::bounded(1_000);

    let mut source = NativeSensorSource::new(driver, 100);
    source.stop();
    source.start(tx).unwrap();
    assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());

    source.stop();
    source.stop();
    assert!(!source.is_running());

    while rx.try_recv().is_ok() {}
    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_events_after_stop_never_reach_a_session() {
    let mut pipeline = idle_pipeline();
    let sender = pipeline.sender();

    pipeline.start_recording(Some("Walking")).unwrap();
    sender.send(accel(1.0, 0.0, 0.0)).unwrap();
    pipeline.stop_recording();

    // Delivered after the recorder went idle
    sender.send(accel(99.0, 0.0, 0.0)).unwrap();

    pipeline.start_recording(Some("Walking")).unwrap();
    sender.send(accel(2.0, 0.0, 0.0)).unwrap();
    pipeline.stop_recording();

    let recorded: Vec<f64> = pipeline
        .archive()
        .all()
        .iter()
        .flat_map(|s| s.events.iter())
        .filter_map(|e| e.as_reading())
        .filter_map(|e| e.payload.x())
        .collect();
    assert_eq!(recorded, vec![1.0, 2.0]);

    // The late reading still reached the live window
    let live: Vec<f64> = pipeline
        .live_snapshot(10)
        .iter()
        .filter_map(|e| e.as_reading())
        .filter_map(|e| e.payload.x())
        .collect();
    assert_eq!(live, vec![1.0, 99.0, 2.0]);
}

fn reading_counts(session: &Session) -> BTreeMap<SensorType, usize> {
    let mut counts = BTreeMap::new();
    for event in session.events.iter().filter_map(|e| e.as_reading()) {
        *counts.entry(event.sensor_type).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_legacy_fallback_splits_motion_events() {
    let mut config = Config::default();
    config.selected_sensors =
        SensorSelection::from_csv("accelerometer,accelerometerWithGravity,gyroscope").unwrap();
    let mut pipeline = Pipeline::new(config, Box::new(SimulatedPlatform::legacy_only()));

    assert!(pipeline.capabilities().is_available(SensorType::Accelerometer));
    pipeline.start_recording(Some("Standing")).unwrap();
    pump_until(&mut pipeline, 6);
    pipeline.stop_recording();

    let counts = reading_counts(&pipeline.archive().all()[0]);
    assert!(counts.contains_key(&SensorType::Accelerometer));
    assert!(counts.contains_key(&SensorType::AccelerometerWithGravity));
    assert!(counts.contains_key(&SensorType::Gyroscope));
}

#[test]
fn test_legacy_fallback_respects_selection() {
    let mut config = Config::default();
    config.selected_sensors = SensorSelection::from_csv("accelerometer").unwrap();
    let mut pipeline = Pipeline::new(config, Box::new(SimulatedPlatform::legacy_only()));

    pipeline.start_recording(Some("Standing")).unwrap();
    pump_until(&mut pipeline, 6);
    pipeline.stop_recording();

    let counts = reading_counts(&pipeline.archive().all()[0]);
    assert_eq!(
        counts.keys().copied().collect::<Vec<_>>(),
        vec![SensorType::Accelerometer]
    );
}

#[test]
fn test_mixed_native_and_fallback_sources_do_not_duplicate() {
    let mut config = Config::default();
    config.sampling_rate = 10;
    config.selected_sensors = SensorSelection::from_csv("accelerometer,gyroscope").unwrap();
    let platform = SimulatedPlatform::all_native().failing_on_open([SensorType::Gyroscope]);
    let mut pipeline = Pipeline::new(config, Box::new(platform));

    pipeline.start_recording(Some("Walking")).unwrap();
    assert_eq!(
        pipeline.active_sensors(),
        vec![SensorType::Accelerometer, SensorType::Gyroscope]
    );
    let started = Instant::now();
    while started.elapsed() < Duration::from_millis(600) {
        pipeline.pump(Duration::from_millis(20));
    }
    pipeline.stop_recording();

    let counts = reading_counts(&pipeline.archive().all()[0]);
    assert!(!counts.contains_key(&SensorType::AccelerometerWithGravity));
    assert!(counts.get(&SensorType::Gyroscope).copied().unwrap_or(0) > 0);

    // Only the 10 Hz native source feeds the accelerometer
    let accel = counts.get(&SensorType::Accelerometer).copied().unwrap_or(0);
    assert!((1..=10).contains(&accel), "accelerometer readings: {accel}");
}

#[test]
fn test_detect_start_race_is_tolerated() {
    let mut config = Config::default();
    config.selected_sensors = SensorSelection::from_csv("magnetometer,accelerometer").unwrap();
    let platform =
        SimulatedPlatform::with_native([SensorType::Magnetometer, SensorType::Accelerometer])
            .failing_on_open([SensorType::Magnetometer]);
    let mut pipeline = Pipeline::new(config, Box::new(platform));

    pipeline.start_recording(Some("Sitting")).unwrap();
    assert_eq!(pipeline.active_sensors(), vec![SensorType::Accelerometer]);
    pump_until(&mut pipeline, 3);
    assert!(matches!(
        pipeline.stop_recording(),
        StopOutcome::Sealed { .. }
    ));
}

#[test]
fn test_permission_failure_does_not_block_recording() {
    let platform = SimulatedPlatform::all_native().denying_permissions("user dismissed prompt");
    let mut pipeline = Pipeline::new(Config::default(), Box::new(platform));

    pipeline.start_recording(Some("Walking")).unwrap();
    assert!(pipeline.is_recording());
    pipeline.stop_recording();
}

#[derive(Clone, Default)]
struct CollectingTransport {
    sent: Arc<Mutex<Vec<CanonicalEvent>>>,
}

impl RelayTransport for CollectingTransport {
    fn connect(&mut self) -> Result<(), RelayError> {
        Ok(())
    }

    fn send(&mut self, event: &CanonicalEvent) -> Result<(), RelayError> {
        self.sent.lock().push(event.clone());
        Ok(())
    }
}

#[test]
fn test_relay_only_forwards_recorded_events() {
    let mut pipeline = idle_pipeline();
    let transport = CollectingTransport::default();
    let sent = Arc::clone(&transport.sent);

    pipeline.connect_relay(Box::new(transport)).unwrap();
    assert_eq!(pipeline.relay_state(), ConnectionState::Connected);

    pipeline.handle_sample(&accel(5.0, 0.0, 0.0));
    pipeline.start_recording(Some("Running")).unwrap();
    pipeline.handle_sample(&accel(6.0, 0.0, 0.0));
    pipeline.handle_sample(&accel(7.0, 0.0, 0.0));
    pipeline.stop_recording();
    pipeline.handle_sample(&accel(8.0, 0.0, 0.0));
    pipeline.disconnect_relay();

    let xs: Vec<f64> = sent.lock().iter().filter_map(|e| e.payload.x()).collect();
    assert_eq!(xs, vec![6.0, 7.0]);
    assert_eq!(pipeline.relay_state(), ConnectionState::Disconnected);
}

#[test]
fn test_legacy_source_can_be_used_directly() {
    let platform = SimulatedPlatform::legacy_only();
    let driver = platform.legacy_driver(LegacyStream::Orientation).unwrap();
    let (tx, rx) = crossbeam_channel::bounded(100);

    let mut source = LegacySensorSource::new(LegacyStream::Orientation, driver);
    source.start(tx).unwrap();
    let sample = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    source.stop();

    assert_eq!(sample.sensor_type, SensorType::Orientation);
    assert!(matches!(sample.reading, RawReading::Orientation(_)));
}
