//! Demonstration of a full recording cycle on the simulated platform.
//!
//! This example shows how to:
//! 1. Detect sensor capabilities
//! 2. Start a recording with an activity label
//! 3. Switch activity mid-session
//! 4. Stop, inspect the session and export it
//!
//! Run with: cargo run --example record_demo
//!
//! Ctrl+C stops the recording early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use motion_recorder::{
    collector::SimulatedPlatform,
    config::{Config, SensorSelection},
    core::{ExportFormat, SessionEntry, StopOutcome},
    pipeline::Pipeline,
};

fn main() {
    println!("Motion Recorder - Record Demo");
    println!("=============================");
    println!();

    let mut config = Config::default();
    config.sampling_rate = 20;
    config.selected_sensors = SensorSelection::from_csv("accelerometer,gyroscope,ambientLight")
        .unwrap_or_default();

    let mut pipeline = Pipeline::new(config, Box::new(SimulatedPlatform::all_native()));

    println!("Capabilities:");
    for (sensor, available) in pipeline.capabilities().iter() {
        println!("  {:<26} {}", sensor.to_string(), if available { "✓" } else { "✗" });
    }
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    if let Err(e) = pipeline.start_recording(Some("Walking")) {
        eprintln!("Could not start recording: {e}");
        return;
    }
    println!("Recording 'Walking' for 3 seconds...");

    let started = Instant::now();
    let mut switched = false;
    while running.load(Ordering::SeqCst) && started.elapsed() < Duration::from_secs(3) {
        pipeline.pump(Duration::from_millis(50));

        if !switched && started.elapsed() >= Duration::from_millis(1500) {
            pipeline.switch_activity("Running");
            println!("Switched to 'Running'");
            switched = true;
        }
    }

    match pipeline.stop_recording() {
        StopOutcome::Sealed { id, entries } => println!("Session {id}: {entries} entries"),
        other => {
            println!("Nothing recorded ({other:?})");
            return;
        }
    }
    println!();

    // Show the last few live entries
    println!("Latest live entries:");
    for entry in pipeline.live_snapshot(5) {
        match entry {
            SessionEntry::Reading(e) => println!(
                "  {} {:<14} {}",
                e.timestamp,
                e.sensor_type.to_string(),
                serde_json::to_string(&e.payload).unwrap_or_default()
            ),
            SessionEntry::Switch(m) => println!(
                "  {} ACTIVITY SWITCH {} -> {}",
                m.timestamp, m.previous_activity, m.activity
            ),
        }
    }
    println!();

    for summary in pipeline.session_summaries() {
        println!(
            "{} | {} | {:.2}s @ {} Hz | {} entries",
            summary.id,
            summary.activity,
            summary.duration_secs,
            summary.sampling_rate,
            summary.event_count
        );
    }
    println!();

    match pipeline.export(ExportFormat::Csv) {
        Ok(artifact) => {
            println!("{} (first lines):", artifact.filename);
            for line in artifact.content.lines().take(6) {
                println!("  {line}");
            }
        }
        Err(e) => eprintln!("Export failed: {e}"),
    }

    println!();
    println!("{}", pipeline.stats().summary());
}
