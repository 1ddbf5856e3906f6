//! The acquisition pipeline.
//!
//! Sources push raw samples into one bounded channel. A single consumer drains
//! it, normalizes each sample, pushes a copy into the live window and hands
//! the event to the session recorder. Relay forwarding happens only after the
//! recorder accepted the event.
//!
//! All commands (`start_recording`, `switch_activity`, `stop_recording`) and
//! all sample processing run on whoever owns the `Pipeline`, so the recorder
//! sees one total order of events and commands.

use crate::collector::capability::{detect, CapabilityMap, SensorPlatform};
use crate::collector::source::SourceSet;
use crate::collector::types::{RawSample, SensorType};
use crate::config::{validate_sampling_rate, Config, ConfigError};
use crate::core::archive::SessionArchive;
use crate::core::event::{now_millis, ActivitySwitchMarker, SessionEntry};
use crate::core::export::{export, ExportArtifact, ExportError, ExportFormat, FileSink};
use crate::core::live_window::LiveWindow;
use crate::core::normalizer::normalize_sample;
use crate::core::recorder::{
    RecorderError, RecorderState, SessionRecorder, SessionSummary, StopOutcome,
};
use crate::relay::{ConnectionState, RelayError, RelayTransport, StreamRelay};
use crate::stats::{create_shared_stats, SharedRecordingStats};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Capacity of the raw sample channel shared by all sources.
pub const INGEST_CHANNEL_CAPACITY: usize = 10_000;

/// Point-in-time view of the pipeline for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub platform: String,
    pub state: RecorderState,
    pub activity: String,
    pub sampling_rate: u32,
    pub open_entries: usize,
    pub sessions: usize,
    pub active_sensors: Vec<SensorType>,
    pub relay: ConnectionState,
}

pub struct Pipeline {
    config: Config,
    platform: Box<dyn SensorPlatform>,
    capabilities: CapabilityMap,
    sources: SourceSet,
    sender: Sender<RawSample>,
    receiver: Receiver<RawSample>,
    live: LiveWindow<SessionEntry>,
    recorder: SessionRecorder,
    archive: SessionArchive,
    relay: StreamRelay,
    stats: SharedRecordingStats,
}

impl Pipeline {
    pub fn new(config: Config, platform: Box<dyn SensorPlatform>) -> Self {
        Self::with_stats(config, platform, create_shared_stats())
    }

    pub fn with_stats(
        config: Config,
        platform: Box<dyn SensorPlatform>,
        stats: SharedRecordingStats,
    ) -> Self {
        let (sender, receiver) = bounded(INGEST_CHANNEL_CAPACITY);
        let capabilities = detect(platform.as_ref());

        Self {
            live: LiveWindow::new(config.live_window_capacity),
            config,
            platform,
            capabilities,
            sources: SourceSet::default(),
            sender,
            receiver,
            recorder: SessionRecorder::new(),
            archive: SessionArchive::new(),
            relay: StreamRelay::new(stats.clone()),
            stats,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform_name(&self) -> &str {
        self.platform.name()
    }

    pub fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    /// Re-run capability detection.
    pub fn refresh_capabilities(&mut self) -> &CapabilityMap {
        self.capabilities = detect(self.platform.as_ref());
        &self.capabilities
    }

    /// Takes effect at the next `start_recording`.
    pub fn set_sampling_rate(&mut self, rate: u32) -> Result<(), ConfigError> {
        validate_sampling_rate(rate)?;
        self.config.sampling_rate = rate;
        Ok(())
    }

    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn current_activity(&self) -> &str {
        self.recorder.current_activity()
    }

    /// Sensor types the running sources can emit.
    pub fn active_sensors(&self) -> Vec<SensorType> {
        self.sources.active_sensors()
    }

    /// Start a recording.
    ///
    /// `activity` defaults to the current label. Fails without side effects
    /// when no activity is set or a recording is already open.
    pub fn start_recording(&mut self, activity: Option<&str>) -> Result<(), RecorderError> {
        let activity = activity
            .map(str::to_string)
            .unwrap_or_else(|| self.recorder.current_activity().to_string());
        self.recorder.check_start(&activity)?;

        if let Err(e) = self.platform.request_permissions() {
            warn!("Sensor permission request failed: {e}");
        }

        // Leftovers from the previous run belong to no session
        self.process_pending();

        self.refresh_capabilities();
        let rate = self.config.sampling_rate;
        self.sources = SourceSet::start(
            self.platform.as_ref(),
            self.config.selected_sensors.iter(),
            &self.capabilities,
            rate,
            &self.sender,
        );
        if self.sources.is_empty() {
            warn!("No sensor sources could be started; the session will stay empty");
        }

        self.recorder.start(&activity, rate, now_millis())?;
        info!(
            activity = %activity,
            rate,
            sources = self.sources.len(),
            "recording started"
        );
        Ok(())
    }

    /// Change the activity label, marking the switch in an open session.
    pub fn switch_activity(&mut self, activity: &str) -> bool {
        // Readings already captured belong before the marker
        self.process_pending();

        let now = now_millis();
        let previous = self.recorder.current_activity().to_string();
        let marked = self.recorder.switch_activity(activity, now);
        if marked {
            self.stats.record_activity_switch();
            self.live.push(SessionEntry::Switch(ActivitySwitchMarker::new(
                now,
                previous,
                self.recorder.current_activity(),
            )));
            info!(activity = %self.recorder.current_activity(), "activity switched");
        }
        marked
    }

    /// Stop sources and seal the open session.
    pub fn stop_recording(&mut self) -> StopOutcome {
        self.process_pending();

        let outcome = self
            .recorder
            .stop(&mut self.archive, &mut self.sources, now_millis());

        match outcome {
            StopOutcome::AlreadyIdle => return outcome,
            StopOutcome::Sealed { .. } => self.stats.record_session_sealed(),
            StopOutcome::Discarded => self.stats.record_session_discarded(),
        }
        if let Err(e) = self.stats.save() {
            warn!("Could not save recording stats: {e}");
        }
        outcome
    }

    /// Feed one raw sample through the pipeline.
    pub fn handle_sample(&mut self, sample: &RawSample) {
        let events = normalize_sample(sample, self.recorder.current_activity(), now_millis());
        self.stats.record_normalized(events.len() as u64);

        for event in events {
            self.live.push(SessionEntry::Reading(event.clone()));
            if self.recorder.on_event(&event) {
                self.stats.record_recorded();
                self.relay.forward(&event);
            } else {
                self.stats.record_idle();
            }
        }
    }

    /// Handle every sample already waiting in the channel.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(sample) = self.receiver.try_recv() {
            self.handle_sample(&sample);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a sample, then drain the channel.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(sample) => {
                self.handle_sample(&sample);
                1 + self.process_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Handle for injecting samples from outside the platform.
    pub fn sender(&self) -> Sender<RawSample> {
        self.sender.clone()
    }

    /// The most recent `k` live entries, oldest first.
    pub fn live_snapshot(&self, k: usize) -> Vec<SessionEntry> {
        self.live.snapshot(k)
    }

    /// The live entries a chart should show.
    pub fn chart_snapshot(&self) -> Vec<SessionEntry> {
        self.live.snapshot(self.config.chart_window)
    }

    pub fn archive(&self) -> &SessionArchive {
        &self.archive
    }

    pub fn session_summaries(&self) -> Vec<SessionSummary> {
        self.archive.summaries()
    }

    pub fn export(&self, format: ExportFormat) -> Result<ExportArtifact, ExportError> {
        let artifact = export(&self.archive, format)?;
        self.stats.record_export();
        Ok(artifact)
    }

    /// Export and hand the result to `sink`.
    pub fn export_to(
        &self,
        sink: &dyn FileSink,
        format: ExportFormat,
    ) -> Result<PathBuf, ExportError> {
        let artifact = self.export(format)?;
        sink.write(&artifact)
    }

    pub fn connect_relay(&mut self, transport: Box<dyn RelayTransport>) -> Result<(), RelayError> {
        self.relay.connect(transport)
    }

    pub fn disconnect_relay(&mut self) {
        self.relay.disconnect();
    }

    pub fn relay_state(&self) -> ConnectionState {
        self.relay.state()
    }

    pub fn stats(&self) -> &SharedRecordingStats {
        &self.stats
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            platform: self.platform.name().to_string(),
            state: self.recorder.state(),
            activity: self.recorder.current_activity().to_string(),
            sampling_rate: self.config.sampling_rate,
            open_entries: self.recorder.open_entry_count(),
            sessions: self.archive.count(),
            active_sensors: self.sources.active_sensors(),
            relay: self.relay.state(),
        }
    }
}
