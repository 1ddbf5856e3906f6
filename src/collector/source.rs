//! Sensor sources: one running acquisition per sensor (or per legacy stream).
//!
//! A source owns a platform driver and a background thread that polls it.
//! Readings are pushed into a bounded crossbeam channel with `try_send`, so a
//! slow consumer drops readings instead of stalling acquisition. Stopping a
//! source joins its thread: once `stop()` returns nothing more is delivered.

use crate::collector::capability::{CapabilityMap, SensorPlatform};
use crate::collector::types::{LegacyStream, RawReading, RawSample, SensorType};
use crossbeam_channel::Sender;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Coarse legacy streams fire on their own platform schedule (~60 Hz).
pub const LEGACY_EVENT_INTERVAL: Duration = Duration::from_millis(16);

/// Upper bound on how long a stop request waits for a sleeping poll loop.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(5);

/// Errors that can occur while starting sensor acquisition.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("{0} is not available on this platform")]
    Unavailable(SensorType),
    #[error("Sensor source is already running")]
    AlreadyRunning,
    #[error("Sensor source was already used; create a new one to restart")]
    Spent,
    #[error("Permission request failed: {0}")]
    PermissionDenied(String),
    #[error("Sensor I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Low-level access to one sensor (or one legacy stream) on a platform.
pub trait SensorDriver: Send + 'static {
    /// Sensor type stamped on the samples this driver produces.
    fn sensor_type(&self) -> SensorType;

    /// Acquire the sensor. Fails if it disappeared since capability detection.
    fn open(&mut self) -> Result<(), CollectorError>;

    /// Next reading, or `None` when nothing new is available this tick.
    fn read(&mut self) -> Option<RawReading>;

    /// Release the sensor.
    fn close(&mut self) {}
}

/// Whether a source reads the fine-grained sensor or a coarse legacy stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Native,
    LegacyFallback,
}

/// A start/stop-able producer of raw samples.
///
/// Callers treat native and legacy sources the same way.
pub trait SensorSource: Send {
    fn kind(&self) -> SourceKind;

    /// Sensor types this source can emit.
    fn emits(&self) -> Vec<SensorType>;

    /// Begin producing samples into `sink`.
    fn start(&mut self, sink: Sender<RawSample>) -> Result<(), CollectorError>;

    /// Stop producing. Safe to call repeatedly or before `start`.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Something that can halt every running sensor source.
pub trait SourceControl {
    fn stop_all(&mut self);
}

/// Background polling thread shared by both source kinds.
struct PollWorker {
    driver: Option<Box<dyn SensorDriver>>,
    interval: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PollWorker {
    fn new(driver: Box<dyn SensorDriver>, interval: Duration) -> Self {
        Self {
            driver: Some(driver),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    fn start(&mut self, sink: Sender<RawSample>) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        let mut driver = self.driver.take().ok_or(CollectorError::Spent)?;

        if let Err(e) = driver.open() {
            // Keep the driver so a failed start leaves the source untouched
            self.driver = Some(driver);
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let interval = self.interval;

        let handle = thread::spawn(move || {
            let sensor_type = driver.sensor_type();
            while running.load(Ordering::SeqCst) {
                if let Some(reading) = driver.read() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    // Don't block if the channel is full - just drop the reading
                    let _ = sink.try_send(RawSample::new(sensor_type, reading));
                }
                sleep_while_running(interval, &running);
            }
            driver.close();
        });

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let slice = remaining.min(STOP_CHECK_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}

/// Polls a fine-grained sensor at the requested sampling frequency.
pub struct NativeSensorSource {
    sensor_type: SensorType,
    worker: PollWorker,
}

impl NativeSensorSource {
    pub fn new(driver: Box<dyn SensorDriver>, frequency: u32) -> Self {
        Self {
            sensor_type: driver.sensor_type(),
            worker: PollWorker::new(driver, Duration::from_secs(1) / frequency.max(1)),
        }
    }
}

impl SensorSource for NativeSensorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Native
    }

    fn emits(&self) -> Vec<SensorType> {
        vec![self.sensor_type]
    }

    fn start(&mut self, sink: Sender<RawSample>) -> Result<(), CollectorError> {
        self.worker.start(sink)
    }

    fn stop(&mut self) {
        self.worker.stop();
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

/// Reads a coarse legacy stream on the platform's own schedule.
///
/// The source only passes on the sensor types it stands in for: a motion
/// source covering just the gyroscope never emits acceleration. One motion
/// event later splits into the covered accelerometer, accelerometer-with-gravity
/// and gyroscope readings; one orientation event becomes one orientation reading.
pub struct LegacySensorSource {
    stream: LegacyStream,
    covers: BTreeSet<SensorType>,
    worker: PollWorker,
}

impl LegacySensorSource {
    /// A source passing on everything the stream carries.
    pub fn new(stream: LegacyStream, driver: Box<dyn SensorDriver>) -> Self {
        Self::covering(stream, driver, stream.sensor_types().iter().copied())
    }

    /// A source passing on only `covers` (intersected with what the stream carries).
    pub fn covering(
        stream: LegacyStream,
        driver: Box<dyn SensorDriver>,
        covers: impl IntoIterator<Item = SensorType>,
    ) -> Self {
        let covers: BTreeSet<SensorType> = covers
            .into_iter()
            .filter(|t| stream.sensor_types().contains(t))
            .collect();
        let driver = Box::new(CoveringDriver {
            inner: driver,
            covers: covers.clone(),
        });
        Self {
            stream,
            covers,
            worker: PollWorker::new(driver, LEGACY_EVENT_INTERVAL),
        }
    }

    pub fn stream(&self) -> LegacyStream {
        self.stream
    }
}

/// Masks the motion groups a legacy source does not stand in for.
struct CoveringDriver {
    inner: Box<dyn SensorDriver>,
    covers: BTreeSet<SensorType>,
}

impl SensorDriver for CoveringDriver {
    fn sensor_type(&self) -> SensorType {
        self.inner.sensor_type()
    }

    fn open(&mut self) -> Result<(), CollectorError> {
        self.inner.open()
    }

    fn read(&mut self) -> Option<RawReading> {
        match self.inner.read()? {
            RawReading::Motion(motion) => {
                let motion = motion.retain(&self.covers);
                (!motion.is_empty()).then_some(RawReading::Motion(motion))
            }
            other => Some(other),
        }
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

impl SensorSource for LegacySensorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LegacyFallback
    }

    fn emits(&self) -> Vec<SensorType> {
        self.stream
            .sensor_types()
            .iter()
            .copied()
            .filter(|t| self.covers.contains(t))
            .collect()
    }

    fn start(&mut self, sink: Sender<RawSample>) -> Result<(), CollectorError> {
        self.worker.start(sink)
    }

    fn stop(&mut self) {
        self.worker.stop();
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

/// The set of sources started for one recording.
#[derive(Default)]
pub struct SourceSet {
    sources: Vec<Box<dyn SensorSource>>,
}

impl SourceSet {
    /// Start a source for every selected, available sensor.
    ///
    /// A native sensor that fails to open falls back to its legacy stream when
    /// one exists; otherwise it is simply not started. Each legacy stream is
    /// started at most once and only carries the selected sensors that have no
    /// running native source, so a fallback never duplicates a native stream.
    pub fn start(
        platform: &dyn SensorPlatform,
        selected: impl IntoIterator<Item = SensorType>,
        capabilities: &CapabilityMap,
        frequency: u32,
        sink: &Sender<RawSample>,
    ) -> Self {
        let mut set = SourceSet::default();
        let mut fallbacks: Vec<(LegacyStream, BTreeSet<SensorType>)> = Vec::new();

        for sensor in selected {
            if !capabilities.is_available(sensor) {
                debug!(%sensor, "sensor not available, skipping");
                continue;
            }

            if let Some(driver) = platform.native_driver(sensor) {
                let mut source = NativeSensorSource::new(driver, frequency);
                match source.start(sink.clone()) {
                    Ok(()) => {
                        debug!(%sensor, frequency, "started native source");
                        set.sources.push(Box::new(source));
                        continue;
                    }
                    Err(e) => warn!(%sensor, error = %e, "native source failed to start"),
                }
            }

            let Some(stream) = sensor.legacy_fallback() else {
                continue;
            };
            match fallbacks.iter_mut().find(|(s, _)| *s == stream) {
                Some((_, covers)) => {
                    covers.insert(sensor);
                }
                None => fallbacks.push((stream, BTreeSet::from([sensor]))),
            }
        }

        for (stream, covers) in fallbacks {
            let Some(driver) = platform.legacy_driver(stream) else {
                debug!(?stream, ?covers, "no legacy stream on this platform");
                continue;
            };
            let mut source = LegacySensorSource::covering(stream, driver, covers);
            match source.start(sink.clone()) {
                Ok(()) => {
                    debug!(?stream, covers = ?source.emits(), "started legacy fallback source");
                    set.sources.push(Box::new(source));
                }
                Err(e) => warn!(?stream, error = %e, "legacy source failed to start"),
            }
        }

        set
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sensor types the running sources can emit, in start order.
    pub fn active_sensors(&self) -> Vec<SensorType> {
        let mut out = Vec::new();
        for source in &self.sources {
            for t in source.emits() {
                if !out.contains(&t) {
                    out.push(t);
                }
            }
        }
        out
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }
}

impl SourceControl for SourceSet {
    fn stop_all(&mut self) {
        for source in &mut self.sources {
            source.stop();
        }
        self.sources.clear();
    }
}

impl Drop for SourceSet {
    fn drop(&mut self) {
        self.stop_all();
    }
}
