//! Fixed-length capture of the live output to a file.
//!
//! A capture taps the final output of an active graph, runs on its own writer
//! thread and never affects playback. At most one capture runs at a time.
//!
//! Contents:
//! - `CaptureBackend` / `CaptureWriter` : where samples end up
//! - `WavCaptureBackend`                : mono 32-bit float WAV via `hound`
//! - `UnsupportedCapture`               : for environments without capture
//! - `Recorder`                         : busy flag, duration, writer thread
//! - `CaptureJob`                       : handle to a running capture

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};

use crate::chain::CaptureTap;
use crate::error::ExportError;
use crate::graph::SignalGraph;

/// Length of a capture unless configured otherwise.
pub const DEFAULT_CAPTURE: Duration = Duration::from_secs(10);
pub const DEFAULT_FILE_NAME: &str = "wind_turbine_10s.wav";

/// Sink for one capture.
pub trait CaptureWriter: Send {
    fn write_sample(&mut self, s: f32) -> Result<(), ExportError>;
    fn path(&self) -> &Path;
    /// Flush and close; returns where the capture was stored.
    fn finish(self: Box<Self>) -> Result<PathBuf, ExportError>;
}

/// Factory for capture writers.
pub trait CaptureBackend: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }
    fn open(&self, sample_rate: u32) -> Result<Box<dyn CaptureWriter>, ExportError>;
}

/// Writes `<dir>/<file_name>` as mono 32-bit float WAV. An existing file is replaced.
#[derive(Debug, Clone)]
pub struct WavCaptureBackend {
    dir: PathBuf,
    file_name: String,
}

impl WavCaptureBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), file_name: DEFAULT_FILE_NAME.to_string() }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl CaptureBackend for WavCaptureBackend {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn CaptureWriter>, ExportError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let writer = hound::WavWriter::create(&path, spec)?;
        Ok(Box::new(WavCapture { writer, path }))
    }
}

struct WavCapture {
    writer: hound::WavWriter<BufWriter<File>>,
    path: PathBuf,
}

impl CaptureWriter for WavCapture {
    #[inline]
    fn write_sample(&mut self, s: f32) -> Result<(), ExportError> {
        self.writer.write_sample(s)?;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn finish(self: Box<Self>) -> Result<PathBuf, ExportError> {
        let WavCapture { writer, path } = *self;
        writer.finalize()?;
        Ok(path)
    }
}

/// Backend for environments that cannot capture. Every `open` fails.
#[derive(Debug, Clone)]
pub struct UnsupportedCapture {
    reason: String,
}

impl UnsupportedCapture {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl CaptureBackend for UnsupportedCapture {
    fn is_supported(&self) -> bool {
        false
    }

    fn open(&self, _sample_rate: u32) -> Result<Box<dyn CaptureWriter>, ExportError> {
        Err(ExportError::Unsupported(self.reason.clone()))
    }
}

/// Clears the busy flag when the capture ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A capture in progress.
pub struct CaptureJob {
    handle: JoinHandle<Result<PathBuf, ExportError>>,
}

impl CaptureJob {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the capture completes and return the file location.
    pub fn wait(self) -> Result<PathBuf, ExportError> {
        self.handle.join().map_err(|_| ExportError::WorkerPanicked)?
    }
}

/// Starts captures against a graph, one at a time.
pub struct Recorder {
    backend: Box<dyn CaptureBackend>,
    duration: Duration,
    busy: Arc<AtomicBool>,
}

impl Recorder {
    pub fn new(backend: Box<dyn CaptureBackend>, duration: Duration) -> Self {
        Self { backend, duration, busy: Arc::new(AtomicBool::new(false)) }
    }

    #[inline] pub fn is_enabled(&self) -> bool { self.backend.is_supported() }
    #[inline] pub fn is_busy(&self) -> bool { self.busy.load(Ordering::Acquire) }
    #[inline] pub fn duration(&self) -> Duration { self.duration }

    /// Begin capturing the graph's output.
    ///
    /// `Ok(None)` when the graph is inactive or a capture is already running;
    /// nothing is started in either case. A graph that cannot take the capture
    /// right now yields [`ExportError::NotAccepted`].
    pub fn start(&self, graph: &SignalGraph) -> Result<Option<CaptureJob>, ExportError> {
        let Some(sample_rate) = graph.sample_rate() else {
            log::debug!("export ignored: audio is not running");
            return Ok(None);
        };
        let Some(guard) = BusyGuard::acquire(&self.busy) else {
            log::debug!("export ignored: a capture is already running");
            return Ok(None);
        };

        let expected = (self.duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        let writer = self.backend.open(sample_rate)?;
        // One second of headroom between the audio thread and the writer.
        let (tx, rx) = bounded(sample_rate.max(1) as usize);
        let tap = CaptureTap::new(tx);
        let dropped = tap.dropped();
        if !graph.attach_capture(tap) {
            log::warn!("export skipped: graph did not accept the capture");
            let path = writer.path().to_path_buf();
            writer.finish()?;
            let _ = fs::remove_file(&path);
            return Err(ExportError::NotAccepted);
        }

        log::info!("capturing {:.1} s to {}", self.duration.as_secs_f32(), writer.path().display());
        let handle = thread::Builder::new()
            .name("windhum-capture".into())
            .spawn(move || {
                let _guard = guard;
                run_capture(writer, rx, expected, &dropped)
            })
            .map_err(ExportError::Spawn)?;
        Ok(Some(CaptureJob { handle }))
    }
}

fn run_capture(
    mut writer: Box<dyn CaptureWriter>,
    rx: Receiver<f32>,
    expected: usize,
    dropped: &AtomicUsize,
) -> Result<PathBuf, ExportError> {
    let mut written = 0;
    while written < expected {
        match rx.recv() {
            Ok(s) => {
                writer.write_sample(s)?;
                written += 1;
            }
            Err(_) => {
                let path = writer.finish()?;
                log::warn!("capture interrupted after {written} of {expected} samples");
                return Err(ExportError::Interrupted { path, written, expected });
            }
        }
    }
    // Disconnecting detaches the tap on the audio side.
    drop(rx);
    let path = writer.finish()?;
    let dropped = dropped.load(Ordering::Relaxed);
    if dropped > 0 {
        log::warn!("capture lost {dropped} samples to a full queue");
        return Err(ExportError::Gaps { path, dropped });
    }
    log::info!("capture written to {}", path.display());
    Ok(path)
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::mapping::{MappingVariant, ParameterMapper};
    use crate::turbine::TurbineConfiguration;

    const SR: u32 = 8_000;

    fn active_graph(backend: &OfflineBackend) -> SignalGraph {
        let cfg = TurbineConfiguration::default();
        let targets = ParameterMapper::new(MappingVariant::Extended).map(&cfg);
        let mut graph = SignalGraph::with_noise_seed(5);
        graph.activate(backend, &cfg, &targets).unwrap();
        graph
    }

    fn recorder(dir: &Path, secs: f32) -> Recorder {
        Recorder::new(Box::new(WavCaptureBackend::new(dir)), Duration::from_secs_f32(secs))
    }

    #[test]
    fn inactive_graph_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let rec = recorder(dir.path(), 0.25);
        assert!(rec.start(&SignalGraph::new()).unwrap().is_none());
        assert!(!rec.is_busy());
        assert!(!dir.path().join(DEFAULT_FILE_NAME).exists());
    }

    #[test]
    fn captures_the_requested_length() {
        let dir = tempfile::tempdir().unwrap();
        let backend = OfflineBackend::new(SR);
        let graph = active_graph(&backend);
        let rec = recorder(dir.path(), 0.25);

        let job = rec.start(&graph).unwrap().unwrap();
        assert!(rec.is_busy());
        assert!(rec.start(&graph).unwrap().is_none());

        backend.render(4_000);
        let path = job.wait().unwrap();
        assert!(!rec.is_busy());
        assert_eq!(path, dir.path().join(DEFAULT_FILE_NAME));

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SR);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        let samples: Vec<f32> = reader.into_samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples.len(), 2_000);
        assert!(samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn stopping_mid_capture_reports_interruption() {
        let dir = tempfile::tempdir().unwrap();
        let backend = OfflineBackend::new(SR);
        let mut graph = active_graph(&backend);
        let rec = recorder(dir.path(), 0.25);

        let job = rec.start(&graph).unwrap().unwrap();
        backend.render(100);
        graph.deactivate();

        match job.wait() {
            Err(ExportError::Interrupted { path, written, expected }) => {
                assert_eq!(written, 100);
                assert_eq!(expected, 2_000);
                assert!(path.exists());
            }
            other => panic!("expected interruption, got {other:?}"),
        }
        assert!(!rec.is_busy());
    }

    #[test]
    fn unsupported_capture_fails_without_side_effects() {
        let backend = OfflineBackend::new(SR);
        let graph = active_graph(&backend);
        let rec = Recorder::new(Box::new(UnsupportedCapture::new("no encoder")), DEFAULT_CAPTURE);
        assert!(!rec.is_enabled());
        assert!(matches!(rec.start(&graph), Err(ExportError::Unsupported(_))));
        assert!(!rec.is_busy());
        assert!(graph.is_active());
    }

    #[test]
    fn rejected_capture_is_reported_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = OfflineBackend::new(SR);
        let graph = active_graph(&backend);
        // Nothing renders, so the command queue fills up.
        while graph.attach_capture(CaptureTap::new(bounded(1).0)) {}

        let rec = recorder(dir.path(), 0.25);
        assert!(matches!(rec.start(&graph), Err(ExportError::NotAccepted)));
        assert!(!rec.is_busy());
        assert!(!dir.path().join(DEFAULT_FILE_NAME).exists());
    }

    #[test]
    fn lost_samples_fail_the_capture() {
        let dir = tempfile::tempdir().unwrap();
        let writer = WavCaptureBackend::new(dir.path()).open(SR).unwrap();
        let (tx, rx) = bounded(16);
        for _ in 0..16 {
            tx.send(0.1).unwrap();
        }
        let dropped = AtomicUsize::new(3);

        match run_capture(writer, rx, 16, &dropped) {
            Err(ExportError::Gaps { path, dropped }) => {
                assert_eq!(dropped, 3);
                assert!(path.exists());
            }
            other => panic!("expected gaps, got {other:?}"),
        }
    }

    #[test]
    fn custom_file_name_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let b = WavCaptureBackend::new(dir.path()).with_file_name("take.wav");
        assert_eq!(b.path(), dir.path().join("take.wav"));
    }
}
