//! The simulator session: one explicit owner for everything that lives
//! between configuration changes.
//!
//! A configuration change synchronously recomputes the readouts, publishes
//! them, and (while audio runs) retargets the graph. The meter ticker exists
//! only while the graph is active.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::acoustics::{DerivedReadouts, ReadoutSink};
use crate::backend::AudioBackend;
use crate::error::{EditError, ExportError, GraphError};
use crate::export::{CaptureBackend, CaptureJob, Recorder};
use crate::graph::SignalGraph;
use crate::mapping::ParameterMapper;
use crate::meter::{MeterFrame, MeterSink};
use crate::settings::SimulatorSettings;
use crate::ticker::Ticker;
use crate::turbine::TurbineConfiguration;

type SharedMeterSink = Arc<Mutex<Box<dyn MeterSink>>>;

pub struct Simulator {
    config: TurbineConfiguration,
    readouts: DerivedReadouts,
    mapper: ParameterMapper,
    backend: Box<dyn AudioBackend>,
    graph: SignalGraph,
    recorder: Recorder,
    readout_sink: Option<Box<dyn ReadoutSink>>,
    meter_sink: Option<SharedMeterSink>,
    ticker: Option<Ticker>,
    tick_interval: Duration,
}

impl Simulator {
    pub fn new(
        settings: &SimulatorSettings,
        backend: Box<dyn AudioBackend>,
        capture: Box<dyn CaptureBackend>,
    ) -> Self {
        let config = TurbineConfiguration::from(settings.turbine.clone());
        Self {
            config,
            readouts: DerivedReadouts::compute(&config),
            mapper: ParameterMapper::new(settings.audio.variant),
            backend,
            graph: SignalGraph::new(),
            recorder: Recorder::new(capture, settings.export.duration()),
            readout_sink: None,
            meter_sink: None,
            ticker: None,
            tick_interval: settings.audio.tick_interval(),
        }
    }

    /// Attach a readout display; it immediately receives the current values.
    pub fn with_readout_sink(mut self, mut sink: Box<dyn ReadoutSink>) -> Self {
        sink.publish(&self.readouts);
        self.readout_sink = Some(sink);
        self
    }

    /// Attach a visualization fed on every tick while audio runs.
    pub fn with_meter_sink(mut self, sink: Box<dyn MeterSink>) -> Self {
        self.meter_sink = Some(Arc::new(Mutex::new(sink)));
        self
    }

    /// Reproducible noise source; mostly for tests.
    pub fn with_noise_seed(mut self, seed: u64) -> Self {
        self.graph = SignalGraph::with_noise_seed(seed);
        self
    }

    #[inline] pub fn configuration(&self) -> &TurbineConfiguration { &self.config }
    #[inline] pub fn readouts(&self) -> DerivedReadouts { self.readouts }
    #[inline] pub fn mapper(&self) -> &ParameterMapper { &self.mapper }
    #[inline] pub fn is_active(&self) -> bool { self.graph.is_active() }
    #[inline] pub fn sample_rate(&self) -> Option<u32> { self.graph.sample_rate() }

    /// Replace the configuration snapshot.
    pub fn update(&mut self, config: TurbineConfiguration) {
        self.config = config;
        self.readouts = DerivedReadouts::compute(&config);
        if let Some(sink) = self.readout_sink.as_mut() {
            sink.publish(&self.readouts);
        }
        if self.graph.is_active() {
            let targets = self.mapper.map(&config);
            log::debug!("retarget: {targets:?}");
            self.graph.retarget(&targets);
        }
    }

    /// Apply a textual edit (`"rpm"`, `"18"`) and update.
    pub fn edit(&mut self, field: &str, value: &str) -> Result<(), EditError> {
        let config = self.config.with_edit(field, value)?;
        self.update(config);
        Ok(())
    }

    /// Build and start the graph, then the meter ticker. No-op while active.
    pub fn start(&mut self) -> Result<(), GraphError> {
        if self.graph.is_active() {
            return Ok(());
        }
        let targets = self.mapper.map(&self.config);
        self.graph.activate(self.backend.as_ref(), &self.config, &targets)?;

        if let (Some(sink), Some(tap)) = (self.meter_sink.clone(), self.graph.meter()) {
            let spawned = Ticker::spawn(self.tick_interval, move || {
                let Some(frame) = tap.frame() else { return };
                if let Ok(mut sink) = sink.lock() {
                    sink.draw(&frame);
                }
            });
            match spawned {
                Ok(t) => self.ticker = Some(t),
                Err(e) => {
                    self.graph.deactivate();
                    return Err(e);
                }
            }
        }
        log::info!("simulation started ({})", self.readouts);
        Ok(())
    }

    /// Stop the ticker, release the graph and clear the meter. No-op while inactive.
    pub fn stop(&mut self) {
        if let Some(mut t) = self.ticker.take() {
            t.cancel();
        }
        if !self.graph.is_active() {
            return;
        }
        self.graph.deactivate();
        if let Some(sink) = &self.meter_sink {
            if let Ok(mut sink) = sink.lock() {
                sink.clear();
            }
        }
        log::info!("simulation stopped");
    }

    /// Start a capture of the live output.
    ///
    /// `Ok(None)` while inactive or while another capture runs.
    pub fn export(&self) -> Result<Option<CaptureJob>, ExportError> {
        self.recorder.start(&self.graph)
    }

    /// Whether [`export`](Self::export) would start a capture right now.
    pub fn export_enabled(&self) -> bool {
        self.graph.is_active() && self.recorder.is_enabled() && !self.recorder.is_busy()
    }

    /// Current meter window; `None` while inactive.
    pub fn meter_frame(&self) -> Option<MeterFrame> {
        self.graph.meter()?.frame()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

// ------------------------------------ Tests --------------------------------------
