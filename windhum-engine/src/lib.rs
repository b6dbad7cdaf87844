//! Windhum Engine: wind-turbine sound simulation.
//!
//! Crate layout:
//! - [`turbine`]    : raw settings and the clamped configuration snapshot
//! - [`acoustics`]  : blade-passage frequency and SPL readouts
//! - [`mapping`]    : configuration → synthesis control targets
//! - [`safety`]     : two-tier output gain ceiling
//! - [`nodes`]      : noise loop and LFOs
//! - [`chain`]      : the audio-thread signal chain and its renderer
//! - [`backend`]    : realtime (cpal) and offline audio sinks
//! - [`graph`]      : activation lifecycle and retargeting
//! - [`meter`]      : non-blocking window onto the live output
//! - [`ticker`]     : cancellable periodic task for redraws
//! - [`export`]     : fixed-length WAV capture
//! - [`settings`]   : YAML settings file
//! - [`simulator`]  : the session tying all of the above together
//!
//! The audio thread never allocates and never blocks: the control side talks
//! to it through a bounded command queue and reads it through `try_lock`ed
//! windows only.

pub mod acoustics;
pub mod backend;
pub mod chain;
pub mod error;
pub mod export;
pub mod graph;
pub mod mapping;
pub mod meter;
pub mod nodes;
pub mod safety;
pub mod settings;
pub mod simulator;
pub mod ticker;
pub mod turbine;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use acoustics::{DerivedReadouts, ReadoutSink};
pub use backend::{AudioBackend, OfflineBackend, PlaybackStream};
#[cfg(feature = "realtime")]
pub use backend::{output_device_names, CpalBackend};
pub use error::{EditError, ExportError, GraphError, SettingsError};
pub use export::{CaptureBackend, CaptureJob, UnsupportedCapture, WavCaptureBackend};
pub use mapping::{MappingVariant, ParameterMapper, SynthesisControlTargets};
pub use meter::{MeterFrame, MeterSink, MeterTap};
pub use safety::SafetyGainStage;
pub use settings::SimulatorSettings;
pub use simulator::Simulator;
pub use turbine::{OutputProfile, TurbineConfiguration, TurbineSettings, WindDirection};
