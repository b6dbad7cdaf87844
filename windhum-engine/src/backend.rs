//! Audio sinks the signal graph can run on.
//!
//! A backend takes ownership of a [`Renderer`] and pulls samples from it on
//! its own schedule. Two implementations:
//! - [`CpalBackend`]    : realtime device output (feature `realtime`)
//! - [`OfflineBackend`] : caller-driven rendering, for tests and headless use

use std::sync::{Arc, Mutex, MutexGuard};

use crate::chain::Renderer;
use crate::error::GraphError;

/// A running output stream. Dropping it releases the device and the renderer.
pub trait PlaybackStream {
    fn pause(&self) -> Result<(), GraphError>;
}

/// Something that can host a renderer.
pub trait AudioBackend {
    /// Rate the next stream will run at.
    fn sample_rate(&self) -> Result<u32, GraphError>;

    /// Start pulling from `renderer`. On error nothing keeps running.
    fn open(&self, renderer: Renderer) -> Result<Box<dyn PlaybackStream>, GraphError>;
}

// ---------------------------------- Realtime -------------------------------------

#[cfg(feature = "realtime")]
pub use self::realtime::{output_device_names, CpalBackend};

#[cfg(feature = "realtime")]
mod realtime {
    use super::{AudioBackend, PlaybackStream};
    use crate::chain::Renderer;
    use crate::error::GraphError;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    fn backend_err(e: impl std::fmt::Display) -> GraphError {
        GraphError::Backend(e.to_string())
    }

    /// Names of every output device on the default host.
    pub fn output_device_names() -> Result<Vec<String>, GraphError> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for dev in host.output_devices().map_err(backend_err)? {
            names.push(dev.name().map_err(backend_err)?);
        }
        Ok(names)
    }

    /// Default host output, or the device with the given name.
    #[derive(Debug, Clone, Default)]
    pub struct CpalBackend {
        device_name: Option<String>,
    }

    impl CpalBackend {
        pub fn new(device_name: Option<String>) -> Self {
            Self { device_name }
        }

        fn pick_device(&self) -> Result<cpal::Device, GraphError> {
            let host = cpal::default_host();
            if let Some(name) = &self.device_name {
                for d in host.output_devices().map_err(backend_err)? {
                    if d.name().map_err(backend_err)? == *name {
                        return Ok(d);
                    }
                }
                return Err(GraphError::DeviceNotFound(name.clone()));
            }
            host.default_output_device().ok_or(GraphError::NoOutputDevice)
        }
    }

    impl AudioBackend for CpalBackend {
        fn sample_rate(&self) -> Result<u32, GraphError> {
            let device = self.pick_device()?;
            let cfg = device.default_output_config().map_err(backend_err)?;
            Ok(cfg.sample_rate().0)
        }

        fn open(&self, renderer: Renderer) -> Result<Box<dyn PlaybackStream>, GraphError> {
            let device = self.pick_device()?;
            let sup_cfg = device.default_output_config().map_err(backend_err)?;
            let sample_format = sup_cfg.sample_format();
            let cfg = sup_cfg.config();

            if cfg.sample_rate.0 as f32 != renderer.sample_rate() {
                return Err(GraphError::Backend(format!(
                    "device rate changed to {} Hz while opening",
                    cfg.sample_rate.0
                )));
            }

            log::debug!(
                "opening {:?} ({:?}, {:?})",
                device.name().unwrap_or_default(),
                cfg,
                sample_format
            );

            let err_fn = |e: cpal::StreamError| log::error!("stream error: {e}");

            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, renderer, err_fn)?,
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, renderer, err_fn)?,
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, renderer, err_fn)?,
                other => return Err(GraphError::UnsupportedSampleFormat(format!("{other:?}"))),
            };

            stream.play().map_err(backend_err)?;
            Ok(Box::new(CpalStream(stream)))
        }
    }

    /// Mono renderer duplicated to every device channel.
    fn build_stream<T>(
        device: &cpal::Device,
        cfg: &cpal::StreamConfig,
        mut renderer: Renderer,
        err_fn: impl Fn(cpal::StreamError) + Send + 'static,
    ) -> Result<cpal::Stream, GraphError>
    where
        T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
    {
        let channels = (cfg.channels as usize).max(1);

        device
            .build_output_stream(
                cfg,
                move |output: &mut [T], _| {
                    renderer.begin_block();
                    for frame in output.chunks_mut(channels) {
                        let v: T = T::from_sample(renderer.next_sample());
                        for ch in frame.iter_mut() {
                            *ch = v;
                        }
                    }
                    renderer.end_block();
                },
                err_fn,
                None,
            )
            .map_err(backend_err)
    }

    struct CpalStream(cpal::Stream);

    impl PlaybackStream for CpalStream {
        fn pause(&self) -> Result<(), GraphError> {
            self.0.pause().map_err(backend_err)
        }
    }
}

// ---------------------------------- Offline --------------------------------------

#[derive(Default)]
struct OfflineState {
    renderer: Option<Renderer>,
    paused: bool,
    open_streams: usize,
}

/// Backend driven by explicit [`render`](OfflineBackend::render) calls.
///
/// Clones share state, so a test can keep one handle while the simulator owns
/// another.
#[derive(Clone)]
pub struct OfflineBackend {
    sample_rate: u32,
    available: bool,
    state: Arc<Mutex<OfflineState>>,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, available: true, state: Arc::default() }
    }

    /// A backend whose every `open` fails, like a machine without audio output.
    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new(48_000) }
    }

    fn lock(&self) -> MutexGuard<'_, OfflineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pull `frames` samples from the open stream. Silence when nothing is open
    /// or the stream is paused.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0_f32; frames];
        let mut state = self.lock();
        if !state.paused {
            if let Some(r) = state.renderer.as_mut() {
                r.render(&mut out);
            }
        }
        out
    }

    /// Streams opened and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.lock().open_streams
    }
}

impl AudioBackend for OfflineBackend {
    fn sample_rate(&self) -> Result<u32, GraphError> {
        if self.available {
            Ok(self.sample_rate)
        } else {
            Err(GraphError::NoOutputDevice)
        }
    }

    fn open(&self, renderer: Renderer) -> Result<Box<dyn PlaybackStream>, GraphError> {
        if !self.available {
            return Err(GraphError::NoOutputDevice);
        }
        let mut state = self.lock();
        if state.renderer.is_some() {
            return Err(GraphError::Backend("offline backend already has an open stream".into()));
        }
        state.renderer = Some(renderer);
        state.paused = false;
        state.open_streams += 1;
        Ok(Box::new(OfflineStream { state: Arc::clone(&self.state) }))
    }
}

struct OfflineStream {
    state: Arc<Mutex<OfflineState>>,
}

impl PlaybackStream for OfflineStream {
    fn pause(&self) -> Result<(), GraphError> {
        if let Ok(mut state) = self.state.lock() {
            state.paused = true;
        }
        Ok(())
    }
}

impl Drop for OfflineStream {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.renderer = None;
        state.open_streams = state.open_streams.saturating_sub(1);
    }
}

// ------------------------------------ Tests --------------------------------------
