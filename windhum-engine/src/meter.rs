//! Read-only window onto the live output for metering and drawing.
//!
//! The audio thread owns the window (through [`MeterWriter`]) and only ever
//! `try_lock`s it, so it never waits on a reader. A [`MeterTap`] holds a weak
//! reference: once the graph is torn down every snapshot returns `None`.

use dasp_ring_buffer::Fixed;
use std::sync::{Arc, Mutex, Weak};

/// Number of recent samples exposed to readers.
pub const METER_WINDOW: usize = 256;

type Window = Mutex<Fixed<Vec<f32>>>;

fn new_window() -> Arc<Window> {
    Arc::new(Mutex::new(Fixed::from(vec![0.0_f32; METER_WINDOW])))
}

/// Audio-thread side of the tap; owns the window.
///
/// Samples are staged locally with [`record`](Self::record) and moved into the
/// shared window once per audio block by [`flush`](Self::flush). If a reader
/// holds the lock the flush is retried on the next block.
pub struct MeterWriter {
    window: Arc<Window>,
    staging: Fixed<Vec<f32>>,
    pending: usize,
}

impl MeterWriter {
    pub fn with_tap() -> (Self, MeterTap) {
        let window = new_window();
        let tap = MeterTap { window: Arc::downgrade(&window) };
        let writer = Self {
            window,
            staging: Fixed::from(vec![0.0_f32; METER_WINDOW]),
            pending: 0,
        };
        (writer, tap)
    }

    #[inline]
    pub fn record(&mut self, s: f32) {
        self.staging.push(s);
        self.pending = (self.pending + 1).min(METER_WINDOW);
    }

    /// Publish staged samples without ever blocking.
    #[inline]
    pub fn flush(&mut self) {
        if self.pending == 0 {
            return;
        }
        if let Ok(mut ring) = self.window.try_lock() {
            for &s in self.staging.iter().skip(METER_WINDOW - self.pending) {
                ring.push(s);
            }
            self.pending = 0;
        }
    }
}

/// Non-owning read handle valid for the lifetime of the graph that made it.
#[derive(Debug, Clone)]
pub struct MeterTap {
    window: Weak<Window>,
}

impl MeterTap {
    /// Oldest-to-newest copy of the window, or `None` once the graph is gone.
    pub fn snapshot(&self) -> Option<Vec<f32>> {
        let window = self.window.upgrade()?;
        let ring = window.lock().ok()?;
        Some(ring.iter().copied().collect())
    }

    pub fn is_live(&self) -> bool {
        self.window.strong_count() > 0
    }

    pub fn frame(&self) -> Option<MeterFrame> {
        self.snapshot().map(MeterFrame::from_waveform)
    }
}

/// What a visualization needs for one redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterFrame {
    pub waveform: Vec<f32>,
    pub peak: f32,
    pub rms: f32,
}

impl MeterFrame {
    pub fn from_waveform(waveform: Vec<f32>) -> Self {
        let peak = waveform.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        let rms = if waveform.is_empty() {
            0.0
        } else {
            (waveform.iter().map(|s| s * s).sum::<f32>() / waveform.len() as f32).sqrt()
        };
        Self { waveform, peak, rms }
    }
}

/// Visualization collaborator fed by the tick loop while audio runs.
pub trait MeterSink: Send {
    fn draw(&mut self, frame: &MeterFrame);
    /// Called once when audio stops.
    fn clear(&mut self);
}
