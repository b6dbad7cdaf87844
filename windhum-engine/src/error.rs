//! Error types of the engine crate, one enum per concern.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while bringing the signal graph up. Activation is all-or-nothing:
/// when one of these is returned the graph is still inactive.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no default audio output device is available")]
    NoOutputDevice,

    #[error("audio output device not found: {0}")]
    DeviceNotFound(String),

    #[error("unsupported device sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("audio backend error: {0}")]
    Backend(String),

    #[error("failed to spawn the {what} thread")]
    Spawn {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the 10-second capture. Playback is never affected by these.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("audio capture is not supported: {0}")]
    Unsupported(String),

    #[error("capture I/O error")]
    Io(#[from] std::io::Error),

    #[error("WAV encoding error")]
    Wav(#[from] hound::Error),

    #[error("capture interrupted after {written} of {expected} samples (partial file at {})", path.display())]
    Interrupted {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    #[error("the audio graph could not take the capture right now")]
    NotAccepted,

    #[error("capture lost {dropped} samples (file with gaps at {})", path.display())]
    Gaps { path: PathBuf, dropped: usize },

    #[error("failed to spawn the capture thread")]
    Spawn(#[source] std::io::Error),

    #[error("capture worker panicked")]
    WorkerPanicked,
}

/// Failures loading or saving the YAML settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("failed to write settings file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings")]
    Serialize(#[from] serde_yml::Error),
}

/// A textual configuration edit (`rpm=18`) that could not be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("unknown configuration field `{0}`")]
    UnknownField(String),

    #[error("invalid value `{value}` for `{field}`")]
    InvalidValue { field: String, value: String },
}
