use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that make a video impossible to open. Only raised by `open` and
/// the store constructors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Path {0} does not exist.")]
    PathNotFound(PathBuf),
    #[error("{0} is not a valid file type.")]
    UnsupportedExtension(PathBuf),
    #[error("{0} not found in PATH")]
    ToolNotFound(&'static str),
    #[error("failed to probe {path}: {message}")]
    Probe { path: PathBuf, message: String },
    #[error("no video stream found in {0}")]
    NoVideoStream(PathBuf),
    #[error("invalid frame array: {0}")]
    InvalidArray(String),
}

#[derive(Debug, Error)]
pub enum VideoError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Frame #{index} does not exist! ({frame_count} frames)")]
    FrameOutOfRange { index: usize, frame_count: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read frame array: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),
    #[error("failed to write frame array: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),
}

impl VideoError {
    pub fn is_config(&self) -> bool {
        matches!(self, VideoError::Config(_))
    }
}

pub type VideoResult<T> = Result<T, VideoError>;

/// Errors reported by a decode device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decoder exited: {0}")]
    Decoder(String),
    #[error("short frame: got {got} bytes, expected {expected}")]
    ShortFrame { got: usize, expected: usize },
}

/// Why a device-backed source handed out a substitute frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticReason {
    OutOfRange { frame_count: usize },
    EndOfStream,
    DecodeFailed(String),
}

/// Non-fatal frame read failure, returned next to the zero-filled substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDiagnostic {
    pub index: usize,
    pub reason: DiagnosticReason,
}

impl FrameDiagnostic {
    pub fn out_of_range(index: usize, frame_count: usize) -> Self {
        Self {
            index,
            reason: DiagnosticReason::OutOfRange { frame_count },
        }
    }
}

impl fmt::Display for FrameDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame #{} does not exist!", self.index)?;
        match &self.reason {
            DiagnosticReason::OutOfRange { frame_count } => {
                write!(f, " (video has {} frames)", frame_count)
            }
            DiagnosticReason::EndOfStream => write!(f, " (end of stream)"),
            DiagnosticReason::DecodeFailed(msg) => write!(f, " ({})", msg),
        }
    }
}
