//! 视频帧源 - 统一的随机帧访问
//!
//! Device-backed files, H264 files primed through a sequential pre-cache, and
//! in-memory frame stacks all answer the same `FrameSource` queries.

pub mod array;
pub mod device;
pub mod error;
pub mod ffmpeg;
pub mod file;
pub mod frame;
pub mod open;
pub mod primed;
pub mod source;

pub use array::VideoArray;
pub use device::{DecodeDevice, DeviceProperties};
pub use error::{ConfigError, DeviceError, DiagnosticReason, FrameDiagnostic, VideoError, VideoResult};
pub use ffmpeg::FfmpegDevice;
pub use file::VideoFile;
pub use frame::Frame;
pub use open::{open, open_device, OpenOptions, Video};
pub use primed::{PrimedVideo, PRIMING_FRAMES};
pub use source::{FrameRead, FrameSelection, FrameSet, FrameSource, ReadPolicy};
