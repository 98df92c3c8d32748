use std::path::Path;

use log::info;
use serde::Deserialize;

use super::array::{VideoArray, DEFAULT_FRAME_RATE};
use super::device::DecodeDevice;
use super::error::{ConfigError, VideoResult};
use super::ffmpeg::FfmpegDevice;
use super::file::VideoFile;
use super::primed::{is_quirked_fourcc, PrimedVideo};
use super::source::{FrameRead, FrameSource, ReadPolicy};

/// Container extensions handed to the decode device.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["avi", "mp4", "mov", "mkv", "m4v"];

/// Extension of serialized frame stacks.
pub const ARRAY_EXTENSION: &str = "npy";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    pub convert_to_grayscale: bool,
    /// Decode the whole video into memory at open time.
    pub import_frames: bool,
    /// Frame rate given to `.npy` stacks, which carry none.
    pub frame_rate: f64,
    pub name: Option<String>,
    /// Overrides the per-variant default (substitute for files, fail for arrays).
    pub read_policy: Option<ReadPolicy>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            convert_to_grayscale: true,
            import_frames: false,
            frame_rate: DEFAULT_FRAME_RATE,
            name: None,
            read_policy: None,
        }
    }
}

impl OpenOptions {
    pub fn in_memory() -> Self {
        Self {
            import_frames: true,
            ..Default::default()
        }
    }

    pub fn color() -> Self {
        Self {
            convert_to_grayscale: false,
            ..Default::default()
        }
    }

    fn name_for(&self, path: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Every frame store `open` can produce.
#[derive(Debug)]
pub enum Video {
    File(VideoFile),
    Primed(PrimedVideo<VideoFile>),
    Array(VideoArray),
}

impl Video {
    pub fn fourcc(&self) -> Option<&str> {
        match self {
            Video::File(v) => Some(v.fourcc()),
            Video::Primed(v) => Some(v.inner().fourcc()),
            Video::Array(_) => None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self, Video::Array(_))
    }

    fn source(&self) -> &dyn FrameSource {
        match self {
            Video::File(v) => v,
            Video::Primed(v) => v,
            Video::Array(v) => v,
        }
    }

    fn source_mut(&mut self) -> &mut dyn FrameSource {
        match self {
            Video::File(v) => v,
            Video::Primed(v) => v,
            Video::Array(v) => v,
        }
    }
}

impl FrameSource for Video {
    fn name(&self) -> &str {
        self.source().name()
    }

    fn frame_count(&self) -> usize {
        self.source().frame_count()
    }

    fn frame_rate(&self) -> f64 {
        self.source().frame_rate()
    }

    fn shape(&self) -> (u32, u32) {
        self.source().shape()
    }

    fn channels(&self) -> u8 {
        self.source().channels()
    }

    fn frame_number(&self) -> usize {
        self.source().frame_number()
    }

    fn grab_frame(&mut self, index: usize) -> VideoResult<FrameRead> {
        self.source_mut().grab_frame(index)
    }

    fn advance_frame(&mut self) -> VideoResult<FrameRead> {
        self.source_mut().advance_frame()
    }
}

/// Opens a frame store, picking the variant from the extension and, for
/// containers, the codec tag.
pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> VideoResult<Video> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::PathNotFound(path.to_path_buf()).into());
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let name = options.name_for(path);

    if ext == ARRAY_EXTENSION {
        let array = VideoArray::from_npy(path, options.frame_rate, name)?;
        return Ok(Video::Array(with_array_policy(array, options)));
    }
    if !VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ConfigError::UnsupportedExtension(path.to_path_buf()).into());
    }

    let device = FfmpegDevice::open(path, options.convert_to_grayscale)?;
    if options.import_frames {
        let array = VideoArray::from_video(Box::new(device), name)?;
        return Ok(Video::Array(with_array_policy(array, options)));
    }
    open_device(path, Box::new(device), options)
}

/// Wraps an already opened decode device, priming it when its codec needs it.
pub fn open_device(
    path: impl AsRef<Path>,
    device: Box<dyn DecodeDevice>,
    options: &OpenOptions,
) -> VideoResult<Video> {
    let path = path.as_ref();
    let mut file = VideoFile::new(path, device, Some(options.name_for(path)));
    if let Some(policy) = options.read_policy {
        file = file.with_policy(policy);
    }

    if is_quirked_fourcc(file.fourcc()) {
        info!("{}: {} stream, priming leading frames", file.name(), file.fourcc());
        return Ok(Video::Primed(PrimedVideo::new(file)?));
    }
    Ok(Video::File(file))
}

fn with_array_policy(array: VideoArray, options: &OpenOptions) -> VideoArray {
    match options.read_policy {
        Some(policy) => array.with_policy(policy),
        None => array,
    }
}
