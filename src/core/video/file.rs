use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::device::DecodeDevice;
use super::error::{DiagnosticReason, FrameDiagnostic, VideoResult};
use super::frame::Frame;
use super::source::{unavailable, FrameRead, FrameSource, ReadPolicy};

/// Device-backed frame store. Frames the device cannot produce are replaced
/// by zero frames (unless the policy says otherwise for out-of-range indices).
pub struct VideoFile {
    path: PathBuf,
    name: String,
    device: Box<dyn DecodeDevice>,
    policy: ReadPolicy,
    frame_number: usize,
    next: usize,
}

impl VideoFile {
    pub fn new(path: impl AsRef<Path>, device: Box<dyn DecodeDevice>, name: Option<String>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        info!(
            "🎬 VideoFile opened: {} ({} frames, fourcc {:?})",
            name,
            device.properties().frame_count,
            device.properties().fourcc
        );
        Self {
            path,
            name,
            device,
            policy: ReadPolicy::Substitute,
            frame_number: 0,
            next: 0,
        }
    }

    pub fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fourcc(&self) -> &str {
        &self.device.properties().fourcc
    }

    fn read_at(&mut self, index: usize) -> VideoResult<FrameRead> {
        let frame_count = self.frame_count();
        if index >= frame_count {
            return unavailable(self.policy, index, frame_count, self.shape(), self.channels());
        }
        self.frame_number = index;
        self.next = index + 1;

        let decoded = match self.device.seek(index) {
            Ok(()) => self.device.read(),
            Err(e) => Err(e),
        };
        let reason = match decoded {
            Ok(Some(data)) => {
                let (width, height) = self.shape();
                return Ok(FrameRead::ok(Frame::new(
                    width,
                    height,
                    self.channels(),
                    data,
                    index,
                )));
            }
            Ok(None) => DiagnosticReason::EndOfStream,
            Err(e) => DiagnosticReason::DecodeFailed(e.to_string()),
        };

        let diagnostic = FrameDiagnostic { index, reason };
        debug!("{}: {}", self.name, diagnostic);
        Ok(FrameRead::substitute(
            Frame::zeros(self.shape(), self.channels(), index),
            diagnostic,
        ))
    }
}

impl fmt::Debug for VideoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFile")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("properties", self.device.properties())
            .field("policy", &self.policy)
            .field("frame_number", &self.frame_number)
            .finish()
    }
}

impl FrameSource for VideoFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_count(&self) -> usize {
        self.device.properties().frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.device.properties().frame_rate
    }

    fn shape(&self) -> (u32, u32) {
        self.device.properties().shape()
    }

    fn channels(&self) -> u8 {
        self.device.channels()
    }

    fn frame_number(&self) -> usize {
        self.frame_number
    }

    fn grab_frame(&mut self, index: usize) -> VideoResult<FrameRead> {
        self.read_at(index)
    }

    fn advance_frame(&mut self) -> VideoResult<FrameRead> {
        self.read_at(self.next)
    }
}

impl Drop for VideoFile {
    fn drop(&mut self) {
        info!("🗑️ VideoFile released: {}", self.name);
    }
}
