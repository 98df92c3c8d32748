//! 视频读取器

use std::path::Path;

use log::{error, info, warn};

use crate::core::video::{
    open, Frame, FrameRead, FrameSelection, FrameSource, OpenOptions, Video, VideoArray, VideoResult,
};

/// 视频读取器 - 统一的帧访问入口，帧缺失时记录警告
///
/// ```ignore
/// let mut reader = VideoReader::open("fish.avi", &OpenOptions::default())?;
/// let first = reader.next_frame()?;
/// let clip = reader.import(&[100, 200])?;
/// ```
pub struct VideoReader {
    video: Video,
}

impl VideoReader {
    /// 打开视频文件或 .npy 帧数组
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> VideoResult<Self> {
        crate::init_logging();
        let path = path.as_ref();
        info!("🎬 VideoReader: opening {:?}", path);

        match open(path, options) {
            Ok(video) => {
                let (width, height) = video.shape();
                info!(
                    "✅ VideoReader: {} ({} frames, {:.2} fps, {}x{})",
                    video.name(),
                    video.frame_count(),
                    video.frame_rate(),
                    width,
                    height
                );
                Ok(Self { video })
            }
            Err(e) => {
                error!("❌ VideoReader: failed to open {:?}: {}", path, e);
                Err(e)
            }
        }
    }

    pub fn from_video(video: Video) -> Self {
        info!("🎬 VideoReader: wrapping {}", video.name());
        Self { video }
    }

    pub fn name(&self) -> &str {
        self.video.name()
    }

    pub fn frame_count(&self) -> usize {
        self.video.frame_count()
    }

    pub fn frame_rate(&self) -> f64 {
        self.video.frame_rate()
    }

    pub fn shape(&self) -> (u32, u32) {
        self.video.shape()
    }

    pub fn frame_number(&self) -> usize {
        self.video.frame_number()
    }

    pub fn video(&self) -> &Video {
        &self.video
    }

    pub fn video_mut(&mut self) -> &mut Video {
        &mut self.video
    }

    /// 随机读取一帧
    pub fn frame(&mut self, index: usize) -> VideoResult<Frame> {
        let read = self.video.grab_frame(index)?;
        Ok(self.report(read))
    }

    /// 顺序读取下一帧
    pub fn next_frame(&mut self) -> VideoResult<Frame> {
        let read = self.video.advance_frame()?;
        Ok(self.report(read))
    }

    /// 按索引批量读取：空 = 全部，一个 = 单帧，两个 = 区间，更多 = 逐个
    pub fn frames(&mut self, indices: &[usize]) -> VideoResult<Vec<Frame>> {
        let set = self
            .video
            .return_frames(&FrameSelection::from_indices(indices))?;
        for diagnostic in &set.diagnostics {
            warn!("⚠️ {}: {}", self.video.name(), diagnostic);
        }
        Ok(set.frames)
    }

    /// 将选中的帧导入内存
    pub fn import(&mut self, indices: &[usize]) -> VideoResult<VideoArray> {
        let array = self
            .video
            .return_video(&FrameSelection::from_indices(indices))?;
        info!(
            "📦 VideoReader: imported {} frames from {}",
            array.frame_count(),
            self.video.name()
        );
        Ok(array)
    }

    fn report(&self, read: FrameRead) -> Frame {
        if let Some(diagnostic) = &read.diagnostic {
            warn!("⚠️ {}: {}", self.video.name(), diagnostic);
        }
        read.into_frame()
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        info!("🗑️ VideoReader: released {}", self.video.name());
    }
}
