use std::path::Path;

use log::{debug, info, warn};
use ndarray::{ArrayD, Axis, IxDyn};
use ndarray_npy::{read_npy, write_npy, ReadNpyError, ReadableElement};

use super::device::DecodeDevice;
use super::error::{ConfigError, VideoResult};
use super::frame::Frame;
use super::source::{unavailable, FrameRead, FrameSource, ReadPolicy};

pub const DEFAULT_FRAME_RATE: f64 = 24.0;

/// 内存帧数组
///
/// Frames are stored as one `(n, height, width)` or `(n, height, width, 3)`
/// array. Every index in `[0, frame_count)` is valid by construction, so by
/// default an out-of-range query is an error rather than a blank frame.
#[derive(Debug)]
pub struct VideoArray {
    name: String,
    frames: ArrayD<u8>,
    frame_rate: f64,
    policy: ReadPolicy,
    frame_number: usize,
    next: usize,
}

impl VideoArray {
    pub fn from_array(
        frames: ArrayD<u8>,
        frame_rate: f64,
        name: impl Into<String>,
    ) -> VideoResult<Self> {
        let shape = frames.shape();
        let valid = match shape.len() {
            3 => true,
            4 => shape[3] == 3,
            _ => false,
        };
        if !valid {
            return Err(ConfigError::InvalidArray(format!(
                "expected (n, h, w) or (n, h, w, 3), got {:?}",
                shape
            ))
            .into());
        }
        if !(frame_rate > 0.0) {
            return Err(ConfigError::InvalidArray(format!("frame rate must be positive, got {}", frame_rate)).into());
        }

        Ok(Self {
            name: name.into(),
            frames: frames.as_standard_layout().into_owned(),
            frame_rate,
            policy: ReadPolicy::Fail,
            frame_number: 0,
            next: 0,
        })
    }

    /// Stacks frames of identical shape. An empty list gives an empty store.
    pub fn from_frames(
        frames: Vec<Frame>,
        frame_rate: f64,
        name: impl Into<String>,
    ) -> VideoResult<Self> {
        let (width, height, channels) = frames
            .first()
            .map(|f| (f.width, f.height, f.channels))
            .unwrap_or((0, 0, 1));
        if let Some(odd) = frames
            .iter()
            .find(|f| (f.width, f.height, f.channels) != (width, height, channels))
        {
            return Err(ConfigError::InvalidArray(format!(
                "frame #{} is {}x{}x{}, expected {}x{}x{}",
                odd.frame_number, odd.width, odd.height, odd.channels, width, height, channels
            ))
            .into());
        }

        let mut dims = vec![frames.len(), height as usize, width as usize];
        if channels > 1 {
            dims.push(channels as usize);
        }
        let data: Vec<u8> = frames.into_iter().flat_map(|f| f.data).collect();
        let array = ArrayD::from_shape_vec(IxDyn(&dims), data)
            .map_err(|e| ConfigError::InvalidArray(e.to_string()))?;
        Self::from_array(array, frame_rate, name)
    }

    /// Loads a serialized frame stack. Non-u8 dtypes are cast like
    /// `astype('uint8')`.
    pub fn from_npy(
        path: impl AsRef<Path>,
        frame_rate: f64,
        name: impl Into<String>,
    ) -> VideoResult<Self> {
        let path = path.as_ref();
        let frames = match read_npy::<_, ArrayD<u8>>(path) {
            Ok(frames) => frames,
            Err(ReadNpyError::WrongDescriptor(descr)) => {
                debug!("{}: casting {:?} array to u8", path.display(), descr);
                read_npy_cast(path)?
            }
            Err(e) => return Err(e.into()),
        };
        info!("📦 loaded frame array {} {:?}", path.display(), frames.shape());
        Self::from_array(frames, frame_rate, name)
    }

    /// Decodes every frame of a device up front. Frames the device cannot
    /// produce stay blank. The device is released before returning.
    pub fn from_video(
        mut device: Box<dyn DecodeDevice>,
        name: impl Into<String>,
    ) -> VideoResult<Self> {
        let name = name.into();
        let props = device.properties().clone();
        let channels = device.channels();
        let frame_len = device.frame_len();

        let mut dims = vec![props.frame_count, props.height as usize, props.width as usize];
        if channels > 1 {
            dims.push(channels as usize);
        }
        let mut data = vec![0u8; props.frame_count * frame_len];

        if let Err(e) = device.seek(0) {
            warn!("{}: cannot rewind decoder: {}", name, e);
        }
        for (index, chunk) in data.chunks_exact_mut(frame_len.max(1)).enumerate() {
            match device.read() {
                Ok(Some(frame)) if frame.len() == frame_len => chunk.copy_from_slice(&frame),
                Ok(Some(frame)) => warn!(
                    "{}: frame #{} has {} bytes, expected {}",
                    name,
                    index,
                    frame.len(),
                    frame_len
                ),
                Ok(None) => {
                    warn!("{}: stream ended at frame #{} of {}", name, index, props.frame_count);
                    break;
                }
                Err(e) => warn!("{}: frame #{} does not exist! ({})", name, index, e),
            }
        }
        drop(device);

        let array = ArrayD::from_shape_vec(IxDyn(&dims), data)
            .map_err(|e| ConfigError::InvalidArray(e.to_string()))?;
        info!("📦 imported {} frames from {}", props.frame_count, name);
        Self::from_array(array, props.frame_rate, name)
    }

    pub fn with_policy(mut self, policy: ReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn frames(&self) -> &ArrayD<u8> {
        &self.frames
    }

    pub fn save_npy(&self, path: impl AsRef<Path>) -> VideoResult<()> {
        write_npy(path.as_ref(), &self.frames)?;
        debug!("saved {} frames to {}", self.frame_count(), path.as_ref().display());
        Ok(())
    }

    fn read_at(&mut self, index: usize) -> VideoResult<FrameRead> {
        let frame_count = self.frame_count();
        if index >= frame_count {
            return unavailable(self.policy, index, frame_count, self.shape(), self.channels());
        }
        self.frame_number = index;
        self.next = index + 1;

        let (width, height) = self.shape();
        let data = self.frames.index_axis(Axis(0), index).iter().copied().collect();
        Ok(FrameRead::ok(Frame::new(width, height, self.channels(), data, index)))
    }
}

fn read_npy_cast(path: &Path) -> VideoResult<ArrayD<u8>> {
    if let Some(a) = try_read_npy::<f64>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<f32>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<i64>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<i32>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<u16>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<u32>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<u64>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<i16>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<i8>(path)? {
        return Ok(a.mapv(|v| v as u8));
    }
    if let Some(a) = try_read_npy::<bool>(path)? {
        return Ok(a.mapv(u8::from));
    }
    Err(ConfigError::InvalidArray(format!("{}: unsupported dtype", path.display())).into())
}

fn try_read_npy<A: ReadableElement>(path: &Path) -> VideoResult<Option<ArrayD<A>>> {
    match read_npy::<_, ArrayD<A>>(path) {
        Ok(a) => Ok(Some(a)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl FrameSource for VideoArray {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_count(&self) -> usize {
        self.frames.shape()[0]
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn shape(&self) -> (u32, u32) {
        let dims = self.frames.shape();
        (dims[2] as u32, dims[1] as u32)
    }

    fn channels(&self) -> u8 {
        if self.frames.ndim() == 4 {
            self.frames.shape()[3] as u8
        } else {
            1
        }
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
