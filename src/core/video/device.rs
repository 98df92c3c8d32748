use super::error::DeviceError;

/// Stream properties reported by a decode device at open time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProperties {
    pub frame_count: usize,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    /// Four character codec tag, empty when the container carries none.
    pub fourcc: String,
}

impl DeviceProperties {
    pub fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A decoder positioned on a single video stream.
///
/// `read` returns the samples of the frame at `position()` and moves the
/// position forward by one; `Ok(None)` signals the end of the stream.
pub trait DecodeDevice: Send {
    fn properties(&self) -> &DeviceProperties;

    /// Samples per pixel emitted by `read` (1 or 3).
    fn channels(&self) -> u8;

    fn position(&self) -> usize;

    fn seek(&mut self, index: usize) -> Result<(), DeviceError>;

    fn read(&mut self) -> Result<Option<Vec<u8>>, DeviceError>;

    fn frame_len(&self) -> usize {
        let props = self.properties();
        (props.width * props.height) as usize * self.channels() as usize
    }
}
