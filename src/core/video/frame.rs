use image::{DynamicImage, GrayImage, RgbImage};

/// 帧数据结构
///
/// Pixel samples are row-major, `channels` interleaved samples per pixel
/// (1 for grayscale, 3 for RGB).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
    pub frame_number: usize,
}

impl Frame {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>, frame_number: usize) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize * channels as usize);
        Self {
            width,
            height,
            channels,
            data,
            frame_number,
        }
    }

    /// Substitute frame handed out when a decode device cannot produce an index.
    pub fn zeros(shape: (u32, u32), channels: u8, frame_number: usize) -> Self {
        let (width, height) = shape;
        let len = (width * height) as usize * channels as usize;
        Self::new(width, height, channels, vec![0u8; len], frame_number)
    }

    pub fn from_gray_image(image: GrayImage, frame_number: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, 1, image.into_raw(), frame_number)
    }

    pub fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_gray(&self) -> bool {
        self.channels == 1
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Grayscale view used by the contour pipeline; color frames are reduced to luma.
    pub fn to_gray_image(&self) -> GrayImage {
        match self.to_rgb_image() {
            Some(rgb) => DynamicImage::ImageRgb8(rgb).to_luma8(),
            None => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| GrayImage::new(self.width, self.height)),
        }
    }

    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.channels != 3 {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}
