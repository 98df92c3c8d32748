//! 轮廓处理 - 阈值分割、轮廓提取、矩特征、掩膜与裁剪
//!
//! All functions here are pure: they read an image and return fresh values.

pub mod contours;
pub mod cropping;
pub mod mask;
pub mod moments;

pub use contours::{find_contours, threshold, Contour, ContourDetector, Point};
pub use cropping::{crop, crop_to_contour, CropError, Cropped, Cropper};
pub use mask::{equalize_hist, mask, Mask};
pub use moments::{contour_info, FeatureVector, Moments};
