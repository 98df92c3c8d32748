//! 轮廓追踪 - 阈值配置与单帧分析

use image::GrayImage;
use log::{debug, warn};
use serde::Deserialize;

use crate::core::image_processing::{contour_info, Contour, ContourDetector, FeatureVector};
use crate::core::video::{FrameDiagnostic, FrameSource, VideoResult};

/// Which half of a `ThresholdPair` to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdSlot {
    Lower,
    Upper,
}

/// 双阈值
///
/// Always satisfies `thresh1 < thresh2`, with `thresh1` in `0..=254` and
/// `thresh2` in `1..=255`. Changing one value pushes the other out of the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "RawThresholds")]
pub struct ThresholdPair {
    thresh1: u8,
    thresh2: u8,
}

#[derive(Deserialize)]
struct RawThresholds {
    thresh1: u8,
    thresh2: u8,
}

impl From<RawThresholds> for ThresholdPair {
    fn from(raw: RawThresholds) -> Self {
        Self::new(raw.thresh1, raw.thresh2)
    }
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self {
            thresh1: 127,
            thresh2: 200,
        }
    }
}

impl ThresholdPair {
    pub const LOWER_MAX: u8 = 254;
    pub const UPPER_MIN: u8 = 1;

    /// When the values conflict, `thresh2` wins.
    pub fn new(thresh1: u8, thresh2: u8) -> Self {
        let mut pair = Self::default();
        pair.set(ThresholdSlot::Lower, thresh1);
        pair.set(ThresholdSlot::Upper, thresh2);
        pair
    }

    pub fn thresh1(&self) -> u8 {
        self.thresh1
    }

    pub fn thresh2(&self) -> u8 {
        self.thresh2
    }

    pub fn set(&mut self, slot: ThresholdSlot, value: u8) {
        match slot {
            ThresholdSlot::Lower => {
                let value = value.min(Self::LOWER_MAX);
                self.thresh1 = value;
                if self.thresh2 <= value {
                    self.thresh2 = value + 1;
                }
            }
            ThresholdSlot::Upper => {
                let value = value.max(Self::UPPER_MIN);
                self.thresh2 = value;
                if self.thresh1 >= value {
                    self.thresh1 = value - 1;
                }
            }
        }
        debug!("thresholds -> ({}, {})", self.thresh1, self.thresh2);
    }

    /// A detector binarizing at the chosen threshold.
    pub fn detector(&self, slot: ThresholdSlot, n: Option<usize>) -> ContourDetector {
        let threshold = match slot {
            ThresholdSlot::Lower => self.thresh1,
            ThresholdSlot::Upper => self.thresh2,
        };
        ContourDetector {
            threshold,
            n,
            invert: false,
        }
    }
}

/// Contours and features of one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub frame_number: usize,
    /// Largest first.
    pub contours: Vec<Contour>,
    /// One entry per contour, same order.
    pub features: Vec<FeatureVector>,
    /// Set when the frame was substituted by a blank one.
    pub diagnostic: Option<FrameDiagnostic>,
}

impl FrameAnalysis {
    /// Features of the largest contour.
    pub fn primary(&self) -> Option<&FeatureVector> {
        self.features.first()
    }
}

/// Contours of `image` with their feature vectors.
pub fn analyze_image(image: &GrayImage, detector: &ContourDetector) -> (Vec<Contour>, Vec<FeatureVector>) {
    let contours = detector.find_contours(image);
    let features = contours.iter().map(contour_info).collect();
    (contours, features)
}

/// Grabs frame `index` and runs the contour pipeline on it.
pub fn analyze_frame<S>(source: &mut S, index: usize, detector: &ContourDetector) -> VideoResult<FrameAnalysis>
where
    S: FrameSource + ?Sized,
{
    let read = source.grab_frame(index)?;
    if let Some(diagnostic) = &read.diagnostic {
        warn!("⚠️ {}: {}", source.name(), diagnostic);
    }
    let (contours, features) = analyze_image(&read.frame.to_gray_image(), detector);
    debug!("frame {}: {} contours", index, contours.len());

    Ok(FrameAnalysis {
        frame_number: index,
        contours,
        features,
        diagnostic: read.diagnostic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image_processing::contours::tests::canvas;
    use crate::core::video::device::mock::ScriptedDevice;
    use crate::core::video::{open_device, Frame, OpenOptions, VideoArray, VideoError};

    #[test]
    fn test_raising_lower_pushes_upper() {
        let mut pair = ThresholdPair::new(10, 20);
        pair.set(ThresholdSlot::Lower, 20);
        assert_eq!((pair.thresh1(), pair.thresh2()), (20, 21));

        pair.set(ThresholdSlot::Lower, 255);
        assert_eq!((pair.thresh1(), pair.thresh2()), (254, 255));
    }

    #[test]
    fn test_lowering_upper_pushes_lower() {
        let mut pair = ThresholdPair::new(100, 150);
        pair.set(ThresholdSlot::Upper, 100);
        assert_eq!((pair.thresh1(), pair.thresh2()), (99, 100));

        pair.set(ThresholdSlot::Upper, 0);
        assert_eq!((pair.thresh1(), pair.thresh2()), (0, 1));
    }

    #[test]
    fn test_non_conflicting_change_keeps_partner() {
        let mut pair = ThresholdPair::new(30, 90);
        pair.set(ThresholdSlot::Lower, 60);
        pair.set(ThresholdSlot::Upper, 61);
        assert_eq!((pair.thresh1(), pair.thresh2()), (60, 61));
    }

    #[test]
    fn test_pair_from_json_is_clamped() {
        let pair: ThresholdPair = serde_json::from_str(r#"{ "thresh1": 80, "thresh2": 40 }"#).unwrap();
        assert_eq!((pair.thresh1(), pair.thresh2()), (39, 40));
        assert!(pair.thresh1() < pair.thresh2());
    }

    #[test]
    fn test_detector_per_slot() {
        let pair = ThresholdPair::new(50, 150);
        assert_eq!(pair.detector(ThresholdSlot::Lower, None).threshold, 50);
        assert_eq!(pair.detector(ThresholdSlot::Upper, Some(1)).n, Some(1));
    }

    #[test]
    fn test_analyze_frame_ranks_blobs() {
        let blobs = canvas(60, 60, &[(2, 2, 21, 26), (40, 40, 49, 49)]);
        let frames = vec![
            Frame::new(60, 60, 1, vec![0; 3600], 0),
            Frame::from_gray_image(blobs, 1),
        ];
        let mut video = VideoArray::from_frames(frames, 24.0, "blobs").unwrap();

        let analysis = analyze_frame(&mut video, 1, &ContourDetector::new(100)).unwrap();
        assert_eq!(analysis.frame_number, 1);
        assert_eq!(analysis.contours.len(), 2);
        assert_eq!(analysis.features.len(), 2);
        assert!(analysis.diagnostic.is_none());

        let primary = analysis.primary().unwrap();
        assert!((primary.x - 11.5).abs() < 1e-6);
        assert!((primary.y - 14.0).abs() < 1e-6);

        let empty = analyze_frame(&mut video, 0, &ContourDetector::new(100)).unwrap();
        assert!(empty.contours.is_empty());
        assert!(empty.primary().is_none());

        assert!(matches!(
            analyze_frame(&mut video, 2, &ContourDetector::new(100)),
            Err(VideoError::FrameOutOfRange { .. })
        ));
    }

    #[test]
    fn test_analyze_substituted_frame() {
        let mut video = open_device(
            "fish.avi",
            Box::new(ScriptedDevice::new(2, 8, 8)),
            &OpenOptions::default(),
        )
        .unwrap();

        let analysis = analyze_frame(&mut video, 5, &ContourDetector::new(0)).unwrap();
        assert!(analysis.diagnostic.is_some());
        assert!(analysis.contours.is_empty());
    }
}
