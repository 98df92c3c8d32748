use serde::Deserialize;

use super::array::VideoArray;
use super::error::{FrameDiagnostic, VideoError, VideoResult};
use super::frame::Frame;

/// What a source does when a frame cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    /// Hand out a zero frame together with a diagnostic.
    Substitute,
    /// Fail with `VideoError::FrameOutOfRange`.
    Fail,
}

/// Result of a single frame query.
#[derive(Debug, Clone)]
pub struct FrameRead {
    pub frame: Frame,
    pub diagnostic: Option<FrameDiagnostic>,
}

impl FrameRead {
    pub fn ok(frame: Frame) -> Self {
        Self {
            frame,
            diagnostic: None,
        }
    }

    pub fn substitute(frame: Frame, diagnostic: FrameDiagnostic) -> Self {
        Self {
            frame,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_substitute(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn into_frame(self) -> Frame {
        self.frame
    }
}

/// Frames returned by a batch query, with every diagnostic raised on the way.
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    pub frames: Vec<Frame>,
    pub diagnostics: Vec<FrameDiagnostic>,
}

impl FrameSet {
    fn push(&mut self, read: FrameRead) {
        if let Some(diag) = read.diagnostic {
            self.diagnostics.push(diag);
        }
        self.frames.push(read.frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Which frames `return_frames` collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSelection {
    All,
    Single(usize),
    /// `[first, last)`
    Range(usize, usize),
    /// Exactly these frames, in this order.
    Indices(Vec<usize>),
}

impl FrameSelection {
    /// Picks the access mode from the number of indices given.
    pub fn from_indices(indices: &[usize]) -> Self {
        match indices {
            [] => FrameSelection::All,
            [i] => FrameSelection::Single(*i),
            [first, last] => FrameSelection::Range(*first, *last),
            _ => FrameSelection::Indices(indices.to_vec()),
        }
    }
}

/// Uniform random-access interface over every kind of frame store.
///
/// `frame_number` is the index of the frame most recently handed out (0
/// before the first read). Requests outside `[0, frame_count)` never move it.
pub trait FrameSource {
    fn name(&self) -> &str;

    fn frame_count(&self) -> usize;

    fn frame_rate(&self) -> f64;

    /// (width, height)
    fn shape(&self) -> (u32, u32);

    fn channels(&self) -> u8;

    fn frame_number(&self) -> usize;

    /// Random access; moves the cursor to `index`.
    fn grab_frame(&mut self, index: usize) -> VideoResult<FrameRead>;

    /// Reads the frame after the cursor (frame 0 if nothing was read yet).
    fn advance_frame(&mut self) -> VideoResult<FrameRead>;

    fn return_frames(&mut self, selection: &FrameSelection) -> VideoResult<FrameSet> {
        let mut set = FrameSet::default();
        match selection {
            FrameSelection::All => {
                let count = self.frame_count();
                read_range(self, 0, count, &mut set)?;
            }
            FrameSelection::Single(index) => set.push(self.grab_frame(*index)?),
            FrameSelection::Range(first, last) => read_range(self, *first, *last, &mut set)?,
            FrameSelection::Indices(indices) => {
                for &index in indices {
                    set.push(self.grab_frame(index)?);
                }
            }
        }
        Ok(set)
    }

    /// Same as `return_frames`, packaged as a new in-memory store.
    fn return_video(&mut self, selection: &FrameSelection) -> VideoResult<VideoArray> {
        let set = self.return_frames(selection)?;
        let name = self.name().to_string();
        VideoArray::from_frames(set.frames, self.frame_rate(), name)
    }
}

fn read_range<S: FrameSource + ?Sized>(
    source: &mut S,
    first: usize,
    last: usize,
    set: &mut FrameSet,
) -> VideoResult<()> {
    // each index is requested explicitly; a missing one must not shift the rest
    for index in first..last {
        set.push(source.grab_frame(index)?);
    }
    Ok(())
}

/// Shared out-of-range handling for every source variant.
pub(crate) fn unavailable(
    policy: ReadPolicy,
    index: usize,
    frame_count: usize,
    shape: (u32, u32),
    channels: u8,
) -> VideoResult<FrameRead> {
    match policy {
        ReadPolicy::Substitute => {
            Ok(FrameRead::substitute(
                Frame::zeros(shape, channels, index),
                FrameDiagnostic::out_of_range(index, frame_count),
            ))
        }
        ReadPolicy::Fail => Err(VideoError::FrameOutOfRange { index, frame_count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_by_arity() {
        assert_eq!(FrameSelection::from_indices(&[]), FrameSelection::All);
        assert_eq!(FrameSelection::from_indices(&[4]), FrameSelection::Single(4));
        assert_eq!(FrameSelection::from_indices(&[2, 6]), FrameSelection::Range(2, 6));
        assert_eq!(
            FrameSelection::from_indices(&[7, 1, 3]),
            FrameSelection::Indices(vec![7, 1, 3])
        );
    }

    #[test]
    fn test_unavailable_policies() {
        let read = unavailable(ReadPolicy::Substitute, 12, 10, (4, 3), 1).unwrap();
        assert!(read.is_substitute());
        assert!(read.frame.is_blank());
        assert_eq!(read.frame.shape(), (4, 3));

        let err = unavailable(ReadPolicy::Fail, 12, 10, (4, 3), 1).unwrap_err();
        assert!(matches!(
            err,
            VideoError::FrameOutOfRange {
                index: 12,
                frame_count: 10
            }
        ));
    }
}
