use log::{info, warn};

use super::error::VideoResult;
use super::source::{FrameRead, FrameSource};

/// Leading frames decoded once, in order, before any seeking.
pub const PRIMING_FRAMES: usize = 19;

/// FOURCC tags whose early frames come back corrupted (or are silently
/// skipped) when the decoder seeks into them.
pub const QUIRKED_FOURCCS: [&str; 3] = ["H264", "X264", "AVC1"];

pub fn is_quirked_fourcc(fourcc: &str) -> bool {
    QUIRKED_FOURCCS
        .iter()
        .any(|tag| tag.eq_ignore_ascii_case(fourcc.trim()))
}

/// Wraps a seekable source and serves its first `PRIMING_FRAMES` frames from a
/// cache filled by one sequential pass at construction.
#[derive(Debug)]
pub struct PrimedVideo<S: FrameSource> {
    inner: S,
    /// Reads as produced during priming, diagnostics included.
    cache: Vec<FrameRead>,
    frame_number: usize,
    next: usize,
}

impl<S: FrameSource> PrimedVideo<S> {
    pub fn new(mut inner: S) -> VideoResult<Self> {
        let primed = PRIMING_FRAMES.min(inner.frame_count());
        let mut cache = Vec::with_capacity(primed);
        for index in 0..primed {
            let read = if index == 0 {
                inner.grab_frame(0)?
            } else {
                inner.advance_frame()?
            };
            if let Some(diag) = &read.diagnostic {
                warn!("{}: priming kept a blank frame: {}", inner.name(), diag);
            }
            cache.push(read);
        }
        info!("🎞️ {}: primed {} leading frames", inner.name(), cache.len());

        Ok(Self {
            inner,
            cache,
            frame_number: 0,
            next: 0,
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn primed_len(&self) -> usize {
        self.cache.len()
    }
}

impl<S: FrameSource> FrameSource for PrimedVideo<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    fn frame_rate(&self) -> f64 {
        self.inner.frame_rate()
    }

    fn shape(&self) -> (u32, u32) {
        self.inner.shape()
    }

    fn channels(&self) -> u8 {
        self.inner.channels()
    }

    fn frame_number(&self) -> usize {
        self.frame_number
    }

    fn grab_frame(&mut self, index: usize) -> VideoResult<FrameRead> {
        if let Some(read) = self.cache.get(index) {
            self.frame_number = index;
            self.next = index + 1;
            return Ok(read.clone());
        }
        let read = self.inner.grab_frame(index)?;
        if index < self.frame_count() {
            self.frame_number = index;
            self.next = index + 1;
        }
        Ok(read)
    }

    fn advance_frame(&mut self) -> VideoResult<FrameRead> {
        self.grab_frame(self.next)
    }
}
