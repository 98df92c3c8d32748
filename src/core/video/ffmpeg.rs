//! ffprobe / ffmpeg 解码设备

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, warn};
use serde::Deserialize;

use super::device::{DecodeDevice, DeviceProperties};
use super::error::{ConfigError, DeviceError};

const DEFAULT_FRAME_RATE: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_tag_string: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    nb_frames: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

/// Decodes a video file by piping raw frames out of an `ffmpeg` child process.
///
/// Sequential reads reuse the running child. Seeking anywhere else restarts
/// it with a frame-accurate `select` filter.
pub struct FfmpegDevice {
    path: PathBuf,
    properties: DeviceProperties,
    channels: u8,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    position: usize,
}

impl FfmpegDevice {
    pub fn open(path: impl AsRef<Path>, grayscale: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        which::which("ffmpeg").map_err(|_| ConfigError::ToolNotFound("ffmpeg"))?;
        let properties = probe(path)?;
        debug!(
            "probed {}: {} frames @ {:.2} fps, {}x{}, fourcc {:?}",
            path.display(),
            properties.frame_count,
            properties.frame_rate,
            properties.width,
            properties.height,
            properties.fourcc
        );

        Ok(Self {
            path: path.to_path_buf(),
            properties,
            channels: if grayscale { 1 } else { 3 },
            child: None,
            stdout: None,
            position: 0,
        })
    }

    fn spawn(&mut self) -> Result<(), DeviceError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-nostdin", "-v", "error", "-i"])
            .arg(&self.path)
            .args(["-map", "0:v:0"]);
        if self.position > 0 {
            cmd.arg("-vf")
                .arg(format!("select=gte(n\\,{})", self.position));
        }
        let pix_fmt = if self.channels == 1 { "gray" } else { "rgb24" };
        cmd.args(["-vsync", "0", "-f", "rawvideo", "-pix_fmt", pix_fmt, "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        debug!("spawning decoder at frame {} for {}", self.position, self.path.display());
        let mut child = cmd.spawn()?;
        self.stdout = child.stdout.take();
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                // already exited
                debug!("decoder kill: {}", e);
            }
            if let Err(e) = child.wait() {
                warn!("failed to reap decoder for {}: {}", self.path.display(), e);
            }
        }
    }
}

impl DecodeDevice for FfmpegDevice {
    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, index: usize) -> Result<(), DeviceError> {
        if self.child.is_some() && index == self.position {
            return Ok(());
        }
        self.stop();
        self.position = index;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, DeviceError> {
        if self.child.is_none() {
            self.spawn()?;
        }
        let expected = self.frame_len();
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| DeviceError::Decoder("decoder has no stdout".to_string()))?;

        let mut buf = vec![0u8; expected];
        let mut filled = 0;
        while filled < expected {
            match stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        // the child keeps its place in the stream even after a truncated frame
        self.position += 1;
        if filled < expected {
            return Err(DeviceError::ShortFrame {
                got: filled,
                expected,
            });
        }
        Ok(Some(buf))
    }
}

impl Drop for FfmpegDevice {
    fn drop(&mut self) {
        self.stop();
        debug!("🗑️ decoder released: {}", self.path.display());
    }
}

/// Read stream properties with `ffprobe`.
pub fn probe(path: &Path) -> Result<DeviceProperties, ConfigError> {
    which::which("ffprobe").map_err(|_| ConfigError::ToolNotFound("ffprobe"))?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ConfigError::Probe {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ConfigError::Probe {
            path: path.to_path_buf(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_probe(path, &output.stdout)
}

fn parse_probe(path: &Path, json: &[u8]) -> Result<DeviceProperties, ConfigError> {
    let probe: FfprobeOutput = serde_json::from_slice(json).map_err(|e| ConfigError::Probe {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| ConfigError::NoVideoStream(path.to_path_buf()))?;

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(DEFAULT_FRAME_RATE);

    let frame_count = match stream.nb_frames.as_deref().and_then(|n| n.parse::<usize>().ok()) {
        Some(n) => n,
        None => {
            let duration = stream
                .duration
                .as_deref()
                .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0);
            (duration * frame_rate).round() as usize
        }
    };

    Ok(DeviceProperties {
        frame_count,
        frame_rate,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        fourcc: stream
            .codec_tag_string
            .as_deref()
            .map(parse_fourcc)
            .unwrap_or_default(),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). Zero rates are rejected.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate > 0.0).then_some(rate)
}

/// ffprobe prints numeric tags as `[0][0][0][0]`; those carry no FOURCC.
fn parse_fourcc(tag: &str) -> String {
    if tag.starts_with('[') {
        String::new()
    } else {
        tag.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_h264_avi() {
        let json = br#"{
            "streams": [{
                "codec_type": "video",
                "codec_name": "h264",
                "codec_tag_string": "H264",
                "width": 640,
                "height": 480,
                "nb_frames": "1200",
                "r_frame_rate": "100/1",
                "avg_frame_rate": "100/1"
            }],
            "format": { "duration": "12.000000" }
        }"#;
        let props = parse_probe(Path::new("fish.avi"), json).unwrap();
        assert_eq!(props.frame_count, 1200);
        assert_eq!(props.shape(), (640, 480));
        assert_eq!(props.fourcc, "H264");
        assert!((props.frame_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_counts_from_duration() {
        let json = br#"{
            "streams": [{
                "codec_type": "video",
                "codec_tag_string": "[0][0][0][0]",
                "width": 320,
                "height": 240,
                "avg_frame_rate": "25/1"
            }],
            "format": { "duration": "4.0" }
        }"#;
        let props = parse_probe(Path::new("clip.mkv"), json).unwrap();
        assert_eq!(props.frame_count, 100);
        assert_eq!(props.fourcc, "");
    }

    #[test]
    fn test_parse_probe_without_video_stream() {
        let json = br#"{ "streams": [{ "codec_type": "audio" }] }"#;
        let err = parse_probe(Path::new("song.avi"), json).unwrap_err();
        assert!(matches!(err, ConfigError::NoVideoStream(_)));
    }
}
