//! Video decoding through the `ffmpeg`/`ffprobe` binaries.
//!
//! Frames are streamed from `ffmpeg` as raw `rgb24` on a pipe, one frame at a
//! time, so memory use is bounded by a single decoded frame.

use crate::error::{ConvertError, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command as ProcCommand, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

/// Locations of the ffmpeg tools. `None` means "look it up on `PATH`".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

impl FfmpegConfig {
    pub fn ffmpeg_cmd(&self) -> &Path {
        self.ffmpeg_path.as_deref().unwrap_or(Path::new("ffmpeg"))
    }

    pub fn ffprobe_cmd(&self) -> &Path {
        self.ffprobe_path.as_deref().unwrap_or(Path::new("ffprobe"))
    }

    /// True when both binaries can be launched.
    pub fn is_available(&self) -> bool {
        [self.ffmpeg_cmd(), self.ffprobe_cmd()].iter().all(|cmd| {
            ProcCommand::new(cmd)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }
}

/// Stream metadata of the first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Native frame rate
    pub fps: f64,
    /// Frame count reported by the container, or estimated from the duration.
    /// Zero when neither is known.
    pub total_frames: u64,
    /// Seconds, zero when unknown
    pub duration: f64,
}

/// A decoded, in-order sequence of frames.
pub trait FrameSource {
    fn info(&self) -> &VideoInfo;

    /// Where the frames come from, for error messages.
    fn path(&self) -> &Path;

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Runs `ffprobe` on `path` and returns the first video stream's metadata.
///
/// Width and height are reported as displayed, after ffmpeg applies any
/// rotation stored in the container.
pub fn probe(path: &Path, ffmpeg: &FfmpegConfig) -> Result<VideoInfo> {
    let output = ProcCommand::new(ffmpeg.ffprobe_cmd())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration\
             :stream_tags=rotate:stream_side_data=rotation:format=duration",
            "-of",
            "default=noprint_wrappers=1",
        ])
        .arg(path)
        .output()
        .map_err(|e| ConvertError::unavailable(path, spawn_failure("ffprobe", &e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConvertError::unavailable(path, format!("ffprobe failed: {}", stderr.trim())));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| ConvertError::unavailable(path, "no decodable video stream"))
}

fn spawn_failure(tool: &str, err: &io::Error) -> String {
    if err.kind() == io::ErrorKind::NotFound {
        format!("{} not found (is ffmpeg installed?)", tool)
    } else {
        format!("running {}: {}", tool, err)
    }
}

/// Parses `key=value` lines printed by ffprobe. Returns `None` without a usable
/// size and frame rate.
pub(crate) fn parse_probe_output(text: &str) -> Option<VideoInfo> {
    let mut width = None;
    let mut height = None;
    let mut r_rate = None;
    let mut avg_rate = None;
    let mut nb_frames = None;
    let mut duration = None;
    let mut rotation = 0i64;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.parse::<u32>().ok(),
            "height" => height = value.parse::<u32>().ok(),
            "r_frame_rate" => r_rate = parse_rate(value),
            "avg_frame_rate" => avg_rate = parse_rate(value),
            "nb_frames" => nb_frames = value.parse::<u64>().ok(),
            "rotation" | "TAG:rotate" => {
                if let Ok(degrees) = value.trim().parse::<f64>() {
                    rotation = degrees.round() as i64;
                }
            }
            // stream duration comes before format duration; keep the first usable one
            "duration" if duration.is_none() => {
                duration = value.parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0)
            }
            _ => {}
        }
    }

    let width = width.filter(|w| *w > 0)?;
    let height = height.filter(|h| *h > 0)?;
    // quarter turns come out of the autorotating decoder transposed
    let (width, height) = match rotation.rem_euclid(360) {
        90 | 270 => (height, width),
        _ => (width, height),
    };
    let fps = r_rate.or(avg_rate)?;
    let duration = duration.unwrap_or(0.0);
    let total_frames = nb_frames
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).round() as u64);

    Some(VideoInfo {
        width,
        height,
        fps,
        total_frames,
        duration,
    })
}

/// Parses `30000/1001` or `29.97`. Zero and non-finite rates are rejected.
pub(crate) fn parse_rate(s: &str) -> Option<f64> {
    let rate = match s.trim().split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Frames decoded by a child `ffmpeg` process.
///
/// The child is killed and reaped on drop, whether decoding finished or not.
/// Its stderr is collected on a background thread and reported when the
/// process exits with a failure status.
pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    frame_len: usize,
    decoded: u64,
    finished: bool,
}

impl FfmpegSource {
    /// Probes `path` and starts decoding it.
    pub fn open(path: &Path, ffmpeg: &FfmpegConfig) -> Result<Self> {
        let info = probe(path, ffmpeg)?;
        log::debug!(
            "probed {}: {}x{} @ {:.3} fps, {} frames",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.total_frames
        );

        let mut child = ProcCommand::new(ffmpeg.ffmpeg_cmd())
            .args(["-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ConvertError::unavailable(path, spawn_failure("ffmpeg", &e)))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConvertError::unavailable(path, "ffmpeg stdout was not captured"));
        };

        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = Vec::new();
                let _ = pipe.read_to_end(&mut text);
                String::from_utf8_lossy(&text).into_owned()
            })
        });

        let frame_len = info.width as usize * info.height as usize * 3;
        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            stderr,
            frame_len,
            decoded: 0,
            finished: false,
        })
    }

    /// Waits for the decoder after its output ended and turns a failure
    /// status into an error carrying what ffmpeg printed.
    fn finish(&mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .map_err(|e| ConvertError::io("waiting for ffmpeg", e))?;
        self.finished = true;
        let stderr = self.collect_stderr();
        if status.success() {
            if !stderr.is_empty() {
                log::debug!("ffmpeg: {}", stderr);
            }
            return Ok(());
        }

        let reason = exit_reason(status, &stderr);
        if self.decoded == 0 {
            Err(ConvertError::unavailable(&self.path, reason))
        } else {
            Err(ConvertError::decode(reason))
        }
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|text| text.trim().to_string())
            .unwrap_or_default()
    }
}

fn exit_reason(status: ExitStatus, stderr: &str) -> String {
    if stderr.is_empty() {
        format!("ffmpeg exited with {}", status)
    } else {
        format!("ffmpeg exited with {}: {}", status, stderr)
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.frame_len];
        let filled = read_full(&mut self.stdout, &mut buf)
            .map_err(|e| ConvertError::io("reading decoded frame from ffmpeg", e))?;
        if filled < self.frame_len {
            if filled > 0 {
                log::warn!(
                    "decoder stopped mid-frame after {} frames ({} of {} bytes)",
                    self.decoded,
                    filled,
                    self.frame_len
                );
            }
            self.finish()?;
            return Ok(None);
        }
        self.decoded += 1;
        // buffer length matches the dimensions, so this cannot fail
        Ok(RgbImage::from_raw(self.info.width, self.info.height, buf))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        // the pipe closes with the process, so this does not block
        self.collect_stderr();
    }
}

/// Reads until `buf` is full or the stream ends, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Frames held in memory, for decoders living outside this crate.
pub struct MemorySource {
    info: VideoInfo,
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(fps: f64, frames: Vec<RgbImage>) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        let total_frames = frames.len() as u64;
        Self {
            info: VideoInfo {
                width,
                height,
                fps,
                total_frames,
                duration: if fps > 0.0 { total_frames as f64 / fps } else { 0.0 },
            },
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn path(&self) -> &Path {
        Path::new("<memory>")
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}
