//! Frame-rate reduction and the per-frame render/persist loop.

use crate::error::{ConvertError, Result};
use crate::render::render_to_string;
use crate::video::{FfmpegConfig, FfmpegSource, FrameSource};
use crate::{ConversionOptions, Progress};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleReport {
    /// Frames rendered and persisted
    pub frames_emitted: usize,
    /// Source frames read, emitted or skipped
    pub frames_decoded: u64,
    pub stride: u64,
}

/// Every `stride`-th source frame is kept: `max(1, round(native / target))`.
///
/// Ties round to even, so 60 fps sampled for 24 keeps every second frame.
/// A target above the native rate keeps every frame; nothing is duplicated.
pub fn frame_stride(native_fps: f64, target_fps: u32) -> u64 {
    if target_fps == 0 || !native_fps.is_finite() || native_fps <= 0.0 {
        return 1;
    }
    ((native_fps / target_fps as f64).round_ties_even() as u64).max(1)
}

/// How many frames a source of `total_frames` produces at `stride`.
pub fn expected_output_frames(total_frames: u64, stride: u64) -> u64 {
    total_frames.div_ceil(stride.max(1))
}

/// File name of the `number`-th (1-based) emitted frame.
pub fn frame_file_name(number: usize) -> String {
    format!("frame_{:04}.txt", number)
}

/// Receives rendered frames as they are produced.
pub trait FrameSink {
    /// `number` is 1-based and contiguous.
    fn write_frame(&mut self, number: usize, content: &str) -> Result<()>;
}

/// Writes each frame to `<dir>/frame_NNNN.txt`.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates `dir` if needed.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| ConvertError::io(format!("creating {}", dir.display()), e))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FrameSink for DirectorySink {
    fn write_frame(&mut self, number: usize, content: &str) -> Result<()> {
        let path = self.dir.join(frame_file_name(number));
        fs::write(&path, content).map_err(|e| ConvertError::io(format!("writing {}", path.display()), e))
    }
}

impl FrameSink for Vec<String> {
    fn write_frame(&mut self, _number: usize, content: &str) -> Result<()> {
        self.push(content.to_string());
        Ok(())
    }
}

/// Renders every `stride`-th frame of `source` into `sink`.
///
/// A frame that fails to decode, render or persist aborts the run with
/// [`ConvertError::Frame`] carrying its source index. A source that ends
/// or fails before yielding any frame is [`ConvertError::SourceUnavailable`].
pub fn sample_frames<S, K, F>(source: &mut S, options: &ConversionOptions, sink: &mut K, progress: F) -> Result<SampleReport>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
    F: Fn(Progress),
{
    options.validate()?;

    let info = source.info().clone();
    let stride = frame_stride(info.fps, options.fps);
    let expected = expected_output_frames(info.total_frames, stride) as usize;
    log::info!(
        "sampling {} at stride {} ({:.2} fps -> {} fps, ~{} frames)",
        source.path().display(),
        stride,
        info.fps,
        options.fps,
        expected
    );

    progress(Progress::converting_frames(0, expected));

    let mut decoded: u64 = 0;
    let mut emitted: usize = 0;
    loop {
        let index = decoded;
        let next = source.next_frame().map_err(|e| match e {
            ConvertError::SourceUnavailable { .. } => e,
            other => other.at_frame(index),
        });
        let Some(frame) = next? else {
            break;
        };
        decoded += 1;
        if index % stride != 0 {
            continue;
        }

        let ascii = render_to_string(&frame, options.mode, options.threshold, options.columns)
            .map_err(|e| e.at_frame(index))?;
        emitted += 1;
        sink.write_frame(emitted, &ascii).map_err(|e| e.at_frame(index))?;
        log::debug!("source frame {} -> {}", index, frame_file_name(emitted));

        progress(Progress::converting_frames(emitted, expected.max(emitted)));
    }

    if decoded == 0 {
        return Err(ConvertError::unavailable(source.path(), "no decodable frames"));
    }
    if info.total_frames > 0 && decoded < info.total_frames {
        log::warn!(
            "{} ended after {} of {} frames",
            source.path().display(),
            decoded,
            info.total_frames
        );
    }

    Ok(SampleReport {
        frames_emitted: emitted,
        frames_decoded: decoded,
        stride,
    })
}

/// Opens `path` with ffmpeg and samples it into `frames_dir`.
///
/// The decoder process is released before this returns, on success or error.
pub fn sample_video<F>(
    path: &Path,
    options: &ConversionOptions,
    ffmpeg: &FfmpegConfig,
    frames_dir: &Path,
    progress: F,
) -> Result<SampleReport>
where
    F: Fn(Progress),
{
    options.validate()?;
    let mut source = FfmpegSource::open(path, ffmpeg)?;
    let mut sink = DirectorySink::create(frames_dir)?;
    sample_frames(&mut source, options, &mut sink, progress)
}
