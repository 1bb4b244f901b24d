//! # vidascii - Video to ASCII frame converter
//!
//! `vidascii` decodes a video, reduces it to a target frame rate and renders
//! every kept frame as ASCII art, either as fixed-width plain text or as
//! per-glyph HTML `<span>` markup for browser players.
//!
//! ## Output layout
//!
//! ```text
//! <output_dir>/
//!   README.txt              run manifest
//!   txt_frames/
//!     frame_0001.txt        one file per emitted frame
//!     frame_0002.txt
//!     ...
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use vidascii::{AsciiConverter, ConversionOptions, RenderMode};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = AsciiConverter::new();
//! let options = ConversionOptions::default()
//!     .with_mode(RenderMode::MonochromeFull)
//!     .with_columns(80)
//!     .with_fps(12);
//! let summary = converter.convert_video(Path::new("input.mp4"), Path::new("out"), &options)?;
//! println!("{} frames written", summary.frame_count);
//! # Ok(())
//! # }
//! ```
//!
//! Decoding shells out to `ffmpeg` and `ffprobe`, which must be installed.

use anyhow::{anyhow, Context};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub mod error;
pub mod luminance;
pub mod render;
pub mod sampler;
pub mod summary;
pub mod video;

pub use error::{ConvertError, Result};
pub use luminance::ASCII_CHARS;
pub use render::{render_frame, rows_for, RenderMode, FONT_RATIO};
pub use sampler::{frame_stride, SampleReport};
pub use summary::ConversionSummary;
pub use video::{FfmpegConfig, FrameSource, VideoInfo};

/// Subdirectory of the output directory that holds the frame files.
pub const FRAMES_DIR: &str = "txt_frames";

/// Represents the current phase of a conversion operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// Reading stream metadata with ffprobe
    ProbingVideo,
    /// Decoding and converting frames to ASCII art
    ConvertingFrames,
    /// Conversion completed successfully
    Complete,
}

/// Progress information for conversion operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub phase: ProgressPhase,
    /// Frames emitted so far
    pub completed: usize,
    /// Expected number of emitted frames (0 if unknown)
    pub total: usize,
    /// Percentage complete (0.0 to 100.0)
    pub percentage: f64,
    pub message: String,
}

impl Progress {
    pub fn probing() -> Self {
        Self {
            phase: ProgressPhase::ProbingVideo,
            completed: 0,
            total: 0,
            percentage: 0.0,
            message: "Reading video metadata...".to_string(),
        }
    }

    pub fn converting_frames(completed: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            phase: ProgressPhase::ConvertingFrames,
            completed,
            total,
            percentage,
            message: format!("Converting frame {} of {}", completed, total),
        }
    }

    pub fn complete(total_frames: usize) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            completed: total_frames,
            total: total_frames,
            percentage: 100.0,
            message: format!("Conversion complete: {} frames", total_frames),
        }
    }
}

/// Named set of conversion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub mode: RenderMode,
    pub threshold: u8,
    pub columns: u32,
    pub fps: u32,
}

/// Application configuration: presets and ffmpeg locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub presets: HashMap<String, Preset>,
    pub default_preset: String,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let presets = [
            ("default", RenderMode::Colored, 15, 100, 24),
            ("terminal", RenderMode::MonochromeFull, 15, 80, 24),
            ("silhouette", RenderMode::TransparentBrowser, 100, 100, 24),
            ("small", RenderMode::MonochromeBrowser, 15, 60, 12),
        ]
        .into_iter()
        .map(|(name, mode, threshold, columns, fps)| {
            (name.to_string(), Preset { mode, threshold, columns, fps })
        })
        .collect();

        Self {
            presets,
            default_preset: "default".to_string(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl AppConfig {
    pub const FILE_NAME: &'static str = "vidascii.json";

    /// Candidate config locations, in lookup order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut tried = Vec::new();
        if let Some(mut d) = dirs::data_dir() {
            d.push("vidascii");
            d.push(Self::FILE_NAME);
            tried.push(d);
        }
        tried.push(PathBuf::from(Self::FILE_NAME));
        tried
    }

    /// First config found in [`AppConfig::search_paths`], or the built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        for p in Self::search_paths() {
            if p.exists() {
                return Self::from_file(&p);
            }
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config json {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.presets.contains_key(&self.default_preset) {
            return Err(anyhow!("default_preset '{}' is not defined in presets", self.default_preset));
        }
        for (name, preset) in &self.presets {
            ConversionOptions::from_preset(preset)
                .validate()
                .with_context(|| format!("preset '{}'", name))?;
        }
        Ok(())
    }
}

/// Options for a video conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    pub mode: RenderMode,
    /// Luminance threshold (0-255); darker cells are rendered blank
    pub threshold: u8,
    /// Target width in characters
    pub columns: u32,
    /// Target output frames per second
    pub fps: u32,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Colored,
            threshold: 15,
            columns: 100,
            fps: 24,
        }
    }
}

impl ConversionOptions {
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_columns(mut self, columns: u32) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            mode: preset.mode,
            threshold: preset.threshold,
            columns: preset.columns,
            fps: preset.fps,
        }
    }

    /// Rows of every emitted frame.
    pub fn rows(&self) -> u32 {
        rows_for(self.columns)
    }

    /// Rejects settings that cannot produce a frame.
    pub fn validate(&self) -> Result<()> {
        render::validate_columns(self.columns)?;
        if self.fps == 0 {
            return Err(ConvertError::InvalidInput("fps must be a positive integer".to_string()));
        }
        Ok(())
    }
}

/// Main converter struct
pub struct AsciiConverter {
    config: AppConfig,
}

impl AsciiConverter {
    /// Create a new converter with default configuration
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// Create a converter with custom configuration
    pub fn with_config(config: AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load configuration from a file
    pub fn from_config_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            config: AppConfig::from_file(path)?,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn get_preset(&self, name: &str) -> Option<&Preset> {
        self.config.presets.get(name)
    }

    /// Get conversion options from a preset name
    pub fn options_from_preset(&self, preset_name: &str) -> anyhow::Result<ConversionOptions> {
        let preset = self
            .get_preset(preset_name)
            .ok_or_else(|| anyhow!("Preset '{}' not found", preset_name))?;
        Ok(ConversionOptions::from_preset(preset))
    }

    /// Stream metadata of `input`.
    pub fn probe(&self, input: &Path) -> Result<VideoInfo> {
        ensure_exists(input)?;
        video::probe(input, &self.config.ffmpeg)
    }

    /// Render a single already-decoded frame.
    pub fn render_image(&self, frame: &image::RgbImage, options: &ConversionOptions) -> Result<String> {
        render::render_to_string(frame, options.mode, options.threshold, options.columns)
    }

    /// Convert `input` into `<output_dir>/txt_frames/frame_NNNN.txt` plus
    /// `<output_dir>/README.txt`.
    pub fn convert_video(&self, input: &Path, output_dir: &Path, options: &ConversionOptions) -> Result<ConversionSummary> {
        self.convert_video_with_progress(input, output_dir, options, |_| {})
    }

    /// Like [`AsciiConverter::convert_video`], reporting progress per phase and per frame.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use vidascii::{AsciiConverter, ConversionOptions, ProgressPhase};
    /// use std::path::Path;
    ///
    /// let converter = AsciiConverter::new();
    /// converter.convert_video_with_progress(
    ///     Path::new("video.mp4"),
    ///     Path::new("output"),
    ///     &ConversionOptions::default(),
    ///     |progress| {
    ///         if progress.phase == ProgressPhase::ConvertingFrames {
    ///             println!("{}/{} ({:.1}%)", progress.completed, progress.total, progress.percentage);
    ///         }
    ///     },
    /// ).unwrap();
    /// ```
    pub fn convert_video_with_progress<F>(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &ConversionOptions,
        progress_callback: F,
    ) -> Result<ConversionSummary>
    where
        F: Fn(Progress),
    {
        ensure_exists(input)?;
        options.validate()?;

        progress_callback(Progress::probing());
        let frames_dir = output_dir.join(FRAMES_DIR);
        let report = sampler::sample_video(input, options, &self.config.ffmpeg, &frames_dir, &progress_callback)?;

        let summary = ConversionSummary {
            generated: Local::now(),
            source: input.to_path_buf(),
            mode: options.mode,
            threshold: options.threshold,
            columns: options.columns,
            rows: options.rows(),
            fps: options.fps,
            frame_count: report.frames_emitted,
            frames_dir,
        };
        summary.write(output_dir)?;
        log::info!(
            "wrote {} frames ({} decoded, stride {}) to {}",
            report.frames_emitted,
            report.frames_decoded,
            report.stride,
            summary.frames_dir.display()
        );

        progress_callback(Progress::complete(report.frames_emitted));
        Ok(summary)
    }
}

impl Default for AsciiConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_exists(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(ConvertError::InvalidInput(format!("video file not found: {}", input.display())));
    }
    Ok(())
}
