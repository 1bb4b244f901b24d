//! The `README.txt` manifest written next to the frames.

use crate::error::{ConvertError, Result};
use crate::render::RenderMode;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "README.txt";

/// Metadata describing one finished conversion.
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub generated: DateTime<Local>,
    pub source: PathBuf,
    pub mode: RenderMode,
    pub threshold: u8,
    pub columns: u32,
    pub rows: u32,
    pub fps: u32,
    pub frame_count: usize,
    /// Directory holding the `frame_NNNN.txt` files
    pub frames_dir: PathBuf,
}

impl ConversionSummary {
    pub fn render(&self) -> String {
        let mode = self.mode.name();
        let frames = self.frames_dir.display();
        format!(
            "ASCII Animation Frames\n\
             =====================\n\
             \n\
             Generated: {generated}\n\
             Source video: {source}\n\
             Mode: {mode}\n\
             Luminance threshold: {threshold}\n\
             Output columns: {columns}\n\
             Output rows: {rows}\n\
             Target FPS: {fps}\n\
             Total frames: {count}\n\
             \n\
             Frames are located in: {frames}\n\
             \n\
             To use in a web project:\n\
             1. Copy frames to public/frames/{mode}/\n\
             \x20  mkdir -p public/frames/{mode}\n\
             \x20  cp {frames}/*.txt public/frames/{mode}/\n\
             \n\
             2. Point the ASCII player at framesPath=\"{mode}\"\n",
            generated = self.generated.format("%Y-%m-%d %H:%M:%S"),
            source = self.source.display(),
            threshold = self.threshold,
            columns = self.columns,
            rows = self.rows,
            fps = self.fps,
            count = self.frame_count,
        )
    }

    /// Writes the manifest to `<output_dir>/README.txt` and returns its path.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(MANIFEST_FILE);
        fs::write(&path, self.render())
            .map_err(|e| ConvertError::io(format!("writing {}", path.display()), e))?;
        Ok(path)
    }
}
