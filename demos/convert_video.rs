//! Example: Convert a video to ASCII frames using vidascii as a library
//!
//! Run with: cargo run --example convert_video -- <video> [output_dir]

use std::path::PathBuf;
use vidascii::{AsciiConverter, ConversionOptions, ProgressPhase, RenderMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        println!("Usage: convert_video <video> [output_dir]");
        return Ok(());
    };
    let output_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("example_video_output"));

    let converter = AsciiConverter::new();
    let options = ConversionOptions::default()
        .with_mode(RenderMode::MonochromeFull)
        .with_columns(80)
        .with_fps(12);

    println!("Converting video to ASCII frames...");
    println!("Input: {}", input.display());
    println!("Output: {}", output_dir.display());

    let summary = converter.convert_video_with_progress(&input, &output_dir, &options, |progress| {
        if progress.phase == ProgressPhase::ConvertingFrames && progress.completed % 25 == 0 {
            println!("  {}", progress.message);
        }
    })?;

    println!("Video conversion complete: {} frames of {}x{}", summary.frame_count, summary.columns, summary.rows);
    println!("ASCII frames saved to {}", summary.frames_dir.display());
    Ok(())
}
