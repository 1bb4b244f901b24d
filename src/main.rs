use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::Parser;
use dialoguer::{Confirm, FuzzySelect};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use vidascii::sampler::{expected_output_frames, frame_stride};
use vidascii::{AppConfig, AsciiConverter, ConversionOptions, Progress, ProgressPhase, RenderMode, FRAMES_DIR};
use walkdir::WalkDir;

const RULE: &str = "============================================================";

fn modes_help() -> String {
    let mut help = String::from("Modes:\n");
    for mode in RenderMode::ALL {
        help.push_str(&format!("  {:<20} - {}\n", mode.name(), mode.description()));
    }
    help.push_str("\nBrowser modes wrap each character in <span> tags to preserve structure.\n");
    help.push_str("Full modes generate fixed-width ASCII text suitable for terminal display.");
    help
}

#[derive(Parser, Debug)]
#[command(version, about = "Convert a video into ASCII art text frames.", after_help = modes_help())]
struct Args {
    /// Input video file
    video: Option<PathBuf>,

    /// Conversion mode (see modes below)
    #[arg(short, long)]
    mode: Option<RenderMode>,

    /// Luminance threshold (0-255); darker cells become blank
    #[arg(short, long)]
    threshold: Option<u8>,

    /// Output columns (width in characters)
    #[arg(short, long)]
    columns: Option<u32>,

    /// Output frames per second
    #[arg(short, long)]
    fps: Option<u32>,

    /// Output directory (default: ascii_frames_<mode>_<timestamp>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Start from a named preset in the config file; explicit flags win
    #[arg(long)]
    preset: Option<String>,

    /// Config file to use instead of the default lookup
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overwrite existing frames without asking
    #[arg(long, short, default_value_t = false)]
    yes: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let interactive = std::io::stdin().is_terminal();

    let cfg = match &args.config {
        Some(p) => AppConfig::from_file(p)?,
        None => AppConfig::load()?,
    };
    let converter = AsciiConverter::with_config(cfg)?;
    let options = resolve_options(&converter, &args)?;

    let video = match args.video.clone() {
        Some(p) => p,
        None => {
            if !interactive {
                return Err(anyhow!("Input video must be provided."));
            }
            pick_media_file()?
        }
    };
    if !video.exists() {
        return Err(anyhow!("Video file not found: {}", video.display()));
    }

    let output_dir = args.output.clone().unwrap_or_else(|| default_output_dir(options.mode));

    if !clear_stale_frames(&output_dir.join(FRAMES_DIR), args.yes, interactive)? {
        println!("Operation cancelled.");
        return Ok(());
    }

    println!("{}", RULE);
    println!("ASCII Video Converter");
    println!("{}", RULE);
    println!("Input video: {}", video.display());
    println!("Mode: {}", options.mode);
    println!("Luminance threshold: {}", options.threshold);
    println!("Output columns: {}", options.columns);
    println!("Target FPS: {}", options.fps);
    println!("Output directory: {}", output_dir.display());
    println!("{}", RULE);

    let info = converter.probe(&video)?;
    let stride = frame_stride(info.fps, options.fps);
    println!("\nVideo info:");
    println!("  Original FPS: {:.2}", info.fps);
    println!("  Duration: {:.2}s", info.duration);
    println!("  Total frames: {}", info.total_frames);
    println!("  Output frames: {}", expected_output_frames(info.total_frames, stride));
    println!("  Frame skip: {}", stride);
    println!("\nConverting to ASCII...");

    let progress_bar: RefCell<Option<ProgressBar>> = RefCell::new(None);
    let summary = converter.convert_video_with_progress(&video, &output_dir, &options, |progress: Progress| {
        if progress.phase != ProgressPhase::ConvertingFrames {
            return;
        }
        let mut pb_guard = progress_bar.borrow_mut();
        let pb = pb_guard.get_or_insert_with(|| new_progress_bar(progress.total));
        if progress.total > 0 {
            pb.set_length(progress.total as u64);
        }
        pb.set_position(progress.completed as u64);
    });

    if let Some(pb) = progress_bar.into_inner() {
        match &summary {
            Ok(_) => pb.finish_with_message("Done"),
            Err(_) => pb.abandon(),
        }
    }
    let summary = summary.with_context(|| format!("converting {}", video.display()))?;

    let mode = summary.mode.name();
    println!("\n{}", RULE);
    println!("Conversion complete!");
    println!("{}", RULE);
    println!("Frames saved to: {}", summary.frames_dir.display());
    println!("Total frames generated: {}", summary.frame_count);
    println!("\nNext steps:");
    println!("  mkdir -p public/frames/{}", mode);
    println!("  cp {}/*.txt public/frames/{}/", summary.frames_dir.display(), mode);
    println!("{}", RULE);

    Ok(())
}

/// Preset (named or default) first, then explicit flags on top.
fn resolve_options(converter: &AsciiConverter, args: &Args) -> Result<ConversionOptions> {
    let preset_name = args
        .preset
        .as_deref()
        .unwrap_or(converter.config().default_preset.as_str());
    let mut options = converter.options_from_preset(preset_name)?;

    if let Some(mode) = args.mode {
        options.mode = mode;
        if args.preset.is_none() {
            options.threshold = mode.default_threshold();
        }
    }
    if let Some(threshold) = args.threshold {
        options.threshold = threshold;
    }
    if let Some(columns) = args.columns {
        options.columns = columns;
    }
    if let Some(fps) = args.fps {
        options.fps = fps;
    }
    options.validate()?;
    Ok(options)
}

fn default_output_dir(mode: RenderMode) -> PathBuf {
    PathBuf::from(format!("ascii_frames_{}_{}", mode, Local::now().format("%Y%m%d_%H%M%S")))
}

fn new_progress_bar(total: usize) -> ProgressBar {
    if total == 0 {
        return ProgressBar::new_spinner();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Removes `frame_*.txt` left over from an earlier run so the new sequence
/// has no gaps or stale tail. Returns `false` if the user declined.
fn clear_stale_frames(frames_dir: &Path, assume_yes: bool, interactive: bool) -> Result<bool> {
    if !frames_dir.is_dir() {
        return Ok(true);
    }
    let stale: Vec<PathBuf> = WalkDir::new(frames_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.starts_with("frame_") && s.ends_with(".txt"))
        })
        .collect();
    if stale.is_empty() {
        return Ok(true);
    }

    if !assume_yes {
        if !interactive {
            return Err(anyhow!(
                "{} already contains {} frames; pass --yes to overwrite",
                frames_dir.display(),
                stale.len()
            ));
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Output directory {} already contains {} frames. Overwrite?",
                frames_dir.display(),
                stale.len()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            return Ok(false);
        }
    }

    for p in stale {
        fs::remove_file(&p).with_context(|| format!("removing {}", p.display()))?;
    }
    Ok(true)
}

fn pick_media_file() -> Result<PathBuf> {
    let files: Vec<String> = WalkDir::new(".")
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path().extension().is_some_and(|ext| {
                    matches!(
                        ext.to_str().map(str::to_ascii_lowercase).as_deref(),
                        Some("mp4" | "mkv" | "mov" | "avi" | "webm" | "gif")
                    )
                })
        })
        .map(|e| e.path().to_string_lossy().into_owned())
        .collect();
    if files.is_empty() {
        return Err(anyhow!("No video files found in current directory."));
    }
    let selection = FuzzySelect::with_theme(&dialoguer::theme::ColorfulTheme::default())
        .with_prompt("Choose an input video")
        .default(0)
        .items(&files)
        .interact()?;
    Ok(PathBuf::from(&files[selection]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn help_lists_every_mode() {
        let help = modes_help();
        for mode in RenderMode::ALL {
            assert!(help.contains(mode.name()), "{help}");
            assert!(help.contains(mode.description()), "{help}");
        }
        assert!(help.contains("  transparent_full     - Pure ASCII with high threshold"), "{help}");
    }

    #[test]
    fn defaults_follow_default_preset() {
        let opts = resolve_options(&AsciiConverter::new(), &parse(&["vidascii", "clip.mp4"])).unwrap();
        assert_eq!(opts, ConversionOptions::default());
    }

    #[test]
    fn transparent_mode_raises_threshold_unless_given() {
        let converter = AsciiConverter::new();
        let opts = resolve_options(&converter, &parse(&["vidascii", "clip.mp4", "-m", "transparent_full"])).unwrap();
        assert_eq!(opts.mode, RenderMode::TransparentFull);
        assert_eq!(opts.threshold, 100);

        let opts = resolve_options(&converter, &parse(&["vidascii", "clip.mp4", "-m", "transparent_full", "-t", "40"])).unwrap();
        assert_eq!(opts.threshold, 40);
    }

    #[test]
    fn flags_override_preset() {
        let opts = resolve_options(
            &AsciiConverter::new(),
            &parse(&["vidascii", "clip.mp4", "--preset", "terminal", "-c", "40", "-f", "10"]),
        )
        .unwrap();
        assert_eq!(opts.mode, RenderMode::MonochromeFull);
        assert_eq!(opts.columns, 40);
        assert_eq!(opts.fps, 10);
        assert_eq!(opts.threshold, 15);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Args::try_parse_from(["vidascii", "clip.mp4", "-m", "sepia"]).is_err());
        assert!(Args::try_parse_from(["vidascii", "clip.mp4", "-t", "300"]).is_err());
        assert!(Args::try_parse_from(["vidascii", "clip.mp4", "-c", "-5"]).is_err());
        let args = parse(&["vidascii", "clip.mp4", "-c", "0"]);
        assert!(resolve_options(&AsciiConverter::new(), &args).is_err());
    }

    #[test]
    fn default_output_dir_names_mode() {
        let dir = default_output_dir(RenderMode::MonochromeFull);
        let name = dir.to_string_lossy().into_owned();
        assert!(name.starts_with("ascii_frames_monochrome_full_"), "{name}");
        assert_eq!(name.len(), "ascii_frames_monochrome_full_".len() + "20261016_120000".len());
    }

    #[test]
    fn stale_frames_are_removed_with_yes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(FRAMES_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("frame_0001.txt"), "x").unwrap();
        fs::write(dir.join("notes.md"), "keep").unwrap();
        assert!(clear_stale_frames(&dir, true, false).unwrap());
        assert!(!dir.join("frame_0001.txt").exists());
        assert!(dir.join("notes.md").exists());
    }

    #[test]
    fn stale_frames_need_confirmation_when_not_interactive() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(FRAMES_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("frame_0001.txt"), "x").unwrap();
        assert!(clear_stale_frames(&dir, false, false).is_err());
        assert!(dir.join("frame_0001.txt").exists());
        assert!(clear_stale_frames(&tmp.path().join("missing"), false, false).unwrap());
    }
}
