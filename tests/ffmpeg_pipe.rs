//! Decoder pipe tests driven by shell-script stand-ins for `ffprobe` and
//! `ffmpeg`, so the rawvideo read, exit-status and cleanup paths run without
//! the real tools installed.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use vidascii::sampler::{sample_frames, FrameSink};
use vidascii::video::FfmpegSource;
use vidascii::{AppConfig, AsciiConverter, ConversionOptions, ConvertError, FfmpegConfig, RenderMode, FRAMES_DIR};

// Scripts are written then executed; running one test at a time keeps a
// concurrent fork from holding a script open for writing (ETXTBSY).
static SERIAL: Mutex<()> = Mutex::new(());

/// 8x8 rgb24
const FRAME_BYTES: usize = 8 * 8 * 3;

const PROBE_SCRIPT: &str = "#!/bin/sh
cat <<'EOF'
width=8
height=8
r_frame_rate=30/1
avg_frame_rate=30/1
nb_frames=60
duration=2.000000
EOF
";

struct Tools {
    _dir: tempfile::TempDir,
    root: PathBuf,
    clip: PathBuf,
    config: FfmpegConfig,
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// `ffmpeg_body` runs after the shebang line.
fn fake_tools(ffmpeg_body: &str) -> Tools {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let ffprobe = root.join("ffprobe");
    let ffmpeg = root.join("ffmpeg");
    write_script(&ffprobe, PROBE_SCRIPT);
    write_script(&ffmpeg, &format!("#!/bin/sh\n{}\n", ffmpeg_body));

    let clip = root.join("clip.mp4");
    fs::write(&clip, b"stand-in").unwrap();
    Tools {
        _dir: dir,
        root,
        clip,
        config: FfmpegConfig {
            ffmpeg_path: Some(ffmpeg),
            ffprobe_path: Some(ffprobe),
        },
    }
}

/// Shell that writes `bytes` of white pixels to stdout.
fn white_bytes(bytes: usize) -> String {
    format!("head -c {} /dev/zero | tr '\\000' '\\377'", bytes)
}

fn converter(tools: &Tools) -> AsciiConverter {
    AsciiConverter::with_config(AppConfig {
        ffmpeg: tools.config.clone(),
        ..AppConfig::default()
    })
    .unwrap()
}

fn options() -> ConversionOptions {
    ConversionOptions::default()
        .with_mode(RenderMode::MonochromeFull)
        .with_threshold(15)
        .with_columns(10)
        .with_fps(30)
}

fn frame_count(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn reads_whole_frames_from_pipe() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let tools = fake_tools(&white_bytes(FRAME_BYTES * 3));
    let out = tools.root.join("out");

    let summary = converter(&tools).convert_video(&tools.clip, &out, &options()).unwrap();
    assert_eq!(summary.frame_count, 3);

    let frames = out.join(FRAMES_DIR);
    assert_eq!(frame_count(&frames), 3);
    let first = fs::read_to_string(frames.join("frame_0001.txt")).unwrap();
    assert_eq!(first, ["$$$$$$$$$$"; 4].join("\n"));
    assert!(out.join("README.txt").exists());
}

#[test]
fn partial_trailing_frame_ends_stream() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let tools = fake_tools(&white_bytes(FRAME_BYTES * 2 + 100));
    let out = tools.root.join("out");

    let summary = converter(&tools).convert_video(&tools.clip, &out, &options()).unwrap();
    assert_eq!(summary.frame_count, 2);
    assert_eq!(frame_count(&out.join(FRAMES_DIR)), 2);
}

#[test]
fn decoder_failure_mid_stream_names_frame() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let body = format!(
        "{}\necho '[h264] error while decoding MB 3 7' >&2\nexit 1",
        white_bytes(FRAME_BYTES * 3)
    );
    let tools = fake_tools(&body);
    let out = tools.root.join("out");

    let err = converter(&tools).convert_video(&tools.clip, &out, &options()).unwrap_err();
    match &err {
        ConvertError::Frame { index, source } => {
            assert_eq!(*index, 3);
            assert!(matches!(**source, ConvertError::Decode(_)), "{source}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("error while decoding"), "{err}");
    assert!(!out.join("README.txt").exists());
}

#[test]
fn decoder_failure_before_first_frame_is_unavailable() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let tools = fake_tools("echo 'Decoder (codec hevc) not found' >&2\nexit 1");
    let out = tools.root.join("out");

    let err = converter(&tools).convert_video(&tools.clip, &out, &options()).unwrap_err();
    assert!(matches!(err, ConvertError::SourceUnavailable { .. }), "{err}");
    assert!(err.to_string().contains("Decoder (codec hevc) not found"), "{err}");
}

#[test]
fn clean_exit_without_frames_is_unavailable() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let tools = fake_tools("exit 0");

    let err = converter(&tools)
        .convert_video(&tools.clip, &tools.root.join("out"), &options())
        .unwrap_err();
    assert!(matches!(err, ConvertError::SourceUnavailable { .. }), "{err}");
}

struct RejectingSink;

impl FrameSink for RejectingSink {
    fn write_frame(&mut self, _number: usize, _content: &str) -> vidascii::Result<()> {
        Err(ConvertError::InvalidInput("sink closed".to_string()))
    }
}

#[test]
fn early_sampler_error_reaps_decoder() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    // one frame, then a decoder that would keep running; `exec` keeps the pid
    let body = format!("echo $$ > \"$(dirname \"$0\")/pid\"\n{}\nexec sleep 30", white_bytes(FRAME_BYTES));
    let tools = fake_tools(&body);

    let started = Instant::now();
    {
        let mut source = FfmpegSource::open(&tools.clip, &tools.config).unwrap();
        let err = sample_frames(&mut source, &options(), &mut RejectingSink, |_| {}).unwrap_err();
        assert!(matches!(err, ConvertError::Frame { index: 0, .. }), "{err}");
    }
    assert!(started.elapsed() < Duration::from_secs(20));

    let pid = fs::read_to_string(tools.root.join("pid")).unwrap();
    let proc_entry = PathBuf::from(format!("/proc/{}", pid.trim()));
    if Path::new("/proc/self").exists() {
        // a killed but unreaped child would linger as a zombie entry
        assert!(!proc_entry.exists(), "decoder {} still present", pid.trim());
    }
}
