//! End-to-end tests for the `transcode` binary.
//!
//! A config file points the binary at `/bin/sh -c <script>` so the runs do
//! not need a real ffmpeg.

use std::io::Write;
use std::process::Output;

use serde_json::Value;
use tempfile::NamedTempFile;

/// Create a config running `script` through the shell
fn shell_config(script: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(
        temp_file,
        r#"
[ffmpeg]
ffmpeg_path = "/bin/sh"
extra_args = ["-c", {}, "sh"]
timeout_secs = 30

[logging]
filter = "error"
"#,
        toml_string(script)
    )
    .unwrap();
    temp_file.flush().unwrap();
    temp_file
}

fn toml_string(value: &str) -> String {
    serde_json::to_string(value).unwrap()
}

fn run(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_transcode"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("FFMPEG_BIN_PATH")
        .env_remove("TRANSCODER_CONFIG")
        .output()
        .expect("Failed to run transcode")
}

fn json_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_dry_run_prints_arguments() {
    let output = run(&[
        "in.mkv",
        "out.mp4",
        "--vcodec",
        "libx264",
        "--format",
        "mp4",
        "--dry-run",
    ]);
    assert!(output.status.success());

    let args: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        args,
        vec![
            "-i",
            "in.mkv",
            "-vcodec",
            "libx264",
            "-f",
            "mp4",
            "-movflags",
            "frag_keyframe+faststart",
            "-y",
            "out.mp4"
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_events_are_json_lines() {
    let config = shell_config(
        r#"printf 'Input #0, wav, from in.wav:\n  Duration: 00:00:02.00, start: 0.000000\nStream mapping:\nsize=  8kB time=00:00:01.00 bitrate=  64.0kbits/s\n' >&2"#,
    );
    let output = run(&[
        "in.wav",
        "out.mp3",
        "--config",
        config.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let events = json_lines(&output.stdout);
    let types: Vec<_> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
    assert_eq!(types, vec!["metadata", "progress", "finished"]);
    assert_eq!(events[0]["input"]["duration"], 2000);
    assert_eq!(events[1]["progress"], 0.5);
    assert_eq!(events[1]["size"], 8192);
}

#[cfg(unix)]
#[test]
fn test_failure_exit_code_and_last_line() {
    let config = shell_config(r#"echo 'in.wav: No such file or directory' >&2; exit 3"#);
    let output = run(&["in.wav", "--config", config.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));

    let events = json_lines(&output.stdout);
    let last = events.last().unwrap();
    assert_eq!(last["type"], "failed");
    assert_eq!(last["code"], 3);
    assert_eq!(last["last_line"], "in.wav: No such file or directory");
}

#[test]
fn test_missing_config_file_fails() {
    let output = run(&["in.wav", "--config", "/nonexistent/transcoder.toml"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}
