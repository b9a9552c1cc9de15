//! yt-dlp subprocess plumbing.
//!
//! All yt-dlp invocations go through here: flat JSON searches, audio
//! extraction, and video downloads. Runs are blocking and belong on the
//! `spawn_blocking` pool; progress lines are parsed off stdout/stderr and
//! forwarded over the caller's channel. A [`CancellationToken`] kills the
//! child mid-run.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::logging::existing_cookies_file;
use crate::download::progress::SourceProgress;

/// Parsed fields from a yt-dlp `[download]` progress line.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub percent: u8,
    pub speed_mbs: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub current_size: Option<u64>,
    pub total_size: Option<u64>,
}

/// Parses progress from a yt-dlp output line.
/// Example: "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"
pub fn parse_progress(line: &str) -> Option<ProgressInfo> {
    if !line.contains("[download]") {
        return None;
    }
    if !line.contains('%') {
        // e.g. "[download] Destination: ..."
        return None;
    }

    let mut percent = None;
    let mut speed_mbs = None;
    let mut eta_seconds = None;
    let mut total_size = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if part.ends_with('%') {
            if let Ok(p) = part.trim_end_matches('%').parse::<f32>() {
                // Clamp so garbage lines never jump the bar past 100%
                percent = Some(p.clamp(0.0, 100.0) as u8);
            }
        }

        // "of 10.00MiB"
        if *part == "of" && i + 1 < parts.len() {
            if let Some(size_bytes) = parse_size(parts[i + 1]) {
                total_size = Some(size_bytes);
            }
        }

        // "at 500.00KiB/s" or "at 2.3MiB/s"
        if *part == "at" && i + 1 < parts.len() {
            if let Some(speed) = parse_size(parts[i + 1]) {
                speed_mbs = Some(speed as f64 / (1024.0 * 1024.0));
            }
        }

        // "ETA 00:10" or "ETA 1:23"
        if *part == "ETA" && i + 1 < parts.len() {
            if let Some(eta) = parse_eta(parts[i + 1]) {
                eta_seconds = Some(eta);
            }
        }
    }

    let percent = percent?;
    let current_size = total_size.map(|total| (total as f64 * (percent as f64 / 100.0)) as u64);

    Some(ProgressInfo {
        percent,
        speed_mbs,
        eta_seconds,
        current_size,
        total_size,
    })
}

/// Parses a size like "10.00MiB" or "500.00KiB" into bytes.
fn parse_size(size_str: &str) -> Option<u64> {
    let size_str = size_str.trim_end_matches("/s");
    if size_str.ends_with("MiB") {
        if let Ok(mb) = size_str.trim_end_matches("MiB").parse::<f64>() {
            return Some((mb * 1024.0 * 1024.0) as u64);
        }
    } else if size_str.ends_with("KiB") {
        if let Ok(kb) = size_str.trim_end_matches("KiB").parse::<f64>() {
            return Some((kb * 1024.0) as u64);
        }
    } else if size_str.ends_with("GiB") {
        if let Ok(gb) = size_str.trim_end_matches("GiB").parse::<f64>() {
            return Some((gb * 1024.0 * 1024.0 * 1024.0) as u64);
        }
    }
    None
}

/// Parses an ETA like "00:10" or "1:23" into seconds.
fn parse_eta(eta_str: &str) -> Option<u64> {
    let parts: Vec<&str> = eta_str.split(':').collect();
    if parts.len() == 2 {
        if let (Ok(minutes), Ok(seconds)) = (parts[0].parse::<u64>(), parts[1].parse::<u64>()) {
            return Some(minutes * 60 + seconds);
        }
    }
    None
}

/// Appends `--cookies <file>` when the configured cookies file exists.
pub fn append_cookies_args(args: &mut Vec<String>) {
    if let Some(path) = existing_cookies_file() {
        args.push("--cookies".to_string());
        args.push(path);
    }
}

/// Arguments shared by every download invocation.
fn common_download_args(output_template: &str) -> Vec<String> {
    vec![
        "-o".to_string(),
        output_template.to_string(),
        "--newline".to_string(),
        "--force-overwrites".to_string(),
        "--no-playlist".to_string(),
        "--socket-timeout".to_string(),
        "30".to_string(),
    ]
}

/// Builds the argument list for an audio extraction run.
///
/// `output_base` is the destination path without an extension; yt-dlp
/// substitutes the real one via `.%(ext)s`, and the postprocessor re-encodes
/// to the configured audio format.
pub fn build_audio_args(output_base: &str, extra_args: &[&str]) -> Vec<String> {
    let template = format!("{}.%(ext)s", output_base);
    let mut args = common_download_args(&template);
    args.extend(
        [
            "--extract-audio",
            "--audio-format",
            config::AUDIO_FORMAT.as_str(),
            "--audio-quality",
            "0",
            "--add-metadata",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push("--postprocessor-args".to_string());
    args.push(format!(
        "ffmpeg:-acodec libmp3lame -b:a {}",
        config::AUDIO_QUALITY.as_str()
    ));
    append_cookies_args(&mut args);
    args.extend(extra_args.iter().map(|s| s.to_string()));
    args
}

/// Runs a flat-playlist search and returns one JSON value per result line.
///
/// `query_spec` is a yt-dlp search spec such as `ytsearch10:query` or a URL.
pub async fn search_flat(query_spec: String, extra_args: Vec<String>) -> AppResult<Vec<serde_json::Value>> {
    let ytdl_bin = config::YTDL_BIN.clone();

    let handle = tokio::task::spawn_blocking(move || -> AppResult<Vec<serde_json::Value>> {
        let mut args: Vec<String> = vec![
            "--dump-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
        ];
        append_cookies_args(&mut args);
        args.extend(extra_args);
        args.push(query_spec.clone());

        log::debug!("yt-dlp search: {} {}", ytdl_bin, args.join(" "));

        let child = Command::new(&ytdl_bin)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Download(format!("Failed to spawn {}: {}", ytdl_bin, e)))?;

        let output = wait_with_output_timeout(child, config::download::ytdlp_timeout())?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!(
                "yt-dlp search failed for '{}': {}",
                query_spec,
                stderr.chars().take(500).collect::<String>()
            );
            return Err(AppError::Download(format!("yt-dlp search failed: {}", stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut values = Vec::new();
        for line in stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(v) => values.push(v),
                Err(e) => log::debug!("Skipping unparsable yt-dlp line: {}", e),
            }
        }
        Ok(values)
    });

    handle
        .await
        .map_err(|e| AppError::Download(format!("Task join error: {}", e)))?
}

/// Probes a single URL with `--dump-json` (no flat-playlist) and returns the
/// full metadata object.
pub async fn probe_json(url: String) -> AppResult<serde_json::Value> {
    let ytdl_bin = config::YTDL_BIN.clone();

    let handle = tokio::task::spawn_blocking(move || -> AppResult<serde_json::Value> {
        let mut args: Vec<String> = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
        ];
        append_cookies_args(&mut args);
        args.push(url.clone());

        let child = Command::new(&ytdl_bin)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Download(format!("Failed to spawn {}: {}", ytdl_bin, e)))?;

        let output = wait_with_output_timeout(child, config::download::ytdlp_timeout())?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Download(format!("yt-dlp probe failed: {}", stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| AppError::Download(format!("yt-dlp returned no metadata for {}", url)))?;
        Ok(serde_json::from_str(line)?)
    });

    handle
        .await
        .map_err(|e| AppError::Download(format!("Task join error: {}", e)))?
}

/// Runs a yt-dlp download to completion, forwarding progress and honouring
/// cancellation. Must be called from a blocking context.
///
/// Cancellation kills the child process; the caller is responsible for
/// removing partial files afterwards.
pub fn run_download_blocking(
    args: &[String],
    url: &str,
    progress_tx: &mpsc::UnboundedSender<SourceProgress>,
    cancel: &CancellationToken,
) -> AppResult<()> {
    let ytdl_bin = config::YTDL_BIN.clone();

    let mut full_args: Vec<&str> = args.iter().map(String::as_str).collect();
    full_args.push(url);

    log::debug!("yt-dlp download: {} {}", ytdl_bin, full_args.join(" "));

    let mut child = Command::new(&ytdl_bin)
        .args(&full_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::Download(format!("Failed to spawn {}: {}", ytdl_bin, e)))?;

    let stderr_lines = Arc::new(std::sync::Mutex::new(VecDeque::<String>::new()));

    // stderr carries both error text and (for some extractors) progress lines
    if let Some(stderr_stream) = child.stderr.take() {
        let stderr_lines = Arc::clone(&stderr_lines);
        let tx = progress_tx.clone();
        std::thread::spawn(move || {
            let reader = BufReader::new(stderr_stream);
            for line in reader.lines().map_while(Result::ok) {
                if let Ok(mut lines) = stderr_lines.lock() {
                    lines.push_back(line.clone());
                    if lines.len() > 200 {
                        lines.pop_front();
                    }
                }
                if let Some(info) = parse_progress(&line) {
                    let _ = tx.send(progress_from_info(info));
                }
            }
        });
    }

    // yt-dlp emits progress on stdout with --newline; read it in a thread too
    // so the wait loop below can poll the cancel token
    if let Some(stdout_stream) = child.stdout.take() {
        let tx = progress_tx.clone();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout_stream);
            for line in reader.lines().map_while(Result::ok) {
                if let Some(info) = parse_progress(&line) {
                    let _ = tx.send(progress_from_info(info));
                }
            }
        });
    }

    let timeout = config::download::ytdlp_timeout();
    let deadline = std::time::Instant::now() + timeout;
    let status = loop {
        if cancel.is_cancelled() {
            log::info!("Download cancelled, killing yt-dlp for {}", url);
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::Download("Download cancelled".to_string()));
        }
        match child.try_wait() {
            Ok(Some(s)) => break s,
            Ok(None) => {
                if std::time::Instant::now() >= deadline {
                    log::error!("yt-dlp timed out after {}s, killing", timeout.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AppError::Download(format!(
                        "yt-dlp process timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(200));
            }
            Err(e) => return Err(AppError::Io(e)),
        }
    };

    if status.success() {
        return Ok(());
    }

    let stderr_text = stderr_lines
        .lock()
        .map(|mut lines| lines.make_contiguous().join("\n"))
        .unwrap_or_default();
    log::error!(
        "yt-dlp failed for {}: {}",
        url,
        stderr_text.chars().take(500).collect::<String>()
    );
    Err(AppError::Download(format!("yt-dlp exited with {}: {}", status, stderr_text)))
}

fn progress_from_info(info: ProgressInfo) -> SourceProgress {
    SourceProgress {
        percent: info.percent,
        speed_bytes_sec: info.speed_mbs.map(|m| m * 1024.0 * 1024.0),
        eta_seconds: info.eta_seconds,
        downloaded_bytes: info.current_size,
        total_bytes: info.total_size,
    }
}

/// Wait for a child process with a timeout. Kills the child on timeout.
fn wait_with_output_timeout(
    mut child: std::process::Child,
    timeout: Duration,
) -> AppResult<std::process::Output> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_status)) => {
                return child.wait_with_output().map_err(AppError::Io);
            }
            Ok(None) => {
                if std::time::Instant::now() >= deadline {
                    log::error!("yt-dlp process timed out after {}s, killing", timeout.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AppError::Download(format!(
                        "yt-dlp process timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(500));
            }
            Err(e) => return Err(AppError::Io(e)),
        }
    }
}

/// Locates the file yt-dlp actually produced for an extension-less base path.
///
/// Audio extraction normally lands on the configured format, but yt-dlp may
/// keep the source container when postprocessing is skipped.
pub fn find_actual_downloaded_file(output_base: &str) -> AppResult<String> {
    let candidates = [
        config::AUDIO_FORMAT.as_str(),
        "m4a",
        "webm",
        "opus",
        "ogg",
        "wav",
        "mp4",
    ];
    for ext in candidates {
        let candidate = format!("{}.{}", output_base, ext);
        if Path::new(&candidate).exists() {
            return Ok(candidate);
        }
    }

    // Last resort: anything in the directory sharing the base name
    let path = Path::new(output_base);
    if let (Some(parent), Some(stem)) = (path.parent(), path.file_name().and_then(|s| s.to_str())) {
        if let Ok(entries) = std::fs::read_dir(parent) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with(stem) {
                    return Ok(entry.path().to_string_lossy().to_string());
                }
            }
        }
    }

    Err(AppError::Download(format!(
        "Downloaded file not found for: {}",
        output_base
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_full_line() {
        let line = "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10";
        let info = parse_progress(line).unwrap();
        assert_eq!(info.percent, 45);
        assert_eq!(info.total_size, Some(10 * 1024 * 1024));
        assert_eq!(info.eta_seconds, Some(10));
        let speed = info.speed_mbs.unwrap();
        assert!((speed - 0.488).abs() < 0.01);
    }

    #[test]
    fn test_parse_progress_derives_current_size() {
        let line = "[download]  50.0% of 8.00MiB at 2.00MiB/s ETA 00:02";
        let info = parse_progress(line).unwrap();
        assert_eq!(info.current_size, Some(4 * 1024 * 1024));
    }

    #[test]
    fn test_parse_progress_ignores_non_download_lines() {
        assert!(parse_progress("[info] Extracting URL").is_none());
        assert!(parse_progress("[download] Destination: /tmp/out.webm").is_none());
    }

    #[test]
    fn test_parse_progress_clamps_percent() {
        let line = "[download] 150.0% of 1.00MiB at 1.00MiB/s ETA 00:00";
        assert_eq!(parse_progress(line).unwrap().percent, 100);
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("500.00KiB"), Some(512_000));
        assert_eq!(parse_size("10.00MiB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("2.00GiB"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("1.50MiB/s"), Some((1.5 * 1024.0 * 1024.0) as u64));
        assert_eq!(parse_size("12345"), None);
    }

    #[test]
    fn test_parse_eta() {
        assert_eq!(parse_eta("00:10"), Some(10));
        assert_eq!(parse_eta("1:23"), Some(83));
        assert_eq!(parse_eta("bogus"), None);
    }

    #[test]
    fn test_find_actual_downloaded_file_prefers_known_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("youtube_abc123");
        let base_str = base.to_str().unwrap();

        assert!(find_actual_downloaded_file(base_str).is_err());

        std::fs::write(format!("{}.m4a", base_str), b"x").unwrap();
        let found = find_actual_downloaded_file(base_str).unwrap();
        assert!(found.ends_with(".m4a"));
    }

    #[test]
    fn test_find_actual_downloaded_file_falls_back_to_stem_scan() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("vk_123_456");
        let base_str = base.to_str().unwrap();

        std::fs::write(dir.path().join("vk_123_456.aac"), b"x").unwrap();
        let found = find_actual_downloaded_file(base_str).unwrap();
        assert!(found.ends_with("vk_123_456.aac"));
    }

    #[test]
    fn test_build_audio_args_output_template() {
        let args = build_audio_args("/tmp/track_abc", &[]);
        assert_eq!(args[0], "-o");
        assert_eq!(args[1], "/tmp/track_abc.%(ext)s");
        assert!(args.iter().any(|a| a == "--extract-audio"));
        assert!(args.iter().any(|a| a == "--no-playlist"));
    }
}
