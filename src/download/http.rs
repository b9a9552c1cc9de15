//! Direct HTTP audio transfer with chunked streaming and progress tracking.
//!
//! VK and Yandex both hand us a plain mp3 URL; this module streams it to
//! disk via reqwest, reporting progress per meaningful percent step and
//! checking the cancellation token between chunks.

use std::io::Write;
use std::time::Instant;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::progress::SourceProgress;

/// Builds the shared client for platform API calls and audio transfers.
pub fn build_client() -> AppResult<Client> {
    Client::builder()
        .user_agent("Mozilla/5.0 (compatible; tunegrab/0.4)")
        .timeout(config::download::http_timeout())
        .connect_timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(AppError::Http)
}

/// Streams a direct audio URL to `output_path`.
///
/// Progress is reported on every 5% step; speed is derived from the bytes
/// moved since the transfer started. Cancellation aborts mid-stream and
/// removes the partial file.
pub async fn stream_to_file(
    client: &Client,
    url: &str,
    output_path: &str,
    progress_tx: &mpsc::UnboundedSender<SourceProgress>,
    cancel: &CancellationToken,
) -> AppResult<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Download(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Download(format!("HTTP {} for {}", response.status(), url)));
    }

    let total_size = response.content_length();

    let mut file = std::fs::File::create(output_path)
        .map_err(|e| AppError::Download(format!("Failed to create file: {}", e)))?;

    let started = Instant::now();
    let mut downloaded: u64 = 0;
    let mut last_progress_percent = 0u8;

    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        if cancel.is_cancelled() {
            drop(file);
            let _ = std::fs::remove_file(output_path);
            return Err(AppError::Download("Download cancelled".to_string()));
        }

        let chunk = chunk_result.map_err(|e| AppError::Download(format!("Error reading chunk: {}", e)))?;
        file.write_all(&chunk)
            .map_err(|e| AppError::Download(format!("Error writing to file: {}", e)))?;
        downloaded += chunk.len() as u64;

        let percent = total_size
            .map(|total| {
                if total > 0 {
                    ((downloaded as f64 / total as f64) * 100.0) as u8
                } else {
                    0
                }
            })
            .unwrap_or(0);

        if percent >= last_progress_percent + 5 || percent == 100 {
            last_progress_percent = percent;
            let elapsed = started.elapsed().as_secs_f64();
            let speed = if elapsed > 0.0 { Some(downloaded as f64 / elapsed) } else { None };
            let eta = match (total_size, speed) {
                (Some(total), Some(s)) if s > 0.0 && total > downloaded => {
                    Some(((total - downloaded) as f64 / s) as u64)
                }
                _ => None,
            };
            let _ = progress_tx.send(SourceProgress {
                percent,
                speed_bytes_sec: speed,
                eta_seconds: eta,
                downloaded_bytes: Some(downloaded),
                total_bytes: total_size,
            });
        }
    }

    file.flush()
        .map_err(|e| AppError::Download(format!("Failed to flush file: {}", e)))?;

    let file_size = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(downloaded);

    log::info!(
        "HTTP download complete: {} ({:.2} MB)",
        output_path,
        file_size as f64 / (1024.0 * 1024.0)
    );

    Ok(file_size)
}
