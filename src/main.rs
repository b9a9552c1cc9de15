use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;

use tunegrab::core::{config, disk, init_logger, log_credentials_configuration};
use tunegrab::state::AppState;
use tunegrab::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_logger(config::LOG_FILE_PATH.as_str())?;
    log::info!("Starting tunegrab v{}", env!("CARGO_PKG_VERSION"));

    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set");
    }
    log_credentials_configuration();

    let download_dir = disk::ensure_download_dir()?;
    log::info!("Download folder: {}", download_dir.display());

    let state = Arc::new(AppState::new());

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    spawn_periodic_cleanup(Arc::clone(&state));

    let deps = HandlerDeps::new(Arc::clone(&state));
    log::info!("Bot is running");

    Dispatcher::builder(bot, schema(deps.clone()))
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Shutting down, clearing scratch files");
    disk::sweep_all_files();
    Ok(())
}

/// Periodic housekeeping: expired search sessions, stale download slots,
/// expired video metadata and leaked scratch files.
fn spawn_periodic_cleanup(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config::cache::sweep_interval());
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            run_cleanup(&state);
        }
    });
}

fn run_cleanup(state: &AppState) {
    let sessions = state.search_cache.sweep_older_than(config::cache::max_age());
    let tracks = state.track_downloads.sweep_stale(config::download::stale_after());
    let videos = state.video_downloads.sweep_stale(config::download::stale_after());
    let infos = state.video_cache.sweep_expired();
    let files = disk::sweep_old_files(Duration::from_secs(config::download::FILE_MAX_AGE_SECS));

    if sessions + tracks + videos + infos + files > 0 {
        log::info!(
            "Cleanup: {} search sessions, {} track slots, {} video slots, {} video infos, {} files",
            sessions,
            tracks,
            videos,
            infos,
            files
        );
    }
}
