use anyhow::Context;
use kioskconfig::Config;
use kioskplayback::{FfprobeProbe, KioskPlayerExt, MpvBackend, VideoPlayer};
use kioskserver::ServerBuilder;
use kioskserver::logs::LoggingOptions;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Configuration et journalisation ==========

    // Répertoire de configuration optionnel en premier argument
    let directory = std::env::args().nth(1).unwrap_or_default();
    let config = Arc::new(Config::load_config(&directory)?);

    let mut server = ServerBuilder::from_config(&config).build();
    server
        .init_logging(LoggingOptions::from_config(&config))
        .await;

    info!("Loading video library...");
    match config.rescan_videos() {
        Ok(count) => info!("{} video(s) found", count),
        Err(e) => error!("Cannot scan video directory: {}", e),
    }

    // ========== PHASE 2 : Lecteur ==========

    info!("Starting media player...");
    let backend = Arc::new(
        MpvBackend::from_config(&config)
            .await
            .context("Cannot start mpv")?,
    );
    let probe = Arc::new(FfprobeProbe::from_config(&config)?);

    let player = Arc::new(VideoPlayer::new(config.clone(), backend, probe)?);
    match player.start().await {
        Ok(state) => info!(?state, "Playback initialized"),
        Err(e) => warn!("Playback initialization incomplete: {}", e),
    }

    server.init_kiosk_api(player.clone()).await;

    // ========== PHASE 3 : Serveur HTTP ==========

    let addr = server.start().await?;
    info!("Kiosk player ready on http://{}", addr);
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    player.shutdown().await;
    info!("Kiosk player stopped");
    Ok(())
}
