//! Façade du lecteur de la borne
//!
//! [`VideoPlayer`] assemble les composants (cache de métadonnées,
//! constructeur de playlist, moteur, échantillonneur d'aperçu, diffuseur) et
//! expose les opérations utilisées par la couche HTTP.
//!
//! Flux d'un changement de configuration :
//! configuration → reconstruction de la playlist → rechargement du moteur →
//! notification `playlist_update` aux abonnés.

use crate::backend::MediaBackend;
use crate::broadcaster::{StatusBroadcaster, Subscription};
use crate::config_ext::PlaybackConfigExt;
use crate::engine::{EngineState, PlaybackEngine, PlaybackState};
use crate::error::{Error, Result};
use crate::metadata::{Metadata, MetadataCache, MetadataProbe};
use crate::playlist::{Playlist, PlaylistBuilder};
use crate::snapshot::{SnapshotFile, SnapshotSampler};
use kioskconfig::{Config, VideoEntry, VideoUpdate};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub struct VideoPlayer {
    config: Arc<Config>,
    cache: Arc<MetadataCache>,
    builder: PlaylistBuilder,
    engine: Arc<PlaybackEngine>,
    snapshot: Arc<SnapshotFile>,
    sampler: SnapshotSampler,
    broadcaster: StatusBroadcaster,
    join_timeout: Duration,
}

impl VideoPlayer {
    /// Assemble le lecteur ; rien n'est lancé avant [`start`](Self::start)
    pub fn new(
        config: Arc<Config>,
        backend: Arc<dyn MediaBackend>,
        probe: Arc<dyn MetadataProbe>,
    ) -> Result<Self> {
        let settings = config.playback_settings()?;

        let cache = Arc::new(MetadataCache::new(probe));
        let builder = PlaylistBuilder::new(cache.clone());
        let engine = Arc::new(PlaybackEngine::new(backend, settings.start_grace));
        let snapshot = Arc::new(SnapshotFile::new(settings.snapshot_path));
        let sampler = SnapshotSampler::new(
            engine.clone(),
            snapshot.clone(),
            settings.preview_interval,
            settings.join_timeout,
        );
        let broadcaster =
            StatusBroadcaster::new(config.clone(), engine.clone(), settings.status_interval);

        Ok(Self {
            config,
            cache,
            builder,
            engine,
            snapshot,
            sampler,
            broadcaster,
            join_timeout: settings.join_timeout,
        })
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }

    /// Démarrage : métadonnées, première lecture, puis aperçu selon la configuration
    ///
    /// Un échec d'écriture de la configuration est journalisé et n'empêche
    /// pas la lecture.
    pub async fn start(&self) -> Result<EngineState> {
        match self.refresh_metadata().await {
            Ok(refreshed) => info!(refreshed, "Video metadata ready"),
            Err(e) => warn!("Video metadata not saved: {}", e),
        }

        let (state, persisted) = self.reload().await?;
        if let Err(e) = persisted {
            warn!("Resolved metadata not saved: {}", e);
        }

        let preview = self.config.get_preview_enabled().map_err(Error::config)?;
        self.handle_preview_toggle(preview).await?;
        Ok(state)
    }

    // ========================================================================
    // Playlist
    // ========================================================================

    /// Reconstruit la playlist depuis la configuration et relance la lecture
    ///
    /// Les métadonnées résolues pendant la reconstruction sont enregistrées
    /// dans la configuration après le rechargement du moteur. Une erreur de
    /// persistance est remontée à l'appelant, la lecture ayant déjà repris.
    pub async fn rebuild_and_reload(&self) -> Result<EngineState> {
        let (state, persisted) = self.reload().await?;
        persisted?;
        Ok(state)
    }

    /// Recharge le moteur puis tente d'enregistrer les métadonnées résolues
    async fn reload(&self) -> Result<(EngineState, Result<()>)> {
        let videos = self
            .config
            .get_enabled_videos_sorted_by_order()
            .map_err(Error::config)?;
        let playlist = self.builder.rebuild(&videos).await;

        let state = self.engine.replace_playlist(playlist.clone()).await;
        self.broadcaster.notify_playlist_change().await;

        let persisted = match self.persist_resolved_metadata(&videos, &playlist) {
            Ok(0) => Ok(()),
            Ok(_) => self.broadcaster.notify_metadata_change(),
            Err(e) => Err(e),
        };
        Ok((state, persisted))
    }

    fn persist_resolved_metadata(&self, source: &[VideoEntry], playlist: &Playlist) -> Result<usize> {
        let mut written = 0;
        for entry in source.iter().filter(|v| v.lacks_metadata()) {
            let Some(resolved) = playlist.find_by_path(&entry.path) else {
                continue;
            };
            self.config
                .set_video_metadata(
                    &resolved.path,
                    &resolved.title,
                    &resolved.description,
                    resolved.duration_minutes,
                )
                .map_err(Error::config)?;
            written += 1;
        }
        Ok(written)
    }

    /// Applique une requête de mise à jour de la liste puis recharge
    pub async fn update_videos(&self, updates: Vec<VideoUpdate>) -> Result<EngineState> {
        self.config.update_videos(updates).map_err(Error::config)?;
        self.broadcaster.notify_metadata_change()?;
        self.rebuild_and_reload().await
    }

    /// Rescanne le répertoire vidéo, complète les métadonnées puis recharge
    pub async fn rescan(&self) -> Result<EngineState> {
        let count = self.config.rescan_videos().map_err(Error::config)?;
        info!(count, "Video library rescanned");
        self.refresh_metadata().await?;
        self.broadcaster.notify_metadata_change()?;
        self.rebuild_and_reload().await
    }

    pub async fn playlist(&self) -> Arc<Playlist> {
        self.engine.playlist().await
    }

    // ========================================================================
    // Métadonnées
    // ========================================================================

    /// Résout et enregistre les métadonnées de toutes les vidéos qui n'en ont pas
    ///
    /// Retourne le nombre d'entrées complétées.
    pub async fn refresh_metadata(&self) -> Result<usize> {
        let missing: Vec<VideoEntry> = self
            .config
            .get_videos()
            .map_err(Error::config)?
            .into_iter()
            .filter(|v| v.lacks_metadata())
            .collect();

        for video in &missing {
            self.store_metadata(&video.path).await?;
        }
        Ok(missing.len())
    }

    /// Résout les métadonnées d'une vidéo et les enregistre
    ///
    /// `None` si le chemin n'est pas dans la configuration.
    pub async fn update_metadata(&self, path: &str) -> Result<Option<Metadata>> {
        if self
            .config
            .get_video_by_path(path)
            .map_err(Error::config)?
            .is_none()
        {
            warn!(path, "Metadata update requested for an unknown video");
            return Ok(None);
        }
        let metadata = self.store_metadata(path).await?;
        Ok(Some(metadata))
    }

    async fn store_metadata(&self, path: &str) -> Result<Metadata> {
        let metadata = self.cache.resolve(Path::new(path)).await;
        self.config
            .set_video_metadata(
                path,
                &metadata.title,
                &metadata.description,
                metadata.duration_minutes,
            )
            .map_err(Error::config)?;
        Ok(metadata)
    }

    /// Change le nom d'affichage et le pousse aux abonnés
    pub fn update_display_name(&self, name: &str) -> Result<()> {
        self.config
            .set_display_name(name.to_string())
            .map_err(Error::config)?;
        self.broadcaster.notify_metadata_change()
    }

    /// Bascule le mode sombre de l'interface et prévient les abonnés
    pub fn toggle_dark_mode(&self) -> Result<bool> {
        let enabled = self.config.toggle_dark_mode().map_err(Error::config)?;
        info!(enabled, "Dark mode toggled");
        self.broadcaster.notify_metadata_change()?;
        Ok(enabled)
    }

    // ========================================================================
    // Aperçu
    // ========================================================================

    /// Bascule l'aperçu dans la configuration et applique le nouvel état
    pub async fn toggle_preview(&self) -> Result<bool> {
        let enabled = self.config.toggle_preview().map_err(Error::config)?;
        self.handle_preview_toggle(enabled).await?;
        Ok(enabled)
    }

    /// Démarre ou arrête l'échantillonnage
    ///
    /// À la désactivation, la tâche est arrêtée et l'image supprimée avant le
    /// retour.
    pub async fn handle_preview_toggle(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.sampler.enable().await?;
        } else {
            self.sampler.disable().await?;
        }
        Ok(())
    }

    pub fn get_snapshot_file_path(&self) -> &Path {
        self.snapshot.path()
    }

    /// Image d'aperçu courante, lue sous le verrou de l'échantillonneur
    ///
    /// `None` si l'aperçu est désactivé ou qu'aucune image n'a encore été
    /// capturée.
    pub async fn read_snapshot(&self) -> Result<Option<Vec<u8>>> {
        if !self.config.get_preview_enabled().map_err(Error::config)? {
            return Ok(None);
        }
        self.snapshot.read().await
    }

    pub async fn is_preview_running(&self) -> bool {
        self.sampler.is_running().await
    }

    // ========================================================================
    // État et abonnés
    // ========================================================================

    pub async fn get_playback_status(&self) -> PlaybackState {
        self.engine.status().await
    }

    pub async fn on_subscriber_connect(&self) -> Result<Subscription> {
        self.broadcaster.on_subscriber_connect().await
    }

    pub async fn notify_playlist_change(&self) {
        self.broadcaster.notify_playlist_change().await
    }

    /// Arrêt du processus
    ///
    /// Arrête la lecture, puis les deux tâches de fond avec une attente
    /// bornée. Un dépassement est journalisé et n'empêche pas la sortie.
    pub async fn shutdown(&self) {
        info!("Shutting down video player");

        if let Err(e) = self.engine.stop().await {
            warn!("Error stopping playback: {}", e);
        }

        let (sampler, ()) = tokio::join!(
            self.sampler.disable(),
            self.broadcaster.shutdown(self.join_timeout)
        );
        if let Err(e) = sampler {
            warn!("Error stopping preview sampling: {}", e);
        }

        if let Err(e) = self.engine.backend().shutdown().await {
            error!("Error shutting down media backend: {}", e);
        }
    }
}
