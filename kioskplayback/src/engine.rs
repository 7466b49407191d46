//! Moteur de lecture en boucle
//!
//! Le moteur possède l'unique lecteur sous-jacent. Chaque remplacement de
//! playlist est une reconstruction complète : arrêt, vidage de la file,
//! remplissage, bouclage, lecture. Les remplacements sont sérialisés par un
//! mutex interne ; les requêtes d'état ne le prennent pas et peuvent donc
//! observer un moteur en cours de reconstruction (lecture arrêtée).

use crate::backend::MediaBackend;
use crate::error::Result;
use crate::playlist::Playlist;
use kioskconfig::VideoEntry;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Fenêtre d'attente par défaut avant de vérifier que la lecture a démarré
pub const DEFAULT_START_GRACE: Duration = Duration::from_millis(300);

/// État du moteur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Aucune entrée à lire
    Empty,
    /// File remplie, lecture non démarrée (ou échec de démarrage)
    Loaded,
    Playing,
}

/// État de lecture exposé aux clients
///
/// Calculé à la demande, jamais persisté.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct PlaybackState {
    #[serde(rename = "playing")]
    pub is_playing: bool,
    /// Position dans la vidéo courante, en secondes entières
    #[serde(rename = "current_time")]
    pub elapsed_seconds: u64,
    pub current_video: Option<VideoEntry>,
}

impl PlaybackState {
    pub fn idle() -> Self {
        Self {
            is_playing: false,
            elapsed_seconds: 0,
            current_video: None,
        }
    }
}

struct Current {
    state: EngineState,
    playlist: Arc<Playlist>,
}

pub struct PlaybackEngine {
    backend: Arc<dyn MediaBackend>,
    control: Mutex<()>,
    current: RwLock<Current>,
    grace: Duration,
}

impl PlaybackEngine {
    pub fn new(backend: Arc<dyn MediaBackend>, grace: Duration) -> Self {
        Self {
            backend,
            control: Mutex::new(()),
            current: RwLock::new(Current {
                state: EngineState::Empty,
                playlist: Arc::new(Playlist::default()),
            }),
            grace,
        }
    }

    pub fn backend(&self) -> &Arc<dyn MediaBackend> {
        &self.backend
    }

    // ========================================================================
    // Remplacement de playlist
    // ========================================================================

    /// Remplace la playlist et relance la lecture en boucle
    ///
    /// Retourne l'état atteint. Les erreurs du lecteur sont journalisées ;
    /// une playlist non vide qui ne démarre pas laisse le moteur en
    /// [`EngineState::Loaded`].
    pub async fn replace_playlist(&self, playlist: Playlist) -> EngineState {
        let _control = self.control.lock().await;
        let playlist = Arc::new(playlist);

        if let Err(e) = self.teardown().await {
            error!("Error stopping playback: {}", e);
        }

        if playlist.is_empty() {
            self.publish(EngineState::Empty, playlist).await;
            warn!("Playlist is empty, playback stays idle");
            return EngineState::Empty;
        }

        self.publish(EngineState::Loaded, playlist.clone()).await;

        if let Err(e) = self.populate(&playlist).await {
            error!("Error loading playlist into the player: {}", e);
            return EngineState::Loaded;
        }

        let state = self.start().await;
        self.current.write().await.state = state;
        state
    }

    /// Arrête la lecture si elle est en cours, puis vide la file
    async fn teardown(&self) -> Result<()> {
        match self.backend.is_playing().await {
            Ok(false) => {}
            Ok(true) => self.backend.stop().await?,
            Err(e) => {
                debug!("Cannot query player state before stop: {}", e);
                self.backend.stop().await?;
            }
        }
        self.backend.clear().await
    }

    async fn populate(&self, playlist: &Playlist) -> Result<()> {
        for entry in playlist {
            self.backend.append(Path::new(&entry.path)).await?;
        }
        self.backend.set_loop(true).await?;
        info!(count = playlist.len(), "Playlist loaded in loop mode");
        Ok(())
    }

    /// Démarre la lecture avec une seule nouvelle tentative
    async fn start(&self) -> EngineState {
        if let Err(e) = self.backend.play().await {
            warn!("Play command failed: {}", e);
        }
        if self.started_within_grace().await {
            info!("Playback started");
            return EngineState::Playing;
        }

        warn!("Playback did not start, retrying once");
        if let Err(e) = self.backend.play().await {
            warn!("Play command failed: {}", e);
        }
        if self.started_within_grace().await {
            info!("Playback started after retry");
            EngineState::Playing
        } else {
            error!("Playback failed to start");
            EngineState::Loaded
        }
    }

    async fn started_within_grace(&self) -> bool {
        tokio::time::sleep(self.grace).await;
        self.backend.is_playing().await.unwrap_or(false)
    }

    async fn publish(&self, state: EngineState, playlist: Arc<Playlist>) {
        let mut current = self.current.write().await;
        current.state = state;
        current.playlist = playlist;
    }

    /// Arrête la lecture sans toucher à la playlist
    pub async fn stop(&self) -> Result<()> {
        let _control = self.control.lock().await;
        self.backend.stop().await?;
        let mut current = self.current.write().await;
        if current.state == EngineState::Playing {
            current.state = EngineState::Loaded;
        }
        Ok(())
    }

    // ========================================================================
    // Requêtes
    // ========================================================================

    /// État courant
    ///
    /// Hors playlist vide, l'état est relu auprès du lecteur : un lecteur
    /// arrêté de lui-même donne [`EngineState::Loaded`].
    pub async fn state(&self) -> EngineState {
        let cached = self.current.read().await.state;
        if cached == EngineState::Empty {
            return EngineState::Empty;
        }
        if self.is_playing().await {
            EngineState::Playing
        } else {
            EngineState::Loaded
        }
    }

    /// Playlist active
    pub async fn playlist(&self) -> Arc<Playlist> {
        self.current.read().await.playlist.clone()
    }

    /// Un échec d'interrogation du lecteur vaut « pas en lecture »
    pub async fn is_playing(&self) -> bool {
        match self.backend.is_playing().await {
            Ok(playing) => playing,
            Err(e) => {
                debug!("Cannot query player state: {}", e);
                false
            }
        }
    }

    /// Position tronquée à la seconde
    pub async fn elapsed_seconds(&self) -> u64 {
        match self.backend.elapsed_ms().await {
            Ok(ms) => ms.unwrap_or(0) / 1000,
            Err(e) => {
                debug!("Cannot query playback position: {}", e);
                0
            }
        }
    }

    /// Entrée de la playlist correspondant à la ressource en cours
    pub async fn current_entry(&self) -> Option<VideoEntry> {
        let resource = match self.backend.current_resource().await {
            Ok(Some(resource)) => resource,
            Ok(None) => return None,
            Err(e) => {
                debug!("Cannot query current resource: {}", e);
                return None;
            }
        };
        let path = normalize_resource(&resource);
        self.playlist().await.find_by_path(&path).cloned()
    }

    pub async fn status(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing().await,
            elapsed_seconds: self.elapsed_seconds().await,
            current_video: self.current_entry().await,
        }
    }

    /// Demande au lecteur d'écrire l'image courante dans `target`
    pub async fn capture_frame(&self, target: &Path) -> Result<()> {
        self.backend.take_snapshot(target).await
    }
}

/// Ramène un identifiant de ressource à un chemin de fichier
///
/// `file:///videos/my%20clip.mp4` devient `/videos/my clip.mp4` ; un chemin
/// simple est retourné tel quel.
pub fn normalize_resource(resource: &str) -> String {
    match resource.strip_prefix("file://") {
        Some(rest) => urlencoding::decode(rest)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| rest.to_string()),
        None => resource.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_resource() {
        assert_eq!(
            normalize_resource("file:///videos/my%20clip.mp4"),
            "/videos/my clip.mp4"
        );
        assert_eq!(normalize_resource("/videos/clip.mp4"), "/videos/clip.mp4");
        assert_eq!(normalize_resource("/videos/50%.mp4"), "/videos/50%.mp4");
    }

    #[test]
    fn test_playback_state_wire_names() {
        let json = serde_json::to_value(PlaybackState::idle()).unwrap();
        assert_eq!(json["playing"], false);
        assert_eq!(json["current_time"], 0);
        assert!(json["current_video"].is_null());
    }
}
