//! Diffusion de l'état aux abonnés
//!
//! Trois évènements circulent :
//! - `metadata_update` : liste complète des vidéos + nom d'affichage ;
//! - `playlist_update` : la playlist active ;
//! - `status_update` : l'état de lecture, poussé périodiquement.
//!
//! À la connexion, un abonné reçoit d'abord `metadata_update` puis
//! `playlist_update`, avant tout évènement du flux partagé. La tâche de
//! statut est lancée à la première connexion et tourne jusqu'à l'arrêt du
//! processus.

use crate::engine::{PlaybackEngine, PlaybackState};
use crate::error::{Error, Result};
use crate::playlist::Playlist;
use crate::task::BackgroundTask;
use kioskconfig::{Config, VideoEntry};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Intervalle par défaut des `status_update`
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(5);

const CHANNEL_CAPACITY: usize = 64;

/// Évènement poussé aux abonnés
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum KioskEvent {
    MetadataUpdate {
        videos: Vec<VideoEntry>,
        display_name: String,
    },
    PlaylistUpdate {
        playlist: Playlist,
    },
    StatusUpdate(PlaybackState),
}

impl KioskEvent {
    /// Nom de l'évènement côté client
    pub fn name(&self) -> &'static str {
        match self {
            KioskEvent::MetadataUpdate { .. } => "metadata_update",
            KioskEvent::PlaylistUpdate { .. } => "playlist_update",
            KioskEvent::StatusUpdate(_) => "status_update",
        }
    }

    /// Charge utile JSON, sans l'enveloppe `{event, data}`
    pub fn data(&self) -> serde_json::Result<serde_json::Value> {
        let mut envelope = serde_json::to_value(self)?;
        Ok(envelope["data"].take())
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Flux d'évènements d'un abonné
///
/// Les évènements de connexion sont livrés en premier, puis le flux partagé.
/// Un abonné trop lent perd des évènements au lieu d'être déconnecté.
pub struct Subscription {
    pending: VecDeque<KioskEvent>,
    receiver: broadcast::Receiver<KioskEvent>,
}

impl Subscription {
    /// Prochain évènement ; `None` quand le diffuseur a disparu
    pub async fn recv(&mut self) -> Option<KioskEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagging, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Version non bloquante de [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<KioskEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagging, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

// ============================================================================
// StatusBroadcaster
// ============================================================================

pub struct StatusBroadcaster {
    tx: broadcast::Sender<KioskEvent>,
    config: Arc<Config>,
    engine: Arc<PlaybackEngine>,
    interval: Duration,
    status_task: Mutex<Option<BackgroundTask>>,
}

impl StatusBroadcaster {
    pub fn new(config: Arc<Config>, engine: Arc<PlaybackEngine>, interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            config,
            engine,
            interval,
            status_task: Mutex::new(None),
        }
    }

    /// Enregistre un nouvel abonné
    ///
    /// L'abonnement au flux partagé précède la préparation des évènements de
    /// connexion : rien n'est perdu entre les deux.
    pub async fn on_subscriber_connect(&self) -> Result<Subscription> {
        let receiver = self.tx.subscribe();

        let mut pending = VecDeque::with_capacity(2);
        pending.push_back(self.metadata_event()?);
        pending.push_back(self.playlist_event().await);

        self.ensure_status_task().await;
        debug!(subscribers = self.tx.receiver_count(), "Subscriber connected");

        Ok(Subscription { pending, receiver })
    }

    /// Pousse la playlist active à tous les abonnés
    pub async fn notify_playlist_change(&self) {
        let event = self.playlist_event().await;
        self.publish(event);
    }

    /// Pousse la liste des vidéos et le nom d'affichage à tous les abonnés
    pub fn notify_metadata_change(&self) -> Result<()> {
        let event = self.metadata_event()?;
        self.publish(event);
        Ok(())
    }

    /// Retourne le nombre d'abonnés ayant reçu l'évènement
    pub fn publish(&self, event: KioskEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("No subscriber, event dropped");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub async fn is_status_running(&self) -> bool {
        self.status_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Arrête la tâche de statut (fin de processus)
    pub async fn shutdown(&self, timeout: Duration) {
        let running = self.status_task.lock().await.take();
        if let Some(task) = running {
            task.stop(timeout).await;
        }
    }

    fn metadata_event(&self) -> Result<KioskEvent> {
        Ok(KioskEvent::MetadataUpdate {
            videos: self.config.get_videos().map_err(Error::config)?,
            display_name: self.config.get_display_name().map_err(Error::config)?,
        })
    }

    async fn playlist_event(&self) -> KioskEvent {
        KioskEvent::PlaylistUpdate {
            playlist: self.engine.playlist().await.as_ref().clone(),
        }
    }

    async fn ensure_status_task(&self) {
        let mut task = self.status_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        if task.is_some() {
            warn!("Status task ended unexpectedly, restarting it");
        }

        let tx = self.tx.clone();
        let engine = self.engine.clone();
        let interval = self.interval;
        *task = Some(BackgroundTask::spawn("status-broadcaster", move |token| {
            status_loop(tx, engine, interval, token)
        }));
        info!(
            interval_ms = interval.as_millis() as u64,
            "Status broadcasting started"
        );
    }
}

async fn status_loop(
    tx: broadcast::Sender<KioskEvent>,
    engine: Arc<PlaybackEngine>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let status = engine.status().await;
        // Aucun abonné n'est pas une erreur
        let _ = tx.send(KioskEvent::StatusUpdate(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MediaBackend;
    use async_trait::async_trait;
    use std::path::Path;

    /// Lecteur inactif
    struct IdleBackend;

    #[async_trait]
    impl MediaBackend for IdleBackend {
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        async fn append(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
        async fn set_loop(&self, _enabled: bool) -> Result<()> {
            Ok(())
        }
        async fn play(&self) -> Result<()> {
            Ok(())
        }
        async fn is_playing(&self) -> Result<bool> {
            Ok(false)
        }
        async fn elapsed_ms(&self) -> Result<Option<u64>> {
            Ok(None)
        }
        async fn current_resource(&self) -> Result<Option<String>> {
            Ok(None)
        }
        async fn take_snapshot(&self, _target: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dead_status_task_is_restarted_on_connect() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::load_config(dir.path().to_str().unwrap()).unwrap());
        let engine = Arc::new(PlaybackEngine::new(
            Arc::new(IdleBackend),
            Duration::from_millis(1),
        ));
        let broadcaster = StatusBroadcaster::new(config, engine, Duration::from_secs(60));

        let dead = BackgroundTask::spawn("status-broadcaster", |_token| async {});
        while !dead.is_finished() {
            tokio::task::yield_now().await;
        }
        *broadcaster.status_task.lock().await = Some(dead);
        assert!(!broadcaster.is_status_running().await);

        let _subscription = broadcaster.on_subscriber_connect().await.unwrap();

        assert!(broadcaster.is_status_running().await);
        broadcaster.shutdown(Duration::from_millis(500)).await;
    }

    #[test]
    fn test_event_names_and_payloads() {
        let event = KioskEvent::MetadataUpdate {
            videos: Vec::new(),
            display_name: "Hall".to_string(),
        };
        assert_eq!(event.name(), "metadata_update");
        let data = event.data().unwrap();
        assert_eq!(data["display_name"], "Hall");
        assert!(data["videos"].as_array().unwrap().is_empty());

        let event = KioskEvent::StatusUpdate(PlaybackState::idle());
        assert_eq!(event.name(), "status_update");
        assert_eq!(event.data().unwrap()["playing"], false);

        let event = KioskEvent::PlaylistUpdate {
            playlist: Playlist::default(),
        };
        assert_eq!(event.name(), "playlist_update");
        assert!(event.data().unwrap()["playlist"].is_array());
    }
}
