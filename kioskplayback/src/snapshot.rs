//! Échantillonnage de l'image courante pour l'aperçu distant
//!
//! Une seule image est conservée, à un chemin fixe, écrasée à chaque
//! capture. L'écriture (échantillonneur) et la lecture (serveur d'aperçu)
//! passent par le même verrou : un lecteur ne voit jamais une image à moitié
//! écrite.

use crate::engine::PlaybackEngine;
use crate::error::Result;
use crate::task::BackgroundTask;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Intervalle d'échantillonnage par défaut
pub const DEFAULT_PREVIEW_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// SnapshotFile
// ============================================================================

/// Le fichier image et le verrou qui protège ses accès
pub struct SnapshotFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capture l'image courante du moteur sous le verrou
    pub async fn capture(&self, engine: &PlaybackEngine) -> Result<()> {
        let _guard = self.lock.lock().await;
        engine.capture_frame(&self.path).await
    }

    /// Contenu complet de l'image, `None` si aucune capture n'existe
    ///
    /// ```
    /// use kioskplayback::SnapshotFile;
    ///
    /// # tokio_test::block_on(async {
    /// let file = SnapshotFile::new("/nonexistent/kiosk/current_frame.png");
    /// assert!(file.read().await.unwrap().is_none());
    /// # });
    /// ```
    pub async fn read(&self) -> Result<Option<Vec<u8>>> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Supprime l'image ; sans effet si elle n'existe pas
    pub async fn remove(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path=%self.path.display(), "Snapshot removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self) -> bool {
        let _guard = self.lock.lock().await;
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

// ============================================================================
// SnapshotSampler
// ============================================================================

/// Tâche périodique de capture, active seulement quand l'aperçu l'est
pub struct SnapshotSampler {
    engine: Arc<PlaybackEngine>,
    file: Arc<SnapshotFile>,
    interval: Duration,
    join_timeout: Duration,
    task: Mutex<Option<BackgroundTask>>,
}

impl SnapshotSampler {
    pub fn new(
        engine: Arc<PlaybackEngine>,
        file: Arc<SnapshotFile>,
        interval: Duration,
        join_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            file,
            interval,
            join_timeout,
            task: Mutex::new(None),
        }
    }

    pub fn file(&self) -> &Arc<SnapshotFile> {
        &self.file
    }

    /// Démarre l'échantillonnage
    ///
    /// Idempotent : si une tâche tourne déjà, rien n'est lancé et la
    /// fonction retourne `false`. Une image restant d'une session précédente
    /// est supprimée avant le démarrage.
    pub async fn enable(&self) -> Result<bool> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("Snapshot sampler already running");
            return Ok(false);
        }

        self.file.remove().await?;

        let engine = self.engine.clone();
        let file = self.file.clone();
        let interval = self.interval;
        *task = Some(BackgroundTask::spawn(
            "snapshot-sampler",
            move |token| sample_loop(engine, file, interval, token),
        ));
        info!(interval_ms = interval.as_millis() as u64, "Preview sampling enabled");
        Ok(true)
    }

    /// Arrête l'échantillonnage puis supprime l'image
    ///
    /// Au retour, la tâche est terminée et le fichier n'existe plus.
    pub async fn disable(&self) -> Result<()> {
        let running = self.task.lock().await.take();
        if let Some(task) = running {
            task.stop(self.join_timeout).await;
            info!("Preview sampling disabled");
        }
        self.file.remove().await
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

async fn sample_loop(
    engine: Arc<PlaybackEngine>,
    file: Arc<SnapshotFile>,
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

        if !engine.is_playing().await {
            continue;
        }
        if let Err(e) = file.capture(&engine).await {
            warn!("Error capturing snapshot: {}", e);
        }
    }
}
