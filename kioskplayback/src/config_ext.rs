//! Extension de kioskconfig pour la lecture

use crate::broadcaster::DEFAULT_STATUS_INTERVAL;
use crate::error::{Error, Result};
use crate::snapshot::DEFAULT_PREVIEW_INTERVAL;
use std::path::PathBuf;
use std::time::Duration;

/// Réglages de l'orchestration, lus une fois au démarrage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub start_grace: Duration,
    pub preview_interval: Duration,
    pub status_interval: Duration,
    pub join_timeout: Duration,
    pub snapshot_path: PathBuf,
}

/// Trait d'extension pour kioskconfig::Config
pub trait PlaybackConfigExt {
    /// Chemin de l'image d'aperçu, relatif au répertoire de configuration
    /// s'il n'est pas absolu
    fn snapshot_path(&self) -> Result<PathBuf>;

    fn playback_settings(&self) -> Result<PlaybackSettings>;
}

impl PlaybackConfigExt for kioskconfig::Config {
    fn snapshot_path(&self) -> Result<PathBuf> {
        let file = self.get_snapshot_file().map_err(Error::config)?;
        Ok(self.resolve_path(&file))
    }

    fn playback_settings(&self) -> Result<PlaybackSettings> {
        let millis = |value: anyhow::Result<u64>| value.map(Duration::from_millis).map_err(Error::config);
        // Un intervalle nul ferait paniquer tokio::time::interval
        let period = |value: anyhow::Result<u64>, default: Duration| {
            millis(value).map(|d| if d.is_zero() { default } else { d })
        };

        Ok(PlaybackSettings {
            start_grace: millis(self.get_start_grace_ms())?,
            preview_interval: period(self.get_preview_interval_ms(), DEFAULT_PREVIEW_INTERVAL)?,
            status_interval: period(self.get_status_interval_ms(), DEFAULT_STATUS_INTERVAL)?,
            join_timeout: millis(self.get_join_timeout_ms())?,
            snapshot_path: self.snapshot_path()?,
        })
    }
}
