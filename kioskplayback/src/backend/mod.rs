//! Abstraction du lecteur vidéo sous-jacent
//!
//! Le moteur de lecture ne parle qu'au trait [`MediaBackend`]. Le lecteur
//! réel gère lui-même les transitions entre éléments et le bouclage ; cette
//! couche se limite à remplir sa file et à l'interroger.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

#[cfg(unix)]
mod mpv;

#[cfg(unix)]
pub use mpv::MpvBackend;

/// Lecteur continu piloté par le [`PlaybackEngine`](crate::PlaybackEngine)
///
/// Les appels doivent rendre la main rapidement : ce sont des commandes de
/// contrôle, pas des attentes sur la lecture elle-même.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Arrête la lecture en cours
    async fn stop(&self) -> Result<()>;

    /// Vide la file de lecture
    async fn clear(&self) -> Result<()>;

    /// Ajoute un fichier en fin de file
    async fn append(&self, path: &Path) -> Result<()>;

    /// Active ou désactive le bouclage de la file entière
    async fn set_loop(&self, enabled: bool) -> Result<()>;

    /// Démarre la lecture au début de la file
    async fn play(&self) -> Result<()>;

    async fn is_playing(&self) -> Result<bool>;

    /// Position dans l'élément courant, en millisecondes
    async fn elapsed_ms(&self) -> Result<Option<u64>>;

    /// Identifiant de la ressource en cours (chemin ou URI `file://`)
    async fn current_resource(&self) -> Result<Option<String>>;

    /// Écrit l'image courante dans `target`
    async fn take_snapshot(&self, target: &Path) -> Result<()>;

    /// Libère le lecteur (fin de processus)
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
