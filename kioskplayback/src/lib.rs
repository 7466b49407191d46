//! # kioskplayback - Orchestration de la lecture d'une borne vidéo en boucle
//!
//! Cette crate transforme la liste ordonnée des vidéos activées en lecture
//! continue, échantillonne une image d'aperçu et pousse l'état de lecture
//! aux abonnés.
//!
//! # Architecture
//!
//! - **MetadataCache** : chemin → titre, description, durée ; une analyse par chemin
//! - **PlaylistBuilder** : vidéos activées triées par `order`
//! - **PlaybackEngine** : possède le lecteur ; arrêt → vidage → remplissage → lecture en boucle
//! - **SnapshotSampler** : capture périodique de l'image courante tant que l'aperçu est actif
//! - **StatusBroadcaster** : évènements de connexion + `status_update` périodique
//! - **VideoPlayer** : façade qui assemble le tout
//!
//! Le lecteur réel est abstrait par [`MediaBackend`] ([`MpvBackend`] en
//! production) et l'analyse des fichiers par [`MetadataProbe`]
//! ([`FfprobeProbe`]).
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use kioskconfig::Config;
//! use kioskplayback::{FfprobeProbe, MpvBackend, VideoPlayer};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> kioskplayback::Result<()> {
//! let config = Arc::new(Config::load_config("").map_err(kioskplayback::Error::config)?);
//! let backend = Arc::new(MpvBackend::from_config(&config).await?);
//! let probe = Arc::new(FfprobeProbe::from_config(&config)?);
//!
//! let player = VideoPlayer::new(config, backend, probe)?;
//! player.start().await?;
//!
//! let status = player.get_playback_status().await;
//! println!("playing: {}", status.is_playing);
//!
//! player.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod backend;
mod broadcaster;
mod config_ext;
mod engine;
mod error;
mod metadata;
mod player;
mod playlist;
mod snapshot;
mod task;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod openapi;
#[cfg(feature = "server")]
mod server_ext;
#[cfg(feature = "server")]
pub mod sse;

// Réexports publics
#[cfg(unix)]
pub use backend::MpvBackend;
pub use backend::MediaBackend;
pub use broadcaster::{KioskEvent, StatusBroadcaster, Subscription, DEFAULT_STATUS_INTERVAL};
pub use config_ext::{PlaybackConfigExt, PlaybackSettings};
pub use engine::{
    normalize_resource, EngineState, PlaybackEngine, PlaybackState, DEFAULT_START_GRACE,
};
pub use error::{Error, Result};
pub use metadata::{
    duration_minutes, parse_ffprobe_output, title_from_filename, FfprobeProbe, Metadata,
    MetadataCache, MetadataProbe, ProbedMetadata,
};
pub use player::VideoPlayer;
pub use playlist::{Playlist, PlaylistBuilder};
pub use snapshot::{SnapshotFile, SnapshotSampler, DEFAULT_PREVIEW_INTERVAL};

#[cfg(feature = "server")]
pub use server_ext::KioskPlayerExt;
