//! Construction de la playlist active
//!
//! Une [`Playlist`] n'est jamais modifiée en place : chaque changement de
//! configuration en produit une nouvelle, qui remplace l'ancienne en bloc.

use crate::metadata::MetadataCache;
use kioskconfig::VideoEntry;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Projection ordonnée des vidéos activées
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Playlist {
    entries: Vec<VideoEntry>,
}

impl Playlist {
    pub fn new(entries: Vec<VideoEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[VideoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VideoEntry> {
        self.entries.iter()
    }

    /// Entrée dont le chemin est exactement `path`
    pub fn find_by_path(&self, path: &str) -> Option<&VideoEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }
}

impl<'a> IntoIterator for &'a Playlist {
    type Item = &'a VideoEntry;
    type IntoIter = std::slice::Iter<'a, VideoEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Dérive la playlist des vidéos configurées
pub struct PlaylistBuilder {
    cache: Arc<MetadataCache>,
}

impl PlaylistBuilder {
    pub fn new(cache: Arc<MetadataCache>) -> Self {
        Self { cache }
    }

    /// Filtre les vidéos activées et les trie par `order`
    ///
    /// Le tri est stable : à `order` égal, l'ordre d'entrée est conservé.
    /// Les entrées sans titre reçoivent les métadonnées du cache. La liste
    /// source n'est pas modifiée.
    pub async fn rebuild(&self, videos: &[VideoEntry]) -> Playlist {
        let mut enabled: Vec<VideoEntry> = videos.iter().filter(|v| v.enabled).cloned().collect();
        enabled.sort_by_key(|v| v.order);

        for entry in enabled.iter_mut().filter(|e| e.lacks_metadata()) {
            let metadata = self.cache.resolve(Path::new(&entry.path)).await;
            entry.title = metadata.title;
            entry.description = metadata.description;
            entry.duration_minutes = metadata.duration_minutes;
        }

        debug!(
            configured = videos.len(),
            enabled = enabled.len(),
            "Playlist rebuilt"
        );
        Playlist::new(enabled)
    }
}
