//! Liste des vidéos persistée dans la configuration
//!
//! La clé d'identité d'une entrée est son chemin. Les champs de métadonnées
//! (titre, description, durée) sont rafraîchis par le lecteur ; les champs
//! d'exécution (`enabled`, `order`) ne sont modifiés que par une requête de
//! mise à jour explicite.

use crate::Config;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Extensions reconnues lors du scan du répertoire vidéo
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv"];

fn default_enabled() -> bool {
    true
}

/// Une vidéo connue de la borne
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct VideoEntry {
    /// Chemin du fichier (identité de l'entrée)
    pub path: String,
    /// Nom de fichier tel que trouvé lors du scan
    #[serde(default)]
    pub name: String,
    /// Titre affiché (vide tant que les métadonnées n'ont pas été résolues)
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Durée en minutes, arrondie au supérieur
    #[serde(default, rename = "duration")]
    pub duration_minutes: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub order: i64,
}

impl VideoEntry {
    /// Entrée créée pour un fichier découvert lors d'un scan
    pub fn discovered(path: impl Into<String>, name: impl Into<String>, order: i64) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            title: String::new(),
            description: String::new(),
            duration_minutes: 0,
            enabled: true,
            order,
        }
    }

    /// Vrai tant que le titre n'a pas été renseigné
    pub fn lacks_metadata(&self) -> bool {
        self.title.trim().is_empty()
    }
}

/// Modification d'une entrée envoyée par l'interface d'administration
///
/// Les champs de métadonnées ne servent que pour une entrée inconnue : pour
/// un chemin déjà présent, les valeurs stockées sont conservées.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct VideoUpdate {
    pub path: String,
    pub enabled: bool,
    pub order: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
}

/// Vue typée de la configuration complète
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct FullConfig {
    pub display_name: String,
    pub videos: Vec<VideoEntry>,
    pub preview_enabled: bool,
    pub dark_mode: bool,
}

fn is_video_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

impl Config {
    fn videos_from(data: &Value) -> Result<Vec<VideoEntry>> {
        match Self::get_value_internal(data, &["videos"]) {
            Ok(Value::Null) | Err(_) => Ok(Vec::new()),
            Ok(value) => serde_yaml::from_value(value).context("Invalid video list in configuration"),
        }
    }

    fn store_videos(data: &mut Value, videos: &[VideoEntry]) -> Result<()> {
        let value = serde_yaml::to_value(videos)?;
        match data {
            Value::Mapping(map) => {
                map.insert(Value::String("videos".to_string()), value);
                Ok(())
            }
            _ => Err(anyhow::anyhow!("Configuration root is not a map")),
        }
    }

    /// Toutes les vidéos, dans l'ordre de scan
    pub fn get_videos(&self) -> Result<Vec<VideoEntry>> {
        let data = self.data()?;
        Self::videos_from(&data)
    }

    /// Vidéos activées, triées par `order` (tri stable : à égalité,
    /// l'ordre de scan est conservé)
    pub fn get_enabled_videos_sorted_by_order(&self) -> Result<Vec<VideoEntry>> {
        let mut enabled: Vec<VideoEntry> = self
            .get_videos()?
            .into_iter()
            .filter(|v| v.enabled)
            .collect();
        enabled.sort_by_key(|v| v.order);
        Ok(enabled)
    }

    /// Instantané typé de la configuration
    pub fn get_full_config(&self) -> Result<FullConfig> {
        Ok(FullConfig {
            display_name: self.get_display_name()?,
            videos: self.get_videos()?,
            preview_enabled: self.get_preview_enabled()?,
            dark_mode: self.get_dark_mode()?,
        })
    }

    /// Recherche une vidéo par son chemin
    pub fn get_video_by_path(&self, path: &str) -> Result<Option<VideoEntry>> {
        Ok(self.get_videos()?.into_iter().find(|v| v.path == path))
    }

    /// Remplace la liste des vidéos par celle de la requête
    ///
    /// Pour un chemin déjà connu, les métadonnées stockées sont conservées ;
    /// `enabled` et `order` viennent toujours de la requête.
    pub fn update_videos(&self, updates: Vec<VideoUpdate>) -> Result<()> {
        let mut data = self.data()?;
        let existing: HashMap<String, VideoEntry> = Self::videos_from(&data)?
            .into_iter()
            .map(|v| (v.path.clone(), v))
            .collect();

        let updated: Vec<VideoEntry> = updates
            .into_iter()
            .map(|update| match existing.get(&update.path) {
                Some(known) => VideoEntry {
                    enabled: update.enabled,
                    order: update.order,
                    ..known.clone()
                },
                None => VideoEntry {
                    name: update.name.unwrap_or_default(),
                    title: update.title.unwrap_or_default(),
                    description: update.description.unwrap_or_default(),
                    duration_minutes: update.duration.unwrap_or(0),
                    enabled: update.enabled,
                    order: update.order,
                    path: update.path,
                },
            })
            .collect();

        info!(count = updated.len(), "Updating video list");
        Self::store_videos(&mut data, &updated)?;
        self.write_locked(&data)
    }

    /// Enregistre les métadonnées résolues pour une vidéo
    ///
    /// Retourne `false` si le chemin est inconnu. Rien n'est écrit si les
    /// valeurs sont inchangées.
    pub fn set_video_metadata(
        &self,
        path: &str,
        title: &str,
        description: &str,
        duration_minutes: u32,
    ) -> Result<bool> {
        let mut data = self.data()?;
        let mut videos = Self::videos_from(&data)?;
        let Some(video) = videos.iter_mut().find(|v| v.path == path) else {
            return Ok(false);
        };

        if video.title == title
            && video.description == description
            && video.duration_minutes == duration_minutes
        {
            return Ok(true);
        }

        video.title = title.to_string();
        video.description = description.to_string();
        video.duration_minutes = duration_minutes;

        Self::store_videos(&mut data, &videos)?;
        self.write_locked(&data)?;
        Ok(true)
    }

    /// Rescanne le répertoire vidéo et fusionne avec la liste existante
    ///
    /// - les chemins connus gardent toutes leurs valeurs ;
    /// - les nouveaux fichiers sont ajoutés, activés, avec `order` = position de scan ;
    /// - les fichiers disparus sont retirés.
    ///
    /// La lecture-modification-écriture se fait sous un seul verrou.
    pub fn rescan_videos(&self) -> Result<usize> {
        let library = self.get_library_dir()?;
        let mut names: Vec<String> = fs::read_dir(&library)
            .with_context(|| format!("Cannot read video directory {}", library.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_video_file(name))
            .collect();
        names.sort();

        let mut data = self.data()?;
        let existing: HashMap<String, VideoEntry> = Self::videos_from(&data)?
            .into_iter()
            .map(|v| (v.path.clone(), v))
            .collect();

        let mut available: Vec<VideoEntry> = Vec::with_capacity(names.len());
        for name in names {
            let path = library.join(&name).to_string_lossy().into_owned();
            let entry = match existing.get(&path) {
                Some(known) => {
                    let mut entry = known.clone();
                    if entry.name.is_empty() {
                        entry.name = name;
                    }
                    entry
                }
                None => {
                    debug!(file=%name, "Adding new video");
                    VideoEntry::discovered(path, name, available.len() as i64)
                }
            };
            available.push(entry);
        }

        info!(
            directory=%library.display(),
            count = available.len(),
            "Video directory scanned"
        );
        Self::store_videos(&mut data, &available)?;
        self.write_locked(&data)?;
        Ok(available.len())
    }
}
