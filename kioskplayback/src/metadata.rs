//! Cache de métadonnées des fichiers vidéo
//!
//! Chaque chemin est analysé au plus une fois par processus. Une analyse qui
//! échoue produit des métadonnées dégradées (titre tiré du nom de fichier,
//! description vide, durée nulle) qui sont elles aussi mises en cache : un
//! fichier corrompu n'est jamais ré-analysé.
//!
//! L'analyse elle-même est déléguée à un [`MetadataProbe`] ; en production,
//! [`FfprobeProbe`] interroge `ffprobe`.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, error};

const MS_PER_MINUTE: u64 = 60_000;

// ============================================================================
// Metadata
// ============================================================================

/// Métadonnées d'affichage d'une vidéo
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    /// Durée en minutes, arrondie au supérieur
    pub duration_minutes: u32,
}

impl Metadata {
    /// Construit les métadonnées à partir du résultat brut d'une analyse
    pub fn from_probe(path: &Path, probed: ProbedMetadata) -> Self {
        let title = probed
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_filename(path));

        Self {
            title,
            description: probed.description.unwrap_or_default(),
            duration_minutes: probed.duration_ms.map(duration_minutes).unwrap_or(0),
        }
    }

    /// Valeurs de repli après un échec d'analyse
    pub fn degraded(path: &Path) -> Self {
        Self {
            title: title_from_filename(path),
            description: String::new(),
            duration_minutes: 0,
        }
    }
}

/// Résultat brut d'une analyse de fichier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbedMetadata {
    /// Titre embarqué dans le conteneur, s'il existe
    pub title: Option<String>,
    pub description: Option<String>,
    /// Durée en millisecondes (négative ou absente si inconnue)
    pub duration_ms: Option<i64>,
}

/// Arrondit une durée en millisecondes à la minute supérieure
///
/// Une durée inconnue (négative) vaut zéro.
pub fn duration_minutes(duration_ms: i64) -> u32 {
    if duration_ms <= 0 {
        return 0;
    }
    let minutes = (duration_ms as u64).div_ceil(MS_PER_MINUTE);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Titre dérivé du nom de fichier
///
/// `sample_video-clip.mp4` devient `Sample Video Clip` : extension retirée,
/// `_` et `-` remplacés par des espaces, puis mise en casse de titre.
pub fn title_from_filename(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    title_case(&stem.replace(['_', '-'], " "))
}

/// Une lettre qui suit une lettre passe en minuscule, toute autre lettre en majuscule.
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut previous_is_letter = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

// ============================================================================
// MetadataProbe
// ============================================================================

/// Analyse d'un fichier média
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbedMetadata>;
}

/// Analyse via `ffprobe -print_format json -show_format`
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &kioskconfig::Config) -> Result<Self> {
        let binary = config.get_ffprobe_binary().map_err(Error::config)?;
        Ok(Self::new(binary))
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MetadataProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> Result<ProbedMetadata> {
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::probe(path.display().to_string(), e.to_string()))?;

        if !output.status.success() {
            return Err(Error::probe(
                path.display().to_string(),
                format!("ffprobe exited with {}", output.status),
            ));
        }

        parse_ffprobe_output(&output.stdout)
            .map_err(|e| Error::probe(path.display().to_string(), e.to_string()))
    }
}

/// Décode la sortie JSON de ffprobe (section `format`)
pub fn parse_ffprobe_output(stdout: &[u8]) -> serde_json::Result<ProbedMetadata> {
    let json: serde_json::Value = serde_json::from_slice(stdout)?;
    let format = &json["format"];

    let duration_ms = format["duration"]
        .as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .or_else(|| format["duration"].as_f64())
        .map(|secs| (secs * 1000.0).round() as i64);

    Ok(ProbedMetadata {
        title: tag(&format["tags"], "title"),
        description: tag(&format["tags"], "description"),
        duration_ms,
    })
}

fn tag(tags: &serde_json::Value, key: &str) -> Option<String> {
    tags.as_object()?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .and_then(|(_, v)| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// MetadataCache
// ============================================================================

/// Cache partagé chemin → métadonnées, jamais invalidé
///
/// Deux résolutions concurrentes d'un même chemin absent peuvent analyser le
/// fichier deux fois ; seule la première valeur insérée est conservée.
pub struct MetadataCache {
    probe: Arc<dyn MetadataProbe>,
    entries: RwLock<HashMap<PathBuf, Metadata>>,
}

impl MetadataCache {
    pub fn new(probe: Arc<dyn MetadataProbe>) -> Self {
        Self {
            probe,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Résout les métadonnées d'un chemin, en les analysant au premier appel
    pub async fn resolve(&self, path: &Path) -> Metadata {
        {
            let entries = self.entries.read().await;
            if let Some(hit) = entries.get(path) {
                return hit.clone();
            }
        }

        let metadata = match self.probe.probe(path).await {
            Ok(probed) => {
                debug!(path=%path.display(), "Metadata extracted");
                Metadata::from_probe(path, probed)
            }
            Err(e) => {
                error!(path=%path.display(), "Error extracting metadata: {}", e);
                Metadata::degraded(path)
            }
        };

        let mut entries = self.entries.write().await;
        entries.entry(path.to_path_buf()).or_insert(metadata).clone()
    }

    /// Lecture sans analyse
    pub async fn get(&self, path: &Path) -> Option<Metadata> {
        self.entries.read().await.get(path).cloned()
    }

    pub async fn contains(&self, path: &Path) -> bool {
        self.entries.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
