//! # Kiosk Configuration Module
//!
//! This module provides configuration management for the kiosk player, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - The persisted video list (see [`VideoEntry`])
//!
//! Unlike a process-wide singleton, a [`Config`] is loaded once at startup and
//! handed to every component that needs it (`Arc<Config>`).
//!
//! ## Usage
//!
//! ```no_run
//! use kioskconfig::Config;
//!
//! let config = Config::load_config("")?;
//!
//! // Access configuration values
//! let port = config.get_http_port();
//! let videos = config.get_enabled_videos_sorted_by_order()?;
//!
//! // Update configuration values
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tracing::info;

mod videos;

pub use videos::{FullConfig, VideoEntry, VideoUpdate, VIDEO_EXTENSIONS};

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("kiosk.yaml");

const ENV_CONFIG_DIR: &str = "KIOSK_CONFIG";
const ENV_PREFIX: &str = "KIOSK_CONFIG__";

const CONFIG_DIR_NAME: &str = ".kiosk";
const CONFIG_FILE_NAME: &str = "config.yaml";

// Default values for configuration
const DEFAULT_HTTP_PORT: u16 = 5000;
const DEFAULT_BASE_URL: &str = "localhost";
const DEFAULT_DISPLAY_NAME: &str = "Main Gallery Display";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_MPV_BINARY: &str = "mpv";
const DEFAULT_FFPROBE_BINARY: &str = "ffprobe";
const DEFAULT_START_GRACE_MS: u64 = 300;
const DEFAULT_PREVIEW_INTERVAL_MS: u64 = 1000;
const DEFAULT_SNAPSHOT_FILE: &str = "current_frame.png";
const DEFAULT_STATUS_INTERVAL_MS: u64 = 5000;
const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1000;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager for the kiosk player
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// Every mutation goes through a single lock, including the
/// read-modify-write of a directory rescan.
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> PathBuf {
        // 1. Try provided directory
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return PathBuf::from(CONFIG_DIR_NAME);
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config;
            }
        }

        // Default fallback
        PathBuf::from(CONFIG_DIR_NAME)
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        // Create if doesn't exist
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        // Verify it's a directory
        if !path.is_dir() {
            return Err(anyhow!(
                "Le chemin spécifié n'est pas un répertoire: {}",
                path.display()
            ));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `KIOSK_CONFIG` environment variable
    /// 3. `.kiosk` in the current directory
    /// 4. `.kiosk` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for write permission.
    pub fn config_dir(directory: &str) -> Result<PathBuf> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(&dir_path)?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    ///
    /// A config.yaml that cannot be parsed is replaced by the defaults.
    pub fn load_config(directory: &str) -> Result<Self> {
        // Obtenir le répertoire de configuration
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir.display(), "Using config directory");

        let path = config_dir.join(CONFIG_FILE_NAME);

        // Charger la configuration par défaut
        let mut config_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        // Essayer de charger le fichier de configuration
        match fs::read(&path) {
            Ok(data) => match serde_yaml::from_slice::<Value>(&data) {
                Ok(external) => {
                    info!(config_file=%path.display(), "Loaded config file");
                    merge_yaml(&mut config_value, &external);
                }
                Err(e) => {
                    tracing::error!(
                        config_file=%path.display(),
                        "Invalid config file format, using default configuration: {}",
                        e
                    );
                }
            },
            Err(_) => {
                info!(config_file=%path.display(), "Config file not found, using default embedded config");
            }
        }

        let mut config_value = Self::lower_keys_value(config_value);

        // Appliquer les overrides depuis les variables d'environnement
        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        // Sauvegarder la configuration
        config.save()?;
        Ok(config)
    }

    /// Répertoire contenant config.yaml
    pub fn directory(&self) -> &Path {
        &self.config_dir
    }

    /// Chemin du fichier config.yaml
    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn data(&self) -> Result<MutexGuard<'_, Value>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("Configuration lock poisoned"))
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let data = self.data()?;
        self.write_locked(&data)
    }

    /// Écrit l'arbre de configuration alors que le verrou est déjà tenu
    pub(crate) fn write_locked(&self, data: &Value) -> Result<()> {
        let yaml = serde_yaml::to_string(data)?;
        fs::write(&self.path, yaml)?;
        info!(config_file=%self.path.display(), "Configuration saved successfully");
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// # Arguments
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "http_port"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data()?;
        Self::set_value_internal(&mut data, path, value)?;
        self.write_locked(&data)
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = Value::String(path[0].to_lowercase());
            if path.len() == 1 {
                map.insert(key, value);
            } else {
                let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data()?;
        Self::get_value_internal(&data, path)
    }

    pub(crate) fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                if let Some(next) = map.get(&Value::String(key.to_lowercase())) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                if let Err(e) = Self::set_value_internal(config, &key_path, yaml_value) {
                    tracing::warn!(env_var=%key, "Ignoring environment override: {}", e);
                }
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    let new_key = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    new_map.insert(new_key, Self::lower_keys_value(v));
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Résout un chemin relatif ou absolu par rapport au répertoire de configuration
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.config_dir.join(candidate)
        }
    }

    /// Récupère un répertoire géré par la configuration
    ///
    /// Le répertoire peut être absolu ou relatif au répertoire de
    /// configuration. Il est créé s'il n'existe pas.
    ///
    /// # Arguments
    ///
    /// * `path` - Chemin dans l'arbre de configuration (ex: `&["library", "directory"]`)
    /// * `default` - Nom de répertoire par défaut si non configuré
    pub fn get_managed_dir(&self, path: &[&str], default: &str) -> Result<PathBuf> {
        let dir_path = match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => {
                self.set_value(path, Value::String(default.to_string()))?;
                default.to_string()
            }
        };

        let absolute_path = self.resolve_path(&dir_path);
        if !absolute_path.exists() {
            fs::create_dir_all(&absolute_path)?;
            info!(directory=%absolute_path.display(), "Created managed directory");
        }
        Ok(absolute_path)
    }

    /// Répertoire contenant les fichiers vidéo de la borne
    pub fn get_library_dir(&self) -> Result<PathBuf> {
        self.get_managed_dir(&["library", "directory"], "videos")
    }

    /// Gets the base URL from configuration
    ///
    /// Falls back to `localhost` when not configured.
    pub fn get_base_url(&self) -> String {
        match self.get_value(&["host", "base_url"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Gets the HTTP port from configuration
    ///
    /// Returns the configured HTTP port, or the default port (5000) if not configured or invalid.
    pub fn get_http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => match n.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(port) => port,
                None => {
                    tracing::warn!("Invalid HTTP port {}, using default {}", n, DEFAULT_HTTP_PORT);
                    DEFAULT_HTTP_PORT
                }
            },
            Ok(Value::String(s)) => s.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("Invalid HTTP port '{}', using default {}", s, DEFAULT_HTTP_PORT);
                DEFAULT_HTTP_PORT
            }),
            _ => {
                tracing::warn!("HTTP port not configured, using default {}", DEFAULT_HTTP_PORT);
                DEFAULT_HTTP_PORT
            }
        }
    }

    /// Sets the HTTP port in configuration
    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    impl_string_config!(
        get_display_name,
        set_display_name,
        &["display_name"],
        DEFAULT_DISPLAY_NAME
    );

    impl_bool_config!(
        get_preview_enabled,
        set_preview_enabled,
        &["preview_enabled"],
        false
    );

    impl_bool_config!(get_dark_mode, set_dark_mode, &["dark_mode"], true);

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_string_config!(
        get_mpv_binary,
        set_mpv_binary,
        &["playback", "mpv_binary"],
        DEFAULT_MPV_BINARY
    );

    impl_string_config!(
        get_ffprobe_binary,
        set_ffprobe_binary,
        &["playback", "ffprobe_binary"],
        DEFAULT_FFPROBE_BINARY
    );

    impl_u64_config!(
        get_start_grace_ms,
        set_start_grace_ms,
        &["playback", "start_grace_ms"],
        DEFAULT_START_GRACE_MS
    );

    impl_u64_config!(
        get_preview_interval_ms,
        set_preview_interval_ms,
        &["preview", "interval_ms"],
        DEFAULT_PREVIEW_INTERVAL_MS
    );

    impl_string_config!(
        get_snapshot_file,
        set_snapshot_file,
        &["preview", "snapshot_file"],
        DEFAULT_SNAPSHOT_FILE
    );

    impl_u64_config!(
        get_status_interval_ms,
        set_status_interval_ms,
        &["status", "interval_ms"],
        DEFAULT_STATUS_INTERVAL_MS
    );

    impl_u64_config!(
        get_join_timeout_ms,
        set_join_timeout_ms,
        &["shutdown", "join_timeout_ms"],
        DEFAULT_JOIN_TIMEOUT_MS
    );

    /// Bascule l'aperçu et retourne le nouvel état
    pub fn toggle_preview(&self) -> Result<bool> {
        self.toggle_bool(&["preview_enabled"], false)
    }

    /// Bascule le mode sombre de l'interface et retourne le nouvel état
    pub fn toggle_dark_mode(&self) -> Result<bool> {
        self.toggle_bool(&["dark_mode"], true)
    }

    fn toggle_bool(&self, path: &[&str], default: bool) -> Result<bool> {
        let mut data = self.data()?;
        let current = match Self::get_value_internal(&data, path) {
            Ok(Value::Bool(b)) => b,
            _ => default,
        };
        Self::set_value_internal(&mut data, path, Value::Bool(!current))?;
        self.write_locked(&data)?;
        Ok(!current)
    }
}

/// Merges external YAML configuration into default configuration
///
/// This function recursively merges two YAML value trees:
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(), // pour les scalaires ou séquences, on remplace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_yaml_keeps_defaults() {
        let mut default: Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n  d: 3\n").unwrap();
        let external: Value = serde_yaml::from_str("b:\n  c: 20\n").unwrap();
        merge_yaml(&mut default, &external);

        assert_eq!(
            Config::get_value_internal(&default, &["b", "c"]).unwrap(),
            Value::Number(20.into())
        );
        assert_eq!(
            Config::get_value_internal(&default, &["b", "d"]).unwrap(),
            Value::Number(3.into())
        );
        assert_eq!(
            Config::get_value_internal(&default, &["a"]).unwrap(),
            Value::Number(1.into())
        );
    }

    #[test]
    fn test_sequences_are_replaced() {
        let mut default: Value = serde_yaml::from_str("videos: [1, 2, 3]").unwrap();
        let external: Value = serde_yaml::from_str("videos: [4]").unwrap();
        merge_yaml(&mut default, &external);

        let videos = Config::get_value_internal(&default, &["videos"]).unwrap();
        assert_eq!(videos.as_sequence().map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_lower_keys() {
        let value: Value = serde_yaml::from_str("Host:\n  HTTP_Port: 8080\n").unwrap();
        let lowered = Config::lower_keys_value(value);
        assert!(Config::get_value_internal(&lowered, &["host", "http_port"]).is_ok());
    }
}
