//! Pilotage de mpv par son socket IPC JSON
//!
//! mpv est lancé en mode `--idle` plein écran et reçoit une commande JSON par
//! ligne. Chaque requête porte un `request_id` ; les lignes d'événements
//! spontanés (`{"event": ...}`) sont ignorées.

use super::MediaBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const QUIT_TIMEOUT: Duration = Duration::from_secs(2);

struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

/// Lecteur mpv piloté via `--input-ipc-server`
pub struct MpvBackend {
    socket_path: PathBuf,
    child: Mutex<Option<Child>>,
    connection: Mutex<Connection>,
    next_request_id: AtomicU64,
}

impl MpvBackend {
    /// Lance mpv et se connecte à son socket IPC
    pub async fn spawn(binary: &str, socket_path: impl Into<PathBuf>) -> Result<Self> {
        let socket_path = socket_path.into();
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let child = Command::new(binary)
            .args([
                "--idle=yes",
                "--fullscreen",
                "--no-osc",
                "--osd-level=0",
                "--no-terminal",
                "--sub-auto=exact",
                "--keep-open=no",
            ])
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::backend(format!("cannot start {}: {}", binary, e)))?;

        info!(binary, socket=%socket_path.display(), "mpv started");

        let stream = Self::connect(&socket_path).await?;
        let (read_half, writer) = stream.into_split();

        Ok(Self {
            socket_path,
            child: Mutex::new(Some(child)),
            connection: Mutex::new(Connection {
                lines: BufReader::new(read_half).lines(),
                writer,
            }),
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Lance mpv avec le binaire configuré, socket dans le répertoire de configuration
    pub async fn from_config(config: &kioskconfig::Config) -> Result<Self> {
        let binary = config.get_mpv_binary().map_err(Error::config)?;
        let socket_path = config.directory().join("mpv.sock");
        Self::spawn(&binary, socket_path).await
    }

    async fn connect(socket_path: &Path) -> Result<UnixStream> {
        let mut last_error = None;
        for _ in 0..CONNECT_ATTEMPTS {
            match UnixStream::connect(socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    last_error = Some(e);
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
        Err(Error::backend(format!(
            "mpv IPC socket {} not available: {}",
            socket_path.display(),
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Envoie une commande et attend la réponse portant le même `request_id`
    async fn command(&self, args: Value) -> Result<Value> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let mut line = json!({ "command": &args, "request_id": request_id }).to_string();
        line.push('\n');

        let mut connection = self.connection.lock().await;
        connection
            .writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::backend(format!("mpv IPC write failed: {}", e)))?;

        let reply = tokio::time::timeout(REPLY_TIMEOUT, async {
            loop {
                let Some(raw) = connection.lines.next_line().await? else {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "mpv closed the IPC socket",
                    ));
                };
                let Ok(message) = serde_json::from_str::<Value>(&raw) else {
                    continue;
                };
                if message.get("event").is_some() {
                    continue;
                }
                if message["request_id"].as_u64() == Some(request_id) {
                    return Ok(message);
                }
            }
        })
        .await
        .map_err(|_| Error::backend(format!("mpv did not answer {}", args)))?
        .map_err(|e| Error::backend(format!("mpv IPC read failed: {}", e)))?;

        match reply["error"].as_str() {
            Some("success") => Ok(reply["data"].clone()),
            Some(other) => Err(Error::backend(format!("mpv {}: {}", args, other))),
            None => Err(Error::backend(format!("malformed mpv reply: {}", reply))),
        }
    }

    /// Lit une propriété ; `None` si mpv la déclare indisponible (rien en lecture)
    async fn get_property(&self, name: &str) -> Result<Option<Value>> {
        match self.command(json!(["get_property", name])).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(Error::Backend(message)) if message.ends_with("property unavailable") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_property(&self, name: &str, value: Value) -> Result<()> {
        self.command(json!(["set_property", name, value])).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaBackend for MpvBackend {
    async fn stop(&self) -> Result<()> {
        self.command(json!(["stop"])).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.command(json!(["playlist-clear"])).await?;
        Ok(())
    }

    async fn append(&self, path: &Path) -> Result<()> {
        self.command(json!(["loadfile", path.to_string_lossy(), "append"]))
            .await?;
        Ok(())
    }

    async fn set_loop(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "inf" } else { "no" };
        self.set_property("loop-playlist", json!(value)).await
    }

    async fn play(&self) -> Result<()> {
        self.command(json!(["playlist-play-index", 0])).await?;
        self.set_property("pause", json!(false)).await
    }

    async fn is_playing(&self) -> Result<bool> {
        let idle = self
            .get_property("idle-active")
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if idle {
            return Ok(false);
        }
        let paused = self
            .get_property("pause")
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Ok(!paused)
    }

    async fn elapsed_ms(&self) -> Result<Option<u64>> {
        Ok(self
            .get_property("time-pos")
            .await?
            .and_then(|v| v.as_f64())
            .filter(|secs| *secs >= 0.0)
            .map(|secs| (secs * 1000.0) as u64))
    }

    async fn current_resource(&self) -> Result<Option<String>> {
        Ok(self
            .get_property("path")
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    async fn take_snapshot(&self, target: &Path) -> Result<()> {
        self.command(json!(["screenshot-to-file", target.to_string_lossy(), "video"]))
            .await
            .map_err(|e| Error::Snapshot(e.to_string()))?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.command(json!(["quit"])).await {
            debug!("mpv quit command failed: {}", e);
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(QUIT_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => info!(%status, "mpv exited"),
                Ok(Err(e)) => warn!("Error waiting for mpv: {}", e),
                Err(_) => {
                    warn!("mpv did not exit in time, killing it");
                    child.kill().await?;
                }
            }
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        Ok(())
    }
}
