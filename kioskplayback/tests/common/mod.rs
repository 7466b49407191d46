//! Doublures partagées par les tests d'intégration
#![allow(dead_code)]

use async_trait::async_trait;
use kioskconfig::Config;
use kioskplayback::{Error, MediaBackend, MetadataProbe, ProbedMetadata, Result, VideoPlayer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

/// Contenu écrit par [`FakeBackend::take_snapshot`]
pub const FRAME: &[u8] = b"PNG-FRAME-0123456789-abcdefghijklmnopqrstuvwxyz";

// ============================================================================
// FakeBackend
// ============================================================================

#[derive(Default)]
struct FakeState {
    queue: Vec<PathBuf>,
    playing: bool,
    looping: bool,
    current: Option<String>,
    elapsed_ms: u64,
    play_calls: usize,
    stop_calls: usize,
    clear_calls: usize,
    snapshots: usize,
    /// 0 : ne démarre jamais ; n : démarre à la n-ième tentative
    starts_on_attempt: usize,
    attempts: usize,
    fail_queries: bool,
    fail_snapshots: bool,
    file_uris: bool,
    shut_down: bool,
}

/// Lecteur en mémoire
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    /// Lecteur qui démarre à la première commande `play`
    pub fn new() -> Arc<Self> {
        Self::starting_on_attempt(1)
    }

    pub fn never_starts() -> Arc<Self> {
        Self::starting_on_attempt(0)
    }

    pub fn starting_on_attempt(attempt: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                starts_on_attempt: attempt,
                ..FakeState::default()
            }),
        })
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    pub fn clear_calls(&self) -> usize {
        self.state.lock().unwrap().clear_calls
    }

    pub fn queue(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().queue.clone()
    }

    pub fn looping(&self) -> bool {
        self.state.lock().unwrap().looping
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.lock().unwrap().snapshots
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().unwrap().shut_down
    }

    pub fn set_playing(&self, playing: bool) {
        self.state.lock().unwrap().playing = playing;
    }

    pub fn set_current(&self, resource: Option<&str>) {
        self.state.lock().unwrap().current = resource.map(str::to_string);
    }

    pub fn set_elapsed_ms(&self, ms: u64) {
        self.state.lock().unwrap().elapsed_ms = ms;
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_queries = fail;
    }

    pub fn set_fail_snapshots(&self, fail: bool) {
        self.state.lock().unwrap().fail_snapshots = fail;
    }

    /// La ressource courante est annoncée comme URI `file://`
    pub fn use_file_uris(&self) {
        self.state.lock().unwrap().file_uris = true;
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn stop(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        state.playing = false;
        state.current = None;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.clear_calls += 1;
        state.queue.clear();
        state.attempts = 0;
        Ok(())
    }

    async fn append(&self, path: &Path) -> Result<()> {
        self.state.lock().unwrap().queue.push(path.to_path_buf());
        Ok(())
    }

    async fn set_loop(&self, enabled: bool) -> Result<()> {
        self.state.lock().unwrap().looping = enabled;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.play_calls += 1;
        state.attempts += 1;
        if state.starts_on_attempt != 0
            && state.attempts >= state.starts_on_attempt
            && !state.queue.is_empty()
        {
            state.playing = true;
            let first = state.queue[0].to_string_lossy().into_owned();
            state.current = Some(if state.file_uris {
                format!("file://{}", first.replace(' ', "%20"))
            } else {
                first
            });
        }
        Ok(())
    }

    async fn is_playing(&self) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(Error::backend("player unreachable"));
        }
        Ok(state.playing)
    }

    async fn elapsed_ms(&self) -> Result<Option<u64>> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(Error::backend("player unreachable"));
        }
        Ok(state.playing.then_some(state.elapsed_ms))
    }

    async fn current_resource(&self) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_queries {
            return Err(Error::backend("player unreachable"));
        }
        Ok(state.current.clone())
    }

    /// Écrit l'image en deux morceaux, avec une pause entre les deux
    async fn take_snapshot(&self, target: &Path) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.fail_snapshots {
                return Err(Error::Snapshot("no video output".to_string()));
            }
            state.snapshots += 1;
        }

        let (head, tail) = FRAME.split_at(FRAME.len() / 2);
        let mut file = tokio::fs::File::create(target).await?;
        file.write_all(head).await?;
        file.flush().await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        file.write_all(tail).await?;
        file.flush().await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.state.lock().unwrap().shut_down = true;
        Ok(())
    }
}

// ============================================================================
// StubProbe
// ============================================================================

/// Analyseur qui compte ses appels
pub struct StubProbe {
    calls: AtomicUsize,
    failing: Vec<PathBuf>,
    responses: HashMap<PathBuf, ProbedMetadata>,
    delay: Duration,
}

impl StubProbe {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: Vec::new(),
            responses: HashMap::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn failing_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.push(path.into());
        self
    }

    pub fn with_response(mut self, path: impl Into<PathBuf>, response: ProbedMetadata) -> Self {
        self.responses.insert(path.into(), response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProbe for StubProbe {
    async fn probe(&self, path: &Path) -> Result<ProbedMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.iter().any(|p| p == path) {
            return Err(Error::probe(path.display().to_string(), "corrupt container"));
        }
        Ok(self
            .responses
            .get(path)
            .cloned()
            .unwrap_or(ProbedMetadata {
                title: None,
                description: None,
                duration_ms: Some(90_000),
            }))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Configuration temporaire avec des intervalles courts
pub fn test_config() -> (TempDir, Arc<Config>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::load_config(temp_dir.path().to_str().unwrap()).unwrap();
    config.set_start_grace_ms(20).unwrap();
    config.set_preview_interval_ms(20).unwrap();
    config.set_status_interval_ms(50).unwrap();
    config.set_join_timeout_ms(500).unwrap();
    (temp_dir, Arc::new(config))
}

/// Crée des fichiers vidéo factices puis rescanne la bibliothèque
pub fn add_videos(config: &Config, names: &[&str]) -> Vec<String> {
    let library = config.get_library_dir().unwrap();
    for name in names {
        std::fs::write(library.join(name), b"fake video").unwrap();
    }
    config.rescan_videos().unwrap();
    names
        .iter()
        .map(|name| library.join(name).to_string_lossy().into_owned())
        .collect()
}

pub struct Fixture {
    pub temp_dir: TempDir,
    pub config: Arc<Config>,
    pub backend: Arc<FakeBackend>,
    pub probe: Arc<StubProbe>,
    pub player: Arc<VideoPlayer>,
    pub paths: Vec<String>,
}

pub fn player_fixture(names: &[&str]) -> Fixture {
    player_fixture_with(names, FakeBackend::new(), StubProbe::new())
}

pub fn player_fixture_with(names: &[&str], backend: Arc<FakeBackend>, probe: StubProbe) -> Fixture {
    let (temp_dir, config) = test_config();
    let paths = add_videos(&config, names);
    let probe = Arc::new(probe);
    let player = VideoPlayer::new(config.clone(), backend.clone(), probe.clone()).unwrap();
    Fixture {
        temp_dir,
        config,
        backend,
        probe,
        player: Arc::new(player),
        paths,
    }
}
