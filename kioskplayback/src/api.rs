//! API REST de la borne
//!
//! Routes montées sous `/api/kiosk` par [`KioskPlayerExt`](crate::KioskPlayerExt).

use crate::engine::{EngineState, PlaybackState};
use crate::error::Error;
use crate::player::VideoPlayer;
use crate::sse::kiosk_events_sse;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use kioskconfig::{FullConfig, VideoEntry, VideoUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

/// Router `/api/kiosk`
pub fn kiosk_api_router(player: Arc<VideoPlayer>) -> Router {
    Router::new()
        .route("/events", get(kiosk_events_sse))
        .route("/status", get(get_status))
        .route("/playlist", get(get_playlist))
        .route("/preview.png", get(get_preview))
        .route("/preview/toggle", post(toggle_preview))
        .route("/dark_mode/toggle", post(toggle_dark_mode))
        .route("/config", get(get_config).post(update_config))
        .route("/rescan", post(rescan))
        .with_state(player)
}

// ============================================================================
// Erreurs
// ============================================================================

/// Erreur renvoyée en 500 `{"status": "error", "message": ...}`
pub struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": "error",
                "message": self.0.to_string()
            })),
        )
            .into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

// ============================================================================
// Types de requêtes / réponses
// ============================================================================

/// Mise à jour partielle de la configuration
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConfigUpdateRequest {
    /// Nouveau nom d'affichage
    #[serde(default)]
    pub display_name: Option<String>,
    /// Liste complète des vidéos (remplace la liste existante)
    #[serde(default)]
    pub videos: Option<Vec<VideoUpdate>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReloadResponse {
    pub status: String,
    #[schema(value_type = String, example = "playing")]
    pub state: EngineState,
    /// Nombre d'entrées dans la playlist active
    pub playlist_size: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewToggleResponse {
    pub status: String,
    pub preview_enabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DarkModeToggleResponse {
    pub status: String,
    pub dark_mode: bool,
}

async fn reload_response(player: &VideoPlayer, state: EngineState) -> ReloadResponse {
    ReloadResponse {
        status: "success".to_string(),
        state,
        playlist_size: player.playlist().await.len(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// État de lecture courant
#[utoipa::path(
    get,
    path = "/status",
    tag = "kiosk",
    responses(
        (status = 200, description = "Playback state", body = PlaybackState)
    )
)]
pub async fn get_status(State(player): State<Arc<VideoPlayer>>) -> Json<PlaybackState> {
    Json(player.get_playback_status().await)
}

/// Playlist active
#[utoipa::path(
    get,
    path = "/playlist",
    tag = "kiosk",
    responses(
        (status = 200, description = "Enabled videos in play order", body = Vec<VideoEntry>)
    )
)]
pub async fn get_playlist(State(player): State<Arc<VideoPlayer>>) -> Json<Vec<VideoEntry>> {
    Json(player.playlist().await.entries().to_vec())
}

/// Image d'aperçu courante
#[utoipa::path(
    get,
    path = "/preview.png",
    tag = "kiosk",
    responses(
        (status = 200, description = "Current frame", content_type = "image/png"),
        (status = 404, description = "Preview disabled or no frame captured yet")
    )
)]
pub async fn get_preview(State(player): State<Arc<VideoPlayer>>) -> Result<Response, ApiError> {
    match player.read_snapshot().await? {
        Some(bytes) => Ok((
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            bytes,
        )
            .into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// Bascule l'aperçu
#[utoipa::path(
    post,
    path = "/preview/toggle",
    tag = "kiosk",
    responses(
        (status = 200, description = "New preview state", body = PreviewToggleResponse),
        (status = 500, description = "Configuration could not be saved")
    )
)]
pub async fn toggle_preview(
    State(player): State<Arc<VideoPlayer>>,
) -> Result<Json<PreviewToggleResponse>, ApiError> {
    let preview_enabled = player.toggle_preview().await?;
    Ok(Json(PreviewToggleResponse {
        status: "success".to_string(),
        preview_enabled,
    }))
}

/// Bascule le mode sombre de l'interface
#[utoipa::path(
    post,
    path = "/dark_mode/toggle",
    tag = "kiosk",
    responses(
        (status = 200, description = "New dark mode state", body = DarkModeToggleResponse),
        (status = 500, description = "Configuration could not be saved")
    )
)]
pub async fn toggle_dark_mode(
    State(player): State<Arc<VideoPlayer>>,
) -> Result<Json<DarkModeToggleResponse>, ApiError> {
    let dark_mode = player.toggle_dark_mode()?;
    Ok(Json(DarkModeToggleResponse {
        status: "success".to_string(),
        dark_mode,
    }))
}

/// Configuration complète
#[utoipa::path(
    get,
    path = "/config",
    tag = "kiosk",
    responses(
        (status = 200, description = "Display name, videos and UI flags", body = FullConfig)
    )
)]
pub async fn get_config(
    State(player): State<Arc<VideoPlayer>>,
) -> Result<Json<FullConfig>, ApiError> {
    let config = player.config().get_full_config().map_err(Error::config)?;
    Ok(Json(config))
}

/// Met à jour le nom d'affichage et/ou la liste des vidéos
///
/// Une nouvelle liste déclenche la reconstruction de la playlist.
#[utoipa::path(
    post,
    path = "/config",
    tag = "kiosk",
    request_body = ConfigUpdateRequest,
    responses(
        (status = 200, description = "Configuration applied", body = ReloadResponse),
        (status = 500, description = "Configuration could not be saved")
    )
)]
pub async fn update_config(
    State(player): State<Arc<VideoPlayer>>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<Json<ReloadResponse>, ApiError> {
    if let Some(name) = request.display_name.as_deref() {
        player.update_display_name(name)?;
    }

    let state = match request.videos {
        Some(videos) => player.update_videos(videos).await?,
        None => player.engine().state().await,
    };
    Ok(Json(reload_response(&player, state).await))
}

/// Rescanne le répertoire vidéo et recharge la playlist
#[utoipa::path(
    post,
    path = "/rescan",
    tag = "kiosk",
    responses(
        (status = 200, description = "Library rescanned", body = ReloadResponse),
        (status = 500, description = "Scan or save failed")
    )
)]
pub async fn rescan(
    State(player): State<Arc<VideoPlayer>>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let state = player.rescan().await?;
    Ok(Json(reload_response(&player, state).await))
}
