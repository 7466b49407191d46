//! Documentation OpenAPI de l'API de la borne

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::sse::kiosk_events_sse,
        crate::api::get_status,
        crate::api::get_playlist,
        crate::api::get_preview,
        crate::api::toggle_preview,
        crate::api::toggle_dark_mode,
        crate::api::get_config,
        crate::api::update_config,
        crate::api::rescan,
    ),
    components(
        schemas(
            crate::engine::PlaybackState,
            crate::api::ConfigUpdateRequest,
            crate::api::ReloadResponse,
            crate::api::PreviewToggleResponse,
            crate::api::DarkModeToggleResponse,
            kioskconfig::VideoEntry,
            kioskconfig::VideoUpdate,
            kioskconfig::FullConfig,
        )
    ),
    tags(
        (name = "kiosk", description = "Looping video kiosk control and status")
    ),
    info(
        title = "Kiosk Player API",
        version = "0.1.0",
        description = r#"
# Borne vidéo en boucle

- `GET /events` : flux SSE (`metadata_update`, `playlist_update`, `status_update`)
- `GET /status` : état de lecture `{playing, current_time, current_video}`
- `GET /playlist` : vidéos activées dans l'ordre de lecture
- `GET /preview.png` : image courante (404 si aperçu désactivé)
- `POST /preview/toggle` : bascule l'aperçu
- `POST /dark_mode/toggle` : bascule le mode sombre de l'interface
- `GET|POST /config` : configuration (nom d'affichage, liste des vidéos)
- `POST /rescan` : rescanne le répertoire vidéo
        "#,
    )
)]
pub struct ApiDoc;
