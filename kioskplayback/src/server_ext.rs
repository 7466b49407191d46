//! Extension kioskserver pour la borne
//!
//! `kioskplayback` ajoute ses routes à `kioskserver::Server` par ce trait,
//! sans que le serveur dépende de la lecture.

use crate::api::kiosk_api_router;
use crate::openapi::ApiDoc;
use crate::player::VideoPlayer;
use kioskserver::Server;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

/// Trait pour étendre kioskserver avec l'API de la borne
pub trait KioskPlayerExt {
    /// Enregistre l'API REST + SSE sous `/api/kiosk`
    ///
    /// # Routes enregistrées
    ///
    /// - `GET /api/kiosk/events` - Flux SSE des évènements
    /// - `GET /api/kiosk/status` - État de lecture
    /// - `GET /api/kiosk/playlist` - Playlist active
    /// - `GET /api/kiosk/preview.png` - Image d'aperçu
    /// - `POST /api/kiosk/preview/toggle` - Bascule de l'aperçu
    /// - `POST /api/kiosk/dark_mode/toggle` - Bascule du mode sombre
    /// - `GET|POST /api/kiosk/config` - Configuration
    /// - `POST /api/kiosk/rescan` - Rescan du répertoire vidéo
    async fn init_kiosk_api(&mut self, player: Arc<VideoPlayer>);
}

impl KioskPlayerExt for Server {
    async fn init_kiosk_api(&mut self, player: Arc<VideoPlayer>) {
        self.add_openapi(kiosk_api_router(player), ApiDoc::openapi(), "kiosk")
            .await;
        info!("Kiosk API available at /api/kiosk/*, docs at /swagger-ui/kiosk");
    }
}
