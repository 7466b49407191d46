//! SSE pour suivre l'état de la borne
//!
//! Route : `GET /api/kiosk/events`. Chaque évènement SSE porte le nom de
//! l'évènement (`metadata_update`, `playlist_update`, `status_update`) et sa
//! charge utile JSON.

use crate::api::ApiError;
use crate::player::VideoPlayer;
use async_stream::stream;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

/// Handler SSE : enregistre un abonné et relaie ses évènements
#[utoipa::path(
    get,
    path = "/events",
    tag = "kiosk",
    responses(
        (status = 200, description = "Event stream: metadata_update, playlist_update, then periodic status_update", content_type = "text/event-stream")
    )
)]
pub async fn kiosk_events_sse(
    State(player): State<Arc<VideoPlayer>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut subscription = player.on_subscriber_connect().await?;

    let stream = stream! {
        while let Some(event) = subscription.recv().await {
            match event.data() {
                Ok(data) => {
                    yield Ok::<_, axum::Error>(Event::default().event(event.name()).data(data.to_string()));
                }
                Err(e) => warn!("Cannot serialize {} event: {}", event.name(), e),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
