//! Tâches de fond annulables

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Boucle lancée avec `tokio::spawn` et arrêtée par son jeton
pub(crate) struct BackgroundTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    /// Lance `body` avec son propre jeton d'annulation
    pub(crate) fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(body(token.clone()));
        debug!(task = name, "Background task started");
        Self {
            name,
            token,
            handle,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Annule la tâche et attend sa fin au plus `timeout`
    ///
    /// Au-delà, la tâche est interrompue de force ; ce dépassement est
    /// journalisé et n'est pas une erreur. Retourne `true` si la tâche s'est
    /// terminée d'elle-même.
    pub(crate) async fn stop(mut self, timeout: Duration) -> bool {
        self.token.cancel();
        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(())) => {
                debug!(task = self.name, "Background task stopped");
                true
            }
            Ok(Err(e)) => {
                warn!(task = self.name, "Background task ended abnormally: {}", e);
                true
            }
            Err(_) => {
                warn!(
                    task = self.name,
                    "Background task did not stop within {:?}, aborting", timeout
                );
                self.handle.abort();
                let _ = self.handle.await;
                false
            }
        }
    }
}
