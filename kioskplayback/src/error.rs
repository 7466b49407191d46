//! Types d'erreurs pour kioskplayback

/// Erreurs de l'orchestration de lecture
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Media backend error: {0}")]
    Backend(String),

    #[error("Metadata probe failed for {path}: {reason}")]
    Probe { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(message.into())
    }

    /// Erreur de persistance remontée par le ConfigStore
    pub fn config(err: anyhow::Error) -> Self {
        Error::Config(format!("{:#}", err))
    }

    pub fn probe(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Probe {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Type Result spécialisé pour kioskplayback
pub type Result<T> = std::result::Result<T, Error>;
