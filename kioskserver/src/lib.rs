//! # kioskserver - Serveur web de la borne, basé sur Axum
//!
//! - [`server`] : serveur principal et builder, documentation OpenAPI, arrêt sur Ctrl+C
//! - [`logs`] : initialisation de tracing avec niveau rechargeable à chaud
//!
//! Les autres crates ajoutent leurs routes par traits d'extension sur
//! [`Server`], sans que cette crate les connaisse.
//!
//! ```rust,no_run
//! use kioskserver::{ServerBuilder, logs::LoggingOptions};
//!
//! # async fn example(config: kioskconfig::Config) -> anyhow::Result<()> {
//! let mut server = ServerBuilder::from_config(&config).build();
//! server.init_logging(LoggingOptions::from_config(&config)).await;
//! server.start().await?;
//! server.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod logs;
pub mod server;

pub use server::{Server, ServerBuilder, ServerInfo};
