//! # kennel
//!
//! A dog roster for an htmx front end, served by a small async HTTP/1.1
//! core: an explicit routing table, onion-style middleware, request-scoped
//! values and coordinated graceful shutdown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use kennel::app::ShutdownPolicy;
//! use kennel::dog::Dogs;
//! use kennel::hypermedia::Routes;
//! use kennel::mux::{Options, WebAppConfig, web_app};
//! use kennel::server::Server;
//! use kennel::shutdown;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let (tx, mut rx) = shutdown::channel();
//!     shutdown::forward_os_signals(tx.clone());
//!
//!     let routes = Routes::new(Arc::new(Dogs::new()))?;
//!     let cfg = WebAppConfig { shutdown: tx, policy: ShutdownPolicy::FailFast };
//!     let app = web_app(cfg, &routes, Options::default());
//!
//!     let server = Server::bind("127.0.0.1:42069").await?;
//!     let stop = async move {
//!         rx.recv().await;
//!     };
//!     server.serve(app, stop, Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

// ── HTTP core ────────────────────────────────────────────────────────────────
pub mod app;
pub mod context;
pub mod error;
pub mod http;
pub mod middleware;
pub mod render;
pub mod router;
pub mod server;
pub mod shutdown;

// ── The dog roster ───────────────────────────────────────────────────────────
pub mod config;
pub mod dog;
pub mod hypermedia;
pub mod mux;

#[cfg(test)]
pub(crate) mod test_support;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::{App, ShutdownPolicy};
pub use context::{Context, Values};
pub use error::{Error, HandlerResult};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
