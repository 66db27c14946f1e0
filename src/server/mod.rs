//! Async HTTP/1.1 server on Tokio.
//!
//! One task per TCP connection, tracked in a [`JoinSet`]. Connections are
//! persistent (keep-alive) and serve their requests one after another
//! through [`App::serve_http`].
//!
//! Shutdown happens in three steps:
//! 1. The shutdown future resolves and the listener stops accepting.
//! 2. Every connection is told to close. Idle ones hang up right away, busy
//!    ones finish their current request and answer with `Connection: close`.
//! 3. The server waits up to the grace period for the tasks to end, then
//!    aborts the rest and reports [`ServerError::ShutdownTimeout`].

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{in_flight} connection(s) still open after the {grace:?} shutdown grace period")]
    ShutdownTimeout { in_flight: usize, grace: Duration },
}

/// Largest request (headers plus body) we buffer before answering `413`.
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The kennel HTTP server.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use kennel::{app::App, server::Server, shutdown};
///
/// # async fn run() -> Result<(), kennel::server::ServerError> {
/// let (tx, mut rx) = shutdown::channel();
/// let app = App::new(tx, []);
/// let server = Server::bind("127.0.0.1:42069").await?;
/// server
///     .serve(app, async move { rx.recv().await; }, Duration::from_secs(5))
///     .await
/// # }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves `app` until `shutdown` resolves, then drains connections for
    /// at most `grace`.
    ///
    /// # Errors
    ///
    /// [`ServerError::ShutdownTimeout`] when connections outlive the grace
    /// period; they are aborted before this returns.
    pub async fn serve<S>(self, app: App, shutdown: S, grace: Duration) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let app = Arc::new(app);
        let (closing_tx, closing_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        tokio::pin!(shutdown);
        info!(address = %self.local_addr, "kennel listening");

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown started, draining connections");
                    break;
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "connection task failed");
                    }
                }

                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    debug!(peer = %peer_addr, "connection accepted");
                    let app = Arc::clone(&app);
                    let closing = closing_rx.clone();
                    tasks.spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, app, closing).await {
                            warn!(peer = %peer_addr, error = %e, "connection closed with error");
                        }
                    });
                }
            }
        }

        drop(self.listener);
        // Receivers only go away with their tasks, so a send error just
        // means there is nothing left to notify.
        let _ = closing_tx.send(true);

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "connection task failed during drain");
                }
            }
        })
        .await;

        match drained {
            Ok(()) => {
                info!("all connections drained");
                Ok(())
            }
            Err(_) => {
                let in_flight = tasks.len();
                warn!(in_flight, ?grace, "grace period expired, aborting connections");
                tasks.abort_all();
                Err(ServerError::ShutdownTimeout { in_flight, grace })
            }
        }
    }
}

/// Serves one TCP connection until the peer hangs up, asks for
/// `Connection: close`, or the server starts closing.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    app: Arc<App>,
    mut closing: watch::Receiver<bool>,
) -> io::Result<()> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        match Request::parse(&buf) {
            Ok((request, body_offset)) => {
                let content_length = match request.content_length() {
                    Ok(n) => n,
                    Err(e) => return reject(&mut stream, StatusCode::BadRequest, &e).await,
                };
                let frame_len = match body_offset.checked_add(content_length) {
                    Some(n) if n <= MAX_REQUEST_SIZE => n,
                    _ => {
                        let e = "request entity too large";
                        return reject(&mut stream, StatusCode::PayloadTooLarge, &e).await;
                    }
                };

                if buf.len() >= frame_len {
                    let frame = buf.split_to(frame_len).freeze();
                    let request = request
                        .with_body(frame.slice(body_offset..))
                        .with_remote_addr(peer_addr);
                    let keep_alive = request.is_keep_alive() && !*closing.borrow();

                    let response = app.serve_http(request).await.keep_alive(keep_alive);
                    if let Err(e) = write_response(&mut stream, response).await {
                        app.handle_transport_error(e);
                        return Ok(());
                    }

                    if !keep_alive {
                        debug!(peer = %peer_addr, "closing connection");
                        return Ok(());
                    }
                    continue;
                }
            }
            Err(RequestError::Incomplete) => {}
            Err(e) => return reject(&mut stream, StatusCode::BadRequest, &e).await,
        }

        if buf.len() > MAX_REQUEST_SIZE {
            let e = "request entity too large";
            return reject(&mut stream, StatusCode::PayloadTooLarge, &e).await;
        }

        let bytes_read = if buf.is_empty() {
            if *closing.borrow() {
                return Ok(());
            }
            tokio::select! {
                read = stream.read_buf(&mut buf) => read?,
                _ = closing.changed() => {
                    debug!(peer = %peer_addr, "closing idle connection");
                    return Ok(());
                }
            }
        } else {
            stream.read_buf(&mut buf).await?
        };

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            return Ok(());
        }
    }
}

async fn write_response(stream: &mut TcpStream, response: Response) -> io::Result<()> {
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await
}

// Answers a request we refuse to parse and closes the connection.
async fn reject(
    stream: &mut TcpStream,
    status: StatusCode,
    reason: &(dyn std::fmt::Display + Sync),
) -> io::Result<()> {
    warn!(%status, %reason, "rejecting request");
    let response = Response::new(status)
        .body(format!("{}: {reason}", status.canonical_reason()))
        .keep_alive(false);
    write_response(stream, response).await
}
