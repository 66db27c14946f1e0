//! Shutdown coordination.
//!
//! A single bounded channel carries every reason to stop: OS signals are
//! forwarded into it by [`forward_os_signals`], and handlers that detect an
//! integrity failure send into it through
//! [`App::signal_shutdown`](crate::app::App::signal_shutdown). The binary
//! waits on the receiving end and then drains the server.

use std::fmt;

use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Why the process is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl-C / SIGINT.
    Interrupt,
    /// SIGTERM, or an internal request to terminate.
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
        })
    }
}

/// Creates the shutdown channel. One pending signal is all that matters, so
/// the capacity is one.
pub fn channel() -> (mpsc::Sender<ShutdownSignal>, mpsc::Receiver<ShutdownSignal>) {
    mpsc::channel(1)
}

/// Spawns a task that forwards the first Ctrl-C or SIGTERM into `tx`.
pub fn forward_os_signals(tx: mpsc::Sender<ShutdownSignal>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let sig = os_signal().await;
        info!(signal = %sig, "received OS signal");
        if tx.send(sig).await.is_err() {
            warn!("shutdown receiver dropped before the signal was delivered");
        }
    })
}

async fn os_signal() -> ShutdownSignal {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        ShutdownSignal::Interrupt
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
        ShutdownSignal::Terminate
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<ShutdownSignal>();

    tokio::select! {
        sig = ctrl_c => sig,
        sig = terminate => sig,
    }
}
