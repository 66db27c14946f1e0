//! Handler error taxonomy and the fail-fast classification used by the app.
//!
//! Handlers return [`HandlerResult`]. Client-facing failures are
//! [`Error::Request`]; the `errors` middleware turns those (and anything it
//! does not recognise as an integrity problem) into JSON error documents.
//! Whatever still reaches the dispatcher is classified with
//! [`validate_error`].

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::http::{Response, StatusCode};

/// What every handler and middleware produces.
pub type HandlerResult = Result<Response, Error>;

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum Error {
    /// A failure the client should hear about, with the status to send.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    /// A handler panicked; carries the panic payload when it was a string.
    #[error("handler panicked: {0}")]
    Panic(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport failure while talking to the peer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The process can no longer trust its own state.
    #[error("integrity failure: {0}")]
    Shutdown(String),

    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::request(StatusCode::NotFound, message)
    }

    pub fn internal(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal(err.into())
    }

    /// The status the client receives for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Request { status, .. } => *status,
            Self::Json(_) => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        }
    }

    /// The message that is safe to show the client. Server-side failures
    /// never leak their details.
    pub fn public_message(&self) -> String {
        match self {
            Self::Request { message, .. } => message.clone(),
            Self::Json(err) => format!("invalid JSON: {err}"),
            _ => StatusCode::InternalServerError.canonical_reason().to_owned(),
        }
    }

    /// Transport and integrity errors bypass normalization and go to the
    /// dispatcher for a shutdown decision.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Shutdown(_))
    }
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        Self::internal(err)
    }
}

/// Returns `true` when the I/O error just means the peer went away.
pub fn is_peer_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
    )
}

/// Decides whether an error that reached the dispatcher should shut the
/// process down.
///
/// Peers hanging up mid-response (broken pipe, connection reset) are not a
/// health signal and yield `false`, including when the disconnect is buried
/// in the source chain of an [`Error::Internal`] or a wrapped `io::Error`.
/// Every other error yields `true`.
///
/// ```
/// use std::io;
/// use kennel::error::{validate_error, Error};
///
/// let reset = Error::Io(io::Error::from(io::ErrorKind::ConnectionReset));
/// assert!(!validate_error(&reset));
/// assert!(validate_error(&Error::Shutdown("store corrupted".into())));
/// ```
pub fn validate_error(err: &Error) -> bool {
    // `Internal` is transparent, so its own `source()` would skip the boxed error.
    let mut cause = match err {
        Error::Io(io_err) => Some(io_err as &(dyn StdError + 'static)),
        Error::Internal(inner) => Some(&**inner as &(dyn StdError + 'static)),
        _ => None,
    };

    while let Some(e) = cause {
        cause = match e.downcast_ref::<io::Error>() {
            Some(io_err) if is_peer_disconnect(io_err) => return false,
            Some(io_err) => io_err
                .get_ref()
                .map(|inner| inner as &(dyn StdError + 'static)),
            None => e.source(),
        };
    }
    true
}
