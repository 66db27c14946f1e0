//! Middleware pipeline: composable before/after logic around handlers.
//!
//! A middleware receives the request [`Context`] and a [`Next`] standing in
//! for everything inside it. It may pass the request through, answer it
//! itself, or decorate what comes back. [`compose_chain`] folds a list of
//! middleware around a terminal handler so that the first entry in the list
//! is the outermost layer: first in on the way down, last out on the way up.
//!
//! ## Built-ins
//!
//! - [`logger`]: "request started" / "request completed" events.
//! - [`errors`]: turns handler errors into JSON error responses.
//! - [`panics`]: converts a panicking handler into an error result.
//! - [`cors`]: `Access-Control-*` headers for an allowed origin.

use std::future::Future;
use std::sync::Arc;

use crate::context::Context;
use crate::error::HandlerResult;
use crate::router::{BoxFuture, Handler};

pub mod cors;
pub mod errors;
pub mod logger;
pub mod panics;

pub use cors::CorsMiddleware;
pub use errors::ErrorsMiddleware;
pub use logger::LoggerMiddleware;
pub use panics::PanicsMiddleware;

/// The rest of the chain, as seen from one middleware.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once.
///
/// # Examples
///
/// ```rust,no_run
/// use kennel::context::Context;
/// use kennel::error::HandlerResult;
/// use kennel::middleware::{Middleware, Next};
/// use kennel::router::BoxFuture;
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(&self, ctx: Context, next: Next) -> BoxFuture<HandlerResult> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    handler: Handler,
}

impl Next {
    pub fn new(handler: Handler) -> Self {
        Self { handler }
    }

    /// Forwards the request to the next layer and awaits its result.
    pub async fn run(self, ctx: Context) -> HandlerResult {
        (self.handler)(ctx).await
    }
}

/// The trait every kennel middleware implements.
///
/// Middleware is shared across connection tasks, hence `Send + Sync`, and
/// must return a `Send` future. Do not hold lock guards across an `.await`.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<HandlerResult>;
}

/// Shared, type-erased middleware as stored in app and route chains.
pub type MiddlewareHandler = Arc<dyn Middleware>;

/// Wraps `terminal` in `middlewares`, first entry outermost.
pub fn compose_chain(middlewares: &[MiddlewareHandler], terminal: Handler) -> Handler {
    middlewares.iter().rev().fold(terminal, |inner, mw| {
        let mw = Arc::clone(mw);
        let wrapped: Handler =
            Arc::new(move |ctx: Context| mw.handle(ctx, Next::new(Arc::clone(&inner))));
        wrapped
    })
}

struct FnMiddleware<F>(F);

impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Context, Next) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<HandlerResult> {
        Box::pin((self.0)(ctx, next))
    }
}

/// Builds a middleware from an async closure.
///
/// ```
/// use kennel::middleware::from_fn;
///
/// let tag = from_fn(|ctx, next| async move {
///     let mut response = next.run(ctx).await?;
///     response.add_header("X-Kennel", "1");
///     Ok(response)
/// });
/// # let _ = tag;
/// ```
pub fn from_fn<F, Fut>(f: F) -> MiddlewareHandler
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnMiddleware(f))
}

/// Request logging; see [`LoggerMiddleware`].
pub fn logger() -> MiddlewareHandler {
    Arc::new(LoggerMiddleware)
}

/// Error normalization; see [`ErrorsMiddleware`].
pub fn errors() -> MiddlewareHandler {
    Arc::new(ErrorsMiddleware)
}

/// Panic recovery; see [`PanicsMiddleware`].
pub fn panics() -> MiddlewareHandler {
    Arc::new(PanicsMiddleware)
}

/// CORS headers for a single allowed origin (`"*"` allows any).
pub fn cors(origin: impl Into<String>) -> MiddlewareHandler {
    Arc::new(CorsMiddleware::new(origin))
}
