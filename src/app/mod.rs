//! The application: a shared routing table, an accumulating middleware list
//! and the shutdown channel.
//!
//! Several `App` views can share one routing table. [`App::group`] and
//! [`App::mount`] hand out a new view with its own copy of the middleware
//! list, so `use_middleware` on one view never leaks into another. Routes
//! registered through a view are wrapped in the view's middleware as it
//! stands at registration time.
//!
//! ```
//! use kennel::app::App;
//! use kennel::http::StatusCode;
//! use kennel::{middleware, render, shutdown};
//!
//! let (tx, _rx) = shutdown::channel();
//! let app = App::new(tx, [middleware::logger(), middleware::errors(), middleware::panics()]);
//!
//! let api = app.mount("api");
//! api.get("/health", |ctx| async move {
//!     render::respond_json(&ctx, Some("OK"), StatusCode::Ok)
//! }, &[]);
//!
//! assert_eq!(app.routes(), vec!["GET /api/health"]);
//! ```

use std::future::Future;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::context::{Context, Values};
use crate::error::{Error, HandlerResult, validate_error};
use crate::http::{Method, Request, Response, StatusCode};
use crate::middleware::panics::panic_message;
use crate::middleware::{MiddlewareHandler, compose_chain};
use crate::render;
use crate::router::{Handler, Lookup, Router, handler_fn};
use crate::shutdown::ShutdownSignal;

/// What to do when an error reaches the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Signal shutdown for anything [`validate_error`] flags.
    #[default]
    FailFast,
    /// Log and keep serving.
    LogOnly,
}

/// An application view. See the [module docs](self).
#[derive(Clone)]
pub struct App {
    router: Arc<RwLock<Router>>,
    mw: Vec<MiddlewareHandler>,
    group: String,
    shutdown: mpsc::Sender<ShutdownSignal>,
    policy: ShutdownPolicy,
}

impl App {
    /// Creates an app with an empty routing table and the given global
    /// middleware, first entry outermost.
    pub fn new(
        shutdown: mpsc::Sender<ShutdownSignal>,
        mw: impl IntoIterator<Item = MiddlewareHandler>,
    ) -> Self {
        Self {
            router: Arc::new(RwLock::new(Router::new())),
            mw: mw.into_iter().collect(),
            group: String::new(),
            shutdown,
            policy: ShutdownPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    /// A view on the same routes with a private copy of the middleware list.
    pub fn group(&self) -> App {
        App {
            router: Arc::clone(&self.router),
            mw: self.mw.clone(),
            group: String::new(),
            shutdown: self.shutdown.clone(),
            policy: self.policy,
        }
    }

    /// Like [`group`](Self::group), but every path registered through the
    /// returned view is prefixed with `/<prefix>`.
    pub fn mount(&self, prefix: &str) -> App {
        App {
            group: prefix.trim_matches('/').to_owned(),
            ..self.group()
        }
    }

    /// Appends middleware for routes registered later through this view.
    pub fn use_middleware(&mut self, mw: impl IntoIterator<Item = MiddlewareHandler>) {
        self.mw.extend(mw);
    }

    pub fn get<H, F>(&self, path: &str, handler: H, mw: &[MiddlewareHandler])
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Method::Get, path, handler, mw);
    }

    pub fn post<H, F>(&self, path: &str, handler: H, mw: &[MiddlewareHandler])
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Method::Post, path, handler, mw);
    }

    pub fn put<H, F>(&self, path: &str, handler: H, mw: &[MiddlewareHandler])
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Method::Put, path, handler, mw);
    }

    pub fn delete<H, F>(&self, path: &str, handler: H, mw: &[MiddlewareHandler])
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(Method::Delete, path, handler, mw);
    }

    /// Registers `handler` for any method. Route middleware `mw` sits
    /// closest to the handler; the view's middleware wraps around it.
    pub fn handle<H, F>(&self, method: Method, path: &str, handler: H, mw: &[MiddlewareHandler])
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler = compose_chain(mw, handler_fn(handler));
        let handler = compose_chain(&self.mw, handler);
        self.register(method, &self.group, path, handler);
    }

    /// Registers a route that skips every middleware. Dispatch still gives
    /// it fresh request values and applies the shutdown policy to its errors.
    pub fn handle_no_middleware<H, F>(&self, method: Method, group: &str, path: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(method, group.trim_matches('/'), path, handler_fn(handler));
    }

    /// Appends `mw` (normally [`middleware::cors`](crate::middleware::cors))
    /// and answers every `OPTIONS` request with `200 "OK"` through the full
    /// middleware chain.
    pub fn enable_cors(&mut self, mw: MiddlewareHandler) {
        self.mw.push(mw);

        let preflight = handler_fn(|ctx: Context| async move {
            render::respond_json(&ctx, Some("OK"), StatusCode::Ok)
        });
        self.register(Method::Options, "", "/*", compose_chain(&self.mw, preflight));
    }

    fn register(&self, method: Method, group: &str, path: &str, handler: Handler) {
        let path = if group.is_empty() {
            path.to_owned()
        } else {
            format!("/{group}{path}")
        };

        let mut router = self.router.write().unwrap_or_else(PoisonError::into_inner);
        if router.add(method.clone(), &path, handler) {
            debug!(%method, %path, "route registered");
        }
    }

    /// Registered route keys (`"<METHOD> <path>"`) in registration order.
    pub fn routes(&self) -> Vec<String> {
        self.router
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .routes()
    }

    /// Routes `request` and produces the response to send.
    ///
    /// Unknown paths get `404`; a known path under the wrong method gets
    /// `405` with an `Allow` header. A handler error that escaped the
    /// middleware is put through the shutdown policy and answered with `500`.
    pub async fn serve_http(&self, request: Request) -> Response {
        let lookup = self
            .router
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(request.method(), request.path());

        match lookup {
            Lookup::Matched { handler, params } => {
                self.dispatch(handler, Context::new(request).with_params(params))
                    .await
            }
            Lookup::MethodNotAllowed(allowed) => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                Response::new(StatusCode::MethodNotAllowed)
                    .header("Allow", allow)
                    .body("405 method not allowed")
            }
            Lookup::NotFound => Response::new(StatusCode::NotFound).body("404 page not found"),
        }
    }

    async fn dispatch(&self, handler: Handler, ctx: Context) -> Response {
        let values = Values::new();
        let span = info_span!("request", trace_id = %values.trace_id());
        let ctx = ctx.with_values(values);

        // Routes without middleware have no panics layer of their own.
        let result = match AssertUnwindSafe(handler(ctx))
            .catch_unwind()
            .instrument(span.clone())
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(Error::Panic(panic_message(payload.as_ref()))),
        };

        match result {
            Ok(response) => response,
            Err(err) => {
                span.in_scope(|| self.handle_error(&err));
                render::error_document(
                    StatusCode::InternalServerError.canonical_reason(),
                    StatusCode::InternalServerError,
                )
                .unwrap_or_else(|_| Response::new(StatusCode::InternalServerError))
            }
        }
    }

    /// Applies the shutdown policy to a failed response write.
    pub fn handle_transport_error(&self, err: io::Error) {
        self.handle_error(&Error::Io(err));
    }

    fn handle_error(&self, err: &Error) {
        match self.policy {
            ShutdownPolicy::FailFast if validate_error(err) => {
                error!(error = %err, "unrecoverable error, signalling shutdown");
                self.signal_shutdown();
            }
            ShutdownPolicy::FailFast => {
                debug!(error = %err, "peer went away mid-response");
            }
            ShutdownPolicy::LogOnly => {
                warn!(error = %err, "unhandled error, shutdown policy is log-only");
            }
        }
    }

    /// Asks the process to terminate. Never blocks: when a signal is already
    /// pending this one is dropped.
    pub fn signal_shutdown(&self) {
        match self.shutdown.try_send(ShutdownSignal::Terminate) {
            Ok(()) => info!("shutdown requested"),
            Err(TrySendError::Full(_)) => debug!("shutdown already pending"),
            Err(TrySendError::Closed(_)) => warn!("shutdown channel closed"),
        }
    }
}
