//! Assembly of the web application: global middleware, optional CORS and
//! static files, then the caller's routes.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::app::{App, ShutdownPolicy};
use crate::context::Context;
use crate::hypermedia::StaticFiles;
use crate::http::Method;
use crate::middleware;
use crate::shutdown::ShutdownSignal;

/// Something that knows how to register a set of routes on an [`App`].
pub trait RouteAdder {
    fn add(&self, app: &App, cfg: &WebAppConfig);
}

/// What every web app needs regardless of its routes.
pub struct WebAppConfig {
    pub shutdown: mpsc::Sender<ShutdownSignal>,
    pub policy: ShutdownPolicy,
}

/// Optional pieces of the web app.
#[derive(Debug, Default)]
pub struct Options {
    cors_origin: Option<String>,
    static_files: Option<StaticFiles>,
}

impl Options {
    #[must_use]
    pub fn with_cors(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn with_static_files(mut self, files: StaticFiles) -> Self {
        self.static_files = Some(files);
        self
    }
}

/// Builds the app: logger, errors and panics middleware on every route,
/// CORS when an origin is configured, `/static/*` without middleware when a
/// static directory is configured, then `routes`.
pub fn web_app(cfg: WebAppConfig, routes: &impl RouteAdder, options: Options) -> App {
    let mut app = App::new(
        cfg.shutdown.clone(),
        [middleware::logger(), middleware::errors(), middleware::panics()],
    )
    .with_policy(cfg.policy);

    if let Some(origin) = options.cors_origin.filter(|o| !o.is_empty()) {
        app.enable_cors(middleware::cors(origin));
    }

    if let Some(files) = options.static_files {
        let files = Arc::new(files);
        app.handle_no_middleware(Method::Get, "", "/static/*", move |ctx: Context| {
            let files = Arc::clone(&files);
            async move { files.serve(ctx).await }
        });
    }

    routes.add(&app, &cfg);
    app
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Response, StatusCode};
    use crate::shutdown;
    use crate::test_support::request_with;

    struct Health;

    impl RouteAdder for Health {
        fn add(&self, app: &App, _cfg: &WebAppConfig) {
            app.get(
                "/health",
                |_ctx| async { Ok(Response::new(StatusCode::Ok).body("ok")) },
                &[],
            );
        }
    }

    fn cfg() -> (WebAppConfig, mpsc::Receiver<ShutdownSignal>) {
        let (tx, rx) = shutdown::channel();
        let cfg = WebAppConfig {
            shutdown: tx,
            policy: ShutdownPolicy::default(),
        };
        (cfg, rx)
    }

    #[test]
    fn routes_without_options() {
        let (cfg, _rx) = cfg();
        let app = web_app(cfg, &Health, Options::default());
        assert_eq!(app.routes(), vec!["GET /health"]);
    }

    #[test]
    fn options_register_cors_and_static_first() {
        let (cfg, _rx) = cfg();
        let options = Options::default()
            .with_cors("*")
            .with_static_files(StaticFiles::new("static"));
        let app = web_app(cfg, &Health, options);
        assert_eq!(
            app.routes(),
            vec!["OPTIONS /*", "GET /static/*", "GET /health"]
        );
    }

    #[test]
    fn empty_cors_origin_is_ignored() {
        let (cfg, _rx) = cfg();
        let app = web_app(cfg, &Health, Options::default().with_cors(""));
        assert!(!app.routes().iter().any(|r| r.starts_with("OPTIONS")));
    }

    #[tokio::test]
    async fn cors_headers_reach_route_responses() {
        let (cfg, _rx) = cfg();
        let app = web_app(cfg, &Health, Options::default().with_cors("*"));
        let response = app
            .serve_http(request_with("GET", "/health", &[("Origin", "https://a.example")], ""))
            .await;
        assert_eq!(response.text(), "ok");
        assert_eq!(response.headers().get("access-control-allow-origin"), Some("*"));
    }
}
