//! Request routing: an explicit table of `(method, pattern) -> handler`
//! entries with a match-and-bind lookup.
//!
//! | Pattern            | Example match           | Bound params                     |
//! |--------------------|-------------------------|----------------------------------|
//! | `/rows`            | `/rows`                 | *(none)*                         |
//! | `/dog/{id}`        | `/dog/42`               | `id → "42"`                      |
//! | `/static/*`        | `/static/css/site.css`  | `wildcard → "/css/site.css"`     |
//!
//! Trailing slashes are ignored on both patterns and paths. When several
//! patterns match, exact patterns beat parameterized ones, which beat
//! wildcards; ties go to the earliest registration.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use crate::context::{Context, Parameters};
use crate::error::HandlerResult;
use crate::http::Method;

/// A boxed, `Send` future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Type-erased async handler: takes the request [`Context`], produces a
/// response or an [`Error`](crate::error::Error).
///
/// Handlers live behind an `Arc` so composed chains can be cloned freely
/// and shared across connection tasks.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<HandlerResult> + Send + Sync + 'static>;

/// Erases an async function or closure into a [`Handler`].
///
/// ```
/// use kennel::http::{Response, StatusCode};
/// use kennel::router::handler_fn;
///
/// let ping = handler_fn(|_ctx| async { Ok(Response::new(StatusCode::NoContent)) });
/// # let _ = ping;
/// ```
pub fn handler_fn<H, F>(handler: H) -> Handler
where
    H: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: Context| -> BoxFuture<HandlerResult> { Box::pin(handler(ctx)) })
}

// One path segment of a parameterized pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

// Compiled form of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    // `/rows`
    Exact(String),
    // `/dog/{id}`
    Parameterized { segments: Vec<Segment> },
    // `/static/*`; the prefix is empty for a root catch-all `/*`.
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Pattern {
    /// Compiles a pattern: a trailing `/*` makes a wildcard, any `{name}`
    /// segment makes it parameterized, anything else is exact.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_owned());
        }

        let segments: Vec<Segment> = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Static(s.to_owned()),
            })
            .collect();

        if segments.iter().any(|s| matches!(s, Segment::Param(_))) {
            Pattern::Parameterized { segments }
        } else {
            Pattern::Exact(pattern.to_owned())
        }
    }

    // Lower ranks win when several patterns match the same path.
    fn rank(&self) -> u8 {
        match self {
            Pattern::Exact(_) => 0,
            Pattern::Parameterized { .. } => 1,
            Pattern::Wildcard(_) => 2,
        }
    }

    fn matches(&self, path: &str) -> Option<Parameters> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(Parameters::new),
            Pattern::Parameterized { segments } => {
                let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if parts.len() != segments.len() {
                    return None;
                }

                let mut params = Parameters::new();
                for (segment, part) in segments.iter().zip(parts) {
                    match segment {
                        Segment::Static(s) if s != part => return None,
                        Segment::Static(_) => {}
                        Segment::Param(name) => params.insert(name.as_str(), part),
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let rest = path.strip_prefix(prefix.as_str())?;
                // `/static/*` must not match `/staticky`.
                if !rest.is_empty() && !rest.starts_with('/') {
                    return None;
                }
                let mut params = Parameters::new();
                params.insert("wildcard", rest);
                Some(params)
            }
        }
    }
}

struct Route {
    key: String,
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// Outcome of a [`Router::lookup`].
pub enum Lookup {
    /// A route accepted the method and path; `params` holds what it bound.
    Matched { handler: Handler, params: Parameters },
    /// The path is known, but only under these methods.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// The routing table. Registration happens at startup; afterwards the table
/// is only read.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `handler` under `"<METHOD> <path>"`.
    ///
    /// Returns `false` (and keeps the existing entry) when that key is
    /// already registered.
    pub fn add(&mut self, method: Method, path: &str, handler: Handler) -> bool {
        let key = format!("{method} {path}");
        if self.routes.iter().any(|route| route.key == key) {
            warn!(route = %key, "duplicate route registration ignored");
            return false;
        }

        self.routes.push(Route {
            key,
            method,
            pattern: Pattern::parse(path),
            handler,
        });
        true
    }

    /// Finds the handler for `method` and `path`, binding path parameters.
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let mut best: Option<(&Route, Parameters)> = None;
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };

            if &route.method != method {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
                continue;
            }

            let better = best
                .as_ref()
                .is_none_or(|(current, _)| route.pattern.rank() < current.pattern.rank());
            if better {
                best = Some((route, params));
            }
        }

        match best {
            Some((route, params)) => Lookup::Matched {
                handler: Arc::clone(&route.handler),
                params,
            },
            None if !allowed.is_empty() => Lookup::MethodNotAllowed(allowed),
            None => Lookup::NotFound,
        }
    }

    /// Registered keys in registration order.
    pub fn routes(&self) -> Vec<String> {
        self.routes.iter().map(|route| route.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Response, StatusCode};
    use crate::test_support::request;

    fn status(code: StatusCode) -> Handler {
        handler_fn(move |_ctx| async move { Ok(Response::new(code)) })
    }

    async fn dispatch(router: &Router, method: &str, path: &str) -> Option<StatusCode> {
        let method: Method = method.parse().unwrap();
        match router.lookup(&method, path) {
            Lookup::Matched { handler, params } => {
                let ctx = Context::new(request(method.as_str(), path)).with_params(params);
                Some(handler(ctx).await.unwrap().status())
            }
            _ => None,
        }
    }

    #[test]
    fn parse_classifies_patterns() {
        assert_eq!(Pattern::parse("/"), Pattern::Exact("/".into()));
        assert_eq!(Pattern::parse("/rows/"), Pattern::Exact("/rows".into()));
        assert_eq!(Pattern::parse("/static/*"), Pattern::Wildcard("/static".into()));
        assert_eq!(Pattern::parse("/*"), Pattern::Wildcard(String::new()));
        assert_eq!(
            Pattern::parse("/dog/{id}"),
            Pattern::Parameterized {
                segments: vec![Segment::Static("dog".into()), Segment::Param("id".into())]
            }
        );
    }

    #[test]
    fn exact_patterns_ignore_trailing_slash() {
        let pat = Pattern::parse("/rows");
        assert!(pat.matches("/rows").is_some());
        assert!(pat.matches("/rows/").is_some());
        assert!(pat.matches("/rowsx").is_none());
        assert!(Pattern::parse("/").matches("/").is_some());
    }

    #[test]
    fn parameterized_patterns_bind_segments() {
        let pat = Pattern::parse("/kennels/{kennel}/dog/{id}");
        let params = pat.matches("/kennels/north/dog/42").unwrap();
        assert_eq!(params.get("kennel"), Some("north"));
        assert_eq!(params.get("id"), Some("42"));

        assert!(pat.matches("/kennels/north/dog").is_none());
        assert!(pat.matches("/kennels/north/cat/42").is_none());
        assert!(pat.matches("/kennels/north/dog/42/extra").is_none());
    }

    #[test]
    fn wildcards_respect_segment_boundaries() {
        let pat = Pattern::parse("/static/*");
        let params = pat.matches("/static/css/site.css").unwrap();
        assert_eq!(params.get("wildcard"), Some("/css/site.css"));
        assert_eq!(pat.matches("/static").unwrap().get("wildcard"), Some(""));
        assert!(pat.matches("/staticky/file").is_none());
        assert!(pat.matches("/other/site.css").is_none());

        let root = Pattern::parse("/*");
        assert_eq!(root.matches("/dog/1").unwrap().get("wildcard"), Some("/dog/1"));
    }

    #[test]
    fn duplicate_keys_keep_first_registration() {
        let mut router = Router::new();
        assert!(router.add(Method::Get, "/rows", status(StatusCode::Ok)));
        assert!(!router.add(Method::Get, "/rows", status(StatusCode::Created)));
        assert!(router.add(Method::Post, "/rows", status(StatusCode::Created)));
        assert_eq!(router.routes(), vec!["GET /rows", "POST /rows"]);
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn specific_patterns_beat_general_ones() {
        let mut router = Router::new();
        router.add(Method::Get, "/dog/*", status(StatusCode::Created));
        router.add(Method::Get, "/dog/{id}", status(StatusCode::Forbidden));
        router.add(Method::Get, "/dog/new", status(StatusCode::Ok));

        assert_eq!(dispatch(&router, "GET", "/dog/new").await, Some(StatusCode::Ok));
        assert_eq!(dispatch(&router, "GET", "/dog/7").await, Some(StatusCode::Forbidden));
        assert_eq!(dispatch(&router, "GET", "/dog/7/a").await, Some(StatusCode::Created));
    }

    #[tokio::test]
    async fn handlers_see_bound_params() {
        let mut router = Router::new();
        router.add(
            Method::Delete,
            "/dog/{id}",
            handler_fn(|ctx: Context| async move {
                let id = ctx.param("id").unwrap_or_default().to_owned();
                Ok(Response::new(StatusCode::Ok).body(id))
            }),
        );

        let Lookup::Matched { handler, params } = router.lookup(&Method::Delete, "/dog/abc") else {
            panic!("expected a match");
        };
        let ctx = Context::new(request("DELETE", "/dog/abc")).with_params(params);
        assert_eq!(handler(ctx).await.unwrap().text(), "abc");
    }

    #[test]
    fn unknown_paths_and_methods_are_distinguished() {
        let mut router = Router::new();
        router.add(Method::Put, "/dog/{id}", status(StatusCode::Ok));
        router.add(Method::Delete, "/dog/{id}", status(StatusCode::Ok));

        assert!(matches!(router.lookup(&Method::Get, "/cats"), Lookup::NotFound));
        match router.lookup(&Method::Get, "/dog/1") {
            Lookup::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, vec![Method::Put, Method::Delete]);
            }
            _ => panic!("expected 405"),
        }
    }

    #[test]
    fn empty_router() {
        let router = Router::default();
        assert!(router.is_empty());
        assert!(matches!(router.lookup(&Method::Get, "/"), Lookup::NotFound));
    }
}
