use super::{Middleware, Next};
use crate::context::Context;
use crate::error::HandlerResult;
use crate::http::Method;
use crate::router::BoxFuture;

/// Cross-Origin Resource Sharing headers for an allow-list of origins.
///
/// - Requests without an `Origin`, or from an origin not on the list, pass
///   through untouched.
/// - Allowed requests run normally and get `Access-Control-Allow-Origin`,
///   `-Methods` and `-Headers` appended to their response. `OPTIONS`
///   responses also carry `Access-Control-Max-Age`.
/// - A specific (non-`*`) origin is echoed back with `Vary: Origin`.
///
/// This middleware never answers a preflight by itself; the catch-all
/// `OPTIONS` route installed by [`App::enable_cors`](crate::app::App::enable_cors)
/// does, so the preflight still travels the full chain.
///
/// ```rust
/// use kennel::middleware::CorsMiddleware;
///
/// let cors = CorsMiddleware::new("https://kennel.example")
///     .allow_origin("https://staging.kennel.example")
///     .allow_header("X-Kennel-Client");
/// # let _ = cors;
/// ```
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
}

impl CorsMiddleware {
    /// Allows `origin` (or every origin for `"*"`) to call the common
    /// methods with `Content-Type`, `Authorization` and the request headers
    /// htmx sends.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            allowed_origins: vec![origin.into()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: [
                "Content-Type",
                "Authorization",
                "HX-Request",
                "HX-Current-URL",
                "HX-Target",
                "HX-Trigger",
            ]
            .map(String::from)
            .to_vec(),
        }
    }

    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origins.push(origin.into());
        self
    }

    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.allowed_methods.push(method.into());
        self
    }

    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.allowed_headers.push(header.into());
        self
    }

    // The value for `Access-Control-Allow-Origin`, if `origin` may call us.
    fn resolve(&self, origin: &str) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            Some("*".to_owned())
        } else if self.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_owned())
        } else {
            None
        }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<HandlerResult> {
        let allow_origin = ctx
            .request()
            .headers()
            .get("origin")
            .and_then(|origin| self.resolve(origin));
        let methods = self.allowed_methods.join(", ");
        let headers = self.allowed_headers.join(", ");

        Box::pin(async move {
            let Some(allow_origin) = allow_origin else {
                return next.run(ctx).await;
            };
            let is_preflight = ctx.request().method() == &Method::Options;

            let mut response = next.run(ctx).await?;
            if allow_origin != "*" {
                response.add_header("Vary", "Origin");
            }
            response.add_header("Access-Control-Allow-Origin", allow_origin);
            response.add_header("Access-Control-Allow-Methods", methods);
            response.add_header("Access-Control-Allow-Headers", headers);
            if is_preflight {
                response.add_header("Access-Control-Max-Age", "3600");
            }
            Ok(response)
        })
    }
}
