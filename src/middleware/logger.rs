use tracing::info;

use super::{Middleware, Next};
use crate::context::Context;
use crate::error::HandlerResult;
use crate::http::StatusCode;
use crate::router::BoxFuture;

/// Logs one "request started" and one "request completed" event per request.
///
/// Both events carry the trace ID, method, path (with `?query` when there is
/// one) and remote address. The completion event adds the status code and
/// the time `since` the request values were stamped. The status comes from
/// the request [`Values`](crate::context::Values) when a helper recorded it,
/// otherwise from the response itself; an error that escaped normalization
/// counts as `500`.
///
/// The inner result is returned untouched.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<HandlerResult> {
        Box::pin(async move {
            let values = ctx.shared_values();
            let request = ctx.request();
            let method = request.method().to_string();
            let path = match request.query_string() {
                Some(query) => format!("{}?{query}", request.path()),
                None => request.path().to_owned(),
            };
            let remote_addr = request
                .remote_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_default();

            info!(
                trace_id = %values.trace_id(),
                %method,
                %path,
                %remote_addr,
                "request started"
            );

            let result = next.run(ctx).await;

            let status_code = match values.status_code() {
                0 => match &result {
                    Ok(response) => response.status().as_u16(),
                    Err(_) => StatusCode::InternalServerError.as_u16(),
                },
                recorded => recorded,
            };

            info!(
                trace_id = %values.trace_id(),
                %method,
                %path,
                %remote_addr,
                status_code,
                since = ?values.elapsed(),
                "request completed"
            );

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::context::Values;
    use crate::http::Response;
    use crate::middleware::{compose_chain, logger};
    use crate::router::handler_fn;
    use crate::test_support::{CapturedLogs, request};

    #[tokio::test]
    async fn emits_started_then_completed_once() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let chain = compose_chain(
            &[logger()],
            handler_fn(|ctx: Context| async move {
                ctx.record_status(StatusCode::Created);
                Ok(Response::new(StatusCode::Created))
            }),
        );
        let ctx = Context::new(request("POST", "/dog?via=form")).with_values(Values::new());
        let trace_id = ctx.trace_id().to_owned();
        chain(ctx).await.unwrap();

        let started = logs.with_message("request started");
        let completed = logs.with_message("request completed");
        assert_eq!(started.len(), 1);
        assert_eq!(completed.len(), 1);

        let (started, completed) = (&started[0], &completed[0]);
        assert!(completed.at >= started.at);
        assert_eq!(started.field("path"), Some("/dog?via=form"));
        assert_eq!(started.field("method"), Some("POST"));
        assert_eq!(started.field("trace_id"), Some(trace_id.as_str()));
        assert_eq!(completed.field("status_code"), Some("201"));
        assert!(completed.field("since").is_some());
    }

    #[tokio::test]
    async fn falls_back_to_response_status() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let chain = compose_chain(
            &[logger()],
            handler_fn(|_ctx| async { Ok(Response::new(StatusCode::NoContent)) }),
        );
        let before = Instant::now();
        chain(Context::new(request("PUT", "/deselect")).with_values(Values::new()))
            .await
            .unwrap();

        let completed = logs.with_message("request completed");
        assert_eq!(completed[0].field("status_code"), Some("204"));
        assert!(completed[0].at >= before);
    }
}
