use tracing::error;

use super::{Middleware, Next};
use crate::context::Context;
use crate::error::HandlerResult;
use crate::render;
use crate::router::BoxFuture;

/// Normalizes handler errors into client responses.
///
/// Every error is logged with the trace ID. Transport and integrity errors
/// (see [`Error::is_integrity`](crate::error::Error::is_integrity)) are passed
/// up unchanged so the app can decide whether to shut down. Anything else
/// becomes a `{"error": "<message>"}` document with the error's status, and
/// that status is recorded in the request values.
pub struct ErrorsMiddleware;

impl Middleware for ErrorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<HandlerResult> {
        Box::pin(async move {
            let values = ctx.shared_values();

            let err = match next.run(ctx).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            error!(trace_id = %values.trace_id(), error = %err, "request failed");

            if err.is_integrity() {
                return Err(err);
            }

            let status = err.status();
            values.set_status_code(status);
            render::error_document(&err.public_message(), status)
        })
    }
}
