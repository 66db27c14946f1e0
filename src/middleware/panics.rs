use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::error;

use super::{Middleware, Next};
use crate::context::Context;
use crate::error::{Error, HandlerResult};
use crate::router::BoxFuture;

/// Turns a panic anywhere inside the chain into [`Error::Panic`], so the
/// errors middleware can answer `500` and the connection survives.
pub struct PanicsMiddleware;

impl Middleware for PanicsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<HandlerResult> {
        Box::pin(async move {
            let trace_id = ctx.trace_id().to_owned();

            match AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(%trace_id, panic = %message, "handler panicked");
                    Err(Error::Panic(message))
                }
            }
        })
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Values;
    use crate::http::{Response, StatusCode};
    use crate::middleware::{compose_chain, errors, panics};
    use crate::router::handler_fn;
    use crate::test_support::request;

    #[tokio::test]
    async fn panics_become_errors() {
        let chain = compose_chain(
            &[panics()],
            handler_fn(|ctx: Context| async move {
                if ctx.request().path() == "/boom" {
                    panic!("kennel on fire");
                }
                Ok(Response::new(StatusCode::Ok))
            }),
        );

        let result = chain(Context::new(request("GET", "/boom"))).await;
        match result {
            Err(Error::Panic(message)) => assert_eq!(message, "kennel on fire"),
            other => panic!("expected Error::Panic, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn errors_then_panics_answers_500() {
        let chain = compose_chain(
            &[errors(), panics()],
            handler_fn(|ctx: Context| async move {
                let id: usize = ctx.param("id").map_or(0, str::len);
                let dogs: Vec<&str> = Vec::new();
                Ok(Response::new(StatusCode::Ok).body(dogs[id].to_owned()))
            }),
        );

        let ctx = Context::new(request("GET", "/dog")).with_values(Values::new());
        let values = ctx.shared_values();
        let response = chain(ctx).await.unwrap();
        assert_eq!(response.status(), StatusCode::InternalServerError);
        assert_eq!(values.status_code(), 500);
    }

    #[test]
    fn formatted_panic_payloads_are_kept() {
        let payload: Box<dyn Any + Send> = Box::new(format!("dog {} missing", 7));
        assert_eq!(panic_message(payload.as_ref()), "dog 7 missing");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
