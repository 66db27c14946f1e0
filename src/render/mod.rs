//! Response helpers for handlers.
//!
//! Each helper records the status it sends in the request values, so the
//! logger reports what the handler decided even when a middleware later
//! decorates the response.

use serde::Serialize;

use crate::context::Context;
use crate::error::HandlerResult;
use crate::http::{Response, StatusCode};

/// MIME type of HTML fragments.
pub const HTML_MIME: &str = "text/html";
/// MIME type of Hyperview XML documents.
pub const HXML_MIME: &str = "application/vnd.hyperview+xml";
pub const JSON_MIME: &str = "application/json";

/// An HTML fragment (or page) as `text/html; charset=utf-8`.
pub fn render_html(ctx: &Context, fragment: impl Into<String>, status: StatusCode) -> HandlerResult {
    ctx.record_status(status);
    Ok(Response::new(status)
        .header("Content-Type", format!("{HTML_MIME}; charset=utf-8"))
        .body(fragment))
}

/// A Hyperview XML document.
pub fn render_hxml(ctx: &Context, doc: impl Into<String>, status: StatusCode) -> HandlerResult {
    ctx.record_status(status);
    Ok(Response::new(status)
        .header("Content-Type", HXML_MIME)
        .body(doc))
}

/// `body` serialized as JSON; `None` sends the status with an empty body.
pub fn respond_json<T>(ctx: &Context, body: Option<&T>, status: StatusCode) -> HandlerResult
where
    T: Serialize + ?Sized,
{
    ctx.record_status(status);
    json_response(body, status)
}

/// An empty body, which is what `hx-swap="delete"` expects.
pub fn render_delete(ctx: &Context, status: StatusCode) -> HandlerResult {
    ctx.record_status(status);
    Ok(Response::new(status))
}

/// The `{"error": "<message>"}` document the errors middleware sends.
pub(crate) fn error_document(message: &str, status: StatusCode) -> HandlerResult {
    json_response(Some(&serde_json::json!({ "error": message })), status)
}

fn json_response<T>(body: Option<&T>, status: StatusCode) -> HandlerResult
where
    T: Serialize + ?Sized,
{
    let Some(body) = body else {
        return Ok(Response::new(status));
    };
    let bytes = serde_json::to_vec(body)?;
    Ok(Response::new(status)
        .header("Content-Type", JSON_MIME)
        .body_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Values;
    use crate::test_support::request;

    fn ctx() -> Context {
        Context::new(request("GET", "/rows")).with_values(Values::new())
    }

    #[test]
    fn html_sets_type_and_records_status() {
        let ctx = ctx();
        let response = render_html(&ctx, "<tr><td>Comet</td></tr>", StatusCode::Ok).unwrap();
        assert_eq!(
            response.headers().get("content-type"),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(response.text(), "<tr><td>Comet</td></tr>");
        assert_eq!(ctx.values().status_code(), 200);
    }

    #[test]
    fn hxml_uses_hyperview_mime() {
        let ctx = ctx();
        let response = render_hxml(&ctx, "<doc/>", StatusCode::Created).unwrap();
        assert_eq!(response.headers().get("content-type"), Some(HXML_MIME));
        assert_eq!(ctx.values().status_code(), 201);
    }

    #[test]
    fn json_bodies_and_empty_bodies() {
        let ctx = ctx();
        let response = respond_json(&ctx, Some("OK"), StatusCode::Ok).unwrap();
        assert_eq!(response.text(), r#""OK""#);
        assert_eq!(response.headers().get("content-type"), Some(JSON_MIME));

        let response = respond_json::<()>(&ctx, None, StatusCode::NoContent).unwrap();
        assert!(response.content().is_empty());
        assert!(!response.headers().contains("content-type"));
        assert_eq!(ctx.values().status_code(), 204);
    }

    #[test]
    fn delete_is_empty() {
        let ctx = ctx();
        let response = render_delete(&ctx, StatusCode::Ok).unwrap();
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.content().is_empty());
    }
}
