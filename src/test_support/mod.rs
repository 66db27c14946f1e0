//! Helpers shared by the unit tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, Once, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};

use crate::http::Request;

/// A request as the server would hand it to the app.
pub(crate) fn request(method: &str, path: &str) -> Request {
    request_with(method, path, &[], "")
}

/// Like [`request`], with extra headers and a body (`Content-Length` is
/// added when the body is non-empty).
pub(crate) fn request_with(
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> Request {
    let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n");
    for (name, value) in headers {
        raw.push_str(&format!("{name}: {value}\r\n"));
    }
    if !body.is_empty() {
        raw.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    raw.push_str("\r\n");

    let (request, _) = Request::parse(raw.as_bytes()).unwrap();
    request.with_body(body.to_owned())
}

static EVENTS: Mutex<Vec<CapturedEvent>> = Mutex::new(Vec::new());
static INSTALL: Once = Once::new();

/// One recorded tracing event with its fields rendered as strings.
#[derive(Debug, Clone)]
pub(crate) struct CapturedEvent {
    pub at: Instant,
    thread: ThreadId,
    fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        self.field("message")
    }
}

#[derive(Default)]
struct FieldRecorder(HashMap<String, String>);

impl Visit for FieldRecorder {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_owned(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_owned(), value.to_owned());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_owned(), value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_owned(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_owned(), value.to_string());
    }
}

struct CaptureLayer;

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut recorder = FieldRecorder::default();
        event.record(&mut recorder);
        EVENTS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                at: Instant::now(),
                thread: thread::current().id(),
                fields: recorder.0,
            });
    }
}

/// Log capture for one test.
///
/// The capturing subscriber is process-global, so each test only sees the
/// events emitted on its own thread after the capture was created. Tests
/// that assert on logs run on the current-thread runtime.
pub(crate) struct CapturedLogs {
    thread: ThreadId,
    start: usize,
}

pub(crate) struct CaptureGuard;

impl Default for CapturedLogs {
    fn default() -> Self {
        Self {
            thread: thread::current().id(),
            start: EVENTS.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }
}

impl CapturedLogs {
    /// Installs the capturing subscriber if it is not installed yet.
    pub fn install(&self) -> CaptureGuard {
        INSTALL.call_once(|| {
            let subscriber = Registry::default().with(CaptureLayer);
            let _ = tracing::subscriber::set_global_default(subscriber);
        });
        CaptureGuard
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        EVENTS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .skip(self.start)
            .filter(|e| e.thread == self.thread)
            .cloned()
            .collect()
    }

    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.message() == Some(message))
            .collect()
    }
}
