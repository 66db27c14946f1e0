//! Per-request context: the parsed request, bound path parameters and the
//! request's [`Values`] record.
//!
//! Values are threaded explicitly. The app attaches a fresh record right
//! before invoking a route's handler chain, and anything downstream reads it
//! back through [`Context::values`].

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU16, Ordering},
    },
    time::{Duration, Instant, SystemTime},
};

use uuid::Uuid;

use crate::http::{Request, StatusCode};

/// Per-request metadata: trace ID, start time and the response status once
/// a handler has settled on one.
#[derive(Debug)]
pub struct Values {
    trace_id: String,
    now: SystemTime,
    started: Instant,
    // 0 until a response helper or the errors middleware records the outcome.
    status_code: AtomicU16,
}

impl Values {
    /// A fresh record with a random v4 trace ID, stamped now.
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            now: SystemTime::now(),
            started: Instant::now(),
            status_code: AtomicU16::new(0),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Wall-clock time at which the request was handed to its handler.
    pub fn now(&self) -> SystemTime {
        self.now
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn status_code(&self) -> u16 {
        self.status_code.load(Ordering::Acquire)
    }

    pub fn set_status_code(&self, status: StatusCode) {
        self.status_code.store(status.as_u16(), Ordering::Release);
    }
}

/// The zero record: empty trace ID, epoch timestamp, status 0.
impl Default for Values {
    fn default() -> Self {
        Self {
            trace_id: String::new(),
            now: SystemTime::UNIX_EPOCH,
            started: Instant::now(),
            status_code: AtomicU16::new(0),
        }
    }
}

static EMPTY_VALUES: std::sync::LazyLock<Values> = std::sync::LazyLock::new(Values::default);

/// Path parameters bound by the router (`{id}` segments and `wildcard`).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Everything a handler gets to see about one request.
pub struct Context {
    request: Request,
    params: Parameters,
    values: Option<Arc<Values>>,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: Parameters::new(),
            values: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Parameters) -> Self {
        self.params = params;
        self
    }

    /// Attaches `values`, replacing any record already present.
    #[must_use]
    pub fn with_values(mut self, values: Values) -> Self {
        self.values = Some(Arc::new(values));
        self
    }

    /// The attached record, or the zero record when none was attached.
    pub fn values(&self) -> &Values {
        self.values.as_deref().unwrap_or(&EMPTY_VALUES)
    }

    /// An owned handle to the record, for middleware that reads it after
    /// handing the context on. Without an attached record this is a
    /// detached zero record.
    pub fn shared_values(&self) -> Arc<Values> {
        self.values.clone().unwrap_or_default()
    }

    /// The trace ID, or `""` when no values are attached.
    pub fn trace_id(&self) -> &str {
        self.values().trace_id()
    }

    /// Records the response status; a no-op when no values are attached.
    pub fn record_status(&self, status: StatusCode) {
        if let Some(values) = &self.values {
            values.set_status_code(status);
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Shorthand for `params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// A decoded field from a form-encoded body.
    pub fn form_value(&self, key: &str) -> Option<String> {
        self.request.form_value(key)
    }

}
