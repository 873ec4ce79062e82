use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicUsize, Ordering};

use http::Method;
use rostra::{CallArgs, Container, Injectable, Request};
use serde_json::Value;

/// Route pipeline logs into the captured test output, once per binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Request helpers
// ============================================================================

pub fn get(path: &str) -> Request {
    init_tracing();
    Request::builder(Method::GET, path).build()
}

pub fn post_json(path: &str, body: &Value) -> Request {
    init_tracing();
    Request::builder(Method::POST, path).json(body).build()
}

// ============================================================================
// Fixture controllers
// ============================================================================

/// A controller that counts handler invocations, for asserting that a
/// short-circuited pipeline never reaches the handler.
pub struct HitsController {
    pub hits: Arc<AtomicUsize>,
}

impl HitsController {
    pub async fn touch(self: Arc<Self>, _args: CallArgs) -> Value {
        self.hits.fetch_add(1, Ordering::SeqCst);
        serde_json::json!({ "ok": true })
    }
}

impl Injectable for HitsController {
    fn construct(_container: &Container) -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
        }
    }
}
