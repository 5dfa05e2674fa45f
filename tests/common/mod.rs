#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use maqs::config::Config;
use maqs::driver::ManagedDriver;
use maqs::error::{DriverError, MaqsError, Result};
use maqs::logging::{LoggingEnabled, MemoryLogger};
use maqs::manager::ManagedDriverManager;
use maqs::test_object::TestObject;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared, ordered record of lifecycle calls
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Driver that counts how often it is closed
pub struct TrackingDriver {
    pub name: String,
    pub closes: AtomicUsize,
    pub fail_close: bool,
    open: AtomicBool,
    calls: Option<CallLog>,
}

impl TrackingDriver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            closes: AtomicUsize::new(0),
            fail_close: false,
            open: AtomicBool::new(true),
            calls: None,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail_close: true,
            ..Self::new(name)
        }
    }

    pub fn with_calls(mut self, calls: CallLog) -> Self {
        self.calls = Some(calls);
        self
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManagedDriver for TrackingDriver {
    fn kind(&self) -> &'static str {
        "tracking"
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(ref calls) = self.calls {
            calls.lock().push(format!("close {}", self.name));
        }
        if self.fail_close {
            return Err(DriverError::Disposal(format!("{} refused to close", self.name)).into());
        }
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Manager stand-in that records disposal
pub struct TrackingManager {
    pub name: String,
    pub fail_dispose: bool,
    pub disposals: AtomicUsize,
    calls: CallLog,
}

impl TrackingManager {
    pub fn new(name: &str, calls: CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_dispose: false,
            disposals: AtomicUsize::new(0),
            calls,
        })
    }

    pub fn failing(name: &str, calls: CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_dispose: true,
            disposals: AtomicUsize::new(0),
            calls,
        })
    }

    pub fn disposal_count(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManagedDriverManager for TrackingManager {
    fn kind(&self) -> &str {
        &self.name
    }

    fn is_initialized(&self) -> bool {
        false
    }

    async fn dispose(&self) -> Result<()> {
        self.disposals.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(format!("dispose {}", self.name));
        if self.fail_dispose {
            return Err(MaqsError::Driver(DriverError::Disposal(format!("{} exploded", self.name))));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Test object backed by a memory logger
pub fn test_object(config: Config, logging: LoggingEnabled) -> (TestObject, Arc<MemoryLogger>) {
    let logger = Arc::new(MemoryLogger::default());
    let test_object = TestObject::new("maqs::tests::case", logger.clone(), Arc::new(config)).with_logging(logging);
    (test_object, logger)
}

/// Serve `router` on an ephemeral local port
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const STUB_SESSION_ID: &str = "stub-session";
pub const STUB_PAGE_SOURCE: &str = "<html><head><title>Stub Page</title></head></html>";
pub const STUB_PNG: &[u8] = b"\x89PNG\r\n\x1a\nstub";

/// Counters kept by the WebDriver stub
#[derive(Default)]
pub struct WebDriverStub {
    pub sessions_created: AtomicUsize,
    pub sessions_deleted: AtomicUsize,
    pub requested_capabilities: Mutex<Option<Value>>,
    pub current_url: Mutex<String>,
    pub commands: Mutex<Vec<String>>,
}

impl WebDriverStub {
    pub fn created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> usize {
        self.sessions_deleted.load(Ordering::SeqCst)
    }
}

type Stub = Arc<WebDriverStub>;

fn record(stub: &Stub, command: &str) {
    stub.commands.lock().push(command.to_string());
}

/// W3C WebDriver endpoint answering the commands sessions use
pub fn webdriver_router() -> (Router, Stub) {
    let stub: Stub = Arc::new(WebDriverStub::default());

    let router = Router::new()
        .route(
            "/session",
            post(|State(stub): State<Stub>, Json(body): Json<Value>| async move {
                stub.sessions_created.fetch_add(1, Ordering::SeqCst);
                *stub.requested_capabilities.lock() = body["capabilities"]["alwaysMatch"].as_object().cloned().map(Value::Object);
                Json(json!({
                    "value": {
                        "sessionId": STUB_SESSION_ID,
                        "capabilities": { "browserName": "chrome", "browserVersion": "120.0" }
                    }
                }))
            }),
        )
        .route(
            "/session/:id",
            delete(|State(stub): State<Stub>| async move {
                stub.sessions_deleted.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "value": null }))
            }),
        )
        .route(
            "/session/:id/url",
            post(|State(stub): State<Stub>, Json(body): Json<Value>| async move {
                record(&stub, "navigate");
                *stub.current_url.lock() = body["url"].as_str().unwrap_or_default().to_string();
                Json(json!({ "value": null }))
            })
            .get(|State(stub): State<Stub>| async move {
                let url = stub.current_url.lock().clone();
                Json(json!({ "value": url }))
            }),
        )
        .route(
            "/session/:id/title",
            get(|| async { Json(json!({ "value": "Stub Page" })) }),
        )
        .route(
            "/session/:id/source",
            get(|State(stub): State<Stub>| async move {
                record(&stub, "source");
                Json(json!({ "value": STUB_PAGE_SOURCE }))
            }),
        )
        .route(
            "/session/:id/screenshot",
            get(|State(stub): State<Stub>| async move {
                record(&stub, "screenshot");
                Json(json!({ "value": STANDARD.encode(STUB_PNG) }))
            }),
        )
        .route(
            "/session/:id/window/maximize",
            post(|State(stub): State<Stub>| async move {
                record(&stub, "maximize");
                Json(json!({ "value": { "width": 1920, "height": 1080 } }))
            }),
        )
        .route(
            "/session/:id/window/rect",
            post(|State(stub): State<Stub>, Json(body): Json<Value>| async move {
                record(&stub, &format!("rect {}x{}", body["width"], body["height"]));
                Json(json!({ "value": body }))
            }),
        )
        .route(
            "/session/:id/element",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "value": { "error": "no such element", "message": "Unable to locate element" } })),
                )
            }),
        )
        .with_state(stub.clone());

    (router, stub)
}
