//! Minimal W3C WebDriver client
//!
//! Only the commands the test lifecycle needs are implemented: starting and
//! quitting a session, navigation, page inspection, screenshots, window size and
//! timeouts. Anything else can be sent through [`WebDriverSession::command`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::driver::ManagedDriver;
use crate::error::{DriverError, Result, SeleniumError};

/// One remote browser session
pub struct WebDriverSession {
    client: Client,
    remote_url: String,
    session_id: String,
    capabilities: Value,
    closed: AtomicBool,
}

impl WebDriverSession {
    /// Create a new session on a WebDriver endpoint (driver server or grid hub)
    pub async fn start(client: Client, remote_url: &str, capabilities: Value) -> Result<Self> {
        let remote_url = remote_url.trim_end_matches('/').to_string();
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });

        let response = client
            .post(format!("{}/session", remote_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| SeleniumError::SessionCreation(format!("{}: {}", remote_url, e)))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SeleniumError::SessionCreation(format!("Invalid response from {}: {}", remote_url, e)))?;

        if !status.is_success() {
            let (error, message) = error_details(&payload);
            return Err(SeleniumError::SessionCreation(format!("{}: {}", error, message)).into());
        }

        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| SeleniumError::Protocol("New session response has no sessionId".to_string()))?
            .to_string();
        let capabilities = value.get("capabilities").cloned().unwrap_or(Value::Null);

        log::info!("Started WebDriver session {} on {}", session_id, remote_url);

        Ok(Self {
            client,
            remote_url,
            session_id,
            capabilities,
            closed: AtomicBool::new(false),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Capabilities the remote end reported for this session
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    /// Send a session command and return its `value`
    ///
    /// `path` is relative to the session, e.g. `"url"` or `"window/rect"`.
    pub async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed("selenium".to_string()).into());
        }

        let url = if path.is_empty() {
            format!("{}/session/{}", self.remote_url, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.remote_url, self.session_id, path)
        };

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        } else if method == Method::POST {
            request = request.json(&json!({}));
        }

        let response = request.send().await.map_err(|e| SeleniumError::Command {
            command: path.to_string(),
            error: "transport".to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| SeleniumError::Protocol(format!("Invalid response to {}: {}", path, e)))?;

        if !status.is_success() {
            let (error, message) = error_details(&payload);
            return Err(SeleniumError::Command {
                command: path.to_string(),
                error,
                message,
            }
            .into());
        }

        Ok(payload.get("value").cloned().unwrap_or(Value::Null))
    }

    pub async fn navigate_to(&self, url: &str) -> Result<()> {
        log::debug!("Navigating to {}", url);
        self.command(Method::POST, "url", Some(json!({ "url": url }))).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self.command(Method::GET, "url", None).await?;
        as_string(value, "url")
    }

    pub async fn title(&self) -> Result<String> {
        let value = self.command(Method::GET, "title", None).await?;
        as_string(value, "title")
    }

    pub async fn page_source(&self) -> Result<String> {
        let value = self.command(Method::GET, "source", None).await?;
        as_string(value, "source")
    }

    /// Screenshot of the current viewport as PNG bytes
    pub async fn screenshot_png(&self) -> Result<Vec<u8>> {
        let value = self.command(Method::GET, "screenshot", None).await?;
        let encoded = as_string(value, "screenshot")?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SeleniumError::Protocol(format!("Screenshot is not valid base64: {}", e)).into())
    }

    pub async fn maximize_window(&self) -> Result<()> {
        self.command(Method::POST, "window/maximize", None).await?;
        Ok(())
    }

    pub async fn set_window_size(&self, width: u32, height: u32) -> Result<()> {
        self.command(
            Method::POST,
            "window/rect",
            Some(json!({ "width": width, "height": height })),
        )
        .await?;
        Ok(())
    }

    pub async fn set_page_load_timeout(&self, timeout: Duration) -> Result<()> {
        self.command(
            Method::POST,
            "timeouts",
            Some(json!({ "pageLoad": timeout.as_millis() as u64 })),
        )
        .await?;
        Ok(())
    }

    /// End the session; later calls are no-ops
    pub async fn quit(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let url = format!("{}/session/{}", self.remote_url, self.session_id);
        let response = self.client.delete(&url).send().await.map_err(|e| SeleniumError::Command {
            command: "quit".to_string(),
            error: "transport".to_string(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            let payload: Value = response.json().await.unwrap_or(Value::Null);
            let (error, message) = error_details(&payload);
            return Err(SeleniumError::Command {
                command: "quit".to_string(),
                error,
                message,
            }
            .into());
        }

        log::info!("Quit WebDriver session {}", self.session_id);
        Ok(())
    }
}

fn error_details(payload: &Value) -> (String, String) {
    let value = payload.get("value");
    let error = value
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    (error, message)
}

fn as_string(value: Value, command: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(SeleniumError::Protocol(format!("Expected a string from {} but got {}", command, other)).into()),
    }
}

#[async_trait]
impl ManagedDriver for WebDriverSession {
    fn kind(&self) -> &'static str {
        "selenium"
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.quit().await
    }
}
