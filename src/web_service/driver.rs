use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::config::WebServiceConfig;
use crate::driver::ManagedDriver;
use crate::error::{DriverError, Result, WebServiceError};

/// HTTP methods supported by the web service driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// A request relative to the driver's base URL (or absolute)
#[derive(Debug, Clone)]
pub struct WebRequest {
    pub method: HttpMethod,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    /// Sent as `Accept`, and as `Content-Type` when a body is present
    pub media_type: Option<String>,
    pub body: Option<String>,
    pub expected_status: Option<u16>,
}

impl WebRequest {
    pub fn new(method: HttpMethod, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            media_type: None,
            body: None,
            expected_status: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_body(mut self, media_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as a JSON body
    pub fn with_json<T: Serialize>(self, value: &T) -> std::result::Result<Self, WebServiceError> {
        let body = serde_json::to_string(value)?;
        Ok(self.with_body("application/json", body))
    }

    /// Fail the request unless the response has this status
    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }
}

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct WebResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration: Duration,
}

impl WebResponse {
    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, WebServiceError> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Web service capability set
#[async_trait]
pub trait WebService: ManagedDriver {
    /// Base URL relative request URIs are resolved against
    fn base_url(&self) -> &Url;

    /// Send a request and read the whole response
    async fn send(&self, request: WebRequest) -> Result<WebResponse>;

    async fn get(&self, uri: &str, media_type: &str, expected_status: Option<u16>) -> Result<WebResponse> {
        let request = WebRequest::new(HttpMethod::Get, uri).with_media_type(media_type);
        self.send(with_expected(request, expected_status)).await
    }

    async fn post(
        &self,
        uri: &str,
        media_type: &str,
        content: String,
        expected_status: Option<u16>,
    ) -> Result<WebResponse> {
        let request = WebRequest::new(HttpMethod::Post, uri).with_body(media_type, content);
        self.send(with_expected(request, expected_status)).await
    }

    async fn put(
        &self,
        uri: &str,
        media_type: &str,
        content: String,
        expected_status: Option<u16>,
    ) -> Result<WebResponse> {
        let request = WebRequest::new(HttpMethod::Put, uri).with_body(media_type, content);
        self.send(with_expected(request, expected_status)).await
    }

    async fn patch(
        &self,
        uri: &str,
        media_type: &str,
        content: String,
        expected_status: Option<u16>,
    ) -> Result<WebResponse> {
        let request = WebRequest::new(HttpMethod::Patch, uri).with_body(media_type, content);
        self.send(with_expected(request, expected_status)).await
    }

    async fn delete(&self, uri: &str, media_type: &str, expected_status: Option<u16>) -> Result<WebResponse> {
        let request = WebRequest::new(HttpMethod::Delete, uri).with_media_type(media_type);
        self.send(with_expected(request, expected_status)).await
    }

    fn as_any(&self) -> &dyn Any;
}

fn with_expected(request: WebRequest, expected_status: Option<u16>) -> WebRequest {
    match expected_status {
        Some(status) => request.expect_status(status),
        None => request,
    }
}

/// Resolve a request URI against a base URL
pub fn resolve_uri(base: &Url, uri: &str) -> std::result::Result<Url, WebServiceError> {
    base.join(uri)
        .map_err(|e| WebServiceError::InvalidUrl(format!("{}: {}", uri, e)))
}

/// Plain HTTP driver over a shared `reqwest` client
pub struct WebServiceDriver {
    client: Client,
    base_url: Url,
    timeout: Duration,
    closed: AtomicBool,
}

impl WebServiceDriver {
    pub fn new(client: Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &WebServiceConfig) -> std::result::Result<Self, WebServiceError> {
        let client = config.build_client()?;
        Ok(Self::new(client, config.base_url.clone(), config.timeout))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_transport_error(&self, error: reqwest::Error) -> WebServiceError {
        if error.is_timeout() {
            WebServiceError::Timeout { timeout: self.timeout }
        } else if error.is_connect() {
            WebServiceError::Connection(error.to_string())
        } else {
            WebServiceError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl ManagedDriver for WebServiceDriver {
    fn kind(&self) -> &'static str {
        "web service"
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        // The client's connection pool is released when the last handle drops
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl WebService for WebServiceDriver {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn send(&self, request: WebRequest) -> Result<WebResponse> {
        if !self.is_open() {
            return Err(DriverError::Closed(self.kind().to_string()).into());
        }

        let url = resolve_uri(&self.base_url, &request.uri)?;
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), url)
            .timeout(self.timeout);

        if let Some(ref media_type) = request.media_type {
            builder = builder.header(reqwest::header::ACCEPT, media_type.as_str());
            if request.body.is_some() {
                builder = builder.header(reqwest::header::CONTENT_TYPE, media_type.as_str());
            }
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let start_time = Instant::now();
        let response = builder.send().await.map_err(|e| self.map_transport_error(e))?;
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.to_string(), value.to_string());
            }
        }

        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;
        let duration = start_time.elapsed();
        log::debug!("{} {} returned {} in {:?}", request.method, request.uri, status, duration);

        if let Some(expected) = request.expected_status {
            if expected != status {
                return Err(WebServiceError::UnexpectedStatus {
                    expected,
                    actual: status,
                    body,
                }
                .into());
            }
        }

        Ok(WebResponse {
            status,
            headers,
            body,
            duration,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("http://localhost:5000/api/").unwrap();
        assert_eq!(
            resolve_uri(&base, "items/1").unwrap().as_str(),
            "http://localhost:5000/api/items/1"
        );
        assert_eq!(
            resolve_uri(&base, "/health").unwrap().as_str(),
            "http://localhost:5000/health"
        );
        assert_eq!(
            resolve_uri(&base, "https://example.com/x").unwrap().as_str(),
            "https://example.com/x"
        );
    }

    #[test]
    fn test_request_builder() {
        let request = WebRequest::new(HttpMethod::Post, "items")
            .with_json(&serde_json::json!({"name": "widget"}))
            .unwrap()
            .with_header("X-Trace", "1")
            .expect_status(201);

        assert_eq!(request.media_type.as_deref(), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"widget"}"#));
        assert_eq!(request.expected_status, Some(201));
        assert_eq!(request.method.to_string(), "POST");
    }

    #[test]
    fn test_response_helpers() {
        let response = WebResponse {
            status: 200,
            headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: r#"{"id":7}"#.to_string(),
            duration: Duration::from_millis(3),
        };

        assert!(response.is_success());
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
    }

    #[tokio::test]
    async fn test_closed_driver_rejects_requests() {
        let driver = WebServiceDriver::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            Duration::from_secs(1),
        );
        driver.close().await.unwrap();
        assert!(!driver.is_open());

        let err = driver.get("x", "text/plain", None).await.unwrap_err();
        assert!(matches!(err, crate::error::MaqsError::Driver(DriverError::Closed(_))));
        assert_eq!(err.to_string(), "Driver error: The web service driver has been closed");
    }
}
