use async_trait::async_trait;
use reqwest::Url;
use std::any::Any;
use std::sync::Arc;

use super::driver::{resolve_uri, WebRequest, WebResponse, WebService};
use crate::driver::ManagedDriver;
use crate::error::Result;
use crate::event::EventEmitter;

const PREVIEW_LIMIT: usize = 1024;

/// Web service driver that reports every request on the test's event bus
///
/// Each request raises an action event before it is sent and a completed event
/// after the response is read. A failed request raises one error event and the
/// error is returned unchanged.
pub struct EventFiringWebServiceDriver {
    inner: Arc<dyn WebService>,
    emitter: EventEmitter,
}

impl EventFiringWebServiceDriver {
    pub fn new(inner: Arc<dyn WebService>, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }

    /// The undecorated driver
    pub fn inner(&self) -> &Arc<dyn WebService> {
        &self.inner
    }

    fn describe_uri(&self, uri: &str) -> String {
        resolve_uri(self.inner.base_url(), uri)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| uri.to_string())
    }
}

pub(crate) fn preview(content: &str) -> String {
    if content.len() <= PREVIEW_LIMIT {
        return content.to_string();
    }

    let mut end = PREVIEW_LIMIT;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes)", &content[..end], content.len())
}

#[async_trait]
impl ManagedDriver for EventFiringWebServiceDriver {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

#[async_trait]
impl WebService for EventFiringWebServiceDriver {
    fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    async fn send(&self, request: WebRequest) -> Result<WebResponse> {
        let method = request.method;
        let uri = self.describe_uri(&request.uri);
        let media_type = request.media_type.clone().unwrap_or_else(|| "no media type".to_string());

        self.emitter
            .action(format!("Sending {} request to {} ({})", method, uri, media_type));
        if let Some(ref body) = request.body {
            self.emitter.verbose(format!("Request content: {}", preview(body)));
        }

        match self.inner.send(request).await {
            Ok(response) => {
                self.emitter
                    .completed(format!("Received {} response from {}", response.status, uri));
                if !response.body.is_empty() {
                    self.emitter.verbose(format!("Response content: {}", preview(&response.body)));
                }
                Ok(response)
            }
            Err(e) => {
                self.emitter.error(&format!("{} request to {} failed", method, uri), &e);
                Err(e)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
