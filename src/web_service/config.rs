use reqwest::{Client, ClientBuilder, Proxy, Url};
use std::time::Duration;

use crate::config::ConfigProvider;
use crate::error::{ConfigError, WebServiceError};

/// Section holding the web service settings
pub const WEB_SERVICE_SECTION: &str = "WebServiceMaqs";

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Web service driver settings
#[derive(Debug, Clone, PartialEq)]
pub struct WebServiceConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

impl WebServiceConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the web service settings from a provider
    pub fn from_provider(config: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let raw_url = config.get_required(WEB_SERVICE_SECTION, "WebServiceUri")?;
        let base_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidValue {
            key: "WebServiceUri".to_string(),
            value: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let timeout = config.get_duration_ms(WEB_SERVICE_SECTION, "WebServiceTimeout", DEFAULT_TIMEOUT)?;

        let proxy = if config.get_bool(WEB_SERVICE_SECTION, "UseProxy", false)? {
            Some(config.get_required(WEB_SERVICE_SECTION, "ProxyAddress")?)
        } else {
            None
        };

        Ok(Self {
            base_url,
            timeout,
            proxy,
        })
    }

    /// Build an HTTP client honoring the timeout and proxy settings
    pub fn build_client(&self) -> Result<Client, WebServiceError> {
        let mut builder = ClientBuilder::new()
            .timeout(self.timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(format!("maqs/{}", env!("CARGO_PKG_VERSION")));

        if let Some(ref address) = self.proxy {
            let proxy = Proxy::all(address.as_str())
                .map_err(|e| WebServiceError::InvalidUrl(format!("Invalid proxy {}: {}", address, e)))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| WebServiceError::Request(format!("Failed to build HTTP client: {}", e)))
    }
}
