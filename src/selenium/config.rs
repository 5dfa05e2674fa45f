use std::time::Duration;

use super::browser::{BrowserSize, BrowserType};
use crate::config::ConfigProvider;
use crate::error::Result;

/// Section holding the browser settings
pub const SELENIUM_SECTION: &str = "SeleniumMaqs";

pub const DEFAULT_HUB_URL: &str = "http://localhost:4444";

/// Browser session settings
#[derive(Debug, Clone, PartialEq)]
pub struct SeleniumConfig {
    pub browser: BrowserType,
    /// Browser name requested from the hub when `browser` is remote
    pub remote_browser: Option<String>,
    pub remote_browser_version: Option<String>,
    pub remote_platform: Option<String>,
    /// WebDriver endpoint sessions are created on
    pub hub_url: String,
    pub web_site_base: Option<String>,
    /// Page load timeout
    pub browser_timeout: Duration,
    /// HTTP timeout for a single WebDriver command
    pub command_timeout: Duration,
    pub browser_size: BrowserSize,
}

impl Default for SeleniumConfig {
    fn default() -> Self {
        Self {
            browser: BrowserType::Chrome,
            remote_browser: None,
            remote_browser_version: None,
            remote_platform: None,
            hub_url: DEFAULT_HUB_URL.to_string(),
            web_site_base: None,
            browser_timeout: Duration::from_millis(20_000),
            command_timeout: Duration::from_millis(60_000),
            browser_size: BrowserSize::Maximize,
        }
    }
}

impl SeleniumConfig {
    pub fn from_provider(config: &dyn ConfigProvider) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| config.get_value(SELENIUM_SECTION, key);

        let browser = match get("Browser") {
            Some(name) => name.parse::<BrowserType>()?,
            None => defaults.browser,
        };
        let browser_size = match get("BrowserSize") {
            Some(size) => size.parse::<BrowserSize>()?,
            None => defaults.browser_size,
        };

        Ok(Self {
            browser,
            remote_browser: get("RemoteBrowser"),
            remote_browser_version: get("RemoteBrowserVersion"),
            remote_platform: get("RemotePlatform"),
            hub_url: get("HubUrl").unwrap_or(defaults.hub_url),
            web_site_base: get("WebSiteBase"),
            browser_timeout: config.get_duration_ms(SELENIUM_SECTION, "BrowserTimeout", defaults.browser_timeout)?,
            command_timeout: config.get_duration_ms(
                SELENIUM_SECTION,
                "SeleniumCommandTimeout",
                defaults.command_timeout,
            )?,
            browser_size,
        })
    }
}
