use reqwest::ClientBuilder;
use serde_json::{json, Map, Value};
use std::str::FromStr;

use super::config::SeleniumConfig;
use super::session::WebDriverSession;
use crate::error::{ConfigError, Result, SeleniumError};

/// Browsers a session can be requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserType {
    Chrome,
    HeadlessChrome,
    Firefox,
    Edge,
    /// Browser chosen by the `RemoteBrowser` setting
    Remote,
}

impl FromStr for BrowserType {
    type Err = SeleniumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserType::Chrome),
            "headlesschrome" => Ok(BrowserType::HeadlessChrome),
            "firefox" => Ok(BrowserType::Firefox),
            "edge" => Ok(BrowserType::Edge),
            "remote" => Ok(BrowserType::Remote),
            _ => Err(SeleniumError::UnsupportedBrowser(s.to_string())),
        }
    }
}

/// Initial browser window size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserSize {
    Maximize,
    /// Leave the window as the browser opened it
    Default,
    Exact { width: u32, height: u32 },
}

impl FromStr for BrowserSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        match trimmed.as_str() {
            "maximize" => return Ok(BrowserSize::Maximize),
            "default" => return Ok(BrowserSize::Default),
            _ => {}
        }

        let parsed = trimmed
            .split_once('x')
            .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)));

        match parsed {
            Some((width, height)) if width > 0 && height > 0 => Ok(BrowserSize::Exact { width, height }),
            _ => Err(ConfigError::UnsupportedValue {
                key: "BrowserSize".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

fn remote_browser_name(name: &str) -> Result<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "chrome" => Ok("chrome"),
        "firefox" => Ok("firefox"),
        "edge" => Ok("MicrosoftEdge"),
        "safari" => Ok("safari"),
        "ie" | "internetexplorer" => Ok("internet explorer"),
        _ => Err(SeleniumError::UnsupportedBrowser(name.to_string()).into()),
    }
}

/// W3C capabilities requested for the configured browser
pub fn capabilities_for(config: &SeleniumConfig) -> Result<Value> {
    let mut capabilities = Map::new();

    match config.browser {
        BrowserType::Chrome => {
            capabilities.insert("browserName".to_string(), json!("chrome"));
            capabilities.insert(
                "goog:chromeOptions".to_string(),
                json!({ "args": ["--disable-extensions"] }),
            );
        }
        BrowserType::HeadlessChrome => {
            let mut args = vec!["--headless=new".to_string(), "--disable-gpu".to_string()];
            if let BrowserSize::Exact { width, height } = config.browser_size {
                args.push(format!("--window-size={},{}", width, height));
            }
            capabilities.insert("browserName".to_string(), json!("chrome"));
            capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        }
        BrowserType::Firefox => {
            capabilities.insert("browserName".to_string(), json!("firefox"));
        }
        BrowserType::Edge => {
            capabilities.insert("browserName".to_string(), json!("MicrosoftEdge"));
        }
        BrowserType::Remote => {
            let requested = config.remote_browser.as_deref().ok_or_else(|| ConfigError::MissingValue {
                section: super::config::SELENIUM_SECTION.to_string(),
                key: "RemoteBrowser".to_string(),
            })?;
            let browser_name = remote_browser_name(requested)?;
            capabilities.insert("browserName".to_string(), json!(browser_name));
            if let Some(ref version) = config.remote_browser_version {
                capabilities.insert("browserVersion".to_string(), json!(version));
            }
            if let Some(ref platform) = config.remote_platform {
                capabilities.insert("platformName".to_string(), json!(platform));
            }
        }
    }

    capabilities.insert(
        "timeouts".to_string(),
        json!({ "pageLoad": config.browser_timeout.as_millis() as u64 }),
    );

    Ok(Value::Object(capabilities))
}

/// Start a session for the configured browser and apply the window size
pub async fn create_session(config: &SeleniumConfig) -> Result<WebDriverSession> {
    let capabilities = capabilities_for(config)?;
    let client = ClientBuilder::new()
        .timeout(config.command_timeout)
        .build()
        .map_err(|e| SeleniumError::SessionCreation(format!("Failed to build HTTP client: {}", e)))?;

    let session = WebDriverSession::start(client, &config.hub_url, capabilities).await?;

    let sized = match config.browser_size {
        BrowserSize::Maximize => session.maximize_window().await,
        BrowserSize::Exact { width, height } if config.browser != BrowserType::HeadlessChrome => {
            session.set_window_size(width, height).await
        }
        _ => Ok(()),
    };

    // Don't leak a browser we could not set up
    if let Err(e) = sized {
        if let Err(quit_error) = session.quit().await {
            log::warn!("Failed to quit session after setup error: {}", quit_error);
        }
        return Err(e);
    }

    Ok(session)
}
