//! Browser sessions over the W3C WebDriver protocol

pub mod artifacts;
pub mod browser;
pub mod config;
pub mod manager;
pub mod session;

pub use artifacts::{capture_screenshot, save_page_source};
pub use browser::{capabilities_for, create_session, BrowserSize, BrowserType};
pub use config::{SeleniumConfig, DEFAULT_HUB_URL, SELENIUM_SECTION};
pub use manager::SeleniumDriverManager;
pub use session::WebDriverSession;
