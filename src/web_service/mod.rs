//! HTTP web service driver

pub mod config;
pub mod driver;
pub mod event_firing;
pub mod manager;

pub use config::{WebServiceConfig, WEB_SERVICE_SECTION};
pub use driver::{resolve_uri, HttpMethod, WebRequest, WebResponse, WebService, WebServiceDriver};
pub use event_firing::EventFiringWebServiceDriver;
pub use manager::WebServiceDriverManager;
