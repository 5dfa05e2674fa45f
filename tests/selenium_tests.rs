mod common;

use common::{spawn_server, test_object, webdriver_router, STUB_PAGE_SOURCE, STUB_PNG, STUB_SESSION_ID};
use maqs::config::Config;
use maqs::driver::ManagedDriver;
use maqs::error::{DriverError, MaqsError, SeleniumError};
use maqs::logging::LoggingEnabled;
use maqs::selenium::{
    capture_screenshot, create_session, save_page_source, BrowserSize, SeleniumConfig, SeleniumDriverManager,
    WebDriverSession, SELENIUM_SECTION,
};
use maqs::test_object::TestObject;
use reqwest::Method;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;

fn hub_config(addr: SocketAddr) -> Config {
    Config::new().with_value(SELENIUM_SECTION, "HubUrl", format!("http://{}", addr))
}

fn register(test_object: &TestObject) -> Arc<SeleniumDriverManager> {
    let manager = Arc::new(SeleniumDriverManager::from_config(&test_object.driver_context()));
    test_object.managers().add_default(manager.clone()).unwrap();
    manager
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (router, stub) = webdriver_router();
    let addr = spawn_server(router).await;

    let config = SeleniumConfig {
        hub_url: format!("http://{}/", addr),
        ..SeleniumConfig::default()
    };
    let session = create_session(&config).await.unwrap();

    assert_eq!(session.session_id(), STUB_SESSION_ID);
    assert_eq!(session.capabilities()["browserName"], "chrome");
    assert_eq!(stub.commands.lock().as_slice(), ["maximize"]);

    let requested = stub.requested_capabilities.lock().clone().unwrap();
    assert_eq!(requested["browserName"], "chrome");
    assert_eq!(requested["timeouts"]["pageLoad"], 20_000);

    session.navigate_to("http://example.test/home").await.unwrap();
    assert_eq!(session.current_url().await.unwrap(), "http://example.test/home");
    assert_eq!(session.title().await.unwrap(), "Stub Page");
    assert_eq!(session.page_source().await.unwrap(), STUB_PAGE_SOURCE);
    assert_eq!(session.screenshot_png().await.unwrap(), STUB_PNG);

    session.quit().await.unwrap();
    session.quit().await.unwrap();
    assert_eq!(stub.deleted(), 1);
    assert!(!session.is_open());
    assert!(matches!(
        session.title().await,
        Err(MaqsError::Driver(DriverError::Closed(_)))
    ));
}

#[tokio::test]
async fn test_exact_size_is_applied() {
    let (router, stub) = webdriver_router();
    let addr = spawn_server(router).await;

    let config = SeleniumConfig {
        hub_url: format!("http://{}", addr),
        browser_size: BrowserSize::Exact { width: 1024, height: 768 },
        ..SeleniumConfig::default()
    };
    create_session(&config).await.unwrap();

    assert_eq!(stub.commands.lock().as_slice(), ["rect 1024x768"]);
}

#[tokio::test]
async fn test_command_error_carries_webdriver_details() {
    let (router, _) = webdriver_router();
    let addr = spawn_server(router).await;
    let session = WebDriverSession::start(reqwest::Client::new(), &format!("http://{}", addr), json!({}))
        .await
        .unwrap();

    let result = session
        .command(Method::POST, "element", Some(json!({ "using": "css selector", "value": "#gone" })))
        .await;

    match result {
        Err(MaqsError::Selenium(SeleniumError::Command { command, error, message })) => {
            assert_eq!(command, "element");
            assert_eq!(error, "no such element");
            assert_eq!(message, "Unable to locate element");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_hub_fails_session_creation() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = SeleniumConfig {
        hub_url: format!("http://{}", addr),
        ..SeleniumConfig::default()
    };
    assert!(matches!(
        create_session(&config).await,
        Err(MaqsError::Selenium(SeleniumError::SessionCreation(_)))
    ));
}

#[tokio::test]
async fn test_manager_starts_browser_lazily_and_quits_on_dispose() {
    let (router, stub) = webdriver_router();
    let addr = spawn_server(router).await;
    let (test_object, _) = test_object(hub_config(addr), LoggingEnabled::No);
    let manager = register(&test_object);

    assert!(!manager.is_initialized());
    assert_eq!(stub.created(), 0);

    let first = test_object.web_driver().await.unwrap();
    let second = test_object.web_driver().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(stub.created(), 1);

    test_object.dispose().await.unwrap();
    assert_eq!(stub.deleted(), 1);
}

#[tokio::test]
async fn test_override_session_quits_previous_browser() {
    let (router, stub) = webdriver_router();
    let addr = spawn_server(router).await;
    let (test_object, _) = test_object(hub_config(addr), LoggingEnabled::No);
    register(&test_object);

    let original = test_object.web_driver().await.unwrap();
    let replacement = WebDriverSession::start(reqwest::Client::new(), &format!("http://{}", addr), json!({}))
        .await
        .unwrap();
    test_object.override_web_driver(replacement).await.unwrap();

    assert!(!original.is_open());
    assert_eq!(stub.deleted(), 1);
    assert!(test_object.web_driver().await.unwrap().is_open());
}

#[tokio::test]
async fn test_unsupported_browser_fails_on_first_use() {
    let (test_object, _) = test_object(
        Config::new().with_value(SELENIUM_SECTION, "Browser", "Netscape"),
        LoggingEnabled::No,
    );
    let manager = register(&test_object);

    assert!(matches!(
        test_object.web_driver().await,
        Err(MaqsError::Selenium(SeleniumError::UnsupportedBrowser(ref name))) if name == "Netscape"
    ));
    assert!(!manager.is_initialized());
}

#[tokio::test]
async fn test_artifacts_are_written_and_associated() {
    let (router, _) = webdriver_router();
    let addr = spawn_server(router).await;
    let dir = TempDir::new().unwrap();
    let (test_object, logger) = test_object(hub_config(addr), LoggingEnabled::Yes);
    let test_object = test_object.with_log_dir(dir.path());
    register(&test_object);

    let session = test_object.web_driver().await.unwrap();
    let screenshot = capture_screenshot(&session, &test_object, "").await.unwrap();
    let source = save_page_source(&session, &test_object, "_PS").await.unwrap();

    assert_eq!(std::fs::read(&screenshot).unwrap(), STUB_PNG);
    assert_eq!(std::fs::read_to_string(&source).unwrap(), STUB_PAGE_SOURCE);
    assert!(screenshot.starts_with(dir.path()));
    assert!(source.file_name().unwrap().to_string_lossy().contains("_PS"));
    assert!(test_object.contains_associated_file(&screenshot));
    assert!(test_object.contains_associated_file(&source));
    assert!(logger.contains("Screenshot saved"));
}
