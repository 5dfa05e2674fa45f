use chrono::Utc;
use std::path::PathBuf;

use super::session::WebDriverSession;
use crate::error::Result;
use crate::logging::{sanitize_file_name, MessageType};
use crate::test_object::TestObject;

fn artifact_path(test_object: &TestObject, suffix: &str, extension: &str) -> PathBuf {
    let name = format!(
        "{}{} - {}.{}",
        test_object.name(),
        suffix,
        Utc::now().format("%Y-%m-%d-%H-%M-%S-%3f"),
        extension
    );
    test_object.log_dir().join(sanitize_file_name(&name))
}

/// Save a screenshot next to the test log and associate it with the test
pub async fn capture_screenshot(
    session: &WebDriverSession,
    test_object: &TestObject,
    suffix: &str,
) -> Result<PathBuf> {
    let png = session.screenshot_png().await?;
    let path = artifact_path(test_object, suffix, "png");

    tokio::fs::create_dir_all(test_object.log_dir()).await?;
    tokio::fs::write(&path, png).await?;
    test_object.add_associated_file(&path);
    test_object.log(MessageType::Information, &format!("Screenshot saved: {}", path.display()));

    Ok(path)
}

/// Save the current page source next to the test log and associate it with the test
pub async fn save_page_source(
    session: &WebDriverSession,
    test_object: &TestObject,
    suffix: &str,
) -> Result<PathBuf> {
    let source = session.page_source().await?;
    let path = artifact_path(test_object, suffix, "txt");

    tokio::fs::create_dir_all(test_object.log_dir()).await?;
    tokio::fs::write(&path, source).await?;
    test_object.add_associated_file(&path);
    test_object.log(MessageType::Information, &format!("Page source saved: {}", path.display()));

    Ok(path)
}
