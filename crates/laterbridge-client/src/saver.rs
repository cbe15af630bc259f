//! Enqueue a URL in the reading list

use laterbridge_core::{ProviderError, SaveResult};
use reqwest::Method;
use serde_json::json;
use tracing::info;
use url::Url;

use crate::executor::AuthedExecutor;
use crate::normalize;

/// One authenticated call; the provider fetches and parses the page itself.
/// Identifiers are returned exactly as the provider assigned them.
pub async fn save(executor: &mut AuthedExecutor, url: &Url) -> Result<SaveResult, ProviderError> {
    let endpoint = executor.resolve(&executor.config().save_path)?;
    let body = executor
        .execute(Method::POST, &endpoint, Some(&json!({ "url": url.as_str() })))
        .await?;
    let result = normalize::save_result(body)?;
    info!("[Saver] Saved {} as {}", url, result.id);
    Ok(result)
}
