//! Tool catalogue and dispatch
//!
//! Argument problems the model can fix (bad id, bad URL) come back as tool
//! errors so the call can be retried; arguments that do not match the schema
//! at all are protocol errors.

use std::sync::Arc;

use laterbridge_client::ReadLaterClient;
use laterbridge_core::ProviderError;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use rmcp::ErrorData as McpError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use url::Url;

use super::format;

pub const LIST_ARTICLES: &str = "list_articles";
pub const GET_ARTICLE: &str = "get_article";
pub const SAVE_ARTICLE: &str = "save_article";

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

pub fn tool_definitions() -> Vec<Tool> {
    vec![
        Tool::new(
            LIST_ARTICLES,
            "List articles in your reading queue, newest first. Returns titles, authors, \
             reading progress and a cursor for fetching the next batch.",
            schema(json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of articles to return (1-100)",
                        "minimum": 1,
                        "maximum": MAX_LIMIT,
                        "default": DEFAULT_LIMIT
                    },
                    "cursor": {
                        "type": "string",
                        "description": "Cursor from a previous list_articles call"
                    }
                }
            })),
        ),
        Tool::new(
            GET_ARTICLE,
            "Get one article with its metadata, tags, notes and highlights.",
            schema(json!({
                "type": "object",
                "properties": {
                    "article_id": {
                        "type": "string",
                        "description": "Article ID as shown by list_articles"
                    }
                },
                "required": ["article_id"]
            })),
        ),
        Tool::new(
            SAVE_ARTICLE,
            "Save a web page to your reading queue.",
            schema(json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Absolute http(s) URL of the page to save"
                    }
                },
                "required": ["url"]
            })),
        ),
    ]
}

fn schema(value: Value) -> Arc<JsonObject> {
    match value {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetArgs {
    #[serde(default)]
    article_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SaveArgs {
    #[serde(default)]
    url: Option<String>,
}

/// Missing `limit` means the default; everything else lands in `1..=MAX_LIMIT`
pub fn clamp_limit(limit: Option<i64>) -> usize {
    match limit {
        None => DEFAULT_LIMIT,
        Some(n) => n.clamp(1, MAX_LIMIT as i64) as usize,
    }
}

/// Absolute http(s) URLs only
pub fn validate_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid URL {:?}: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(format!(
            "Invalid URL {:?}: expected an http or https address, got {}",
            raw, scheme
        )),
    }
}

/// Ids arrive as strings, but numbers are accepted and rendered as text
fn article_id(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(
    tool: &str,
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default()))
        .map_err(|e| McpError::invalid_params(format!("Invalid arguments for {}: {}", tool, e), None))
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

fn tool_error(text: String) -> CallToolResult {
    CallToolResult::error(vec![Content::text(text)])
}

fn provider_failure(tool: &str, error: &ProviderError) -> CallToolResult {
    warn!(tool = %tool, status = ?error.status(), "[Tools] Provider call failed: {}", error);
    let hint = if error.is_auth_expired() {
        " Sign in again to obtain new credentials."
    } else {
        ""
    };
    tool_error(format!("{}.{}", error, hint))
}

/// Run one tool against the session's client
pub async fn dispatch(
    client: &mut ReadLaterClient,
    name: &str,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    match name {
        LIST_ARTICLES => {
            let args: ListArgs = parse_args(name, arguments)?;
            let limit = clamp_limit(args.limit);
            let cursor = args
                .cursor
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty());
            info!(limit, has_cursor = cursor.is_some(), "[Tools] list_articles");

            Ok(match client.list_articles(limit, cursor).await {
                Ok(collection) => text_result(format::article_list(&collection)),
                Err(e) => provider_failure(name, &e),
            })
        }
        GET_ARTICLE => {
            let args: GetArgs = parse_args(name, arguments)?;
            let Some(id) = article_id(args.article_id) else {
                return Ok(tool_error("article_id must be a non-empty string".to_string()));
            };
            info!(article_id = %id, "[Tools] get_article");

            Ok(match client.find_article(&id).await {
                Ok(Some(item)) => text_result(format::article_detail(&item)),
                Ok(None) => text_result(format::not_found(&id)),
                Err(e) => provider_failure(name, &e),
            })
        }
        SAVE_ARTICLE => {
            let args: SaveArgs = parse_args(name, arguments)?;
            let raw = args.url.unwrap_or_default();
            let url = match validate_url(&raw) {
                Ok(url) => url,
                Err(message) => return Ok(tool_error(message)),
            };
            info!(host = url.host_str().unwrap_or("-"), "[Tools] save_article");

            Ok(match client.save_article(&url).await {
                Ok(result) => text_result(format::saved(url.as_str(), &result)),
                Err(e) => provider_failure(name, &e),
            })
        }
        other => Err(McpError::invalid_params(
            format!("Unknown tool: {}", other),
            None,
        )),
    }
}
