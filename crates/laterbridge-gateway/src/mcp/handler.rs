//! Laterbridge MCP Handler
//!
//! Implements the MCP `ServerHandler` trait for the three reading-list tools.
//! Over HTTP every request carries its own credentials and gets its own
//! client; over stdio one client lives for the whole process.

use std::sync::Arc;

use laterbridge_client::{ReadLaterClient, TokenObserver};
use laterbridge_core::{branding, CredentialPair, ProviderConfig};
use rmcp::{
    model::*, service::RequestContext, ErrorData as McpError, RoleServer, ServerHandler,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credentials::credentials_from_parts;
use super::tools;

#[derive(Clone)]
pub struct ReadLaterHandler {
    provider: Arc<ProviderConfig>,
    http: reqwest::Client,
    observer: Option<Arc<dyn TokenObserver>>,
    /// Process-wide client (stdio); calls are serialized behind the mutex
    session: Option<Arc<Mutex<ReadLaterClient>>>,
}

impl ReadLaterHandler {
    /// Handler that reads credentials from each HTTP request
    pub fn per_request(provider: Arc<ProviderConfig>, http: reqwest::Client) -> Self {
        Self {
            provider,
            http,
            observer: None,
            session: None,
        }
    }

    /// Handler bound to one long-lived client
    pub fn with_session(
        provider: Arc<ProviderConfig>,
        http: reqwest::Client,
        client: ReadLaterClient,
    ) -> Self {
        Self {
            provider,
            http,
            observer: None,
            session: Some(Arc::new(Mutex::new(client))),
        }
    }

    /// Observer attached to every per-request client
    pub fn with_observer(mut self, observer: Arc<dyn TokenObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn request_client(&self, pair: CredentialPair) -> ReadLaterClient {
        let client = ReadLaterClient::new(self.http.clone(), self.provider.clone(), pair);
        match &self.observer {
            Some(observer) => client.with_observer(observer.clone()),
            None => client,
        }
    }

    async fn run_tool(
        &self,
        params: CallToolRequestParams,
        extensions: &Extensions,
    ) -> Result<CallToolResult, McpError> {
        if let Some(session) = &self.session {
            let mut client = session.lock().await;
            return tools::dispatch(&mut client, &params.name, params.arguments).await;
        }

        let pair = extensions
            .get::<http::request::Parts>()
            .and_then(credentials_from_parts);
        match pair {
            Some(pair) => {
                let mut client = self.request_client(pair);
                tools::dispatch(&mut client, &params.name, params.arguments).await
            }
            None => {
                warn!(tool = %params.name, "[Gateway] Tool call without credentials");
                Ok(CallToolResult::error(vec![Content::text(format!(
                    "Not authenticated. Provide {} and {}, or sign in through the OAuth flow.",
                    branding::env_var("ACCESS_TOKEN"),
                    branding::env_var("REFRESH_TOKEN")
                ))]))
            }
        }
    }
}

impl ServerHandler for ReadLaterHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools_with(ToolsCapability {
                    list_changed: Some(false),
                })
                .build(),
            server_info: Implementation {
                name: branding::SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "{} reads and updates your read-later library. Use list_articles to browse \
                 the queue, get_article for details and highlights, and save_article to add \
                 a page.",
                branding::DISPLAY_NAME
            )),
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = tools::tool_definitions();
        debug!(count = tools.len(), "list_tools");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        info!(tool = %params.name, "call_tool");
        let tool = params.name.clone();

        let result = self.run_tool(params, &context.extensions).await?;
        debug!(
            tool = %tool,
            is_error = result.is_error.unwrap_or(false),
            "call_tool result"
        );
        Ok(result)
    }
}
