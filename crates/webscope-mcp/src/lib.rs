//! webscope MCP Server
//!
//! 公式 rmcp SDK を使用した MCP サーバー実装。
//! Web ページを取得して内容を抽出する `browse_webpage` ツールを提供する。
//! トランスポートは streamable HTTP（`/browser`）と stdio の2種類。

use anyhow::Result;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
    handler::server::{tool::ToolCallContext, tool::ToolRouter, wrapper::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_router,
    transport::streamable_http_server::{
        StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
    },
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use webscope_core::Browser;

/// HTTP トランスポートのマウント先
pub const MCP_PATH: &str = "/browser";

// ============================================================================
// パラメータ定義
// ============================================================================

/// ページ閲覧パラメータ
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BrowseParam {
    /// 取得するページの URL（http / https）
    pub url: String,
    /// 抽出キーと CSS セレクタの対応（例: {"headings": "h1, h2"}）
    #[serde(default)]
    pub selectors: Option<BTreeMap<String, String>>,
}

// ============================================================================
// MCP サーバー
// ============================================================================

/// webscope MCP サーバー
#[derive(Clone)]
pub struct BrowserServer {
    browser: Arc<Browser>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BrowserServer {
    pub fn new(browser: Arc<Browser>) -> Self {
        Self {
            browser,
            tool_router: Self::tool_router(),
        }
    }

    /// Web ページを閲覧
    #[tool(
        description = "Browse a webpage and extract its content. Returns JSON with the page title, the visible text, the list of links, and, for each entry of `selectors`, the text of every element matching that CSS selector. Pages behind an Anubis proof-of-work challenge are solved automatically."
    )]
    async fn browse_webpage(&self, params: Parameters<BrowseParam>) -> Result<String, String> {
        let BrowseParam { url, selectors } = params.0;
        let selectors = selectors.unwrap_or_default();

        let content = self
            .browser
            .browse(&url, &selectors)
            .await
            .map_err(|e| {
                warn!("browse_webpage failed for {}: {}", url, e);
                e.user_message()
            })?;

        serde_json::to_string_pretty(&content.to_json()).map_err(|e| format!("Error: {}", e))
    }
}

impl ServerHandler for BrowserServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "webscope MCP サーバー。browse_webpage で Web ページのタイトル・本文・リンクを取得できます。",
        )
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_context = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_context).await
    }
}

/// streamable HTTP トランスポート用のルーター
///
/// セッションを持たない（リクエストごとにサーバーインスタンスを作る）。
pub fn http_router(browser: Arc<Browser>) -> axum::Router {
    let mut config = StreamableHttpServerConfig::default();
    config.stateful_mode = false;

    let service = StreamableHttpService::new(
        move || Ok(BrowserServer::new(browser.clone())),
        LocalSessionManager::default().into(),
        config,
    );

    axum::Router::new().nest_service(MCP_PATH, service)
}

/// MCP サーバーを起動（streamable HTTP トランスポート）
///
/// Ctrl-C を受けると処理中のリクエストを終えてから停止する。
pub async fn run_http_server(browser: Arc<Browser>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind {}: {}", addr, e);
        anyhow::anyhow!("Failed to bind {}: {}", addr, e)
    })?;

    info!("Starting MCP server on {}{}", addr, MCP_PATH);

    axum::serve(listener, http_router(browser))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("MCP server error: {}", e);
            anyhow::anyhow!("MCP server error: {}", e)
        })?;

    Ok(())
}

/// MCP サーバーを起動（stdio トランスポート）
pub async fn run_stdio_server(browser: Arc<Browser>) -> Result<()> {
    let server = BrowserServer::new(browser);
    let transport = (tokio::io::stdin(), tokio::io::stdout());

    let service = server.serve(transport).await.map_err(|e| {
        error!("MCP server initialization failed: {}", e);
        anyhow::anyhow!("MCP server initialization failed: {}", e)
    })?;

    // サーバーが終了するまで待機
    service.waiting().await.map_err(|e| {
        error!("MCP server error: {}", e);
        anyhow::anyhow!("MCP server error: {}", e)
    })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutting down MCP server...");
}
