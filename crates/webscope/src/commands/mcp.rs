use crate::logging;
use std::sync::Arc;
use webscope_config::Settings;
use webscope_core::Browser;

const LOG_PATH: &str = "/tmp/webscope-mcp.log";

pub async fn handle() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    logging::init_file(LOG_PATH, &settings.log_level);

    let browser = Arc::new(Browser::new(&settings)?);
    // rmcp SDK ベースの MCP サーバーを起動（stdio トランスポート）
    webscope_mcp::run_stdio_server(browser).await
}
