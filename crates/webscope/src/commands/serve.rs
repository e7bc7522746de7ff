use crate::logging;
use std::sync::Arc;
use tracing::info;
use webscope_config::{Settings, drop_privileges};
use webscope_core::Browser;

/// 環境変数の設定に CLI の --host / --port を上書きする
pub fn resolve_settings(host: Option<String>, port: Option<u16>) -> anyhow::Result<Settings> {
    let mut settings = Settings::from_env()?;
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    Ok(settings)
}

pub async fn handle(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let settings = resolve_settings(host, port)?;

    logging::init_stderr(&settings.log_level);
    info!("Log level is {}", settings.log_level);

    drop_privileges(settings.uid, settings.gid)?;

    let addr = settings.bind_addr()?;
    let browser = Arc::new(Browser::new(&settings)?);
    webscope_mcp::run_http_server(browser, addr).await
}
