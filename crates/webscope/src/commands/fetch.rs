use crate::logging;
use colored::Colorize;
use std::collections::BTreeMap;
use webscope_config::Settings;
use webscope_core::Browser;

/// `key=selector` 形式の引数を分解
pub fn parse_selector_arg(raw: &str) -> Result<(String, String), String> {
    let (key, selector) = raw
        .split_once('=')
        .ok_or_else(|| format!("'{}' は key=selector の形式ではありません", raw))?;
    let key = key.trim();
    let selector = selector.trim();
    if key.is_empty() || selector.is_empty() {
        return Err(format!("'{}' のキーまたはセレクタが空です", raw));
    }
    Ok((key.to_string(), selector.to_string()))
}

pub async fn handle(url: &str, selectors: Vec<(String, String)>) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    logging::init_stderr(&settings.log_level);

    let selectors: BTreeMap<String, String> = selectors.into_iter().collect();
    let browser = Browser::new(&settings)?;

    match browser.browse(url, &selectors).await {
        Ok(content) => {
            println!("{}", serde_json::to_string_pretty(&content.to_json())?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e.user_message());
            anyhow::bail!("{} の取得に失敗しました", url)
        }
    }
}
