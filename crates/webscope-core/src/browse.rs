//! ページ閲覧
//!
//! 取得・Anubis 突破・抽出をひとまとめにした操作。

use crate::anubis::{AnubisSolver, is_anubis_page};
use crate::error::Result;
use crate::extract::{PageContent, extract, parse_selector};
use crate::fetch::{FetchOptions, Fetcher};
use std::collections::BTreeMap;
use tracing::{info, warn};
use webscope_config::Settings;

pub struct Browser {
    fetcher: Fetcher,
    solver: AnubisSolver,
}

impl Browser {
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_options(FetchOptions::from(settings))
    }

    pub fn with_options(options: FetchOptions) -> Result<Self> {
        let solver = AnubisSolver::new(options.user_agent.clone(), options.timeout);
        Ok(Self {
            fetcher: Fetcher::new(options)?,
            solver,
        })
    }

    /// ページを取得して内容を抽出する
    ///
    /// Anubis のチャレンジページが返った場合は突破を試み、失敗したときはチャレンジ
    /// ページのまま抽出する。
    pub async fn browse(
        &self,
        url: &str,
        selectors: &BTreeMap<String, String>,
    ) -> Result<PageContent> {
        for selector in selectors.values() {
            parse_selector(selector)?;
        }

        let page = self.fetcher.fetch(url).await?;
        let mut html = page.html;

        if is_anubis_page(&html) {
            info!("Anubis challenge detected at {}", page.url);
            match self.solver.solve(page.url.as_str()).await {
                Ok(Some(solved)) => html = solved,
                Ok(None) => warn!("Could not pass Anubis challenge at {}", page.url),
                Err(e) => warn!("Anubis challenge at {} failed: {}", page.url, e),
            }
        }

        extract(&html, selectors)
    }
}
