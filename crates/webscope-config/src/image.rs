//! コンテナイメージ名の解決
//!
//! `Makefile` と同じ規則でレジストリ・名前空間・プロジェクト名からイメージ名を組み立てる。

use crate::settings::env_string;
use chrono::{DateTime, Utc};

pub const PROJECT_NAME: &str = "webscope";
pub const DEFAULT_REGISTRY: &str = "registry.example.com";

/// イメージのビルド・プッシュ先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    /// CONTAINER_REGISTRY
    pub registry: String,
    /// NAMESPACE（空なら省略）
    pub namespace: Option<String>,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            namespace: None,
        }
    }
}

impl ImageSettings {
    pub fn from_env() -> Self {
        Self {
            registry: env_string("CONTAINER_REGISTRY")
                .unwrap_or_else(|| DEFAULT_REGISTRY.to_string()),
            namespace: env_string("NAMESPACE"),
        }
    }

    /// タグなしのイメージ名
    pub fn image_name(&self) -> String {
        image_name(&self.registry, self.namespace.as_deref(), PROJECT_NAME)
    }

    /// タグ付きのイメージ参照
    pub fn image_ref(&self, tag: &str) -> String {
        format!("{}:{}", self.image_name(), tag)
    }
}

/// `registry[/namespace]/project`
pub fn image_name(registry: &str, namespace: Option<&str>, project: &str) -> String {
    let registry = registry.trim_end_matches('/');
    match namespace.map(|ns| ns.trim_matches('/')).filter(|ns| !ns.is_empty()) {
        Some(ns) => format!("{}/{}/{}", registry, ns, project),
        None => format!("{}/{}", registry, project),
    }
}

/// タイムスタンプ由来のバージョンタグ（UTC, YYYYMMDDHHMMSS）
pub fn version_tag(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}
