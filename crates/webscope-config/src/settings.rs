//! 実行時設定
//!
//! コンテナイメージから渡される環境変数を読み込み、サーバーとフェッチャーの
//! 設定値にまとめる。

use crate::error::{ConfigError, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_UID: u32 = 1000;
pub const DEFAULT_GID: u32 = 1000;

/// サーバー全体の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// バインドするホスト（HOST）
    pub host: String,
    /// 待ち受けポート（PORT）
    pub port: u16,
    /// tracing のフィルタ初期値（LOG_LEVEL）
    pub log_level: String,
    /// HTTP リクエストの User-Agent（USER_AGENT）
    pub user_agent: String,
    /// リクエスト単位のタイムアウト（REQUEST_TIMEOUT, 秒）
    pub request_timeout: Duration,
    /// 一時的な失敗に対する追加リトライ回数（MAX_RETRIES）
    pub max_retries: u32,
    /// root で起動した場合に降格する UID / GID
    pub uid: u32,
    pub gid: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            uid: DEFAULT_UID,
            gid: DEFAULT_GID,
        }
    }
}

impl Settings {
    /// 環境変数から設定を読み込む
    ///
    /// 未設定または空文字の変数はデフォルト値になる。
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: env_string("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port)?,
            log_level: env_string("LOG_LEVEL").unwrap_or(defaults.log_level),
            user_agent: env_string("USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries)?,
            uid: env_parse("UID", defaults.uid)?,
            gid: env_parse("GID", defaults.gid)?,
        })
    }

    /// host:port をソケットアドレスに解決
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let display = format!("{}:{}", self.host, self.port);
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConfigError::InvalidBindAddr(format!("{} ({})", display, e)))?
            .next()
            .ok_or(ConfigError::InvalidBindAddr(display))
    }
}

pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
