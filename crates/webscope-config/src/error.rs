use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("環境変数 {name} の値が不正です: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("バインドアドレスが不正です: {0}")]
    InvalidBindAddr(String),

    #[error("権限の降格に失敗しました ({step}): {source}")]
    PrivilegeDrop {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
