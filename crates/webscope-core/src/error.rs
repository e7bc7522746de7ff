use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP {0} - Failed to fetch webpage")]
    HttpStatus(u16),

    #[error("Request timed out while fetching webpage")]
    Timeout,

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Proof-of-work difficulty {0} cannot be satisfied by a SHA-256 digest")]
    UnsatisfiableDifficulty(u32),

    #[error("Proof-of-work search for difficulty {difficulty} gave up after {attempts} attempts")]
    PowTimeout { difficulty: u32, attempts: u64 },

    #[error("Proof-of-work worker failed: {0}")]
    SolverTask(String),
}

impl BrowseError {
    /// reqwest のエラーを分類（タイムアウトは専用のバリアントへ）
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrowseError::Timeout
        } else {
            BrowseError::Http(err)
        }
    }

    /// リトライで回復しうるエラーか
    ///
    /// 接続失敗・タイムアウト・5xx のみ。4xx は何度送っても変わらない。
    pub fn is_retryable(&self) -> bool {
        match self {
            BrowseError::Timeout => true,
            BrowseError::HttpStatus(code) => (500..600).contains(code),
            BrowseError::Http(err) => err.is_connect(),
            _ => false,
        }
    }

    /// ツール呼び出し側に返すメッセージ
    pub fn user_message(&self) -> String {
        format!("Error: {}", self)
    }
}

pub type Result<T> = std::result::Result<T, BrowseError>;
