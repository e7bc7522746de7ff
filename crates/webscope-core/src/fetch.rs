//! ページ取得
//!
//! User-Agent とタイムアウトを設定した HTTP クライアントでページを取得し、
//! 一時的な失敗はリトライする。本文は宣言された文字コードから順にデコードを試す。

use crate::error::{BrowseError, Result};
use encoding_rs::{Encoding, UTF_8};
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use std::time::Duration;
use tracing::{debug, warn};
use webscope_config::Settings;

/// 宣言された文字コードで読めなかった場合に試す順序
const FALLBACK_ENCODINGS: [&str; 3] = ["utf-8", "iso-8859-1", "windows-1252"];

/// リトライ間隔の単位（試行回数に比例して伸ばす）
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl From<&Settings> for FetchOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            timeout: settings.request_timeout,
            max_retries: settings.max_retries,
        }
    }
}

/// 取得済みのページ
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// リダイレクト後の URL
    pub url: Url,
    pub status: u16,
    pub html: String,
}

pub struct Fetcher {
    client: reqwest::Client,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// URL を取得する
    ///
    /// ステータス 400 以上は `HttpStatus` エラー。接続失敗・タイムアウト・5xx は
    /// `max_retries` 回まで再試行する。
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let url = parse_url(url)?;
        let mut attempt: u32 = 0;

        loop {
            match self.fetch_once(url.clone()).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = RETRY_BACKOFF * attempt;
                    warn!(
                        "Fetching {} failed ({}), retrying in {:?} ({}/{})",
                        url, e, delay, attempt, self.options.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: Url) -> Result<FetchedPage> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(BrowseError::from_reqwest)?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(BrowseError::HttpStatus(status));
        }

        let final_url = response.url().clone();
        let charset = charset_from_headers(response.headers());
        let body = response.bytes().await.map_err(BrowseError::from_reqwest)?;

        Ok(FetchedPage {
            url: final_url,
            status,
            html: decode_body(&body, charset.as_deref()),
        })
    }
}

/// http / https の絶対 URL のみ受け付ける
pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| BrowseError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(BrowseError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

/// Content-Type の charset パラメータを取り出す
pub fn charset_from_headers(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// 本文をデコードする（失敗しない）
///
/// 宣言された文字コード（未指定なら UTF-8）→ フォールバック候補 → 置換文字付き UTF-8
/// の順に試す。
pub fn decode_body(body: &[u8], charset: Option<&str>) -> String {
    let declared = charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    if let Some(text) = decode_strict(declared, body) {
        return text;
    }

    for label in FALLBACK_ENCODINGS {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            if let Some(text) = decode_strict(encoding, body) {
                debug!("Decoded body as {} instead of {}", label, declared.name());
                return text;
            }
        }
    }

    String::from_utf8_lossy(body).into_owned()
}

fn decode_strict(encoding: &'static Encoding, body: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.trim_start_matches('\u{feff}').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::Router;
    use axum::http::{StatusCode, header};
    use axum::routing::get;
    use reqwest::header::HeaderValue;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn options(max_retries: u32) -> FetchOptions {
        FetchOptions {
            user_agent: "webscope-test".to_string(),
            timeout: Duration::from_secs(5),
            max_retries,
        }
    }

    #[test]
    fn test_parse_url_rejects_non_http() {
        assert!(parse_url("https://example.com/a").is_ok());
        assert!(matches!(
            parse_url("ftp://example.com"),
            Err(BrowseError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_url("not a url"),
            Err(BrowseError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_charset_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(charset_from_headers(&headers), None);

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; Charset=\"ISO-8859-1\""),
        );
        assert_eq!(
            charset_from_headers(&headers),
            Some("ISO-8859-1".to_string())
        );
    }

    #[test]
    fn test_decode_body_utf8() {
        assert_eq!(decode_body("héllo".as_bytes(), None), "héllo");
        assert_eq!(decode_body(b"\xef\xbb\xbfbom", Some("utf-8")), "bom");
    }

    #[test]
    fn test_decode_body_declared_charset() {
        // 0x80 は windows-1252 でユーロ記号
        assert_eq!(decode_body(b"\x80 5", Some("windows-1252")), "€ 5");
    }

    #[test]
    fn test_decode_body_falls_back_when_utf8_invalid() {
        // Latin-1 の "café" は UTF-8 として不正
        assert_eq!(decode_body(b"caf\xe9", None), "café");
        assert_eq!(decode_body(b"caf\xe9", Some("utf-8")), "café");
    }

    #[test]
    fn test_decode_body_unknown_label_uses_utf8() {
        assert_eq!(decode_body(b"plain", Some("x-unknown")), "plain");
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let router = Router::new().route(
            "/",
            get(|headers: axum::http::HeaderMap| async move {
                let ua = headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    format!("<p>{}</p>", ua),
                )
            }),
        );
        let addr = spawn_server(router).await;

        let fetcher = Fetcher::new(options(0)).unwrap();
        let page = fetcher.fetch(&format!("http://{}/", addr)).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.html, "<p>webscope-test</p>");
    }

    #[tokio::test]
    async fn test_fetch_latin1_body() {
        let router = Router::new().route(
            "/",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=iso-8859-1")],
                    b"<p>caf\xe9</p>".to_vec(),
                )
            }),
        );
        let addr = spawn_server(router).await;

        let fetcher = Fetcher::new(options(0)).unwrap();
        let page = fetcher.fetch(&format!("http://{}/", addr)).await.unwrap();
        assert_eq!(page.html, "<p>café</p>");
    }

    #[tokio::test]
    async fn test_fetch_client_error_is_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND
                }
            }),
        );
        let addr = spawn_server(router).await;

        let fetcher = Fetcher::new(options(3)).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowseError::HttpStatus(404)));
        assert_eq!(err.user_message(), "Error: HTTP 404 - Failed to fetch webpage");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/",
            get(move || {
                let counter = counter.clone();
                async move {
                    // 最初の2回は 503、3回目で成功
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, "busy")
                    } else {
                        (StatusCode::OK, "ok")
                    }
                }
            }),
        );
        let addr = spawn_server(router).await;

        let fetcher = Fetcher::new(options(2)).unwrap();
        let page = fetcher.fetch(&format!("http://{}/", addr)).await.unwrap();
        assert_eq!(page.html, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_retries() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::BAD_GATEWAY
                }
            }),
        );
        let addr = spawn_server(router).await;

        let fetcher = Fetcher::new(options(1)).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowseError::HttpStatus(502)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_retries_connect_errors() {
        // 一度バインドして解放したポートには誰も待ち受けていない
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = Fetcher::new(options(1)).unwrap();
        let started = std::time::Instant::now();
        let err = fetcher
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();

        match &err {
            BrowseError::Http(inner) => assert!(inner.is_connect()),
            other => panic!("Expected connect error, got {:?}", other),
        }
        assert!(err.is_retryable());
        // 1回分のバックオフを待ってから諦めている
        assert!(started.elapsed() >= RETRY_BACKOFF);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let router = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let addr = spawn_server(router).await;

        let fetcher = Fetcher::new(FetchOptions {
            timeout: Duration::from_millis(200),
            ..options(0)
        })
        .unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowseError::Timeout));
        assert_eq!(
            err.user_message(),
            "Error: Request timed out while fetching webpage"
        );
    }
}
