use crate::anubis::PASS_CHALLENGE_PATH;
use axum::Router;
use axum::extract::Query;
use axum::http::{HeaderMap, header};
use axum::response::IntoResponse;
use axum::routing::get;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::SocketAddr;

/// テスト用 HTTP サーバーを空きポートで起動
pub(crate) async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// 難易度2のチャレンジを埋め込んだ Anubis ページ
pub(crate) const CHALLENGE_PAGE: &str = r#"<html><head><title>Making sure you're not a bot!</title></head>
<body><p>Protected by Anubis</p>
<script id="anubis_challenge" type="application/json">{"challenge":"abc123","rules":{"algorithm":"fast","difficulty":2,"report_as":2}}</script>
</body></html>"#;

/// 正しい解を提出すると Cookie を発行し、Cookie 付きのリクエストにだけ本文を返すサーバー
pub(crate) fn anubis_router(verify_returns_content: bool) -> Router {
    async fn page(headers: HeaderMap) -> impl IntoResponse {
        let authed = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|c| c.contains("anubis-auth=ok"));
        if authed {
            "<html><title>Real</title><body>Real content</body></html>".to_string()
        } else {
            CHALLENGE_PAGE.to_string()
        }
    }

    Router::new().route("/docs", get(page)).route(
        PASS_CHALLENGE_PATH,
        get(move |Query(params): Query<HashMap<String, String>>| async move {
            let nonce = params.get("nonce").cloned().unwrap_or_default();
            let response = params.get("response").cloned().unwrap_or_default();
            let expected = hex::encode(Sha256::digest(format!("abc123{}", nonce).as_bytes()));
            let valid = response == expected
                && response.starts_with("00")
                && params.get("redir").map(String::as_str) == Some("/docs")
                && params.get("elapsedTime").map(String::as_str) == Some("100");

            if !valid {
                return (HeaderMap::new(), CHALLENGE_PAGE.to_string());
            }
            let mut headers = HeaderMap::new();
            headers.insert(
                header::SET_COOKIE,
                "anubis-auth=ok; Path=/".parse().unwrap(),
            );
            let body = if verify_returns_content {
                "<html><title>Real</title><body>Verified content</body></html>"
            } else {
                CHALLENGE_PAGE
            };
            (headers, body.to_string())
        }),
    )
}

