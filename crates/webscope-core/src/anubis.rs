//! Anubis チャレンジの突破
//!
//! Anubis はページ本体の前に SHA-256 の proof-of-work を要求するリバースプロキシ。
//! チャレンジページを判定し、ノンスを探索して pass-challenge API に提出し、
//! 発行された Cookie で本来のページを取得する。

use crate::error::{BrowseError, Result};
use crate::fetch::parse_url;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// チャレンジページに必ず含まれる文字列
pub const ANUBIS_MARKERS: [&str; 3] = ["Making sure you", "bot", "Anubis"];

pub const PASS_CHALLENGE_PATH: &str = "/.within.website/x/cmd/anubis/api/pass-challenge";

/// 提出時に申告する経過時間（ミリ秒）
const REPORTED_ELAPSED_MS: &str = "100";

/// SHA-256 の16進表現の桁数
const MAX_DIFFICULTY: u32 = 64;

/// 探索の打ち切り判定を行う間隔（ノンス数）
const DEADLINE_CHECK_INTERVAL: u64 = 4096;

static CHALLENGE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script id="anubis_challenge" type="application/json">([^<]+)</script>"#)
        .expect("challenge pattern is a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenge: String,
    pub difficulty: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowSolution {
    pub nonce: u64,
    /// 小文字16進の SHA-256
    pub hash: String,
}

#[derive(Deserialize)]
struct ChallengeDocument {
    challenge: String,
    rules: ChallengeRules,
}

#[derive(Deserialize)]
struct ChallengeRules {
    difficulty: u32,
}

/// HTML が Anubis のチャレンジページか
pub fn is_anubis_page(html: &str) -> bool {
    !html.is_empty() && ANUBIS_MARKERS.iter().all(|marker| html.contains(marker))
}

/// チャレンジページに埋め込まれた JSON からチャレンジを取り出す
pub fn extract_challenge(html: &str) -> Option<Challenge> {
    let payload = CHALLENGE_SCRIPT.captures(html)?.get(1)?.as_str();
    match serde_json::from_str::<ChallengeDocument>(payload) {
        Ok(doc) => Some(Challenge {
            challenge: doc.challenge,
            difficulty: doc.rules.difficulty,
        }),
        Err(e) => {
            debug!("Anubis challenge payload could not be decoded: {}", e);
            None
        }
    }
}

/// `sha256(challenge + nonce)` の16進表現が `difficulty` 個の '0' で始まる最小のノンスを探す
///
/// 難易度はリモートのページが決めるので、`budget` を過ぎたら探索を打ち切って
/// `PowTimeout` を返す。
pub fn solve_pow(challenge: &str, difficulty: u32, budget: Duration) -> Result<PowSolution> {
    if difficulty > MAX_DIFFICULTY {
        return Err(BrowseError::UnsatisfiableDifficulty(difficulty));
    }

    let started = Instant::now();
    let mut nonce: u64 = 0;
    loop {
        if nonce % DEADLINE_CHECK_INTERVAL == 0 && nonce > 0 && started.elapsed() >= budget {
            return Err(BrowseError::PowTimeout {
                difficulty,
                attempts: nonce,
            });
        }
        let digest = Sha256::digest(format!("{}{}", challenge, nonce).as_bytes());
        if has_leading_zero_nibbles(&digest, difficulty) {
            return Ok(PowSolution {
                nonce,
                hash: hex::encode(digest),
            });
        }
        nonce += 1;
    }
}

fn has_leading_zero_nibbles(digest: &[u8], nibbles: u32) -> bool {
    let full_bytes = (nibbles / 2) as usize;
    if digest[..full_bytes].iter().any(|b| *b != 0) {
        return false;
    }
    nibbles % 2 == 0 || digest[full_bytes] >> 4 == 0
}

/// pass-challenge API の URL を組み立てる
pub fn verification_url(page: &Url, solution: &PowSolution) -> Url {
    let mut url = page.clone();
    url.set_path(PASS_CHALLENGE_PATH);
    url.set_query(None);
    url.set_fragment(None);

    let redir = match page.path() {
        "" => "/",
        path => path,
    };
    url.query_pairs_mut()
        .append_pair("response", &solution.hash)
        .append_pair("nonce", &solution.nonce.to_string())
        .append_pair("redir", redir)
        .append_pair("elapsedTime", REPORTED_ELAPSED_MS);
    url
}

/// Cookie を保持するクライアントでチャレンジを突破する
pub struct AnubisSolver {
    user_agent: String,
    timeout: Duration,
}

impl AnubisSolver {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }

    /// チャレンジを突破して本来のページを返す
    ///
    /// Anubis のページでない場合、チャレンジが読み取れない場合、検証後もチャレンジが
    /// 返ってくる場合は `Ok(None)`。
    pub async fn solve(&self, url: &str) -> Result<Option<String>> {
        let page_url = parse_url(url)?;
        // 発行される認証 Cookie を次のリクエストに引き継ぐため、呼び出しごとに専用の jar を持つ
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .cookie_store(true)
            .build()?;

        let html = get_text(&client, page_url.clone()).await?;
        if !is_anubis_page(&html) {
            return Ok(None);
        }

        let Some(challenge) = extract_challenge(&html) else {
            debug!("Anubis page without a readable challenge: {}", page_url);
            return Ok(None);
        };
        if challenge.challenge.is_empty() || challenge.difficulty == 0 {
            return Ok(None);
        }

        info!(
            "Solving Anubis challenge for {} (difficulty {})",
            page_url, challenge.difficulty
        );
        let solution = solve_pow_blocking(challenge, self.timeout).await?;
        debug!("Found nonce {} ({})", solution.nonce, solution.hash);

        let verify_url = verification_url(&page_url, &solution);
        let verified = get_text(&client, verify_url).await?;
        if !is_anubis_page(&verified) {
            return Ok(Some(verified));
        }

        // 検証レスポンスがチャレンジのままなら Cookie 付きで元の URL を取り直す
        let retried = get_text(&client, page_url).await?;
        if is_anubis_page(&retried) {
            Ok(None)
        } else {
            Ok(Some(retried))
        }
    }
}

/// CPU を占有する探索を async ランタイムの外で実行する
async fn solve_pow_blocking(challenge: Challenge, budget: Duration) -> Result<PowSolution> {
    tokio::task::spawn_blocking(move || {
        solve_pow(&challenge.challenge, challenge.difficulty, budget)
    })
        .await
        .map_err(|e| BrowseError::SolverTask(e.to_string()))?
}

async fn get_text(client: &reqwest::Client, url: Url) -> Result<String> {
    let body = client
        .get(url)
        .send()
        .await
        .map_err(BrowseError::from_reqwest)?
        .bytes()
        .await
        .map_err(BrowseError::from_reqwest)?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}
