//! webscope のコア機能
//!
//! Web ページの取得、HTML からのテキスト・リンク抽出、
//! Anubis の proof-of-work チャレンジ突破を提供する。

pub mod anubis;
pub mod browse;
pub mod error;
pub mod extract;
pub mod fetch;

#[cfg(test)]
mod test_support;

pub use anubis::{
    AnubisSolver, Challenge, PowSolution, extract_challenge, is_anubis_page, solve_pow,
};
pub use browse::Browser;
pub use error::{BrowseError, Result};
pub use extract::{Link, PageContent, extract};
pub use fetch::{FetchOptions, FetchedPage, Fetcher};
