//! HTML からの情報抽出
//!
//! タイトル・本文テキスト・リンク一覧と、呼び出し側が指定した CSS セレクタごとの
//! テキストを取り出す。

use crate::error::{BrowseError, Result};
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// テキスト抽出の対象外とする要素
const NON_TEXT_ELEMENTS: [&str; 3] = ["script", "style", "template"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// ページから抽出した内容
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageContent {
    pub title: Option<String>,
    pub text: String,
    pub links: Vec<Link>,
    /// (キー, マッチした要素ごとのテキスト)。キー順。
    pub selections: Vec<(String, Vec<String>)>,
}

impl PageContent {
    /// ツール応答用の JSON
    ///
    /// セレクタのキーが title / text / links と重なる場合はセレクタ側で上書きする。
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("title".to_string(), json!(self.title));
        map.insert("text".to_string(), json!(self.text));
        map.insert("links".to_string(), json!(self.links));
        for (key, texts) in &self.selections {
            map.insert(key.clone(), json!(texts));
        }
        Value::Object(map)
    }
}

/// HTML を解析して内容を抽出する
///
/// セレクタは解析前にすべて検証し、1つでも不正なら `InvalidSelector` を返す。
pub fn extract(html: &str, selectors: &BTreeMap<String, String>) -> Result<PageContent> {
    let compiled = selectors
        .iter()
        .map(|(key, selector)| -> Result<(String, Selector)> {
            Ok((key.clone(), parse_selector(selector)?))
        })
        .collect::<Result<Vec<_>>>()?;
    let title_selector = parse_selector("title")?;
    let link_selector = parse_selector("a[href]")?;

    let document = Html::parse_document(html);

    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .filter(|title| !title.is_empty());

    let text = stripped_text(document.root_element());

    let links = document
        .select(&link_selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            Some(Link {
                text: el.text().collect::<String>().trim().to_string(),
                href: href.to_string(),
            })
        })
        .collect();

    let selections = compiled
        .into_iter()
        .map(|(key, selector)| {
            let texts = document.select(&selector).map(stripped_text).collect();
            (key, texts)
        })
        .collect();

    Ok(PageContent {
        title,
        text,
        links,
        selections,
    })
}

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| BrowseError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// 要素配下のテキストノードをそれぞれ trim し、空でないものを区切りなしで連結
///
/// script / style / template の中身は含めない。
pub fn stripped_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(el) => NON_TEXT_ELEMENTS.contains(&el.name()),
            _ => false,
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push_str(trimmed);
        }
    }
    out
}
