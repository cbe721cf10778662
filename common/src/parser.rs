//! APIレスポンスパーサー
//!
//! - 解析レスポンス（JSON本文）を PcbAnalysis にパース
//! - チャット応答に埋め込まれたジャンパ提案（```json ブロック）を抽出

use crate::error::{Error, Result};
use crate::types::{JumperSuggestion, PcbAnalysis};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

/// 解析レスポンスで必須のトップレベルキー
const REQUIRED_KEYS: &[&str] = &["components", "defects"];

lazy_static! {
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid jumper block pattern");
}

/// 解析レスポンスをパース
///
/// 本文全体がJSONオブジェクトであり、`components` と `defects` を含むこと。
/// それ以外は `MalformedResponse`。入れ子のフィールドは検証せず、
/// 欠落や null は既定値、未知の presence/condition は `Unknown` として読む。
///
/// # Examples
/// ```
/// use pcb_guru_common::parse_analysis_response;
///
/// let analysis = parse_analysis_response(r#"{"components": [], "defects": []}"#).unwrap();
/// assert!(analysis.components.is_empty());
/// ```
pub fn parse_analysis_response(response: &str) -> Result<PcbAnalysis> {
    let value: serde_json::Value = serde_json::from_str(response.trim())
        .map_err(|e| Error::MalformedResponse(format!("JSONとして解釈できません: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::MalformedResponse("JSONオブジェクトではありません".into()))?;

    for key in REQUIRED_KEYS {
        if !object.contains_key(*key) {
            return Err(Error::MalformedResponse(format!("必須キーがありません: {}", key)));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| Error::MalformedResponse(format!("解析結果の形式が不正: {}", e)))
}

/// ジャンパ抽出結果
#[derive(Debug, Clone, PartialEq)]
pub struct JumperExtraction {
    /// ユーザーに表示するテキスト（抽出したブロックは除去済み）
    pub display_text: String,
    pub jumper: Option<JumperSuggestion>,
}

#[derive(Deserialize)]
struct JumperEnvelope {
    jumper: JumperSuggestion,
}

/// チャット応答からジャンパ提案を抽出
///
/// `jumper` を含む ```json ブロックを探す。パースできれば取り出して本文から除去し、
/// できなければ何もせず元のテキストを返す（ベストエフォート）。
pub fn extract_jumper(reply: &str) -> JumperExtraction {
    for caps in FENCED_JSON.captures_iter(reply) {
        let (Some(block), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !body.as_str().contains("\"jumper\"") {
            continue;
        }
        let Ok(envelope) = serde_json::from_str::<JumperEnvelope>(body.as_str()) else {
            continue;
        };

        let mut display_text = String::with_capacity(reply.len());
        display_text.push_str(&reply[..block.start()]);
        display_text.push_str(&reply[block.end()..]);

        return JumperExtraction {
            display_text: display_text.trim().to_string(),
            jumper: Some(envelope.jumper),
        };
    }

    JumperExtraction {
        display_text: reply.to_string(),
        jumper: None,
    }
}
