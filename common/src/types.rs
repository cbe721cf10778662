//! 解析結果の型定義
//!
//! 解析クライアント・状態コントローラ・エクスポートで共有される型:
//! - PcbAnalysis: 1回のアップロードに対する解析結果（集約ルート）
//! - Component / Defect: 正規化バウンディングボックス付きの検出レコード
//! - ChatMessage / JumperSuggestion: フォローアップ会話の記録

use serde::{Deserialize, Deserializer, Serialize};

/// null を既定値として読む（モデル出力の入れ子フィールドは検証しない）
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 正規化座標 [0,1] の矩形（画像サイズ基準）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// 描画に必要な不変条件を満たすか（パース時には強制しない）
    pub fn is_normalized(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.w > 0.0
            && self.h > 0.0
            && self.x + self.w <= 1.0
            && self.y + self.h <= 1.0
    }

    /// 中心点
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.w / 2.0,
            y: self.y + self.h / 2.0,
        }
    }

    /// 正規化座標が矩形内か
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.w
            && point.y >= self.y
            && point.y <= self.y + self.h
    }
}

/// 正規化座標の点
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 部品の実装有無（想定外の値は Unknown）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Presence {
    Missing,
    Ok,
    #[default]
    Unknown,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Missing => "missing",
            Presence::Ok => "ok",
            Presence::Unknown => "unknown",
        }
    }
}

impl From<String> for Presence {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "missing" => Presence::Missing,
            "ok" => Presence::Ok,
            _ => Presence::Unknown,
        }
    }
}

/// 部品の外観状態（想定外の値は Unknown）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Condition {
    Burnt,
    Corroded,
    Ok,
    #[default]
    Unknown,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Burnt => "burnt",
            Condition::Corroded => "corroded",
            Condition::Ok => "ok",
            Condition::Unknown => "unknown",
        }
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "burnt" => Condition::Burnt,
            "corroded" => Condition::Corroded,
            "ok" => Condition::Ok,
            _ => Condition::Unknown,
        }
    }
}

/// 表示用の部品ステータス（優先順: 欠品 > 損傷 > 電圧超過 > 正常）
///
/// presence/condition が Unknown の部品は要確認として Damaged に寄せる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentStatus {
    Missing,
    Damaged,
    VoltageMismatch,
    Ok,
}

impl ComponentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ComponentStatus::Missing => "missing",
            ComponentStatus::Damaged => "damaged",
            ComponentStatus::VoltageMismatch => "over-voltage",
            ComponentStatus::Ok => "ok",
        }
    }
}

/// 検出された部品
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Component {
    /// リファレンス記号（解析内で一意）
    #[serde(deserialize_with = "null_as_default")]
    pub designator: String,

    #[serde(deserialize_with = "null_as_default")]
    pub mpn: String,

    #[serde(deserialize_with = "null_as_default")]
    pub bbox: BoundingBox,

    #[serde(deserialize_with = "null_as_default")]
    pub presence: Presence,

    #[serde(deserialize_with = "null_as_default")]
    pub condition: Condition,

    #[serde(deserialize_with = "null_as_default")]
    pub confidence: f64,

    /// 推定温度（℃）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// 定格最大電圧（V）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_voltage: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasheet_url: Option<String>,
}

impl Component {
    /// 基板電圧が定格最大電圧を超えているか
    pub fn voltage_mismatch(&self, board_voltage: Option<f64>) -> bool {
        match (board_voltage, self.max_voltage) {
            (Some(board), Some(max)) => board > max,
            _ => false,
        }
    }

    pub fn has_issue(&self, board_voltage: Option<f64>) -> bool {
        self.presence != Presence::Ok
            || self.condition != Condition::Ok
            || self.voltage_mismatch(board_voltage)
    }

    pub fn status(&self, board_voltage: Option<f64>) -> ComponentStatus {
        if self.presence == Presence::Missing {
            ComponentStatus::Missing
        } else if self.condition != Condition::Ok || self.presence != Presence::Ok {
            ComponentStatus::Damaged
        } else if self.voltage_mismatch(board_voltage) {
            ComponentStatus::VoltageMismatch
        } else {
            ComponentStatus::Ok
        }
    }
}

/// 検出された不良箇所
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defect {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,

    /// 不良種別（solder_bridge, misalignment, overheating など。値は開いている）
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub defect_type: String,

    #[serde(deserialize_with = "null_as_default")]
    pub bbox: BoundingBox,

    #[serde(deserialize_with = "null_as_default")]
    pub confidence: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Replacement {
    #[serde(deserialize_with = "null_as_default")]
    pub mpn: String,
    #[serde(deserialize_with = "null_as_default")]
    pub reason: String,
}

/// 代替部品の提案
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alternative {
    #[serde(deserialize_with = "null_as_default")]
    pub original_mpn: String,
    #[serde(deserialize_with = "null_as_default")]
    pub replacements: Vec<Replacement>,
}

/// 修理アドバイス
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Advice {
    #[serde(deserialize_with = "null_as_default")]
    pub quick_actions: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub alternatives: Vec<Alternative>,
    #[serde(deserialize_with = "null_as_default")]
    pub next_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair_cost: Option<f64>,
}

/// 基板解析結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcbAnalysis {
    #[serde(deserialize_with = "null_as_default")]
    pub components: Vec<Component>,
    #[serde(deserialize_with = "null_as_default")]
    pub defects: Vec<Defect>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub advice: Advice,
}

impl PcbAnalysis {
    pub fn component(&self, designator: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.designator == designator)
    }

    pub fn defect(&self, id: &str) -> Option<&Defect> {
        self.defects.iter().find(|d| d.id == id)
    }

    /// designator または defect id で参照できるか
    pub fn contains_id(&self, id: &str) -> bool {
        self.component(id).is_some() || self.defect(id).is_some()
    }

    /// 正規化座標の点を含む部品（重なっていれば中心が最も近いもの）
    pub fn component_at(&self, point: Point) -> Option<&Component> {
        let distance = |c: &Component| {
            let center = c.bbox.center();
            (center.x - point.x).powi(2) + (center.y - point.y).powi(2)
        };
        self.components
            .iter()
            .filter(|c| c.bbox.contains(point))
            .min_by(|a, b| distance(a).total_cmp(&distance(b)))
    }

    /// 問題のある部品（欠品・損傷・電圧超過）
    pub fn components_with_issues(&self, board_voltage: Option<f64>) -> Vec<&Component> {
        self.components
            .iter()
            .filter(|c| c.has_issue(board_voltage))
            .collect()
    }
}

/// ジャンパ配線の提案（正規化座標の2点）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumperSuggestion {
    pub from: Point,
    pub to: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// 会話ログの1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jumper_suggestion: Option<JumperSuggestion>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            jumper_suggestion: None,
        }
    }

    pub fn model(text: impl Into<String>, jumper_suggestion: Option<JumperSuggestion>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
            jumper_suggestion,
        }
    }
}
