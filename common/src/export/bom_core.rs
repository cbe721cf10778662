//! BOM（部品表）の行データとCSV生成
//!
//! CSV/Excel で同じ列定義・同じ表示値を使う。

use crate::types::{Component, PcbAnalysis};

/// BOM の列見出し
pub const BOM_HEADERS: [&str; 8] = [
    "Designator",
    "MPN",
    "Presence",
    "Condition",
    "Confidence",
    "Temperature",
    "Max Voltage",
    "Datasheet URL",
];

/// 値がない項目の表示
pub const NOT_AVAILABLE: &str = "N/A";

/// BOM の1行（表示用に整形済み）
#[derive(Debug, Clone, PartialEq)]
pub struct BomRow {
    pub designator: String,
    pub mpn: String,
    pub presence: String,
    pub condition: String,
    pub confidence: String,
    pub temperature: String,
    pub max_voltage: String,
    pub datasheet_url: String,
}

impl BomRow {
    pub fn from_component(component: &Component) -> Self {
        Self {
            designator: component.designator.clone(),
            mpn: or_placeholder(&component.mpn),
            presence: component.presence.as_str().to_string(),
            condition: component.condition.as_str().to_string(),
            confidence: format_confidence(component.confidence),
            temperature: component
                .temperature
                .map(format_number)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            max_voltage: component
                .max_voltage
                .map(format_number)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            datasheet_url: component
                .datasheet_url
                .as_deref()
                .map(or_placeholder)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        }
    }

    /// 列見出しと同じ順の値
    pub fn values(&self) -> [&str; 8] {
        [
            self.designator.as_str(),
            self.mpn.as_str(),
            self.presence.as_str(),
            self.condition.as_str(),
            self.confidence.as_str(),
            self.temperature.as_str(),
            self.max_voltage.as_str(),
            self.datasheet_url.as_str(),
        ]
    }
}

fn or_placeholder(value: &str) -> String {
    if value.trim().is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

/// 信頼度を整数パーセントで表示（0.92 → "92%"）
pub fn format_confidence(confidence: f64) -> String {
    format!("{}%", (confidence * 100.0).round() as i64)
}

/// 数値表示（整数は小数点なし）
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn bom_rows(analysis: &PcbAnalysis) -> Vec<BomRow> {
    analysis.components.iter().map(BomRow::from_component).collect()
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// BOM CSV を生成（全値をダブルクォートで囲む）
pub fn generate_bom_csv(analysis: &PcbAnalysis) -> String {
    let mut lines = Vec::with_capacity(analysis.components.len() + 1);
    lines.push(BOM_HEADERS.iter().map(|h| quote(h)).collect::<Vec<_>>().join(","));

    for row in bom_rows(analysis) {
        lines.push(row.values().iter().map(|v| quote(v)).collect::<Vec<_>>().join(","));
    }

    let mut csv = lines.join("\n");
    csv.push('\n');
    csv
}
