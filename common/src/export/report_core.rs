//! PDFレポートの表データ（描画に依存しない部分）

use crate::export::bom_core::{format_confidence, format_number, NOT_AVAILABLE};
use crate::types::{ChatMessage, ChatRole, PcbAnalysis};

/// レポート内の1表
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub title: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
    /// 列幅の比率（合計1.0）
    pub column_ratios: Vec<f32>,
}

/// 不良一覧
pub fn defect_table(analysis: &PcbAnalysis) -> ReportTable {
    ReportTable {
        title: "Defects",
        headers: vec!["ID", "Type", "Confidence", "Description"],
        rows: analysis
            .defects
            .iter()
            .map(|d| {
                vec![
                    d.id.clone(),
                    d.defect_type.clone(),
                    format_confidence(d.confidence),
                    d.description.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                ]
            })
            .collect(),
        column_ratios: vec![0.1, 0.2, 0.14, 0.56],
    }
}

/// 部品一覧（基板電圧が設定されていれば電圧超過を表示）
pub fn component_table(analysis: &PcbAnalysis, board_voltage: Option<f64>) -> ReportTable {
    ReportTable {
        title: "Components",
        headers: vec!["Designator", "MPN", "Status", "Confidence", "Max V"],
        rows: analysis
            .components
            .iter()
            .map(|c| {
                vec![
                    c.designator.clone(),
                    if c.mpn.is_empty() { NOT_AVAILABLE.to_string() } else { c.mpn.clone() },
                    c.status(board_voltage).label().to_string(),
                    format_confidence(c.confidence),
                    c.max_voltage.map(format_number).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                ]
            })
            .collect(),
        column_ratios: vec![0.16, 0.34, 0.2, 0.15, 0.15],
    }
}

/// 代替部品の提案
pub fn alternatives_table(analysis: &PcbAnalysis) -> ReportTable {
    ReportTable {
        title: "Alternative parts",
        headers: vec!["Original MPN", "Replacement", "Reason"],
        rows: analysis
            .advice
            .alternatives
            .iter()
            .flat_map(|alt| {
                alt.replacements.iter().map(move |r| {
                    vec![alt.original_mpn.clone(), r.mpn.clone(), r.reason.clone()]
                })
            })
            .collect(),
        column_ratios: vec![0.25, 0.25, 0.5],
    }
}

/// アドバイスの箇条書き（見出し, 項目）
pub fn advice_sections(analysis: &PcbAnalysis) -> Vec<(&'static str, Vec<String>)> {
    let mut sections = vec![
        ("Quick actions", analysis.advice.quick_actions.clone()),
        ("Next steps", analysis.advice.next_steps.clone()),
    ];
    if let Some(cost) = analysis.advice.repair_cost {
        sections.push(("Estimated repair cost", vec![format!("${:.2}", cost)]));
    }
    sections.retain(|(_, items)| !items.is_empty());
    sections
}

/// 会話ログの行（話者ラベル付き）
pub fn transcript_lines(transcript: &[ChatMessage]) -> Vec<String> {
    transcript
        .iter()
        .map(|m| {
            let speaker = match m.role {
                ChatRole::User => "You",
                ChatRole::Model => "Guru",
            };
            let jumper = m
                .jumper_suggestion
                .map(|j| {
                    format!(
                        " [jumper ({:.2},{:.2}) -> ({:.2},{:.2})]",
                        j.from.x, j.from.y, j.to.x, j.to.y
                    )
                })
                .unwrap_or_default();
            format!("{}: {}{}", speaker, m.text, jumper)
        })
        .collect()
}

/// 文字数で折り返す（等幅近似。単語の途中では切らない）
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current.chars().count();
            if current_len > 0 && current_len + 1 + word_len > max_chars {
                lines.push(std::mem::take(&mut current));
            }
            if word_len > max_chars {
                // 長すぎる単語は強制分割
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(max_chars) {
                    if !current.is_empty() {
                        lines.push(std::mem::take(&mut current));
                    }
                    current = chunk.iter().collect();
                }
                continue;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
