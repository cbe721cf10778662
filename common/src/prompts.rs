//! プロンプト生成モジュール
//!
//! - ANALYSIS_INSTRUCTION / analysis_response_schema: 画像解析リクエスト用
//! - build_chat_system_instruction: フォローアップ会話（Guru）用
//! - decorate_chat_message: 送信メッセージへの選択部品・基板電圧の付加

use crate::types::{Component, PcbAnalysis};
use serde_json::{json, Value};

/// 解析リクエストの生成温度（構造化出力を安定させるため低め）
pub const ANALYSIS_TEMPERATURE: f32 = 0.1;

pub const PRESENCE_VALUES: &[&str] = &["missing", "ok"];
pub const CONDITION_VALUES: &[&str] = &["burnt", "corroded", "ok"];

/// 画像解析の指示文
pub const ANALYSIS_INSTRUCTION: &str = r#"You are an expert PCB repair technician inspecting a photograph of a printed circuit board.

Identify every visible component and every visible manufacturing or damage defect.

For each component report:
- designator: the silkscreen reference (R17, U1, C3 ...). Invent a unique one if it is not legible.
- mpn: the manufacturer part number if it can be read or confidently inferred, otherwise an empty string.
- bbox: normalized bounding box {x, y, w, h} relative to the image size, all values between 0 and 1.
- presence: "missing" if the footprint is empty, otherwise "ok".
- condition: "burnt", "corroded" or "ok".
- confidence: 0 to 1.
- temperature: estimated operating temperature in Celsius if it can be inferred.
- maxVoltage: the absolute maximum rated voltage in volts if known for the part.
- datasheetUrl: a datasheet URL if known.

For each defect report an id (D1, D2 ...), a type (solder_bridge, misalignment, overheating, cold_joint, tombstoning, corrosion, crack, lifted_pad or another short snake_case label), a normalized bbox, a confidence and a one-sentence description.

Then write a short summary of the board's condition and repair advice: quick actions, alternative parts for damaged or obsolete MPNs, next steps and an estimated repair cost in USD.

Respond with JSON only, following the response schema exactly."#;

fn bbox_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "x": { "type": "NUMBER" },
            "y": { "type": "NUMBER" },
            "w": { "type": "NUMBER" },
            "h": { "type": "NUMBER" }
        },
        "required": ["x", "y", "w", "h"]
    })
}

/// 構造化出力スキーマ（Gemini responseSchema 形式）
pub fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "components": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "designator": { "type": "STRING" },
                        "mpn": { "type": "STRING" },
                        "bbox": bbox_schema(),
                        "presence": { "type": "STRING", "enum": PRESENCE_VALUES },
                        "condition": { "type": "STRING", "enum": CONDITION_VALUES },
                        "confidence": { "type": "NUMBER" },
                        "temperature": { "type": "NUMBER" },
                        "maxVoltage": { "type": "NUMBER" },
                        "datasheetUrl": { "type": "STRING" }
                    },
                    "required": ["designator", "mpn", "bbox", "presence", "condition", "confidence"]
                }
            },
            "defects": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "type": { "type": "STRING" },
                        "bbox": bbox_schema(),
                        "confidence": { "type": "NUMBER" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["id", "type", "bbox", "confidence"]
                }
            },
            "summary": { "type": "STRING" },
            "advice": {
                "type": "OBJECT",
                "properties": {
                    "quick_actions": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "alternatives": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "original_mpn": { "type": "STRING" },
                                "replacements": {
                                    "type": "ARRAY",
                                    "items": {
                                        "type": "OBJECT",
                                        "properties": {
                                            "mpn": { "type": "STRING" },
                                            "reason": { "type": "STRING" }
                                        },
                                        "required": ["mpn", "reason"]
                                    }
                                }
                            },
                            "required": ["original_mpn", "replacements"]
                        }
                    },
                    "next_steps": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "repair_cost": { "type": "NUMBER" }
                },
                "required": ["quick_actions", "alternatives", "next_steps"]
            }
        },
        "required": ["components", "defects", "summary", "advice"]
    })
}

/// Guru の振る舞い（セッション作成時に一度だけ送る）
const CHAT_PERSONA: &str = r#"You are "Guru", a senior electronics repair technician helping a user fix the printed circuit board they photographed.
Keep answers concise and practical: short paragraphs or bullet lists, concrete part numbers and measurements where useful.
If the user selected a component, the message starts with a [Context: ...] line describing it. A [Note: ...] line gives the measured board voltage.

When a jumper wire would bypass a damaged trace or component, append exactly one fenced block tagged json in this format, coordinates normalized to the photo (0 to 1):
```json
{"jumper": {"from": {"x": 0.25, "y": 0.35}, "to": {"x": 0.28, "y": 0.55}}}
```
Never include that block otherwise."#;

/// 会話用システム指示を生成（解析結果の要約を含める）
pub fn build_chat_system_instruction(analysis: &PcbAnalysis) -> String {
    let components = analysis
        .components
        .iter()
        .map(|c| {
            format!(
                "- {} (MPN: {}) presence={} condition={} bbox=({:.2},{:.2},{:.2},{:.2})",
                c.designator,
                if c.mpn.is_empty() { "unknown" } else { c.mpn.as_str() },
                c.presence.as_str(),
                c.condition.as_str(),
                c.bbox.x,
                c.bbox.y,
                c.bbox.w,
                c.bbox.h,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let defects = analysis
        .defects
        .iter()
        .map(|d| {
            format!(
                "- {} {}: {}",
                d.id,
                d.defect_type,
                d.description.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{CHAT_PERSONA}\n\n## Inspection summary\n{}\n\n## Components\n{}\n\n## Defects\n{}",
        if analysis.summary.is_empty() { "-" } else { analysis.summary.as_str() },
        if components.is_empty() { "-".to_string() } else { components },
        if defects.is_empty() { "-".to_string() } else { defects },
    )
}

/// 送信メッセージに付加する文脈
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub selected_component: Option<Component>,
    pub board_voltage: Option<f64>,
}

/// ユーザー入力に文脈を付加（送信用。会話ログには元の文を残す）
pub fn decorate_chat_message(user_text: &str, context: &ChatContext) -> String {
    let mut message = String::new();

    if let Some(component) = &context.selected_component {
        message.push_str(&format!(
            "[Context: The user has selected component {} (MPN: {}). Status: presence {}, condition {}.]\n\n",
            component.designator,
            if component.mpn.is_empty() { "unknown" } else { component.mpn.as_str() },
            component.presence.as_str(),
            component.condition.as_str(),
        ));
    }

    message.push_str(user_text);

    if let Some(voltage) = context.board_voltage {
        message.push_str(&format!("\n\n[Note: The board is powered at {} V.]", voltage));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Condition, Defect, Presence};

    fn regulator() -> Component {
        Component {
            designator: "U1".to_string(),
            mpn: "LM1117-3.3".to_string(),
            bbox: BoundingBox::new(0.1, 0.2, 0.1, 0.1),
            presence: Presence::Ok,
            condition: Condition::Burnt,
            confidence: 0.9,
            temperature: None,
            max_voltage: Some(15.0),
            datasheet_url: None,
        }
    }

    #[test]
    fn test_schema_required_keys() {
        let schema = analysis_response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["components", "defects", "summary", "advice"]);
        assert_eq!(
            schema["properties"]["components"]["items"]["properties"]["condition"]["enum"],
            json!(["burnt", "corroded", "ok"])
        );
        assert_eq!(
            schema["properties"]["components"]["items"]["properties"]["presence"]["enum"],
            json!(["missing", "ok"])
        );
    }

    #[test]
    fn test_decorate_plain() {
        let text = decorate_chat_message("Is this fixable?", &ChatContext::default());
        assert_eq!(text, "Is this fixable?");
    }

    #[test]
    fn test_decorate_with_selection_and_voltage() {
        let context = ChatContext {
            selected_component: Some(regulator()),
            board_voltage: Some(12.0),
        };
        let text = decorate_chat_message("Can I replace it?", &context);
        assert!(text.starts_with("[Context: The user has selected component U1 (MPN: LM1117-3.3)"));
        assert!(text.contains("condition burnt"));
        assert!(text.contains("Can I replace it?"));
        assert!(text.ends_with("[Note: The board is powered at 12 V.]"));
    }

    #[test]
    fn test_chat_system_instruction_digest() {
        let analysis = PcbAnalysis {
            components: vec![regulator()],
            defects: vec![Defect {
                id: "D1".to_string(),
                defect_type: "overheating".to_string(),
                bbox: BoundingBox::new(0.1, 0.2, 0.1, 0.1),
                confidence: 0.7,
                description: Some("Discoloured area around U1".to_string()),
            }],
            summary: "Regulator failed".to_string(),
            ..Default::default()
        };
        let instruction = build_chat_system_instruction(&analysis);
        assert!(instruction.contains("\"Guru\""));
        assert!(instruction.contains("- U1 (MPN: LM1117-3.3) presence=ok condition=burnt"));
        assert!(instruction.contains("- D1 overheating: Discoloured area around U1"));
        assert!(instruction.contains("Regulator failed"));
    }
}
