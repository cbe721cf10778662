//! Excel生成（共通ライブラリ）
//!
//! BOM シートと不良一覧シートを持つブックを生成

use crate::export::bom_core::{bom_rows, format_confidence, BOM_HEADERS, NOT_AVAILABLE};
use crate::types::PcbAnalysis;
use rust_xlsxwriter::*;

const DEFECT_HEADERS: [&str; 4] = ["ID", "Type", "Confidence", "Description"];

/// 列幅（文字数）
const BOM_COLUMN_WIDTHS: [f64; 8] = [12.0, 22.0, 10.0, 10.0, 11.0, 12.0, 12.0, 40.0];
const DEFECT_COLUMN_WIDTHS: [f64; 4] = [8.0, 18.0, 11.0, 60.0];

/// BOM Excel をバッファに生成
pub fn generate_bom_excel_buffer(analysis: &PcbAnalysis) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0xFFFFFF))
        .set_background_color(Color::RGB(0x2F3A4F))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);

    let value_format = Format::new()
        .set_align(FormatAlign::Left)
        .set_text_wrap()
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    // BOM シート
    let rows = bom_rows(analysis);
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("BOM")
            .map_err(|e| format!("シート名設定エラー: {}", e))?;

        for (col, width) in BOM_COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)
                .map_err(|e| format!("列幅設定エラー: {}", e))?;
        }

        for (col, header) in BOM_HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)
                .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
        }

        for (i, row) in rows.iter().enumerate() {
            let excel_row = (i + 1) as u32;
            for (col, value) in row.values().iter().enumerate() {
                worksheet.write_string_with_format(excel_row, col as u16, *value, &value_format)
                    .map_err(|e| format!("値書き込みエラー: {}", e))?;
            }
        }
    }

    // 不良一覧シート
    {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Defects")
            .map_err(|e| format!("シート名設定エラー: {}", e))?;

        for (col, width) in DEFECT_COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)
                .map_err(|e| format!("列幅設定エラー: {}", e))?;
        }

        for (col, header) in DEFECT_HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)
                .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
        }

        for (i, defect) in analysis.defects.iter().enumerate() {
            let excel_row = (i + 1) as u32;
            let confidence = format_confidence(defect.confidence);
            let values = [
                defect.id.as_str(),
                defect.defect_type.as_str(),
                confidence.as_str(),
                defect.description.as_deref().unwrap_or(NOT_AVAILABLE),
            ];
            for (col, value) in values.iter().enumerate() {
                worksheet.write_string_with_format(excel_row, col as u16, *value, &value_format)
                    .map_err(|e| format!("値書き込みエラー: {}", e))?;
            }
        }
    }

    workbook.save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Component, Condition, Defect, Presence};

    #[test]
    fn test_generate_bom_excel_buffer() {
        let analysis = PcbAnalysis {
            components: vec![Component {
                designator: "R17".to_string(),
                mpn: String::new(),
                bbox: BoundingBox::new(0.4, 0.4, 0.05, 0.02),
                presence: Presence::Ok,
                condition: Condition::Ok,
                confidence: 0.92,
                temperature: None,
                max_voltage: None,
                datasheet_url: None,
            }],
            defects: vec![Defect {
                id: "D1".to_string(),
                defect_type: "solder_bridge".to_string(),
                bbox: BoundingBox::new(0.3, 0.3, 0.05, 0.02),
                confidence: 0.7,
                description: None,
            }],
            ..Default::default()
        };

        let buffer = generate_bom_excel_buffer(&analysis).expect("Excel生成失敗");
        // xlsx は zip（PK ヘッダ）
        assert!(buffer.len() > 4);
        assert_eq!(&buffer[..2], b"PK");
    }

    #[test]
    fn test_generate_bom_excel_buffer_empty() {
        let buffer = generate_bom_excel_buffer(&PcbAnalysis::default()).expect("Excel生成失敗");
        assert_eq!(&buffer[..2], b"PK");
    }
}
