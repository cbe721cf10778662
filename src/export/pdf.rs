//! PDFレポート生成
//!
//! 構成: タイトル / 概要 / オーバーレイ図 / 不良一覧 / 部品一覧 / 代替部品 / アドバイス / 会話ログ。
//! 写真があればオーバーレイ付きスナップショットを図として埋め込み、PNGでも隣に保存する。
//! 写真がなければ図の枠の中に部品/欠陥の枠をベクターで描く。

use super::ensure_parent_dir;
use crate::controller::SessionView;
use crate::error::{ExportError, PcbGuruError, Result};
use crate::overlay::{render_snapshot, OverlayScene, SnapshotImage};
use pcb_guru_common::export::report_core::{
    advice_sections, alternatives_table, component_table, defect_table, transcript_lines, wrap_text,
    ReportTable,
};
use pcb_guru_common::export::bom_core::format_confidence;
use pcb_guru_common::geometry::{
    component_color, defect_color, popover_anchor, Rgba, COLOR_JUMPER, COLOR_SELECTED,
};
use pcb_guru_common::{AnalysisStats, BoundingBox, ChatMessage, PcbAnalysis};
use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, IndirectFontRef, Line, Mm,
    PdfDocument, PdfDocumentReference, PdfLayerReference, Point, Px, Rgb,
};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const A4_WIDTH_MM: f32 = 210.0;
const A4_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const CONTENT_WIDTH_MM: f32 = A4_WIDTH_MM - MARGIN_MM * 2.0;
const FIGURE_MAX_HEIGHT_MM: f32 = 110.0;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 10.0;
const TABLE_SIZE: f32 = 8.5;

/// pt → 行送り(mm)
fn line_height(size: f32) -> f32 {
    size * 0.5
}

/// 指定幅に入るおおよその文字数（Helvetica平均字幅で近似）
fn chars_for_width(width_mm: f32, size: f32) -> usize {
    ((width_mm / (size * 0.19)).floor() as usize).max(4)
}

/// レポートの入力
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub scene: OverlayScene<'a>,
    pub photo: Option<&'a [u8]>,
    pub transcript: &'a [ChatMessage],
    pub title: &'a str,
}

impl<'a> ReportInput<'a> {
    pub fn new(analysis: &'a PcbAnalysis) -> Self {
        Self {
            scene: OverlayScene::new(analysis),
            photo: None,
            transcript: &[],
            title: "PCB Inspection Report",
        }
    }

    pub fn from_view(view: &SessionView<'a>) -> Option<Self> {
        Some(Self {
            scene: OverlayScene::from_view(view)?,
            photo: view.image.map(|i| i.bytes.as_slice()),
            transcript: view.transcript,
            title: "PCB Inspection Report",
        })
    }
}

/// 書き出したファイル
#[derive(Debug, Clone)]
pub struct PdfArtifacts {
    pub pdf: PathBuf,
    pub snapshot: Option<PathBuf>,
}

impl PdfArtifacts {
    pub fn paths(self) -> Vec<PathBuf> {
        std::iter::once(self.pdf).chain(self.snapshot).collect()
    }
}

/// スナップショットの保存先（`report.pdf` → `report-overlay.png`）
pub fn snapshot_path_for(pdf_path: &Path) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "pcb-report".to_string());
    pdf_path.with_file_name(format!("{}-overlay.png", stem))
}

pub fn export_pdf(input: &ReportInput, path: &Path) -> Result<PdfArtifacts> {
    // スナップショットを先に作る（失敗時はPDFも作らない）
    let snapshot = match input.photo {
        Some(photo) => Some(render_snapshot(photo, &input.scene)?),
        None => None,
    };

    let bytes = generate_pdf(input, snapshot.as_ref())?;
    ensure_parent_dir(path)?;

    // PNGを先に書く。PDFの書き込みに失敗したらPNGも消す
    let snapshot_path = match snapshot {
        Some(snapshot) => {
            let snapshot_path = snapshot_path_for(path);
            std::fs::write(&snapshot_path, &snapshot.png)
                .map_err(|e| ExportError::ScreenshotFailed(format!("{}: {}", snapshot_path.display(), e)))?;
            Some(snapshot_path)
        }
        None => None,
    };

    if let Err(e) = std::fs::write(path, bytes) {
        if let Some(snapshot_path) = &snapshot_path {
            let _ = std::fs::remove_file(snapshot_path);
        }
        return Err(e.into());
    }

    Ok(PdfArtifacts {
        pdf: path.to_path_buf(),
        snapshot: snapshot_path,
    })
}

/// PDFをバイト列で生成
pub fn generate_pdf(input: &ReportInput, snapshot: Option<&SnapshotImage>) -> Result<Vec<u8>> {
    let mut writer = ReportWriter::new(input.title)?;
    let analysis = input.scene.analysis;

    writer.text(input.title, TITLE_SIZE, true);
    writer.text(
        &format!("Generated {}", chrono::Local::now().format("%Y-%m-%d %H:%M")),
        BODY_SIZE,
        false,
    );
    if let Some(voltage) = input.scene.board_voltage {
        writer.text(&format!("Board voltage: {} V", voltage), BODY_SIZE, false);
    }
    writer.gap(4.0);

    writer.heading("Summary");
    let stats = AnalysisStats::from_analysis(analysis, input.scene.board_voltage);
    writer.paragraph(&format!(
        "{} components ({} ok, {} missing, {} damaged, {} over-voltage), {} defects.",
        stats.total_components, stats.ok, stats.missing, stats.damaged, stats.over_voltage, stats.defects
    ));
    if !analysis.summary.is_empty() {
        writer.paragraph(&analysis.summary);
    }
    writer.gap(2.0);

    writer.heading("Overlay");
    writer.figure(&input.scene, snapshot);
    if let Some(line) = jumper_caption(&input.scene) {
        writer.paragraph(&line);
    }

    for table in [
        defect_table(analysis),
        component_table(analysis, input.scene.board_voltage),
        alternatives_table(analysis),
    ] {
        if !table.rows.is_empty() {
            writer.table(&table);
        }
    }

    let sections = advice_sections(analysis);
    if !sections.is_empty() {
        writer.heading("Repair advice");
        for (title, items) in sections {
            writer.text(title, BODY_SIZE, true);
            for item in items {
                writer.paragraph(&format!("- {}", item));
            }
            writer.gap(1.5);
        }
    }

    if !input.transcript.is_empty() {
        writer.heading("Guru conversation");
        for line in transcript_lines(input.transcript) {
            writer.paragraph(&line);
            writer.gap(1.0);
        }
    }

    writer.finish()
}

/// ページ送りを管理しながら上から順に描く
struct ReportWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    /// 次に描く行のベースライン（下端からのmm）
    cursor: f32,
    pages: usize,
}

impl ReportWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| pdf_error("フォント追加エラー", e))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| pdf_error("フォント追加エラー", e))?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(Self {
            doc,
            layer,
            font,
            bold,
            cursor: A4_HEIGHT_MM - MARGIN_MM,
            pages: 1,
        })
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height >= MARGIN_MM {
            return;
        }
        self.pages += 1;
        let (page, layer) = self
            .doc
            .add_page(Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), format!("Layer {}", self.pages));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor = A4_HEIGHT_MM - MARGIN_MM;
    }

    fn gap(&mut self, mm: f32) {
        self.cursor -= mm;
    }

    fn text_at(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.font };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn text(&mut self, text: &str, size: f32, bold: bool) {
        let height = line_height(size);
        self.ensure_space(height);
        self.cursor -= height;
        self.text_at(text, size, MARGIN_MM, self.cursor, bold);
    }

    fn heading(&mut self, text: &str) {
        self.ensure_space(line_height(HEADING_SIZE) + line_height(BODY_SIZE) * 3.0);
        self.gap(2.0);
        self.text(text, HEADING_SIZE, true);
        self.gap(1.0);
    }

    fn paragraph(&mut self, text: &str) {
        for line in wrap_text(text, chars_for_width(CONTENT_WIDTH_MM, BODY_SIZE)) {
            self.text(&line, BODY_SIZE, false);
        }
    }

    fn table(&mut self, table: &ReportTable) {
        self.heading(table.title);

        let widths: Vec<f32> = table.column_ratios.iter().map(|r| r * CONTENT_WIDTH_MM).collect();
        let header: Vec<String> = table.headers.iter().map(|h| h.to_string()).collect();
        self.table_row(&header, &widths, true);
        self.rule();

        for row in &table.rows {
            self.table_row(row, &widths, false);
        }
        self.gap(2.0);
    }

    fn table_row(&mut self, cells: &[String], widths: &[f32], bold: bool) {
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| wrap_text(cell, chars_for_width(width - 2.0, TABLE_SIZE)))
            .collect();
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let height = line_height(TABLE_SIZE) * lines as f32 + 1.0;

        self.ensure_space(height);
        let top = self.cursor;
        let mut x = MARGIN_MM;
        for (cell_lines, width) in wrapped.iter().zip(widths) {
            for (i, line) in cell_lines.iter().enumerate() {
                let y = top - line_height(TABLE_SIZE) * (i as f32 + 1.0);
                self.text_at(line, TABLE_SIZE, x, y, bold);
            }
            x += width;
        }
        self.cursor = top - height;
    }

    fn rule(&mut self) {
        set_stroke(&self.layer, [180, 180, 180, 255], 0.3);
        self.layer.add_line(polyline(
            &[(MARGIN_MM, self.cursor + 0.5), (A4_WIDTH_MM - MARGIN_MM, self.cursor + 0.5)],
            false,
        ));
        self.gap(1.0);
    }

    /// 画像枠にスナップショットを貼り、ラベルと選択中の詳細を重ねる
    ///
    /// スナップショットがなければ枠とジャンパ線もベクターで描く。
    fn figure(&mut self, scene: &OverlayScene, snapshot: Option<&SnapshotImage>) {
        let aspect = match snapshot {
            Some(s) if s.width > 0 && s.height > 0 => s.height as f32 / s.width as f32,
            _ => 0.75,
        };
        let mut width = CONTENT_WIDTH_MM;
        let mut height = width * aspect;
        if height > FIGURE_MAX_HEIGHT_MM {
            height = FIGURE_MAX_HEIGHT_MM;
            width = height / aspect;
        }

        self.ensure_space(height + 2.0);
        let frame = Frame {
            left: MARGIN_MM + (CONTENT_WIDTH_MM - width) / 2.0,
            top: self.cursor,
            width,
            height,
        };

        if let Some(snapshot) = snapshot {
            self.image(&frame, snapshot);
        }

        set_stroke(&self.layer, [60, 60, 60, 255], 0.4);
        self.layer.add_line(frame.rect(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)));

        let vector_boxes = snapshot.is_none();

        for defect in &scene.analysis.defects {
            if vector_boxes {
                let color = if scene.selected_id == Some(defect.id.as_str()) {
                    COLOR_SELECTED
                } else {
                    defect_color(&defect.defect_type)
                };
                set_stroke(&self.layer, color, 0.6);
                self.layer.add_line(frame.rect(&defect.bbox));
            }
            self.text_at(&defect.id, 6.0, frame.x(defect.bbox.x), frame.y(defect.bbox.y) + 0.8, false);
        }

        for component in &scene.analysis.components {
            if vector_boxes {
                let color = if scene.selected_id == Some(component.designator.as_str()) {
                    COLOR_SELECTED
                } else {
                    component_color(component.status(scene.board_voltage))
                };
                set_stroke(&self.layer, color, 0.6);
                self.layer.add_line(frame.rect(&component.bbox));
            }
            self.text_at(
                &component.designator,
                6.0,
                frame.x(component.bbox.x),
                frame.y(component.bbox.y) + 0.8,
                false,
            );
        }

        if let Some((bbox, lines)) = selection_details(scene) {
            self.popover(&frame, &bbox, &lines);
        }

        if let Some(jumper) = scene.jumper.filter(|_| vector_boxes) {
            set_stroke(&self.layer, COLOR_JUMPER, 1.2);
            self.layer.add_line(polyline(
                &[
                    (frame.x(jumper.from.x), frame.y(jumper.from.y)),
                    (frame.x(jumper.to.x), frame.y(jumper.to.y)),
                ],
                false,
            ));
        }

        self.cursor -= height + 2.0;
    }

    /// RGB画素をそのまま画像XObjectにして枠いっぱいに貼る
    fn image(&self, frame: &Frame, snapshot: &SnapshotImage) {
        let xobject = ImageXObject {
            width: Px(snapshot.width as usize),
            height: Px(snapshot.height as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: snapshot.rgb.clone(),
            image_filter: None,
            smask: None,
            clipping_bbox: None,
        };
        // 1px = 1pt になるdpiで枠の幅に合わせる
        let dpi = snapshot.width as f32 * 25.4 / frame.width;
        Image::from(xobject).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(frame.left)),
                translate_y: Some(Mm(frame.top - frame.height)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
    }

    /// 選択中の項目の詳細を枠の近くに出す
    fn popover(&self, frame: &Frame, anchor_of: &BoundingBox, lines: &[String]) {
        let area = popover_anchor(anchor_of).bbox();
        set_stroke(&self.layer, COLOR_SELECTED, 0.5);
        self.layer.add_line(frame.rect(&area));

        let chars = chars_for_width(area.w as f32 * frame.width - 2.0, 6.5);
        let mut y = frame.y(area.y) - line_height(6.5);
        for line in lines.iter().flat_map(|l| wrap_text(l, chars)) {
            if y < frame.y(area.y + area.h) {
                break;
            }
            self.text_at(&line, 6.5, frame.x(area.x) + 1.0, y, false);
            y -= line_height(6.5);
        }
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut buffer = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buffer)
            .map_err(|e| pdf_error("PDF保存エラー", e))?;
        buffer
            .into_inner()
            .map_err(|e| PcbGuruError::Export(ExportError::Generic(format!("PDF保存エラー: {}", e))))
    }
}

/// 選択中の部品/欠陥の位置と説明
fn selection_details(scene: &OverlayScene) -> Option<(BoundingBox, Vec<String>)> {
    let id = scene.selected_id?;
    if let Some(c) = scene.analysis.component(id) {
        let mut lines = vec![
            format!("{} {}", c.designator, if c.mpn.is_empty() { "" } else { c.mpn.as_str() }),
            format!("presence {} / condition {}", c.presence.as_str(), c.condition.as_str()),
            format!("status {} / confidence {}", c.status(scene.board_voltage).label(), format_confidence(c.confidence)),
        ];
        if let Some(max) = c.max_voltage {
            lines.push(format!("max {} V", max));
        }
        return Some((c.bbox, lines));
    }
    let d = scene.analysis.defect(id)?;
    Some((
        d.bbox,
        vec![
            format!("{} {}", d.id, d.defect_type),
            d.description.clone().unwrap_or_default(),
        ],
    ))
}

/// ジャンパ提案の説明（端点が乗っている部品を添える）
fn jumper_caption(scene: &OverlayScene) -> Option<String> {
    let jumper = scene.jumper?;
    let name = |p: pcb_guru_common::Point| {
        scene
            .analysis
            .component_at(p)
            .map_or_else(|| "-".to_string(), |c| c.designator.clone())
    };
    Some(format!(
        "Suggested jumper: {} ({:.2}, {:.2}) -> {} ({:.2}, {:.2})",
        name(jumper.from),
        jumper.from.x,
        jumper.from.y,
        name(jumper.to),
        jumper.to.x,
        jumper.to.y
    ))
}

/// ページ上の画像枠（正規化座標 → mm）
struct Frame {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

impl Frame {
    fn x(&self, nx: f64) -> f32 {
        self.left + nx.clamp(0.0, 1.0) as f32 * self.width
    }

    /// 画像は上から下、PDFは下から上
    fn y(&self, ny: f64) -> f32 {
        self.top - ny.clamp(0.0, 1.0) as f32 * self.height
    }

    fn rect(&self, bbox: &BoundingBox) -> Line {
        let (x0, y0) = (self.x(bbox.x), self.y(bbox.y));
        let (x1, y1) = (self.x(bbox.x + bbox.w), self.y(bbox.y + bbox.h));
        polyline(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)], true)
    }
}

fn polyline(points: &[(f32, f32)], is_closed: bool) -> Line {
    Line {
        points: points
            .iter()
            .map(|&(x, y)| (Point::new(Mm(x), Mm(y)), false))
            .collect(),
        is_closed,
    }
}

fn set_stroke(layer: &PdfLayerReference, color: Rgba, thickness: f32) {
    layer.set_outline_color(Color::Rgb(Rgb::new(
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
        None,
    )));
    layer.set_outline_thickness(thickness);
}

fn pdf_error(context: &str, err: impl std::fmt::Debug) -> PcbGuruError {
    PcbGuruError::Export(ExportError::Generic(format!("{}: {:?}", context, err)))
}
