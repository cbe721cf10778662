//! オーバーレイ描画（写真 + 部品/欠陥の枠 + ジャンパ線）
//!
//! PDFレポート用のスナップショットを作る（PDF埋め込み用のRGB画素とPNG）。

use crate::controller::SessionView;
use crate::error::ExportError;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use pcb_guru_common::geometry::{
    component_color, defect_color, to_pixel_point, to_pixel_rect, COLOR_JUMPER, COLOR_SELECTED,
};
use pcb_guru_common::{JumperSuggestion, PcbAnalysis};
use std::io::Cursor;

/// 描画対象
#[derive(Debug, Clone, Copy)]
pub struct OverlayScene<'a> {
    pub analysis: &'a PcbAnalysis,
    pub board_voltage: Option<f64>,
    pub selected_id: Option<&'a str>,
    pub hovered_id: Option<&'a str>,
    pub jumper: Option<JumperSuggestion>,
}

impl<'a> OverlayScene<'a> {
    pub fn new(analysis: &'a PcbAnalysis) -> Self {
        Self {
            analysis,
            board_voltage: None,
            selected_id: None,
            hovered_id: None,
            jumper: None,
        }
    }

    pub fn from_view(view: &SessionView<'a>) -> Option<Self> {
        Some(Self {
            analysis: view.analysis?,
            board_voltage: view.board_voltage,
            selected_id: view.selected_id,
            hovered_id: view.hovered_id,
            jumper: view.jumper_suggestion,
        })
    }
}

/// 画像サイズに応じた線幅
fn base_thickness(img: &RgbaImage) -> u32 {
    (img.width().min(img.height()) / 250).max(2)
}

/// 写真の上に枠を描く
pub fn draw_overlay(img: &mut RgbaImage, scene: &OverlayScene) {
    let (w, h) = img.dimensions();
    let thickness = base_thickness(img);

    for defect in &scene.analysis.defects {
        if let Some(rect) = to_pixel_rect(&defect.bbox, w, h) {
            let emphasis = emphasis(scene, &defect.id);
            let color = if scene.selected_id == Some(defect.id.as_str()) {
                COLOR_SELECTED
            } else {
                defect_color(&defect.defect_type)
            };
            draw_rect_outline(img, rect.x, rect.y, rect.w, rect.h, Rgba(color), thickness + emphasis);
        }
    }

    for component in &scene.analysis.components {
        if let Some(rect) = to_pixel_rect(&component.bbox, w, h) {
            let emphasis = emphasis(scene, &component.designator);
            let color = if scene.selected_id == Some(component.designator.as_str()) {
                COLOR_SELECTED
            } else {
                component_color(component.status(scene.board_voltage))
            };
            draw_rect_outline(img, rect.x, rect.y, rect.w, rect.h, Rgba(color), thickness + emphasis);
        }
    }

    if let Some(jumper) = scene.jumper {
        let (x1, y1) = to_pixel_point(&jumper.from, w, h);
        let (x2, y2) = to_pixel_point(&jumper.to, w, h);
        let width = thickness as f64 * 1.5;
        draw_thick_line(img, x1, y1, x2, y2, Rgba(COLOR_JUMPER), width);
        draw_disc(img, x1, y1, width * 1.5, Rgba(COLOR_JUMPER));
        draw_disc(img, x2, y2, width * 1.5, Rgba(COLOR_JUMPER));
    }
}

/// 選択中は太く、ホバー中は少し太く
fn emphasis(scene: &OverlayScene, id: &str) -> u32 {
    if scene.selected_id == Some(id) {
        2
    } else if scene.hovered_id == Some(id) {
        1
    } else {
        0
    }
}

/// 写真を読み込んでオーバーレイを描き、PNGバイト列を返す
pub fn render_snapshot(photo: &[u8], scene: &OverlayScene) -> Result<SnapshotImage, ExportError> {
    let decoded = image::load_from_memory(photo)
        .map_err(|e| ExportError::ScreenshotFailed(format!("画像を読み込めません: {}", e)))?;
    let mut img = decoded.to_rgba8();
    draw_overlay(&mut img, scene);
    SnapshotImage::encode(img)
}

/// オーバーレイ描画済みのスナップショット
#[derive(Debug, Clone)]
pub struct SnapshotImage {
    pub width: u32,
    pub height: u32,
    /// 8bit RGB の画素列（アルファは捨てる）
    pub rgb: Vec<u8>,
    pub png: Vec<u8>,
}

impl SnapshotImage {
    fn encode(img: RgbaImage) -> Result<Self, ExportError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ExportError::ScreenshotFailed("画像サイズが0です".into()));
        }
        let dynamic = DynamicImage::ImageRgba8(img);
        let rgb = dynamic.to_rgb8().into_raw();
        let mut png = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| ExportError::ScreenshotFailed(format!("PNGエンコード失敗: {}", e)))?;
        Ok(Self {
            width,
            height,
            rgb,
            png,
        })
    }
}

fn draw_rect_outline(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>, thickness: u32) {
    if w == 0 || h == 0 || img.width() == 0 || img.height() == 0 {
        return;
    }
    let max_x = img.width() - 1;
    let max_y = img.height() - 1;

    let x0 = x.min(max_x);
    let y0 = y.min(max_y);
    let x1 = (x + w - 1).min(max_x);
    let y1 = (y + h - 1).min(max_y);

    // 内側に向かって太らせる（枠が画像外に出ない）
    for t in 0..thickness.max(1) {
        if x0 + t > x1.saturating_sub(t) || y0 + t > y1.saturating_sub(t) {
            break;
        }
        let (tx0, ty0, tx1, ty1) = (x0 + t, y0 + t, x1 - t, y1 - t);
        for xx in tx0..=tx1 {
            img.put_pixel(xx, ty0, color);
            img.put_pixel(xx, ty1, color);
        }
        for yy in ty0..=ty1 {
            img.put_pixel(tx0, yy, color);
            img.put_pixel(tx1, yy, color);
        }
    }
}

fn draw_disc(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    let max_x = img.width() as i64 - 1;
    let max_y = img.height() as i64 - 1;
    let min_x = ((cx - radius).floor() as i64).clamp(0, max_x);
    let hi_x = ((cx + radius).ceil() as i64).clamp(0, max_x);
    let min_y = ((cy - radius).floor() as i64).clamp(0, max_y);
    let hi_y = ((cy + radius).ceil() as i64).clamp(0, max_y);
    let r2 = radius * radius;

    for y in min_y..=hi_y {
        for x in min_x..=hi_x {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn draw_thick_line(img: &mut RgbaImage, x1: f64, y1: f64, x2: f64, y2: f64, color: Rgba<u8>, width: f64) {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let steps = (dx * dx + dy * dy).sqrt().max(1.0).ceil() as u32;
    let radius = (width.max(1.0) / 2.0).max(0.6);
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        draw_disc(img, x1 + dx * t, y1 + dy * t, radius, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_guru_common::geometry::{COLOR_DAMAGED, COLOR_OK};
    use pcb_guru_common::{BoundingBox, Component, Condition, Point, Presence};

    fn analysis() -> PcbAnalysis {
        let component = |designator: &str, x: f64, condition: Condition| Component {
            designator: designator.into(),
            mpn: String::new(),
            bbox: BoundingBox::new(x, 0.1, 0.2, 0.2),
            presence: Presence::Ok,
            condition,
            confidence: 0.9,
            temperature: None,
            max_voltage: None,
            datasheet_url: None,
        };
        PcbAnalysis {
            components: vec![
                component("R1", 0.1, Condition::Ok),
                component("U2", 0.6, Condition::Burnt),
            ],
            ..Default::default()
        }
    }

    fn blank(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn test_component_boxes_use_status_color() {
        let analysis = analysis();
        let mut img = blank(100, 100);
        draw_overlay(&mut img, &OverlayScene::new(&analysis));

        assert_eq!(img.get_pixel(10, 10).0, COLOR_OK);
        assert_eq!(img.get_pixel(60, 10).0, COLOR_DAMAGED);
        // 枠の内側は塗らない
        assert_eq!(img.get_pixel(20, 20).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_selected_box_highlighted() {
        let analysis = analysis();
        let mut img = blank(100, 100);
        let scene = OverlayScene {
            selected_id: Some("U2"),
            ..OverlayScene::new(&analysis)
        };
        draw_overlay(&mut img, &scene);
        assert_eq!(img.get_pixel(60, 10).0, COLOR_SELECTED);
    }

    #[test]
    fn test_jumper_line_drawn() {
        let analysis = PcbAnalysis::default();
        let mut img = blank(100, 100);
        let scene = OverlayScene {
            jumper: Some(JumperSuggestion {
                from: Point::new(0.1, 0.5),
                to: Point::new(0.9, 0.5),
            }),
            ..OverlayScene::new(&analysis)
        };
        draw_overlay(&mut img, &scene);
        assert_eq!(img.get_pixel(50, 50).0, COLOR_JUMPER);
    }

    #[test]
    fn test_snapshot_rejects_undecodable_photo() {
        let analysis = analysis();
        let result = render_snapshot(b"not an image", &OverlayScene::new(&analysis));
        assert!(matches!(result, Err(ExportError::ScreenshotFailed(_))));
    }

    #[test]
    fn test_snapshot_png_roundtrip() {
        let analysis = analysis();
        let mut photo = Vec::new();
        DynamicImage::ImageRgba8(blank(40, 30))
            .write_to(&mut Cursor::new(&mut photo), ImageFormat::Png)
            .unwrap();

        let snapshot = render_snapshot(&photo, &OverlayScene::new(&analysis)).unwrap();
        assert_eq!((snapshot.width, snapshot.height), (40, 30));
        assert_eq!(snapshot.rgb.len(), 40 * 30 * 3);
        assert_eq!(image::guess_format(&snapshot.png).unwrap(), ImageFormat::Png);
    }
}
