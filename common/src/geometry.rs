//! 座標変換と描画スタイル
//!
//! 正規化座標 [0,1] → ピクセル座標の変換、オーバーレイの配色、
//! ポップオーバー位置の簡易クランプ。

use crate::types::{BoundingBox, ComponentStatus, Point};

/// ピクセル座標の矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// 正規化矩形を画像サイズに合わせてピクセル矩形へ（画像外ははみ出さないよう切り詰め）
///
/// 幅・高さが0になる場合は None
pub fn to_pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<PixelRect> {
    if width == 0 || height == 0 {
        return None;
    }
    let x0 = (bbox.x.clamp(0.0, 1.0) * width as f64).round() as u32;
    let y0 = (bbox.y.clamp(0.0, 1.0) * height as f64).round() as u32;
    let x1 = ((bbox.x + bbox.w).clamp(0.0, 1.0) * width as f64).round() as u32;
    let y1 = ((bbox.y + bbox.h).clamp(0.0, 1.0) * height as f64).round() as u32;

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(PixelRect {
        x: x0.min(width - 1),
        y: y0.min(height - 1),
        w: x1 - x0,
        h: y1 - y0,
    })
}

/// 正規化点 → ピクセル座標（f64、画像内にクランプ）
pub fn to_pixel_point(point: &Point, width: u32, height: u32) -> (f64, f64) {
    (
        point.x.clamp(0.0, 1.0) * width as f64,
        point.y.clamp(0.0, 1.0) * height as f64,
    )
}

/// RGBA
pub type Rgba = [u8; 4];

pub const COLOR_OK: Rgba = [52, 199, 89, 255];
pub const COLOR_MISSING: Rgba = [142, 142, 147, 255];
pub const COLOR_DAMAGED: Rgba = [255, 59, 48, 255];
pub const COLOR_OVER_VOLTAGE: Rgba = [255, 149, 0, 255];
pub const COLOR_SELECTED: Rgba = [255, 214, 10, 255];
pub const COLOR_JUMPER: Rgba = [10, 132, 255, 255];
/// 未知の不良種別に使う色
pub const COLOR_DEFECT_FALLBACK: Rgba = [191, 90, 242, 255];

pub fn component_color(status: ComponentStatus) -> Rgba {
    match status {
        ComponentStatus::Ok => COLOR_OK,
        ComponentStatus::Missing => COLOR_MISSING,
        ComponentStatus::Damaged => COLOR_DAMAGED,
        ComponentStatus::VoltageMismatch => COLOR_OVER_VOLTAGE,
    }
}

/// 不良種別ごとの色。種別は開いた文字列なので未知の値はフォールバック色
pub fn defect_color(defect_type: &str) -> Rgba {
    match defect_type.to_ascii_lowercase().as_str() {
        "solder_bridge" => [255, 45, 85, 255],
        "misalignment" => [255, 204, 0, 255],
        "overheating" | "burn" | "burnt" => [255, 59, 48, 255],
        "corrosion" | "corroded" => [48, 176, 199, 255],
        "cold_joint" => [100, 210, 255, 255],
        "tombstoning" => [255, 159, 10, 255],
        _ => COLOR_DEFECT_FALLBACK,
    }
}

/// ポップオーバーの配置（ビューポート幅に対する割合）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopoverAnchor {
    pub left: f64,
    pub top: f64,
    /// 矩形の下ではなく上に出す
    pub above: bool,
}

/// ポップオーバーの想定幅（ビューポート比）
pub const POPOVER_WIDTH: f64 = 0.3;
pub const POPOVER_HEIGHT: f64 = 0.25;

impl PopoverAnchor {
    /// ポップオーバー自体の矩形
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.left, self.top, POPOVER_WIDTH, POPOVER_HEIGHT.min(1.0 - self.top))
    }
}

/// 矩形の近くにポップオーバーを置き、端でははみ出さないよう寄せる
///
/// 想定幅は固定の近似値で、厳密な保証はしない。
pub fn popover_anchor(bbox: &BoundingBox) -> PopoverAnchor {
    let left = bbox.x.clamp(0.0, (1.0 - POPOVER_WIDTH).max(0.0));
    let below = bbox.y + bbox.h;
    if below + POPOVER_HEIGHT > 1.0 && bbox.y >= POPOVER_HEIGHT {
        PopoverAnchor {
            left,
            top: bbox.y - POPOVER_HEIGHT,
            above: true,
        }
    } else {
        PopoverAnchor {
            left,
            top: below.min(1.0),
            above: false,
        }
    }
}
