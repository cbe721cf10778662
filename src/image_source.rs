//! アップロード画像の読み込みとMIME判定

use crate::error::{PcbGuruError, Result};
use image::ImageFormat;
use std::path::Path;

/// 解析に送れるMIMEタイプ
const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif", "image/bmp"];

/// アップロードされた画像
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    /// バイト列から作成（中身→拡張子の順でMIMEを判定）
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let mime_type = detect_mime_type(&file_name, &bytes)
            .ok_or_else(|| PcbGuruError::UnsupportedImage(file_name.clone()))?;

        Ok(Self {
            file_name,
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// 画像ファイルを読み込む
pub fn load_image(path: &Path) -> Result<UploadedImage> {
    if !path.is_file() {
        return Err(PcbGuruError::FileNotFound(path.display().to_string()));
    }

    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    UploadedImage::from_bytes(file_name, bytes)
}

fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

fn mime_for_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

pub fn detect_mime_type(file_name: &str, bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes) {
        Ok(format) => mime_for_format(format),
        Err(_) => mime_for_extension(file_name),
    }
}

pub fn is_supported_mime_type(mime_type: &str) -> bool {
    SUPPORTED_MIME_TYPES.contains(&mime_type)
}
