//! Excel生成（部品表 + 不良一覧）

use super::ensure_parent_dir;
use crate::error::{ExportError, Result};
use pcb_guru_common::export::excel_core::generate_bom_excel_buffer;
use pcb_guru_common::PcbAnalysis;
use std::path::{Path, PathBuf};

pub fn export_excel(analysis: &PcbAnalysis, path: &Path) -> Result<PathBuf> {
    let buffer = generate_bom_excel_buffer(analysis)
        .map_err(|e| ExportError::Generic(format!("Excel生成エラー: {}", e)))?;

    ensure_parent_dir(path)?;
    std::fs::write(path, buffer)?;
    Ok(path.to_path_buf())
}
