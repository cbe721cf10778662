use super::ensure_parent_dir;
use crate::error::Result;
use pcb_guru_common::export::bom_core::generate_bom_csv;
use pcb_guru_common::PcbAnalysis;
use std::path::{Path, PathBuf};

/// 部品表をCSVで保存
pub fn export_csv(analysis: &PcbAnalysis, path: &Path) -> Result<PathBuf> {
    ensure_parent_dir(path)?;
    std::fs::write(path, generate_bom_csv(analysis))?;
    Ok(path.to_path_buf())
}
