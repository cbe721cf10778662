//! エクスポート（CSV / Excel / PDF）と部品データシート検索
//!
//! 現在の状態を読むだけで、状態へは書き戻さない。

pub mod csv;
pub mod datasheet;
pub mod excel;
pub mod pdf;

pub use datasheet::datasheet_url;
pub use pdf::{PdfArtifacts, ReportInput};

use crate::cli::ExportFormat;
use crate::controller::SessionView;
use crate::error::{PcbGuruError, Result};
use std::path::{Path, PathBuf};

const DEFAULT_STEM: &str = "pcb-report";

/// 出力先がディレクトリ（または拡張子なし）ならファイル名を補う
pub fn output_path_for_format(output: &Path, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", DEFAULT_STEM, extension))
    } else {
        output.to_path_buf()
    }
}

/// 現在のセッションを書き出す。書き出したファイルを返す
pub fn export_view(view: &SessionView, format: ExportFormat, output: &Path) -> Result<Vec<PathBuf>> {
    let analysis = view.analysis.ok_or(PcbGuruError::NoAnalysis)?;
    let path = output_path_for_format(output, format.extension());

    let written = match format {
        ExportFormat::Csv => vec![csv::export_csv(analysis, &path)?],
        ExportFormat::Excel => vec![excel::export_excel(analysis, &path)?],
        ExportFormat::Pdf => {
            let input = ReportInput::from_view(view).ok_or(PcbGuruError::NoAnalysis)?;
            pdf::export_pdf(&input, &path)?.paths()
        }
    };

    tracing::info!(format = format.extension(), files = written.len(), "エクスポート完了");
    Ok(written)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
