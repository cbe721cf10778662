use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pcb-guru")]
#[command(about = "基板写真AI診断・修理アシスタント", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 基板写真を解析して結果を表示
    Analyze {
        /// 基板写真のパス
        #[arg(required = true)]
        image: PathBuf,

        /// 解析結果JSONの保存先
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 基板電圧（V）。定格超過の判定に使う
        #[arg(long)]
        voltage: Option<f64>,
    },

    /// 解析後に対話モードで部品の確認・Guruへの質問を行う
    Inspect {
        /// 基板写真のパス
        #[arg(required = true)]
        image: PathBuf,

        /// 基板電圧（V）
        #[arg(long)]
        voltage: Option<f64>,
    },

    /// 保存した解析結果からCSV/Excel/PDFを生成
    Export {
        /// 解析結果JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力形式 (csv/excel/pdf)
        #[arg(short, long, default_value = "pdf")]
        format: ExportFormat,

        /// 元の基板写真（PDFにオーバーレイ画像を添える）
        #[arg(long)]
        image: Option<PathBuf>,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 基板電圧（V）
        #[arg(long)]
        voltage: Option<f64>,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
    #[default]
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(format!("Unknown format: {}. Use csv, excel, or pdf", s)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Excel => write!(f, "excel"),
            ExportFormat::Pdf => write!(f, "pdf"),
        }
    }
}
