use clap::Parser;
use pcb_guru::{build_controller, cli, config, error, export, image_source, inspect};
use pcb_guru::controller::UploadOutcome;
use pcb_guru::export::ReportInput;
use pcb_guru::overlay::OverlayScene;
use cli::{Cli, Commands, ExportFormat};
use config::Config;
use error::{PcbGuruError, Result};
use pcb_guru_common::PcbAnalysis;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Analyze { image, output, voltage } => {
            println!("🔍 pcb-guru - 基板診断\n");

            let mut controller = build_controller(&config)?;
            let outcome = inspect::upload_with_progress(&mut controller, &image).await?;
            if let UploadOutcome::Failed(info) = outcome {
                return Err(PcbGuruError::CliExecution(info.message));
            }
            controller.set_board_voltage(voltage)?;

            let analysis = controller.analysis().ok_or(PcbGuruError::NoAnalysis)?;
            inspect::print_summary(analysis, controller.board_voltage());

            if let Some(output) = output {
                let json = serde_json::to_string_pretty(analysis)?;
                std::fs::write(&output, json)?;
                println!("\n✔ 結果を保存: {}", output.display());
            }
        }

        Commands::Inspect { image, voltage } => {
            println!("🛠  pcb-guru - 対話モード\n");
            let mut controller = build_controller(&config)?;
            inspect::run_inspect(&mut controller, image, voltage).await?;
        }

        Commands::Export { input, format, image, output, voltage } => {
            println!("📄 pcb-guru - エクスポート\n");

            let content = std::fs::read_to_string(&input)?;
            let analysis: PcbAnalysis = serde_json::from_str(&content)?;
            if let Some(v) = voltage {
                if !v.is_finite() || v < 0.0 {
                    return Err(PcbGuruError::InvalidInput(format!("電圧が不正です: {}", v)));
                }
            }

            let output = output.unwrap_or_else(|| PathBuf::from("."));
            let path = export::output_path_for_format(&output, format.extension());
            println!("- {}を生成中...", format);

            let written = match format {
                ExportFormat::Csv => vec![export::csv::export_csv(&analysis, &path)?],
                ExportFormat::Excel => vec![export::excel::export_excel(&analysis, &path)?],
                ExportFormat::Pdf => {
                    let photo = match image {
                        Some(image) => Some(image_source::load_image(&image)?),
                        None => None,
                    };
                    let input = ReportInput {
                        scene: OverlayScene {
                            board_voltage: voltage,
                            ..OverlayScene::new(&analysis)
                        },
                        photo: photo.as_ref().map(|p| p.bytes.as_slice()),
                        ..ReportInput::new(&analysis)
                    };
                    export::pdf::export_pdf(&input, &path)?.paths()
                }
            };

            for path in written {
                println!("✔ 出力: {}", path.display());
            }
            println!("\n✅ エクスポート完了");
        }

        Commands::Config { set_api_key, show } => {
            let mut config = config;

            if let Some(key) = set_api_key {
                config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                println!("  モデル: {}", config.model);
                println!("  APIエンドポイント: {}", config.api_base_url);
                println!("  タイムアウト: {}秒（チャット {}秒）", config.timeout_seconds, config.chat_timeout_seconds);
                println!("  画像サイズ目安: {} MB", config.max_image_bytes / 1024 / 1024);
                println!(
                    "  APIキー: {}",
                    if config.credentials().is_available() { "設定済み" } else { "未設定" }
                );
            }
        }
    }

    Ok(())
}
