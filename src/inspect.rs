//! 対話モード（inspect）
//!
//! 解析結果を表示し、部品の選択・電圧設定・Guruへの質問・エクスポートをコマンドで行う。

use crate::cli::ExportFormat;
use crate::controller::{AppController, ChatOutcome, Phase, UploadOutcome};
use crate::error::{PcbGuruError, Result};
use crate::export::{datasheet_url, export_view};
use crate::image_source::load_image;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use pcb_guru_common::explorer::search_defects;
use pcb_guru_common::{AnalysisStats, ChatRole, Component, ExplorerFilter, PcbAnalysis};
use std::path::PathBuf;
use std::time::Duration;

const HELP: &str = "\
  list                  部品一覧
  issues                問題のある部品
  defects               欠陥一覧
  search <語>           部品・欠陥を検索
  select <ID>           選択（同じIDで解除）
  hover <ID|off>        ホバー
  voltage <V|off>       基板電圧
  ask <質問> / 任意の文  Guruに質問
  datasheet [ID]        データシートURL
  export <csv|excel|pdf> <パス>
  upload <パス>         別の写真を解析
  retry                 失敗した解析をやり直す
  reset                 全てクリア
  help / quit";

/// 対話コマンド
#[derive(Debug, Clone, PartialEq)]
pub enum InspectCommand {
    List,
    Issues,
    Defects,
    Search(String),
    Select(String),
    Hover(Option<String>),
    Voltage(Option<f64>),
    Ask(String),
    Datasheet(Option<String>),
    Export { format: ExportFormat, path: PathBuf },
    Upload(PathBuf),
    Retry,
    Reset,
    Help,
    Quit,
    Empty,
}

/// 入力行をコマンドに変換（認識できない語は質問として扱う）
pub fn parse_command(line: &str) -> std::result::Result<InspectCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(InspectCommand::Empty);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let command = match head.to_lowercase().as_str() {
        "list" | "ls" => InspectCommand::List,
        "issues" => InspectCommand::Issues,
        "defects" => InspectCommand::Defects,
        "search" if !rest.is_empty() => InspectCommand::Search(rest.to_string()),
        "select" | "sel" if !rest.is_empty() => InspectCommand::Select(rest.to_string()),
        "hover" => match rest {
            "" | "off" => InspectCommand::Hover(None),
            id => InspectCommand::Hover(Some(id.to_string())),
        },
        "voltage" | "v" => match rest {
            "" | "off" => InspectCommand::Voltage(None),
            value => {
                let value = value.trim_end_matches(['V', 'v']).trim();
                let volts = value
                    .parse::<f64>()
                    .map_err(|_| format!("電圧を数値で指定してください: {}", rest))?;
                InspectCommand::Voltage(Some(volts))
            }
        },
        "ask" if !rest.is_empty() => InspectCommand::Ask(rest.to_string()),
        "datasheet" | "ds" => InspectCommand::Datasheet((!rest.is_empty()).then(|| rest.to_string())),
        "export" => {
            let (format, path) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "使い方: export <csv|excel|pdf> <パス>".to_string())?;
            InspectCommand::Export {
                format: format.parse()?,
                path: PathBuf::from(path.trim()),
            }
        }
        "upload" if !rest.is_empty() => InspectCommand::Upload(PathBuf::from(rest)),
        "retry" => InspectCommand::Retry,
        "reset" => InspectCommand::Reset,
        "help" | "?" => InspectCommand::Help,
        "quit" | "exit" | "q" => InspectCommand::Quit,
        "search" | "select" | "sel" | "ask" | "upload" => {
            return Err(format!("{} には引数が必要です", head));
        }
        _ => InspectCommand::Ask(line.to_string()),
    };
    Ok(command)
}

pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::default_spinner());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// 写真を解析（スピナー付き）
pub async fn upload_with_progress(controller: &mut AppController, path: &std::path::Path) -> Result<UploadOutcome> {
    let image = load_image(path)?;
    println!("- {} ({} KB) を解析中...", image.file_name, image.size() / 1024);

    let bar = spinner("AI解析中...");
    let outcome = controller.upload(image).await;
    bar.finish_and_clear();

    report_upload(&outcome);
    Ok(outcome)
}

fn report_upload(outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Ready => println!("✔ 解析完了"),
        UploadOutcome::Failed(info) => {
            println!("✗ 解析失敗 [{}]: {}", info.kind.code(), info.message);
            if info.retryable {
                println!("  `retry` で再試行できます");
            }
        }
        UploadOutcome::Stale => {}
    }
}

/// 解析結果の概要を表示
pub fn print_summary(analysis: &PcbAnalysis, board_voltage: Option<f64>) {
    let stats = AnalysisStats::from_analysis(analysis, board_voltage);

    println!("\n=== 解析結果 ===");
    if !analysis.summary.is_empty() {
        println!("{}\n", analysis.summary);
    }
    println!(
        "部品: {}件（正常 {} / 欠品 {} / 損傷 {} / 電圧超過 {}）  欠陥: {}件",
        stats.total_components, stats.ok, stats.missing, stats.damaged, stats.over_voltage, stats.defects
    );
    if let Some(mean) = stats.mean_confidence {
        println!("平均信頼度: {:.0}%", mean * 100.0);
    }

    let issues = analysis.components_with_issues(board_voltage);
    if !issues.is_empty() {
        println!("\n要確認の部品:");
        print_components(&issues, board_voltage);
    }

    if !analysis.defects.is_empty() {
        println!("\n欠陥:");
        for defect in &analysis.defects {
            println!(
                "  {:<6} {:<16} {:>4.0}%  {}",
                defect.id,
                defect.defect_type,
                defect.confidence * 100.0,
                defect.description.as_deref().unwrap_or("")
            );
        }
    }

    let advice = &analysis.advice;
    if !advice.quick_actions.is_empty() {
        println!("\nすぐにできること:");
        for action in &advice.quick_actions {
            println!("  - {}", action);
        }
    }
    for alternative in &advice.alternatives {
        let replacements: Vec<&str> = alternative.replacements.iter().map(|r| r.mpn.as_str()).collect();
        println!("代替部品: {} → {}", alternative.original_mpn, replacements.join(", "));
    }
    if !advice.next_steps.is_empty() {
        println!("\n次のステップ:");
        for step in &advice.next_steps {
            println!("  - {}", step);
        }
    }
    if let Some(cost) = advice.repair_cost {
        println!("\n修理費の目安: ${:.2}", cost);
    }
}

fn print_components(components: &[&Component], board_voltage: Option<f64>) {
    for c in components {
        println!(
            "  {:<8} {:<20} {:<12} {:>4.0}%",
            c.designator,
            if c.mpn.is_empty() { "-" } else { c.mpn.as_str() },
            c.status(board_voltage).label(),
            c.confidence * 100.0
        );
    }
}

/// 対話ループ
pub async fn run_inspect(controller: &mut AppController, image: PathBuf, voltage: Option<f64>) -> Result<()> {
    upload_with_progress(controller, &image).await?;
    if voltage.is_some() {
        controller.set_board_voltage(voltage)?;
    }
    if let Some(analysis) = controller.analysis() {
        print_summary(analysis, controller.board_voltage());
    }

    println!("\nコマンド一覧は `help`。それ以外の入力はGuruへの質問になります。");

    loop {
        let prompt = match (controller.phase(), controller.selected_id()) {
            (Phase::Ready, Some(id)) => format!("guru [{}]", id),
            (phase, _) => format!("guru ({})", phase.label().to_lowercase()),
        };
        let line: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| PcbGuruError::CliExecution(e.to_string()))?;

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("  {}", message);
                continue;
            }
        };

        if command == InspectCommand::Quit {
            break;
        }
        if let Err(err) = execute(controller, command).await {
            println!("  ✗ {}", err);
        }
    }

    Ok(())
}

async fn execute(controller: &mut AppController, command: InspectCommand) -> Result<()> {
    match command {
        InspectCommand::Empty | InspectCommand::Quit => {}
        InspectCommand::Help => println!("{}", HELP),
        InspectCommand::List => {
            let components = controller.explorer(&ExplorerFilter::default());
            print_components(&components, controller.board_voltage());
        }
        InspectCommand::Issues => {
            let issues = controller.components_with_issues();
            if issues.is_empty() {
                println!("  問題のある部品はありません");
            }
            print_components(&issues, controller.board_voltage());
        }
        InspectCommand::Defects => {
            let analysis = controller.analysis().ok_or(PcbGuruError::NoAnalysis)?;
            for d in &analysis.defects {
                println!("  {:<6} {:<16} {}", d.id, d.defect_type, d.description.as_deref().unwrap_or(""));
            }
        }
        InspectCommand::Search(query) => {
            let analysis = controller.analysis().ok_or(PcbGuruError::NoAnalysis)?;
            let components = controller.explorer(&ExplorerFilter::query(query.clone()));
            let defects = search_defects(analysis, &query);
            if components.is_empty() && defects.is_empty() {
                println!("  該当なし");
            }
            print_components(&components, controller.board_voltage());
            for d in defects {
                println!("  {:<6} {}", d.id, d.defect_type);
            }
        }
        InspectCommand::Select(id) => match controller.toggle_select(&id)? {
            Some(selected) => {
                println!("  選択: {}", selected);
                if let Some(c) = controller.selected_component() {
                    println!(
                        "  MPN {} / presence {} / condition {}{}",
                        if c.mpn.is_empty() { "-" } else { c.mpn.as_str() },
                        c.presence.as_str(),
                        c.condition.as_str(),
                        if controller.is_voltage_mismatch(c) { " / 電圧超過" } else { "" }
                    );
                }
            }
            None => println!("  選択を解除しました"),
        },
        InspectCommand::Hover(id) => controller.set_hover(id.as_deref()),
        InspectCommand::Voltage(volts) => {
            controller.set_board_voltage(volts)?;
            match volts {
                Some(v) => println!(
                    "  基板電圧: {} V（電圧超過 {}件）",
                    v,
                    controller
                        .components_with_issues()
                        .iter()
                        .filter(|c| controller.is_voltage_mismatch(c))
                        .count()
                ),
                None => println!("  基板電圧を解除しました"),
            }
        }
        InspectCommand::Ask(text) => {
            let bar = spinner("Guruが考えています...");
            let outcome = controller.send_message(&text).await;
            bar.finish_and_clear();

            match outcome? {
                ChatOutcome::Replied | ChatOutcome::Failed(_) => {
                    if let Some(message) = controller.transcript().last().filter(|m| m.role == ChatRole::Model) {
                        println!("\nGuru: {}\n", message.text);
                        if let Some(j) = message.jumper_suggestion {
                            println!(
                                "  ジャンパ提案: ({:.2}, {:.2}) → ({:.2}, {:.2})",
                                j.from.x, j.from.y, j.to.x, j.to.y
                            );
                            if let Some(analysis) = controller.analysis() {
                                let name = |p: pcb_guru_common::Point| {
                                    analysis.component_at(p).map_or("-", |c| c.designator.as_str())
                                };
                                println!("  接続先: {} → {}", name(j.from), name(j.to));
                            }
                        }
                    }
                }
                ChatOutcome::Stale => {}
            }
        }
        InspectCommand::Datasheet(id) => {
            let id = id
                .or_else(|| controller.selected_id().map(str::to_string))
                .ok_or_else(|| PcbGuruError::InvalidInput("部品IDを指定するか、先に select してください".into()))?;
            let analysis = controller.analysis().ok_or(PcbGuruError::NoAnalysis)?;
            let component = analysis
                .component(&id)
                .ok_or_else(|| PcbGuruError::InvalidInput(format!("部品が見つかりません: {}", id)))?;
            println!("  {}", datasheet_url(component));
        }
        InspectCommand::Export { format, path } => {
            for written in export_view(&controller.view(), format, &path)? {
                println!("  ✔ {}", written.display());
            }
        }
        InspectCommand::Upload(path) => {
            upload_with_progress(controller, &path).await?;
            if let Some(analysis) = controller.analysis() {
                print_summary(analysis, controller.board_voltage());
            }
        }
        InspectCommand::Retry => {
            let bar = spinner("再解析中...");
            let outcome = controller.retry_upload().await;
            bar.finish_and_clear();
            report_upload(&outcome?);
            if let Some(analysis) = controller.analysis() {
                print_summary(analysis, controller.board_voltage());
            }
        }
        InspectCommand::Reset => {
            controller.reset();
            println!("  リセットしました。`upload <パス>` で新しい写真を解析できます");
        }
    }
    Ok(())
}
