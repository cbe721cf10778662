//! PCB Guru
//!
//! 基板写真をGeminiで診断し、部品・欠陥・修理アドバイスを扱うライブラリ。
//! 共通の型とロジックは `pcb_guru_common` にある。

pub mod analyzer;
pub mod chat;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod gemini;
pub mod image_source;
pub mod inspect;
pub mod overlay;

use std::sync::Arc;
use std::time::Duration;

/// 設定からGemini接続のコントローラを組み立てる
pub fn build_controller(config: &config::Config) -> error::Result<controller::AppController> {
    let service: Arc<dyn gemini::ModelService> = Arc::new(gemini::GeminiService::new(config)?);
    let credentials = config.credentials();

    Ok(controller::AppController::new(
        analyzer::AnalysisClient::new(service.clone(), credentials.clone())
            .with_max_image_bytes(config.max_image_bytes),
        chat::ChatClient::new(service, credentials),
        Duration::from_secs(config.chat_timeout_seconds),
    ))
}
