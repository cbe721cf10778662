//! Gemini API連携
//!
//! 解析・チャットの両クライアントは `ModelService` 越しにモデルを呼ぶ。
//! 本番は `GeminiService`（REST）、テストはスクリプト化したモックを差し込む。

mod client;
mod types;

pub use client::GeminiService;
pub use types::{
    Candidate, Content, GenerateRequest, GenerateResponse, GenerationConfig, InlineData, Part,
    ROLE_MODEL, ROLE_USER,
};

use crate::error::Result;
use async_trait::async_trait;

/// 生成モデルの呼び出し口
#[async_trait]
pub trait ModelService: Send + Sync {
    /// 1リクエスト1応答。戻り値はモデル応答のテキスト部分
    async fn generate(&self, api_key: &str, request: &GenerateRequest) -> Result<String>;
}
