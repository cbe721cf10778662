//! フォローアップ会話クライアント（Guru）
//!
//! セッションは解析1件に紐づき、システム指示は作成時に固定する。
//! 送信ごとに選択部品・基板電圧を付加し、応答からジャンパ提案を取り出す。

use crate::config::Credentials;
use crate::error::Result;
use crate::gemini::{Content, GenerateRequest, GenerationConfig, ModelService, Part};
use pcb_guru_common::prompts::build_chat_system_instruction;
use pcb_guru_common::{decorate_chat_message, extract_jumper, ChatContext, JumperSuggestion, PcbAnalysis};
use std::sync::Arc;

const CHAT_TEMPERATURE: f32 = 0.4;

/// 会話セッション（システム指示 + 履歴）
#[derive(Debug, Clone)]
pub struct ChatSession {
    system_instruction: String,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(analysis: &PcbAnalysis) -> Self {
        Self {
            system_instruction: build_chat_system_instruction(analysis),
            history: Vec::new(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// 往復数
    pub fn turns(&self) -> usize {
        self.history.len() / 2
    }

    fn request_for(&self, outbound: &str) -> GenerateRequest {
        let mut contents = self.history.clone();
        contents.push(Content::user(vec![Part::text(outbound)]));

        GenerateRequest {
            system_instruction: Some(Content::system(self.system_instruction.clone())),
            contents,
            generation_config: GenerationConfig {
                temperature: CHAT_TEMPERATURE,
                response_mime_type: None,
                response_schema: None,
            },
        }
    }

    fn record(&mut self, outbound: String, reply: String) {
        self.history.push(Content::user(vec![Part::text(outbound)]));
        self.history.push(Content::model(reply));
    }
}

/// 送信結果
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub display_text: String,
    pub jumper_suggestion: Option<JumperSuggestion>,
}

#[derive(Clone)]
pub struct ChatClient {
    service: Arc<dyn ModelService>,
    credentials: Credentials,
}

impl ChatClient {
    pub fn new(service: Arc<dyn ModelService>, credentials: Credentials) -> Self {
        Self { service, credentials }
    }

    pub fn create_session(&self, analysis: &PcbAnalysis) -> ChatSession {
        ChatSession::new(analysis)
    }

    /// 1メッセージ送信。成功時のみ履歴に追加
    pub async fn send(
        &self,
        session: &mut ChatSession,
        user_text: &str,
        context: &ChatContext,
    ) -> Result<ChatReply> {
        let api_key = self.credentials.resolve()?;

        let outbound = decorate_chat_message(user_text, context);
        let request = session.request_for(&outbound);
        tracing::debug!(turns = session.turns(), chars = outbound.len(), "チャット送信");

        let raw = self.service.generate(&api_key, &request).await?;
        let extraction = extract_jumper(&raw);
        if extraction.jumper.is_some() {
            tracing::debug!("ジャンパ提案を検出");
        }

        session.record(outbound, raw);

        Ok(ChatReply {
            display_text: extraction.display_text,
            jumper_suggestion: extraction.jumper,
        })
    }
}
