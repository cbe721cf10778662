//! アプリケーション状態コントローラ
//!
//! 解析結果・読み込み状態・選択/ホバー・基板電圧・会話ログを一か所で持ち、
//! 解析/チャットの両クライアントを順番に呼ぶ。
//!
//! 送信するリクエストには世代番号（generation）を付けたチケットを渡し、
//! 完了時に世代が変わっていれば結果を捨てる。アップロードやリセットで世代が進むため、
//! 古いセッションへの応答が新しいセッションに混ざることはない。

use crate::analyzer::AnalysisClient;
use crate::chat::{ChatClient, ChatReply, ChatSession};
use crate::error::{ErrorKind, PcbGuruError, Result};
use crate::image_source::UploadedImage;
use pcb_guru_common::{
    ChatContext, ChatMessage, Component, ExplorerFilter, JumperSuggestion, PcbAnalysis,
};
use std::time::Duration;

/// 画面の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Error,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "IDLE",
            Phase::Loading => "LOADING",
            Phase::Ready => "READY",
            Phase::Error => "ERROR",
        }
    }
}

/// 表示用のエラー情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&PcbGuruError> for ErrorInfo {
    fn from(err: &PcbGuruError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// 解析リクエストのチケット
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub generation: u64,
    pub image: UploadedImage,
}

/// チャット送信のチケット（送信中はセッションをここに預ける）
#[derive(Debug)]
pub struct ChatTicket {
    pub generation: u64,
    pub user_text: String,
    pub context: ChatContext,
    session: ChatSession,
}

impl ChatTicket {
    pub fn session_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Ready,
    Failed(ErrorInfo),
    /// 世代が古いので破棄した
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Replied,
    Failed(ErrorInfo),
    Stale,
}

/// 1セッション分の状態。アップロードで作り直し、リセットで破棄する
#[derive(Debug)]
struct SessionState {
    phase: Phase,
    image: Option<UploadedImage>,
    analysis: Option<PcbAnalysis>,
    error: Option<ErrorInfo>,
    selected_id: Option<String>,
    hovered_id: Option<String>,
    board_voltage: Option<f64>,
    transcript: Vec<ChatMessage>,
    chat_session: Option<ChatSession>,
    chat_busy: bool,
    jumper_suggestion: Option<JumperSuggestion>,
}

impl SessionState {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            image: None,
            analysis: None,
            error: None,
            selected_id: None,
            hovered_id: None,
            board_voltage: None,
            transcript: Vec::new(),
            chat_session: None,
            chat_busy: false,
            jumper_suggestion: None,
        }
    }
}

/// 表示・エクスポートに渡す読み取り専用ビュー
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub phase: Phase,
    pub image: Option<&'a UploadedImage>,
    pub analysis: Option<&'a PcbAnalysis>,
    pub transcript: &'a [ChatMessage],
    pub selected_id: Option<&'a str>,
    pub hovered_id: Option<&'a str>,
    pub board_voltage: Option<f64>,
    pub jumper_suggestion: Option<JumperSuggestion>,
    pub error: Option<&'a ErrorInfo>,
}

pub struct AppController {
    analysis_client: AnalysisClient,
    chat_client: ChatClient,
    chat_timeout: Duration,
    generation: u64,
    state: SessionState,
}

impl AppController {
    pub fn new(analysis_client: AnalysisClient, chat_client: ChatClient, chat_timeout: Duration) -> Self {
        Self {
            analysis_client,
            chat_client,
            chat_timeout,
            generation: 0,
            state: SessionState::idle(),
        }
    }

    // ============================================
    // アップロード
    // ============================================

    /// 状態を全て捨ててLOADINGへ（どの状態からでも可）
    pub fn begin_upload(&mut self, image: UploadedImage) -> AnalysisTicket {
        self.generation += 1;
        self.state = SessionState::idle();
        self.state.phase = Phase::Loading;
        self.state.image = Some(image.clone());

        tracing::debug!(generation = self.generation, file = %image.file_name, "アップロード開始");
        AnalysisTicket {
            generation: self.generation,
            image,
        }
    }

    pub fn complete_upload(&mut self, ticket: AnalysisTicket, result: Result<PcbAnalysis>) -> UploadOutcome {
        if ticket.generation != self.generation {
            tracing::warn!(
                ticket = ticket.generation,
                current = self.generation,
                "古い解析結果を破棄"
            );
            return UploadOutcome::Stale;
        }

        match result {
            Ok(analysis) => {
                self.state.analysis = Some(analysis);
                self.state.error = None;
                self.state.phase = Phase::Ready;
                UploadOutcome::Ready
            }
            Err(err) => {
                let info = ErrorInfo::from(&err);
                tracing::debug!(code = info.kind.code(), "解析失敗: {}", err);
                self.state.error = Some(info.clone());
                self.state.phase = Phase::Error;
                UploadOutcome::Failed(info)
            }
        }
    }

    pub async fn upload(&mut self, image: UploadedImage) -> UploadOutcome {
        let ticket = self.begin_upload(image);
        let result = self.analysis_client.analyze(&ticket.image).await;
        self.complete_upload(ticket, result)
    }

    /// 全てクリアしてIDLEへ。処理中のリクエストは孤立する
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = SessionState::idle();
        tracing::debug!(generation = self.generation, "リセット");
    }

    /// ERROR → IDLE。再アップロード用に直前の画像を返す
    pub fn retry(&mut self) -> Option<UploadedImage> {
        if self.state.phase != Phase::Error {
            return None;
        }
        let image = self.state.image.take();
        self.reset();
        image
    }

    pub async fn retry_upload(&mut self) -> Result<UploadOutcome> {
        let image = self
            .retry()
            .ok_or_else(|| PcbGuruError::InvalidInput("再試行できるエラーがありません".into()))?;
        Ok(self.upload(image).await)
    }

    // ============================================
    // 選択・ホバー・電圧
    // ============================================

    /// 同じIDなら選択解除、別のIDなら置き換え。戻り値は新しい選択
    pub fn toggle_select(&mut self, id: &str) -> Result<Option<&str>> {
        let analysis = self.state.analysis.as_ref().ok_or(PcbGuruError::NoAnalysis)?;
        if !analysis.contains_id(id) {
            return Err(PcbGuruError::InvalidInput(format!("該当する部品・欠陥がありません: {}", id)));
        }

        if self.state.selected_id.as_deref() == Some(id) {
            self.state.selected_id = None;
        } else {
            self.state.selected_id = Some(id.to_string());
        }
        Ok(self.state.selected_id.as_deref())
    }

    pub fn clear_selection(&mut self) {
        self.state.selected_id = None;
    }

    pub fn set_hover(&mut self, id: Option<&str>) {
        self.state.hovered_id = id.map(str::to_string);
    }

    pub fn set_board_voltage(&mut self, voltage: Option<f64>) -> Result<()> {
        if let Some(v) = voltage {
            if !v.is_finite() || v < 0.0 {
                return Err(PcbGuruError::InvalidInput(format!("電圧が不正です: {}", v)));
            }
        }
        self.state.board_voltage = voltage;
        Ok(())
    }

    // ============================================
    // チャット
    // ============================================

    pub fn begin_send(&mut self, text: &str) -> Result<ChatTicket> {
        if text.trim().is_empty() {
            return Err(PcbGuruError::InvalidInput("メッセージが空です".into()));
        }
        let analysis = match (&self.state.phase, &self.state.analysis) {
            (Phase::Ready, Some(analysis)) => analysis,
            _ => return Err(PcbGuruError::NoAnalysis),
        };
        if self.state.chat_busy {
            return Err(PcbGuruError::ChatBusy);
        }

        let session = match self.state.chat_session.take() {
            Some(session) => session,
            None => self.chat_client.create_session(analysis),
        };
        let context = ChatContext {
            selected_component: self.selected_component().cloned(),
            board_voltage: self.state.board_voltage,
        };

        self.state.transcript.push(ChatMessage::user(text));
        self.state.chat_busy = true;

        Ok(ChatTicket {
            generation: self.generation,
            user_text: text.to_string(),
            context,
            session,
        })
    }

    pub fn complete_send(&mut self, ticket: ChatTicket, result: Result<ChatReply>) -> ChatOutcome {
        if ticket.generation != self.generation {
            tracing::warn!(
                ticket = ticket.generation,
                current = self.generation,
                "古いチャット応答を破棄"
            );
            return ChatOutcome::Stale;
        }

        self.state.chat_session = Some(ticket.session);
        self.state.chat_busy = false;

        match result {
            Ok(reply) => {
                if reply.jumper_suggestion.is_some() {
                    self.state.jumper_suggestion = reply.jumper_suggestion;
                }
                self.state
                    .transcript
                    .push(ChatMessage::model(reply.display_text, reply.jumper_suggestion));
                ChatOutcome::Replied
            }
            Err(err) => {
                let info = ErrorInfo::from(&err);
                tracing::warn!(code = info.kind.code(), "チャット失敗: {}", err);
                self.state.transcript.push(ChatMessage::model(fallback_reply(&err), None));
                ChatOutcome::Failed(info)
            }
        }
    }

    /// 送信して応答を待つ（タイムアウト付き）
    pub async fn send_message(&mut self, text: &str) -> Result<ChatOutcome> {
        let mut ticket = self.begin_send(text)?;
        let user_text = ticket.user_text.clone();
        let context = ticket.context.clone();

        let result = match tokio::time::timeout(
            self.chat_timeout,
            self.chat_client.send(ticket.session_mut(), &user_text, &context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PcbGuruError::Timeout(self.chat_timeout.as_secs())),
        };

        Ok(self.complete_send(ticket, result))
    }

    // ============================================
    // 読み取り
    // ============================================

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn image(&self) -> Option<&UploadedImage> {
        self.state.image.as_ref()
    }

    pub fn analysis(&self) -> Option<&PcbAnalysis> {
        self.state.analysis.as_ref()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.state.transcript
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.state.selected_id.as_deref()
    }

    pub fn hovered_id(&self) -> Option<&str> {
        self.state.hovered_id.as_deref()
    }

    /// 選択中のIDが部品なら、その部品
    pub fn selected_component(&self) -> Option<&Component> {
        let id = self.state.selected_id.as_deref()?;
        self.state.analysis.as_ref()?.component(id)
    }

    pub fn board_voltage(&self) -> Option<f64> {
        self.state.board_voltage
    }

    pub fn jumper_suggestion(&self) -> Option<JumperSuggestion> {
        self.state.jumper_suggestion
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.state.error.as_ref()
    }

    pub fn is_chat_busy(&self) -> bool {
        self.state.chat_busy
    }

    pub fn has_chat_session(&self) -> bool {
        self.state.chat_session.is_some()
    }

    pub fn components_with_issues(&self) -> Vec<&Component> {
        self.state
            .analysis
            .as_ref()
            .map(|a| a.components_with_issues(self.state.board_voltage))
            .unwrap_or_default()
    }

    pub fn is_voltage_mismatch(&self, component: &Component) -> bool {
        component.voltage_mismatch(self.state.board_voltage)
    }

    pub fn explorer(&self, filter: &ExplorerFilter) -> Vec<&Component> {
        self.state
            .analysis
            .as_ref()
            .map(|a| filter.apply(a, self.state.board_voltage))
            .unwrap_or_default()
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            phase: self.state.phase,
            image: self.state.image.as_ref(),
            analysis: self.state.analysis.as_ref(),
            transcript: &self.state.transcript,
            selected_id: self.state.selected_id.as_deref(),
            hovered_id: self.state.hovered_id.as_deref(),
            board_voltage: self.state.board_voltage,
            jumper_suggestion: self.state.jumper_suggestion,
            error: self.state.error.as_ref(),
        }
    }
}

/// 失敗時に会話ログへ入れる代替メッセージ
fn fallback_reply(err: &PcbGuruError) -> String {
    match err {
        PcbGuruError::Timeout(_) => {
            "Sorry, the response took too long. Please try asking again.".to_string()
        }
        PcbGuruError::MissingApiKey => {
            "I can't reach the AI service because no API key is configured.".to_string()
        }
        _ => "Sorry, I couldn't get a response from the AI service. Please try again.".to_string(),
    }
}
