use thiserror::Error;

/// エクスポート失敗（解析状態には影響しない）
#[derive(Error, Debug)]
pub enum ExportError {
    /// オーバーレイのスナップショット生成に失敗（SCREENSHOT_FAILED）
    #[error("スナップショット生成に失敗しました: {0}")]
    ScreenshotFailed(String),

    #[error("エクスポートに失敗しました: {0}")]
    Generic(String),
}

#[derive(Error, Debug)]
pub enum PcbGuruError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。GEMINI_API_KEY を設定するか `pcb-guru config --set-api-key YOUR_KEY` を実行してください")]
    MissingApiKey,

    /// 通信・認証・レート制限など（再試行可能）
    #[error("AIサービスエラー: {0}")]
    Service(String),

    #[error("AIサービスの応答がタイムアウトしました（{0}秒）")]
    Timeout(u64),

    /// 応答がJSONでない・必須キーがない
    #[error("解析データの形式が不正です。もう一度お試しください: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("チャット応答を待っています")]
    ChatBusy,

    #[error("解析結果がありません。先に画像をアップロードしてください")]
    NoAnalysis,

    #[error("入力が不正です: {0}")]
    InvalidInput(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("対応していない画像形式です: {0}")]
    UnsupportedImage(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("CLI実行エラー: {0}")]
    CliExecution(String),

    #[error(transparent)]
    Common(pcb_guru_common::Error),
}

impl From<pcb_guru_common::Error> for PcbGuruError {
    fn from(err: pcb_guru_common::Error) -> Self {
        match err {
            pcb_guru_common::Error::MalformedResponse(msg) => PcbGuruError::MalformedResponse(msg),
            pcb_guru_common::Error::Export(msg) => PcbGuruError::Export(ExportError::Generic(msg)),
            other => PcbGuruError::Common(other),
        }
    }
}

/// 表示側が振る舞いを変えるためのエラー種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Service,
    MalformedResponse,
    ScreenshotFailed,
    Export,
    /// 状態機械が操作を受け付けなかった
    Rejected,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::Service => "SERVICE_ERROR",
            ErrorKind::MalformedResponse => "MALFORMED_RESPONSE",
            ErrorKind::ScreenshotFailed => "SCREENSHOT_FAILED",
            ErrorKind::Export => "EXPORT_FAILED",
            ErrorKind::Rejected => "REJECTED",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl PcbGuruError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PcbGuruError::Config(_) | PcbGuruError::MissingApiKey => ErrorKind::Configuration,
            PcbGuruError::Service(_) | PcbGuruError::Timeout(_) => ErrorKind::Service,
            PcbGuruError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            PcbGuruError::Export(ExportError::ScreenshotFailed(_)) => ErrorKind::ScreenshotFailed,
            PcbGuruError::Export(ExportError::Generic(_)) => ErrorKind::Export,
            PcbGuruError::ChatBusy | PcbGuruError::NoAnalysis | PcbGuruError::InvalidInput(_) => {
                ErrorKind::Rejected
            }
            _ => ErrorKind::Internal,
        }
    }

    /// 同じ入力で再試行して意味があるか（解析: 再試行ボタンを出す）
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Service
    }
}

pub type Result<T> = std::result::Result<T, PcbGuruError>;
