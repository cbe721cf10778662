use crate::error::{PcbGuruError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// APIキーを探す環境変数（先頭優先）
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub timeout_seconds: u64,
    pub chat_timeout_seconds: u64,
    /// 目安の上限（超えても警告のみ）
    pub max_image_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default_config())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| PcbGuruError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("pcb-guru").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            timeout_seconds: 120,
            chat_timeout_seconds: 60,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }

    /// 呼び出し時点でキーを解決する資格情報
    pub fn credentials(&self) -> Credentials {
        Credentials::Env {
            fallback: self.api_key.clone(),
        }
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }
}

/// APIキーの取得元
#[derive(Debug, Clone)]
pub enum Credentials {
    /// 固定値（None はキーなし）
    Static(Option<String>),
    /// 環境変数を優先し、なければ設定ファイルの値
    Env { fallback: Option<String> },
}

impl Credentials {
    pub fn fixed(key: impl Into<String>) -> Self {
        Credentials::Static(Some(key.into()))
    }

    pub fn none() -> Self {
        Credentials::Static(None)
    }

    /// キーを解決（空文字はキーなし扱い）
    pub fn resolve(&self) -> Result<String> {
        let key = match self {
            Credentials::Static(key) => key.clone(),
            Credentials::Env { fallback } => API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|k| !k.trim().is_empty()))
                .or_else(|| fallback.clone()),
        };

        key.filter(|k| !k.trim().is_empty())
            .ok_or(PcbGuruError::MissingApiKey)
    }

    pub fn is_available(&self) -> bool {
        self.resolve().is_ok()
    }
}
