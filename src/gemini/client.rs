use super::types::{ErrorEnvelope, GenerateRequest, GenerateResponse};
use super::ModelService;
use crate::config::Config;
use crate::error::{PcbGuruError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST (`models/{model}:generateContent`)
#[derive(Debug, Clone)]
pub struct GeminiService {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout_seconds: u64,
}

impl GeminiService {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PcbGuruError::Service(format!("HTTPクライアント初期化失敗: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> PcbGuruError {
        if err.is_timeout() {
            PcbGuruError::Timeout(self.timeout_seconds)
        } else {
            PcbGuruError::Service(err.to_string())
        }
    }
}

#[async_trait]
impl ModelService for GeminiService {
    async fn generate(&self, api_key: &str, request: &GenerateRequest) -> Result<String> {
        tracing::debug!(model = %self.model, contents = request.contents.len(), "generateContent");

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            tracing::warn!(status = status.as_u16(), "Gemini API error: {}", detail);
            return Err(PcbGuruError::Service(describe_status(status, &detail)));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| PcbGuruError::Service(format!("応答エンベロープを解釈できません: {}", e)))?;

        if let Some(text) = parsed.text() {
            return Ok(text);
        }

        let reason = parsed
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| parsed.candidates.first().and_then(|c| c.finish_reason.clone()))
            .unwrap_or_else(|| "empty".to_string());
        Err(PcbGuruError::MalformedResponse(format!("応答にテキストがありません ({})", reason)))
    }
}

fn describe_status(status: StatusCode, detail: &str) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("認証に失敗しました ({}): {}", status.as_u16(), detail)
        }
        StatusCode::TOO_MANY_REQUESTS => format!("レート制限中です: {}", detail),
        _ => format!("HTTP {}: {}", status.as_u16(), detail),
    }
}
