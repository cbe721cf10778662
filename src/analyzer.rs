//! 解析リクエストクライアント
//!
//! 画像 + 指示文 + 出力スキーマを1リクエストで送り、応答JSONを `PcbAnalysis` に変換する。
//! 再試行はしない（呼び出し側の retry に任せる）。

use crate::config::Credentials;
use crate::error::{PcbGuruError, Result};
use crate::gemini::{Content, GenerateRequest, GenerationConfig, ModelService, Part};
use crate::image_source::{is_supported_mime_type, UploadedImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pcb_guru_common::prompts::{analysis_response_schema, ANALYSIS_INSTRUCTION, ANALYSIS_TEMPERATURE};
use pcb_guru_common::{parse_analysis_response, PcbAnalysis};
use std::sync::Arc;

const JSON_MIME_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct AnalysisClient {
    service: Arc<dyn ModelService>,
    credentials: Credentials,
    max_image_bytes: u64,
}

impl AnalysisClient {
    pub fn new(service: Arc<dyn ModelService>, credentials: Credentials) -> Self {
        Self {
            service,
            credentials,
            max_image_bytes: u64::MAX,
        }
    }

    /// 目安サイズ（超えたら警告ログのみ）
    pub fn with_max_image_bytes(mut self, max_image_bytes: u64) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// 画像を解析
    pub async fn analyze(&self, image: &UploadedImage) -> Result<PcbAnalysis> {
        // キーがなければ通信しない
        let api_key = self.credentials.resolve()?;

        if !is_supported_mime_type(&image.mime_type) {
            return Err(PcbGuruError::UnsupportedImage(format!(
                "{} ({})",
                image.file_name, image.mime_type
            )));
        }

        if image.size() as u64 > self.max_image_bytes {
            tracing::warn!(
                file = %image.file_name,
                bytes = image.size(),
                limit = self.max_image_bytes,
                "画像サイズが目安を超えています"
            );
        }

        let request = build_analysis_request(image);
        tracing::debug!(file = %image.file_name, bytes = image.size(), "解析リクエスト送信");

        let response = self.service.generate(&api_key, &request).await?;
        tracing::debug!(chars = response.len(), "解析レスポンス受信");

        let analysis = parse_analysis_response(&response)?;
        tracing::info!(
            components = analysis.components.len(),
            defects = analysis.defects.len(),
            "解析完了"
        );
        Ok(analysis)
    }
}

/// 解析リクエストを組み立て
pub fn build_analysis_request(image: &UploadedImage) -> GenerateRequest {
    GenerateRequest {
        system_instruction: None,
        contents: vec![Content::user(vec![
            Part::inline_data(image.mime_type.clone(), STANDARD.encode(&image.bytes)),
            Part::text(ANALYSIS_INSTRUCTION),
        ])],
        generation_config: GenerationConfig {
            temperature: ANALYSIS_TEMPERATURE,
            response_mime_type: Some(JSON_MIME_TYPE.to_string()),
            response_schema: Some(analysis_response_schema()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedReply {
        reply: String,
        calls: AtomicUsize,
    }

    impl FixedReply {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ModelService for FixedReply {
        async fn generate(&self, api_key: &str, _request: &GenerateRequest) -> Result<String> {
            assert_eq!(api_key, "test-key");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn png() -> UploadedImage {
        UploadedImage {
            file_name: "board.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_build_analysis_request() {
        let request = build_analysis_request(&png());
        assert!((request.generation_config.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(request.generation_config.response_mime_type.as_deref(), Some("application/json"));
        assert!(request.generation_config.response_schema.is_some());

        match &request.contents[0].parts[0] {
            Part::InlineData { inline_data } => {
                assert_eq!(inline_data.mime_type, "image/png");
                assert_eq!(inline_data.data, "AQID");
            }
            other => panic!("unexpected part: {:?}", other),
        }
        assert_eq!(request.last_user_text(), Some(ANALYSIS_INSTRUCTION));
    }

    #[tokio::test]
    async fn test_analyze_parses_reply() {
        let service = FixedReply::new(r#"{"components":[],"defects":[],"summary":"clean"}"#);
        let client = AnalysisClient::new(service.clone(), Credentials::fixed("test-key"));
        let analysis = client.analyze(&png()).await.unwrap();
        assert_eq!(analysis.summary, "clean");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_skips_network() {
        let service = FixedReply::new("{}");
        let client = AnalysisClient::new(service.clone(), Credentials::none());
        let err = client.analyze(&png()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_reply() {
        let service = FixedReply::new(r#"{"components":[]}"#);
        let client = AnalysisClient::new(service, Credentials::fixed("test-key"));
        let err = client.analyze(&png()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_oversized_image_is_advisory() {
        let service = FixedReply::new(r#"{"components":[],"defects":[]}"#);
        let client = AnalysisClient::new(service, Credentials::fixed("test-key")).with_max_image_bytes(1);
        assert!(client.analyze(&png()).await.is_ok());
    }
}
