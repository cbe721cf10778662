//! 統合テスト用のモデルサービス（応答を順番に返す）

#![allow(dead_code)]

use async_trait::async_trait;
use pcb_guru::analyzer::AnalysisClient;
use pcb_guru::chat::ChatClient;
use pcb_guru::config::Credentials;
use pcb_guru::controller::AppController;
use pcb_guru::error::{PcbGuruError, Result};
use pcb_guru::gemini::{GenerateRequest, ModelService};
use pcb_guru::image_source::UploadedImage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Scripted {
    Reply(String),
    Fail(PcbGuruError),
    /// 応答せずに待ち続ける
    Hang,
}

pub struct ScriptedService {
    script: Mutex<VecDeque<Scripted>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedService {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> GenerateRequest {
        self.requests.lock().unwrap().last().cloned().expect("no request recorded")
    }
}

#[async_trait]
impl ModelService for ScriptedService {
    async fn generate(&self, _api_key: &str, request: &GenerateRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(PcbGuruError::Service("script exhausted".into())),
        }
    }
}

pub fn controller_with(service: Arc<ScriptedService>, credentials: Credentials) -> AppController {
    AppController::new(
        AnalysisClient::new(service.clone(), credentials.clone()),
        ChatClient::new(service, credentials),
        Duration::from_millis(200),
    )
}

pub fn controller(service: Arc<ScriptedService>) -> AppController {
    controller_with(service, Credentials::fixed("test-key"))
}

pub fn board_image() -> UploadedImage {
    UploadedImage::from_bytes("board.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).unwrap()
}

/// 部品2件・欠陥1件の解析応答
pub const TWO_COMPONENTS_ONE_DEFECT: &str = r#"{
  "components": [
    {"designator": "R17", "mpn": "", "bbox": {"x": 0.1, "y": 0.2, "w": 0.05, "h": 0.03},
     "presence": "ok", "condition": "ok", "confidence": 0.92},
    {"designator": "U1", "mpn": "LM1117-3.3", "bbox": {"x": 0.4, "y": 0.4, "w": 0.1, "h": 0.1},
     "presence": "ok", "condition": "burnt", "confidence": 0.81, "maxVoltage": 15}
  ],
  "defects": [
    {"id": "D1", "type": "solder_bridge", "bbox": {"x": 0.6, "y": 0.1, "w": 0.05, "h": 0.05},
     "confidence": 0.7, "description": "Bridge between pins 2 and 3"}
  ],
  "summary": "Voltage regulator shows burn marks.",
  "advice": {"quick_actions": ["Inspect U1"], "alternatives": [], "next_steps": ["Replace U1"], "repair_cost": 8}
}"#;
