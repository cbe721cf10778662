//! PCB Guru Common Library
//!
//! CLIと解析クライアントで共有される型とユーティリティ（I/Oなし）

pub mod types;
pub mod error;
pub mod geometry;
pub mod prompts;
pub mod parser;
pub mod explorer;
pub mod export;

pub use types::{
    Advice, Alternative, BoundingBox, ChatMessage, ChatRole, Component, ComponentStatus,
    Condition, Defect, JumperSuggestion, PcbAnalysis, Point, Presence, Replacement,
};
pub use error::{Error, Result};
pub use parser::{extract_jumper, parse_analysis_response, JumperExtraction};
pub use prompts::{decorate_chat_message, ChatContext};
pub use explorer::{AnalysisStats, ExplorerFilter};
