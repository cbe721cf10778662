//! 状態コントローラの統合テスト（スクリプト化したモデルサービスを使用）

mod common;

use common::{board_image, controller, controller_with, Scripted, ScriptedService, TWO_COMPONENTS_ONE_DEFECT};
use pcb_guru::analyzer::AnalysisClient;
use pcb_guru::chat::ChatReply;
use pcb_guru::config::Credentials;
use pcb_guru::controller::{ChatOutcome, Phase, UploadOutcome};
use pcb_guru::error::{ErrorKind, PcbGuruError};
use pcb_guru_common::{ChatRole, JumperSuggestion, Point};

const JUMPER_REPLY: &str = "Run a jumper from the regulator output to C3.\n\n```json\n{\"jumper\": {\"from\": {\"x\": 0.25, \"y\": 0.35}, \"to\": {\"x\": 0.28, \"y\": 0.55}}}\n```";

#[tokio::test]
async fn test_upload_end_to_end() {
    let service = ScriptedService::new(vec![Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into())]);
    let client = AnalysisClient::new(service.clone(), Credentials::fixed("test-key"));
    let mut c = controller(service.clone());
    assert_eq!(c.phase(), Phase::Idle);

    let ticket = c.begin_upload(board_image());
    assert_eq!(c.phase(), Phase::Loading);
    assert!(c.analysis().is_none());

    let result = client.analyze(&ticket.image).await;
    assert_eq!(c.phase(), Phase::Loading);
    let outcome = c.complete_upload(ticket, result);

    assert_eq!(outcome, UploadOutcome::Ready);
    assert_eq!(c.phase(), Phase::Ready);
    assert!(c.error().is_none());
    let analysis = c.analysis().unwrap();
    assert_eq!(analysis.components.len(), 2);
    assert_eq!(analysis.defects.len(), 1);
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn test_upload_convenience_reaches_ready() {
    let service = ScriptedService::new(vec![Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into())]);
    let mut c = controller(service);

    assert_eq!(c.upload(board_image()).await, UploadOutcome::Ready);
    assert_eq!(c.phase(), Phase::Ready);
}

#[tokio::test]
async fn test_upload_failure_enters_error() {
    let service = ScriptedService::new(vec![Scripted::Fail(PcbGuruError::Service("HTTP 503".into()))]);
    let mut c = controller(service);

    let outcome = c.upload(board_image()).await;

    assert!(matches!(outcome, UploadOutcome::Failed(ref info) if info.kind == ErrorKind::Service));
    assert_eq!(c.phase(), Phase::Error);
    assert!(c.analysis().is_none());
    assert!(c.error().unwrap().retryable);
}

#[tokio::test]
async fn test_malformed_reply_enters_error() {
    let service = ScriptedService::new(vec![Scripted::Reply("Sorry, I cannot see a board.".into())]);
    let mut c = controller(service);

    let outcome = c.upload(board_image()).await;

    match outcome {
        UploadOutcome::Failed(info) => {
            assert_eq!(info.kind, ErrorKind::MalformedResponse);
            assert!(!info.retryable);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_credential_fails_before_transport() {
    let service = ScriptedService::new(vec![Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into())]);
    let mut c = controller_with(service.clone(), Credentials::none());

    let outcome = c.upload(board_image()).await;

    assert!(matches!(outcome, UploadOutcome::Failed(ref info) if info.kind == ErrorKind::Configuration));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_retry_upload_after_failure() {
    let service = ScriptedService::new(vec![
        Scripted::Fail(PcbGuruError::Timeout(120)),
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
    ]);
    let mut c = controller(service.clone());

    c.upload(board_image()).await;
    assert_eq!(c.phase(), Phase::Error);

    let outcome = c.retry_upload().await.unwrap();
    assert_eq!(outcome, UploadOutcome::Ready);
    assert_eq!(service.calls(), 2);
}

#[tokio::test]
async fn test_retry_rejected_when_not_in_error() {
    let service = ScriptedService::new(vec![]);
    let mut c = controller(service);
    assert!(matches!(c.retry_upload().await, Err(PcbGuruError::InvalidInput(_))));
}

#[tokio::test]
async fn test_new_upload_clears_everything_before_request() {
    let service = ScriptedService::new(vec![
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
        Scripted::Reply(JUMPER_REPLY.into()),
    ]);
    let mut c = controller(service);
    c.upload(board_image()).await;
    c.toggle_select("U1").unwrap();
    c.set_hover(Some("D1"));
    c.set_board_voltage(Some(5.0)).unwrap();
    c.send_message("How do I bypass U1?").await.unwrap();
    assert!(c.jumper_suggestion().is_some());
    assert!(c.has_chat_session());

    let generation = c.generation();
    let _ticket = c.begin_upload(board_image());

    assert_eq!(c.phase(), Phase::Loading);
    assert!(c.generation() > generation);
    assert!(c.analysis().is_none());
    assert!(c.transcript().is_empty());
    assert!(!c.has_chat_session());
    assert!(c.board_voltage().is_none());
    assert!(c.selected_id().is_none());
    assert!(c.hovered_id().is_none());
    assert!(c.jumper_suggestion().is_none());
    assert!(!c.is_chat_busy());
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let service = ScriptedService::new(vec![Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into())]);
    let mut c = controller(service);
    c.upload(board_image()).await;
    c.toggle_select("R17").unwrap();

    c.reset();

    let view = c.view();
    assert_eq!(view.phase, Phase::Idle);
    assert!(view.analysis.is_none());
    assert!(view.image.is_none());
    assert!(view.selected_id.is_none());
    assert!(view.transcript.is_empty());
}

#[tokio::test]
async fn test_stale_analysis_discarded_after_reset() {
    let service = ScriptedService::new(vec![]);
    let mut c = controller(service);

    let ticket = c.begin_upload(board_image());
    c.reset();

    let analysis = pcb_guru_common::parse_analysis_response(TWO_COMPONENTS_ONE_DEFECT).unwrap();
    assert_eq!(c.complete_upload(ticket, Ok(analysis)), UploadOutcome::Stale);
    assert_eq!(c.phase(), Phase::Idle);
    assert!(c.analysis().is_none());
}

#[tokio::test]
async fn test_chat_reply_with_jumper() {
    let service = ScriptedService::new(vec![
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
        Scripted::Reply(JUMPER_REPLY.into()),
    ]);
    let mut c = controller(service.clone());
    c.upload(board_image()).await;
    c.toggle_select("U1").unwrap();
    c.set_board_voltage(Some(5.0)).unwrap();

    let outcome = c.send_message("How do I bypass U1?").await.unwrap();
    assert_eq!(outcome, ChatOutcome::Replied);

    let transcript = c.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, ChatRole::User);
    assert_eq!(transcript[0].text, "How do I bypass U1?");
    assert_eq!(transcript[1].role, ChatRole::Model);
    assert_eq!(transcript[1].text, "Run a jumper from the regulator output to C3.");

    let expected = JumperSuggestion {
        from: Point::new(0.25, 0.35),
        to: Point::new(0.28, 0.55),
    };
    assert_eq!(transcript[1].jumper_suggestion, Some(expected));
    assert_eq!(c.jumper_suggestion(), Some(expected));

    let outbound = service.last_request();
    let text = outbound.last_user_text().unwrap();
    assert!(text.contains("selected component U1 (MPN: LM1117-3.3)"));
    assert!(text.contains("How do I bypass U1?"));
    assert!(text.contains("[Note: The board is powered at 5 V.]"));
}

#[tokio::test]
async fn test_chat_failure_appends_fallback() {
    let service = ScriptedService::new(vec![
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
        Scripted::Fail(PcbGuruError::Service("HTTP 500".into())),
    ]);
    let mut c = controller(service);
    c.upload(board_image()).await;

    let outcome = c.send_message("Is R17 fine?").await.unwrap();

    assert!(matches!(outcome, ChatOutcome::Failed(ref info) if info.kind == ErrorKind::Service));
    assert!(!c.is_chat_busy());
    assert_eq!(c.transcript().len(), 2);
    assert_eq!(c.transcript()[1].role, ChatRole::Model);
    assert_eq!(c.phase(), Phase::Ready);
}

#[tokio::test]
async fn test_chat_timeout_clears_busy() {
    let service = ScriptedService::new(vec![
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
        Scripted::Hang,
    ]);
    let mut c = controller(service);
    c.upload(board_image()).await;

    let outcome = c.send_message("hello?").await.unwrap();

    assert!(matches!(outcome, ChatOutcome::Failed(ref info) if info.kind == ErrorKind::Service));
    assert!(!c.is_chat_busy());
    assert!(c.transcript()[1].text.contains("took too long"));
}

#[tokio::test]
async fn test_concurrent_send_rejected() {
    let service = ScriptedService::new(vec![Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into())]);
    let mut c = controller(service);
    c.upload(board_image()).await;

    let ticket = c.begin_send("first").unwrap();
    assert!(matches!(c.send_message("second").await, Err(PcbGuruError::ChatBusy)));
    assert_eq!(c.transcript().len(), 1);

    c.complete_send(
        ticket,
        Ok(ChatReply {
            display_text: "ok".into(),
            jumper_suggestion: None,
        }),
    );
    assert!(!c.is_chat_busy());
}

#[tokio::test]
async fn test_stale_chat_reply_discarded() {
    let service = ScriptedService::new(vec![
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
    ]);
    let mut c = controller(service);
    c.upload(board_image()).await;

    let ticket = c.begin_send("what about D1?").unwrap();
    c.upload(board_image()).await;

    let outcome = c.complete_send(
        ticket,
        Ok(ChatReply {
            display_text: "late reply".into(),
            jumper_suggestion: None,
        }),
    );

    assert_eq!(outcome, ChatOutcome::Stale);
    assert!(c.transcript().is_empty());
    assert!(!c.is_chat_busy());
    assert!(!c.has_chat_session());
}

#[tokio::test]
async fn test_chat_requires_analysis() {
    let service = ScriptedService::new(vec![]);
    let mut c = controller(service);
    assert!(matches!(c.send_message("hi").await, Err(PcbGuruError::NoAnalysis)));
}

#[tokio::test]
async fn test_chat_session_reused_across_messages() {
    let service = ScriptedService::new(vec![
        Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into()),
        Scripted::Reply("first answer".into()),
        Scripted::Reply("second answer".into()),
    ]);
    let mut c = controller(service.clone());
    c.upload(board_image()).await;

    c.send_message("one").await.unwrap();
    c.send_message("two").await.unwrap();

    let request = service.last_request();
    assert_eq!(request.contents.len(), 3);
    assert!(request
        .system_instruction
        .as_ref()
        .and_then(|s| s.text())
        .unwrap()
        .contains("Guru"));
    assert_eq!(c.transcript().len(), 4);
}

#[tokio::test]
async fn test_voltage_mismatch_projection() {
    let service = ScriptedService::new(vec![Scripted::Reply(TWO_COMPONENTS_ONE_DEFECT.into())]);
    let mut c = controller(service);
    c.upload(board_image()).await;

    // U1 は焼損なので電圧に関係なく要確認
    assert_eq!(c.components_with_issues().len(), 1);

    c.set_board_voltage(Some(24.0)).unwrap();
    let u1 = c.analysis().unwrap().component("U1").unwrap().clone();
    assert!(c.is_voltage_mismatch(&u1));

    let r17 = c.analysis().unwrap().component("R17").unwrap().clone();
    assert!(!c.is_voltage_mismatch(&r17));
}
