//! Conversation Integration Tests
//!
//! Turn counting, scripted replies, typing indicator and intake completion.

use guided_triage::{CoreError, FlowEvent, MessageOrigin, Stage, StepStatus};

use super::support::{complete_intake, drain, service, Clock, ANALYSIS_RUNNING};

#[tokio::test(start_paused = true)]
async fn test_first_user_turn_after_hospital_gets_second_reply() {
    let service = service();
    let clock = Clock::start();

    service.select_hospital("zrfy").await.unwrap();
    clock.advance_to(600).await;
    service.send_message("chest pain").await.unwrap();
    clock.advance_to(2150).await;

    let snapshot = service.snapshot().await;
    let replies = &service.catalog().replies;
    let contents: Vec<(MessageOrigin, &str)> = snapshot
        .messages
        .iter()
        .map(|m| (m.origin, m.content.as_str()))
        .collect();
    assert_eq!(
        contents,
        vec![
            (MessageOrigin::System, "Selected China-Japan Friendship Hospital, please describe your symptoms"),
            (MessageOrigin::User, "chest pain"),
            (MessageOrigin::Assistant, replies[0].as_str()),
            (MessageOrigin::Assistant, replies[1].as_str()),
        ]
    );
    assert_eq!(snapshot.turns, 2);
    assert!(!snapshot.intake_complete);
    assert_eq!(snapshot.stage, Stage::Intake);
}

#[tokio::test(start_paused = true)]
async fn test_three_turns_start_analysis() {
    let service = service();
    let clock = Clock::start();

    complete_intake(&service, &clock).await;
    clock.advance_to(2250).await;
    let snapshot = service.snapshot().await;
    assert!(snapshot.intake_complete);
    assert_eq!(snapshot.stage, Stage::Intake);

    clock.advance_to(ANALYSIS_RUNNING).await;
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.stage, Stage::Analysis);
    assert_eq!(snapshot.current_step, Some(0));
    assert_eq!(snapshot.steps[0].overall_status, StepStatus::InProgress);
    assert!(snapshot.steps[0].expanded);
    assert!(snapshot.conversation_collapsed);
}

#[tokio::test(start_paused = true)]
async fn test_blank_messages_are_ignored() {
    let service = service();
    let clock = Clock::start();
    let mut events = service.subscribe();

    service.send_message("").await.unwrap();
    service.send_message("   \t").await.unwrap();
    clock.advance_to(2000).await;

    let snapshot = service.snapshot().await;
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.turns, 0);
    assert!(!snapshot.is_typing);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_typing_indicator_tracks_pending_replies() {
    let service = service();
    let clock = Clock::start();

    service.send_message("Rib pain").await.unwrap();
    assert!(service.snapshot().await.is_typing);

    clock.advance_to(1000).await;
    service.send_message("Since this morning").await.unwrap();

    // First reply landed, second still pending
    clock.advance_to(1600).await;
    assert!(service.snapshot().await.is_typing);

    clock.advance_to(2600).await;
    assert!(!service.snapshot().await.is_typing);
}

#[tokio::test(start_paused = true)]
async fn test_replies_clamp_to_last_entry() {
    let service = service();
    let clock = Clock::start();
    let reply_count = service.catalog().replies.len();

    for i in 0..(reply_count + 2) as u64 {
        clock.advance_to(i * 10).await;
        service.send_message("more detail").await.unwrap();
    }
    clock.advance_to(1700).await;

    let snapshot = service.snapshot().await;
    let replies: Vec<&str> = snapshot
        .messages
        .iter()
        .filter(|m| m.origin == MessageOrigin::Assistant)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(replies.len(), reply_count + 2);
    let last = service.catalog().replies.last().unwrap().as_str();
    assert_eq!(replies[reply_count - 1], last);
    assert_eq!(replies[reply_count], last);
    assert_eq!(replies[reply_count + 1], last);
}

#[tokio::test(start_paused = true)]
async fn test_intake_completes_exactly_once() {
    let service = service();
    let clock = Clock::start();
    let mut events = service.subscribe();

    for i in 0..5u64 {
        clock.advance_to(i * 100).await;
        service.send_message("symptom").await.unwrap();
    }
    clock.advance_to(2600).await;

    let completions = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, FlowEvent::IntakeComplete))
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_input_uses_draft_buffer() {
    let service = service();

    service.set_input_text("Joint pain").await;
    assert_eq!(service.snapshot().await.input_text, "Joint pain");

    service.send_input().await.unwrap();
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.input_text, "");
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].content, "Joint pain");
    assert_eq!(snapshot.messages[0].origin, MessageOrigin::User);
}

#[tokio::test(start_paused = true)]
async fn test_symptom_tag_becomes_user_turn() {
    let service = service();

    service.select_symptom_tag("Chest pain").await.unwrap();
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].content, "Chest pain");
    assert_eq!(snapshot.turns, 1);

    let err = service.select_symptom_tag("Hiccups").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_hospital_is_rejected() {
    let service = service();
    let err = service.select_hospital("nowhere").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert!(service.snapshot().await.selected_hospital.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_hospital_acknowledgement_counts_as_turn() {
    let service = service();
    let clock = Clock::start();
    let mut events = service.subscribe();

    service.select_hospital("bdkq").await.unwrap();
    clock.advance_to(550).await;

    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.selected_hospital.as_ref().map(|h| h.id.as_str()), Some("bdkq"));
    assert_eq!(snapshot.turns, 1);
    assert_eq!(snapshot.messages[0].origin, MessageOrigin::System);

    let events = drain(&mut events);
    assert_eq!(
        events[0],
        FlowEvent::HospitalSelected {
            hospital_id: "bdkq".to_string()
        }
    );
}
