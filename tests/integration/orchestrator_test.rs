//! Step Orchestrator Integration Tests
//!
//! Staggered task starts, progress aggregation, step completion cascade,
//! confidence updates and the user/warning paths.

use std::collections::HashMap;

use guided_triage::{CoreError, FlowEvent, Stage, StepStatus, TaskStatus};

use super::support::{
    complete_intake, drain, service, Clock, ANALYSIS_RUNNING, RESULT_SHOWN, STEP_ZERO_DONE,
};

#[tokio::test(start_paused = true)]
async fn test_tasks_start_in_order_with_stagger() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;

    clock.advance_to(ANALYSIS_RUNNING).await;
    let snapshot = service.snapshot().await;
    let tasks = &snapshot.steps[0].tasks;
    assert_eq!(tasks[0].status, TaskStatus::InProgress);
    assert_eq!(tasks[0].progress, 0);
    assert!(tasks[1..].iter().all(|t| t.status == TaskStatus::Pending));

    clock.advance_to(4350).await;
    let snapshot = service.snapshot().await;
    let tasks = &snapshot.steps[0].tasks;
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[1].status, TaskStatus::InProgress);
    assert_eq!(tasks[2].status, TaskStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_step_progress_is_mean_of_tasks() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;

    clock.advance_to(3950).await;
    let snapshot = service.snapshot().await;
    let step = &snapshot.steps[0];
    assert_eq!(step.tasks[0].progress, 50);
    // 0.5 / 6 tasks
    assert_eq!(step.overall_progress, 8);
}

#[tokio::test(start_paused = true)]
async fn test_step_zero_completes_exactly_once() {
    let service = service();
    let clock = Clock::start();
    let mut events = service.subscribe();
    complete_intake(&service, &clock).await;

    clock.advance_to(8350).await;
    let snapshot = service.snapshot().await;
    let step = &snapshot.steps[0];
    assert!(step.tasks.iter().all(|t| t.status == TaskStatus::Completed));
    assert_eq!(step.overall_progress, 100);
    assert!(snapshot.completed_steps.is_empty(), "completion waits for the settle delay");

    clock.advance_to(STEP_ZERO_DONE).await;
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.steps[0].overall_status, StepStatus::Completed);
    assert_eq!(snapshot.steps[0].overall_progress, 100);
    assert!(snapshot.steps[0].can_proceed);
    assert_eq!(snapshot.completed_steps, vec![0]);
    assert_eq!(snapshot.current_step, Some(1));

    clock.advance_to(RESULT_SHOWN).await;
    let completions = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, FlowEvent::StepCompleted { step_index: 0, .. }))
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_next_step_runs_after_completion() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;

    clock.advance_to(9650).await;
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.current_step, Some(1));
    assert_eq!(snapshot.steps[1].overall_status, StepStatus::InProgress);
    assert!(snapshot.steps[1].expanded);
    assert!(!snapshot.steps[0].expanded);
    assert_eq!(snapshot.steps[1].tasks[0].status, TaskStatus::InProgress);
}

#[tokio::test(start_paused = true)]
async fn test_full_run_reaches_result() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;

    clock.advance_to(27700).await;
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.stage, Stage::Analysis);
    assert_eq!(snapshot.completed_steps, vec![0, 1, 2, 3]);

    clock.advance_to(RESULT_SHOWN).await;
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.stage, Stage::Result);
    assert_eq!(snapshot.current_step, Some(4));
    for step in &snapshot.steps {
        assert_eq!(step.overall_status, StepStatus::Completed);
        assert_eq!(step.overall_progress, 100);
        assert!(step.tasks.iter().all(|t| t.progress == 100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_task_progress_is_monotonic() {
    let service = service();
    let clock = Clock::start();
    let mut events = service.subscribe();
    complete_intake(&service, &clock).await;
    clock.advance_to(RESULT_SHOWN).await;

    let mut last: HashMap<(usize, String), u8> = HashMap::new();
    for event in drain(&mut events) {
        let (key, progress) = match event {
            FlowEvent::TaskProgress {
                step_index,
                task_id,
                progress,
            } => ((step_index, task_id), progress),
            FlowEvent::TaskCompleted {
                step_index,
                task_id,
                ..
            } => ((step_index, task_id), 100),
            _ => continue,
        };
        let previous = last.insert(key.clone(), progress).unwrap_or(0);
        assert!(progress >= previous, "{:?} went from {} to {}", key, previous, progress);
        assert!(progress <= 100);
    }
    assert_eq!(last.len(), 6 + 5 + 6 + 6);
}

#[tokio::test(start_paused = true)]
async fn test_completed_indices_exclude_current_step() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;

    for at in (ANALYSIS_RUNNING..RESULT_SHOWN).step_by(1000) {
        clock.advance_to(at + 50).await;
        let snapshot = service.snapshot().await;
        if let Some(current) = snapshot.current_step {
            let running = snapshot
                .steps
                .get(current)
                .map_or(false, |s| s.overall_status == StepStatus::InProgress);
            if running {
                assert!(!snapshot.completed_steps.contains(&current));
            }
        }
        let mut sorted = snapshot.completed_steps.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, snapshot.completed_steps);
    }
}

#[tokio::test(start_paused = true)]
async fn test_confidence_seed_after_delay() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;

    clock.advance_to(5450).await;
    assert_eq!(service.snapshot().await.steps[0].confidence, None);

    clock.advance_to(5550).await;
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.steps[0].confidence, Some(65));
    assert!(snapshot.steps[1..].iter().all(|s| s.confidence.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_user_action_on_pending_task() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;
    clock.advance_to(ANALYSIS_RUNNING).await;

    service
        .handle_task_action("info-summary", "medical-history")
        .await
        .unwrap();
    let snapshot = service.snapshot().await;
    let task = snapshot.steps[0].task("medical-history").unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    // Unset confidence starts from the base before the bonus
    assert_eq!(snapshot.steps[0].confidence, Some(65));

    service
        .handle_task_action("info-summary", "medication-check")
        .await
        .unwrap();
    assert_eq!(service.snapshot().await.steps[0].confidence, Some(80));

    // Its scheduled start and the confidence seed leave both untouched
    clock.advance_to(5550).await;
    let snapshot = service.snapshot().await;
    let task = snapshot.steps[0].task("medical-history").unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(snapshot.steps[0].confidence, Some(80));
}

#[tokio::test(start_paused = true)]
async fn test_user_action_wins_over_running_ticks() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;

    // lab-results starts at 7500 and has one tick at 7700
    clock.advance_to(7750).await;
    let task = service.snapshot().await.steps[0].tasks[5].clone();
    assert_eq!(task.id, "lab-results");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.progress, 25);

    service.handle_task_action("info-summary", "lab-results").await.unwrap();
    clock.advance_to(7950).await;
    let task = service.snapshot().await.steps[0].tasks[5].clone();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);

    // The other tasks were already done, so the step settles early
    clock.advance_to(8300).await;
    assert_eq!(service.snapshot().await.completed_steps, vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_warning_blocks_step_until_user_recovers_it() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;
    clock.advance_to(ANALYSIS_RUNNING).await;

    service
        .report_task_status(
            "info-summary",
            "symptom-analysis",
            TaskStatus::Warning,
            Some("Symptom description is ambiguous".to_string()),
        )
        .await
        .unwrap();

    clock.advance_to(STEP_ZERO_DONE).await;
    let snapshot = service.snapshot().await;
    let step = &snapshot.steps[0];
    assert_eq!(step.tasks[0].status, TaskStatus::Warning);
    assert_eq!(
        step.tasks[0].message.as_deref(),
        Some("Symptom description is ambiguous")
    );
    assert!(step.tasks[1..].iter().all(|t| t.status == TaskStatus::Completed));
    assert_eq!(step.overall_progress, 83);
    assert!(snapshot.completed_steps.is_empty());
    assert_eq!(snapshot.stage, Stage::Analysis);

    service
        .handle_task_action("info-summary", "symptom-analysis")
        .await
        .unwrap();
    clock.advance_to(9550).await;
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.completed_steps, vec![0]);
    assert!(snapshot.steps[0].tasks[0].message.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_report_requires_running_task() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;
    clock.advance_to(ANALYSIS_RUNNING).await;

    let err = service
        .report_task_status("info-summary", "medication-check", TaskStatus::Failed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition(_)));

    let err = service
        .report_task_status("info-summary", "symptom-analysis", TaskStatus::InProgress, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[tokio::test(start_paused = true)]
async fn test_task_action_error_paths() {
    let service = service();
    let clock = Clock::start();

    let err = service
        .handle_task_action("info-summary", "medical-history")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition(_)));

    complete_intake(&service, &clock).await;
    clock.advance_to(ANALYSIS_RUNNING).await;

    let err = service
        .handle_task_action("unknown-step", "medical-history")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    let err = service
        .handle_task_action("info-summary", "unknown-task")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    clock.advance_to(STEP_ZERO_DONE).await;
    let err = service
        .handle_task_action("info-summary", "lab-results")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyCompleted(_)));
}

#[tokio::test(start_paused = true)]
async fn test_run_step_guards() {
    let service = service();
    let clock = Clock::start();
    complete_intake(&service, &clock).await;
    clock.advance_to(ANALYSIS_RUNNING).await;

    let before = service.snapshot().await;
    service.run_step(0).await.unwrap();
    assert_eq!(service.snapshot().await, before);

    assert!(matches!(
        service.run_step(2).await,
        Err(CoreError::InvalidTransition(_))
    ));
    assert!(matches!(service.run_step(9).await, Err(CoreError::OutOfRange(_))));

    // A second driver for step 0 would double the tick rate
    clock.advance_to(3950).await;
    assert_eq!(service.snapshot().await.steps[0].tasks[0].progress, 50);
}
