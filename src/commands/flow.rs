//! Flow Commands
//!
//! Presentation-facing entry points of the consultation flow. Every command
//! returns a [`CommandResponse`]; the outer `Err` is reserved for failures of
//! the command layer itself.

use guided_triage_core::{Hospital, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::models::CommandResponse;
use crate::services::flow::{FlowService, FlowSnapshot, ResultHandoff};

/// Reference data for the intake view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogView {
    pub hospitals: Vec<Hospital>,
    pub symptom_tags: Vec<String>,
}

/// List hospitals and symptom shortcuts
pub async fn get_catalog(state: &FlowService) -> Result<CommandResponse<CatalogView>, String> {
    let catalog = state.catalog();
    Ok(CommandResponse::ok(CatalogView {
        hospitals: catalog.hospitals.clone(),
        symptom_tags: catalog.symptom_tags.clone(),
    }))
}

/// Current session state
pub async fn get_flow_snapshot(state: &FlowService) -> Result<CommandResponse<FlowSnapshot>, String> {
    Ok(CommandResponse::ok(state.snapshot().await))
}

pub async fn select_hospital(
    hospital_id: String,
    state: &FlowService,
) -> Result<CommandResponse<()>, String> {
    Ok(state.select_hospital(&hospital_id).await.into())
}

pub async fn set_input_text(
    text: String,
    state: &FlowService,
) -> Result<CommandResponse<()>, String> {
    state.set_input_text(text).await;
    Ok(CommandResponse::ok(()))
}

/// Send a message; with no text the draft input buffer is sent
pub async fn send_message(
    text: Option<String>,
    state: &FlowService,
) -> Result<CommandResponse<()>, String> {
    let result = match text {
        Some(text) => state.send_message(&text).await,
        None => state.send_input().await,
    };
    Ok(result.into())
}

pub async fn select_symptom_tag(
    tag: String,
    state: &FlowService,
) -> Result<CommandResponse<()>, String> {
    Ok(state.select_symptom_tag(&tag).await.into())
}

pub async fn handle_task_action(
    step_id: String,
    task_id: String,
    state: &FlowService,
) -> Result<CommandResponse<()>, String> {
    Ok(state.handle_task_action(&step_id, &task_id).await.into())
}

/// Flag a running task; `status` is "warning" or "failed"
pub async fn report_task_status(
    step_id: String,
    task_id: String,
    status: String,
    message: Option<String>,
    state: &FlowService,
) -> Result<CommandResponse<()>, String> {
    let Some(status) = TaskStatus::from_str(&status) else {
        return Ok(CommandResponse::err(format!("Unknown task status: {}", status)));
    };
    Ok(state
        .report_task_status(&step_id, &task_id, status, message)
        .await
        .into())
}

pub async fn toggle_step_expansion(
    step_id: String,
    state: &FlowService,
) -> Result<CommandResponse<bool>, String> {
    Ok(state.toggle_step_expansion(&step_id).await.into())
}

pub async fn toggle_conversation_collapsed(
    state: &FlowService,
) -> Result<CommandResponse<bool>, String> {
    Ok(CommandResponse::ok(state.toggle_conversation_collapsed().await))
}

pub async fn restart_session(state: &FlowService) -> Result<CommandResponse<()>, String> {
    state.restart().await;
    Ok(CommandResponse::ok(()))
}

/// Result hand-off; an error response until results are available
pub async fn get_recommendations(
    state: &FlowService,
) -> Result<CommandResponse<ResultHandoff>, String> {
    match state.recommendations().await {
        Some(handoff) => Ok(CommandResponse::ok(handoff)),
        None => Ok(CommandResponse::err("Recommendations are not available yet")),
    }
}
