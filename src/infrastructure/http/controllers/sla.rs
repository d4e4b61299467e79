use crate::{
    domain::entities::{AppliedSla, SlaEvent, SlaPolicy, SlaPolicyRequest},
    infrastructure::http::middleware::{ApiError, ApiResult, AppState},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ApplySlaRequest {
    pub conversation_id: String,
    pub sla_policy_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
}

pub async fn list_policies(State(state): State<AppState>) -> ApiResult<Json<Vec<SlaPolicy>>> {
    let policies = state.sla_service.list_policies().await?;
    Ok(Json(policies))
}

pub async fn get_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SlaPolicy>> {
    let policy = state.sla_service.get_policy(&id).await?;
    Ok(Json(policy))
}

pub async fn create_policy(
    State(state): State<AppState>,
    Json(request): Json<SlaPolicyRequest>,
) -> ApiResult<(StatusCode, Json<SlaPolicy>)> {
    let policy = state.sla_service.create_policy(request).await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

pub async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SlaPolicyRequest>,
) -> ApiResult<Json<SlaPolicy>> {
    let policy = state.sla_service.update_policy(&id, request).await?;
    Ok(Json(policy))
}

pub async fn delete_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.sla_service.delete_policy(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Apply a policy to a conversation with the clock starting now.
pub async fn apply_sla(
    State(state): State<AppState>,
    Json(request): Json<ApplySlaRequest>,
) -> ApiResult<(StatusCode, Json<AppliedSla>)> {
    if request.conversation_id.trim().is_empty() {
        return Err(ApiError::BadRequest("conversation_id is required".to_string()));
    }

    state
        .sla_service
        .apply_sla(
            Utc::now(),
            &request.conversation_id,
            request.team_id.as_deref(),
            &request.sla_policy_id,
        )
        .await?;

    let applied = state
        .sla_service
        .get_applied_sla_by_conversation(&request.conversation_id)
        .await?;
    Ok((StatusCode::CREATED, Json(applied)))
}

pub async fn get_conversation_sla(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<AppliedSla>> {
    let applied = state
        .sla_service
        .get_applied_sla_by_conversation(&conversation_id)
        .await?;
    Ok(Json(applied))
}

pub async fn list_sla_events(
    State(state): State<AppState>,
    Path(applied_sla_id): Path<String>,
) -> ApiResult<Json<Vec<SlaEvent>>> {
    // 404 for an unknown applied SLA rather than an empty list
    state.sla_service.get_applied_sla(&applied_sla_id).await?;
    let events = state.sla_service.get_sla_events(&applied_sla_id).await?;
    Ok(Json(events))
}
