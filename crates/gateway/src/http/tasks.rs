//! Task Scheduler routes (§4.8, §4.12): `POST /api/tasks`,
//! `GET /api/tasks[?status=]`, `GET /api/tasks/budget`,
//! `GET/DELETE /api/tasks/:id`, `POST /api/tasks/:id/retry`,
//! `GET /api/tasks/:id/runs`.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use spaceduck_domain::model::{TaskBudget, TaskDefinition, TaskSchedule, TaskStatus};

use crate::http::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub definition: TaskDefinition,
    pub schedule: TaskSchedule,
    #[serde(default)]
    pub budget: TaskBudget,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .scheduler
        .create_task(body.definition, body.schedule, body.budget, body.max_attempts)
        .await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
}

fn parse_status(raw: &str) -> Option<TaskStatus> {
    match raw {
        "pending" => Some(TaskStatus::Pending),
        "scheduled" => Some(TaskStatus::Scheduled),
        "running" => Some(TaskStatus::Running),
        "completed" => Some(TaskStatus::Completed),
        "failed" => Some(TaskStatus::Failed),
        "dead_letter" => Some(TaskStatus::DeadLetter),
        "cancelled" => Some(TaskStatus::Cancelled),
        _ => None,
    }
}

pub async fn list(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Result<impl IntoResponse, ApiError> {
    let filter = q.status.as_deref().and_then(parse_status);
    let tasks = state.scheduler.list_tasks(filter).await?;
    Ok(Json(tasks))
}

pub async fn budget(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let status = state.scheduler.budget_status().await?;
    Ok(Json(status))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    match state.scheduler.get_task(&id).await? {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError(spaceduck_domain::error::Error::NotFound(format!("task {id}")))),
    }
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let cancelled = state.scheduler.cancel_task(&id).await?;
    Ok(Json(serde_json::json!({ "cancelled": cancelled })))
}

pub async fn retry(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let retried = state.scheduler.retry_task(&id).await?;
    Ok(Json(serde_json::json!({ "retried": retried })))
}

pub async fn runs(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let runs = state.scheduler.list_runs(&id).await?;
    Ok(Json(runs))
}
