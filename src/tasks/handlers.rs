use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::Actor,
    error::ApiError,
    state::AppState,
    tasks::{
        dto::{CreateTaskRequest, TaskDetails, TaskPatch},
        policy, query,
        query::TaskListParams,
        repo_types::{TaskRecord, TaskStatus},
    },
    users::repo_types::User,
};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/report", get(report_tasks))
        .route(
            "/tasks/:id",
            get(get_task).patch(update_task).delete(delete_task),
        )
}

#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<TaskListParams>,
) -> Result<Json<Vec<TaskDetails>>, ApiError> {
    let spec = query::build_list_query(policy::list_scope(&actor), &params)?;
    let tasks = TaskRecord::list(&state.db, &spec).await?;
    Ok(Json(tasks.into_iter().map(TaskDetails::from).collect()))
}

/// List variant backing report export: deadline-ordered, status filter only.
#[instrument(skip(state))]
pub async fn report_tasks(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<TaskListParams>,
) -> Result<Json<Vec<TaskDetails>>, ApiError> {
    let spec = query::build_report_query(policy::list_scope(&actor), &params)?;
    let tasks = TaskRecord::list(&state.db, &spec).await?;
    Ok(Json(tasks.into_iter().map(TaskDetails::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskDetails>, ApiError> {
    let record = TaskRecord::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;
    policy::authorize_view(&actor, record.assigned_to)?;
    Ok(Json(TaskDetails::from(record)))
}

#[instrument(skip(state, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskDetails>), ApiError> {
    policy::authorize_create(&actor)?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("Please provide a title".into()));
    }
    // The assignee must exist before anything is written.
    if !User::exists(&state.db, payload.assigned_to).await? {
        return Err(ApiError::NotFound("Assigned user not found".into()));
    }

    let id = TaskRecord::create(
        &state.db,
        payload.title.trim(),
        payload.description.as_deref().unwrap_or_default(),
        payload.deadline,
        payload.status.unwrap_or(TaskStatus::Pending),
        payload.assigned_to,
        // created_by is always the acting admin, whatever the caller sent.
        actor.id,
    )
    .await?;

    let record = TaskRecord::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("task missing after insert")))?;

    info!(task_id = %id, assigned_to = %record.assigned_to, "task created");
    Ok((StatusCode::CREATED, Json(TaskDetails::from(record))))
}

#[instrument(skip(state, body))]
pub async fn update_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<TaskDetails>, ApiError> {
    let record = TaskRecord::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    let patch = TaskPatch::from_value(&body)?;
    policy::authorize_update(&actor, record.assigned_to, &patch)?;

    if let Some(assigned_to) = patch.assigned_to {
        if !User::exists(&state.db, assigned_to).await? {
            return Err(ApiError::NotFound("Assigned user not found".into()));
        }
    }

    TaskRecord::update(&state.db, id, &patch).await?;
    let record = TaskRecord::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    info!(task_id = %id, "task updated");
    Ok(Json(TaskDetails::from(record)))
}

#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let record = TaskRecord::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    policy::authorize_delete(&actor, record.created_by)?;
    TaskRecord::delete(&state.db, id).await?;

    info!(task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}
