//! Task CRUD handlers.
//!
//! Every route here sits behind the bearer check and acts on behalf of the
//! user named in `X-User-ID`.

use super::schemas::{
    ListTasksParams, MessageResponse, TaskCreateRequest, TaskResponse, TaskUpdateRequest,
};
use super::{AppState, header_value};
use crate::db::tasks::ensure_owner;
use crate::error::{ApiError, ApiResult};
use crate::types::{TaskQuery, TaskStatus, TaskUpdate};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Header naming the acting user.
pub const USER_ID_HEADER: &str = "X-User-ID";

fn user_id(headers: &HeaderMap) -> ApiResult<String> {
    header_value(headers, USER_ID_HEADER).ok_or_else(ApiError::missing_user_id)
}

fn parse_status(raw: &str) -> ApiResult<TaskStatus> {
    raw.parse().map_err(|_| ApiError::invalid_status())
}

/// `GET /api/tasks?status=&tags=a,b`
pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<ListTasksParams>, QueryRejection>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let user_id = user_id(&headers)?;
    let Query(params) = params.map_err(|_| ApiError::invalid_request())?;

    let mut query = TaskQuery::default().with_tags(params.tag_list());
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        query = query.with_status(parse_status(status)?);
    }

    let tasks = state.db.list_tasks(&user_id, &query)?;
    tracing::debug!(user_id = %user_id, count = tasks.len(), "Listed tasks");
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// `POST /api/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TaskCreateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let user_id = user_id(&headers)?;
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected task body");
        ApiError::invalid_request()
    })?;

    let task = state.db.create_task(
        &user_id,
        request.title,
        request.description,
        request.tags.unwrap_or_default(),
    )?;
    Ok((StatusCode::CREATED, Json(task.into())))
}

/// `GET /api/tasks/{task_id}`
pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskResponse>> {
    let user_id = user_id(&headers)?;
    let task = state.db.get_task(&task_id)?;
    ensure_owner(&task, &user_id)?;
    Ok(Json(task.into()))
}

/// `PUT /api/tasks/{task_id}`
///
/// A missing task or a foreign one is reported before anything wrong with
/// the body.
pub async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    body: Result<Json<TaskUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<TaskResponse>> {
    let user_id = user_id(&headers)?;
    let existing = state.db.get_task(&task_id)?;
    ensure_owner(&existing, &user_id)?;

    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected task update body");
        ApiError::invalid_request()
    })?;

    let status = match request.status {
        Some(Value::String(raw)) => Some(parse_status(&raw)?),
        Some(_) => return Err(ApiError::invalid_status()),
        None => None,
    };

    let update = TaskUpdate {
        title: request.title,
        description: request.description,
        status,
        tags: request.tags,
    };

    let task = state.db.update_task(&task_id, &user_id, update)?;
    Ok(Json(task.into()))
}

/// `DELETE /api/tasks/{task_id}`
pub async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = user_id(&headers)?;
    state.db.delete_task(&task_id, &user_id)?;
    Ok(Json(MessageResponse::new("删除成功")))
}
