//! Device registration and status handlers.

use super::schemas::{DeviceRegisterRequest, DeviceRegisterResponse, DeviceStatusResponse};
use super::{AppState, header_value};
use crate::error::{ApiError, ApiResult, StoreError};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;

/// Header carrying the caller's device ID on status checks.
pub const DEVICE_ID_HEADER: &str = "X-Device-ID";

/// `POST /api/device/register`. Unauthenticated.
pub async fn register_device(
    State(state): State<AppState>,
    body: Result<Json<DeviceRegisterRequest>, JsonRejection>,
) -> ApiResult<Json<DeviceRegisterResponse>> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected device registration body");
        ApiError::invalid_device_id()
    })?;

    let (device, user) = state
        .db
        .register_device(&request.device_id)
        .map_err(|err| match err {
            StoreError::InvalidInput(_) => ApiError::invalid_device_id(),
            other => ApiError::from(other),
        })?;

    Ok(Json(DeviceRegisterResponse::registered(&device, &user)))
}

/// `GET /api/device/status`. Doubles as a heartbeat.
pub async fn device_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<DeviceStatusResponse>> {
    let device_id = header_value(&headers, DEVICE_ID_HEADER).ok_or_else(ApiError::missing_device_id)?;
    let device = state.db.get_device_status(&device_id)?;
    Ok(Json(device.into()))
}
