//! Request and response bodies for the HTTP API.

use crate::types::{Device, Task, User};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Format a timestamp as RFC 3339 in UTC with second precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Deserialize a present field (even `null`) as `Some`, so that absent and
/// null stay distinguishable when combined with `#[serde(default)]`.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegisterRequest {
    pub device_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegisterResponse {
    pub device_id: String,
    pub user_id: String,
    pub message: String,
}

impl DeviceRegisterResponse {
    pub fn registered(device: &Device, user: &User) -> Self {
        Self {
            device_id: device.id.clone(),
            user_id: user.id.clone(),
            message: "注册成功".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusResponse {
    pub device_id: String,
    pub user_id: String,
    pub last_seen_at: String,
}

impl From<Device> for DeviceStatusResponse {
    fn from(device: Device) -> Self {
        Self {
            last_seen_at: format_timestamp(&device.last_seen_at),
            device_id: device.id,
            user_id: device.user_id,
        }
    }
}

/// Query string for `GET /tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksParams {
    pub status: Option<String>,
    /// Comma-separated tag list.
    pub tags: Option<String>,
}

impl ListTasksParams {
    /// Split the `tags` parameter, trimming entries and dropping empty ones.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskCreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Partial update body.
///
/// `title`, `status` and `tags`: absent or `null` leaves the field unchanged.
/// `description`: absent leaves it unchanged, `null` clears it.
/// `status` is kept as raw JSON so a non-string or unknown label can be
/// reported as an invalid status rather than a malformed body.
#[derive(Debug, Default, Deserialize)]
pub struct TaskUpdateRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub task_id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            created_at: format_timestamp(&task.created_at),
            updated_at: format_timestamp(&task.updated_at),
            task_id: task.id,
            user_id: task.user_id,
            title: task.title,
            description: task.description.unwrap_or_default(),
            status: task.status.to_string(),
            tags: task.tags,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
