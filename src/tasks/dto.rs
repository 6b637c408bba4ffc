use std::collections::BTreeSet;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::tasks::repo_types::{TaskRecord, TaskStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUserRef {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: Date,
    pub status: TaskStatus,
    pub assigned_to: TaskUserRef,
    pub created_by: TaskUserRef,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<TaskRecord> for TaskDetails {
    fn from(r: TaskRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            deadline: r.deadline,
            status: r.status,
            assigned_to: TaskUserRef {
                id: r.assigned_to,
                name: r.assignee_name,
                email: Some(r.assignee_email),
            },
            created_by: TaskUserRef {
                id: r.created_by,
                name: r.creator_name,
                email: None,
            },
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub deadline: Date,
    pub assigned_to: Uuid,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// A partial task update, parsed from the raw JSON object so the full key
/// set is retained. The policy layer compares that key set against an
/// allow-list rather than probing the shape at runtime.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub keys: BTreeSet<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<Date>,
    pub assigned_to: Option<Uuid>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn from_value(value: &Value) -> Result<Self, ApiError> {
        let map = value
            .as_object()
            .ok_or_else(|| ApiError::Validation("Request body must be a JSON object".into()))?;

        Ok(Self {
            keys: map.keys().cloned().collect(),
            title: field(map, "title")?,
            description: field(map, "description")?,
            deadline: field(map, "deadline")?,
            assigned_to: field(map, "assignedTo")?,
            status: field(map, "status")?,
        })
    }

    /// True when every key present in the payload is `status`. An empty
    /// payload trivially passes.
    pub fn touches_only_status(&self) -> bool {
        self.keys.iter().all(|k| k == "status")
    }
}

/// Null and empty-string values count as absent, matching the partial-update
/// rule that unset fields are left untouched.
fn field<T: DeserializeOwned>(
    map: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<T>, ApiError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("Invalid value for `{key}`"))),
    }
}
