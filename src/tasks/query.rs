//! Translates the optional list parameters into a normalized query plan.
//! Role scoping arrives from the policy layer and lands in the plan before
//! any caller-supplied filter is considered.

use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::tasks::repo_types::TaskStatus;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Sortable task fields, allow-listed so a caller-supplied name can never
/// reach the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    Deadline,
    Title,
    Status,
}

impl SortKey {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" | "created_at" => Some(Self::CreatedAt),
            "deadline" => Some(Self::Deadline),
            "title" => Some(Self::Title),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Deadline => "deadline",
            Self::Title => "title",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct TaskQuerySpec {
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub sort: SortKey,
    pub descending: bool,
}

/// `"all"` is a sentinel meaning no status filter.
fn parse_status_filter(status: Option<&str>) -> Result<Option<TaskStatus>, ApiError> {
    match status {
        None | Some("all") | Some("") => Ok(None),
        Some(s) => TaskStatus::parse(s)
            .map(Some)
            .ok_or_else(|| ApiError::Validation(format!("Unknown status filter `{s}`"))),
    }
}

pub fn build_list_query(
    scope: Option<Uuid>,
    params: &TaskListParams,
) -> Result<TaskQuerySpec, ApiError> {
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let status = parse_status_filter(params.status.as_deref())?;

    let (sort, descending) = match params.sort_by.as_deref() {
        // Default: newest first.
        None | Some("") => (SortKey::CreatedAt, true),
        Some(field) => {
            let key = SortKey::parse(field)
                .ok_or_else(|| ApiError::Validation(format!("Cannot sort by `{field}`")))?;
            // Descending only on the exact string "desc"; anything else,
            // including an absent sortOrder, is ascending.
            (key, params.sort_order.as_deref() == Some("desc"))
        }
    };

    Ok(TaskQuerySpec {
        assigned_to: scope,
        search,
        status,
        sort,
        descending,
    })
}

/// The report variant ignores the caller's sort preference entirely: a
/// report is chronological by deadline. Search is not part of reports.
pub fn build_report_query(
    scope: Option<Uuid>,
    params: &TaskListParams,
) -> Result<TaskQuerySpec, ApiError> {
    let status = parse_status_filter(params.status.as_deref())?;
    Ok(TaskQuerySpec {
        assigned_to: scope,
        search: None,
        status,
        sort: SortKey::Deadline,
        descending: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(
        search: Option<&str>,
        status: Option<&str>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
    ) -> TaskListParams {
        TaskListParams {
            search: search.map(String::from),
            status: status.map(String::from),
            sort_by: sort_by.map(String::from),
            sort_order: sort_order.map(String::from),
        }
    }

    #[test]
    fn defaults_to_created_at_newest_first() {
        let spec = build_list_query(None, &TaskListParams::default()).unwrap();
        assert_eq!(spec.sort, SortKey::CreatedAt);
        assert!(spec.descending);
        assert_eq!(spec.search, None);
        assert_eq!(spec.status, None);
    }

    #[test]
    fn explicit_sort_defaults_to_ascending() {
        let spec = build_list_query(None, &params(None, None, Some("deadline"), None)).unwrap();
        assert_eq!(spec.sort, SortKey::Deadline);
        assert!(!spec.descending);

        // Anything other than the exact string "desc" is ascending too.
        let spec = build_list_query(None, &params(None, None, Some("deadline"), Some("DESC")))
            .unwrap();
        assert!(!spec.descending);
    }

    #[test]
    fn descending_on_exact_desc() {
        let spec = build_list_query(None, &params(None, None, Some("title"), Some("desc"))).unwrap();
        assert_eq!(spec.sort, SortKey::Title);
        assert!(spec.descending);
    }

    #[test]
    fn camel_case_created_at_is_sortable() {
        let spec = build_list_query(None, &params(None, None, Some("createdAt"), None)).unwrap();
        assert_eq!(spec.sort, SortKey::CreatedAt);
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let err = build_list_query(None, &params(None, None, Some("password_hash"), None))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn all_sentinel_disables_status_filter() {
        let spec = build_list_query(None, &params(None, Some("all"), None, None)).unwrap();
        assert_eq!(spec.status, None);
    }

    #[test]
    fn status_filter_is_exact() {
        let spec = build_list_query(None, &params(None, Some("in-progress"), None, None)).unwrap();
        assert_eq!(spec.status, Some(TaskStatus::InProgress));

        let err = build_list_query(None, &params(None, Some("nope"), None, None)).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn blank_search_is_dropped() {
        let spec = build_list_query(None, &params(Some("   "), None, None, None)).unwrap();
        assert_eq!(spec.search, None);

        let spec = build_list_query(None, &params(Some(" report "), None, None, None)).unwrap();
        assert_eq!(spec.search.as_deref(), Some("report"));
    }

    #[test]
    fn scope_is_carried_into_the_spec() {
        let id = Uuid::new_v4();
        let spec = build_list_query(Some(id), &TaskListParams::default()).unwrap();
        assert_eq!(spec.assigned_to, Some(id));
    }

    #[test]
    fn report_always_sorts_by_deadline_ascending() {
        let spec = build_report_query(
            None,
            &params(Some("ignored"), Some("completed"), Some("title"), Some("desc")),
        )
        .unwrap();
        assert_eq!(spec.sort, SortKey::Deadline);
        assert!(!spec.descending);
        assert_eq!(spec.search, None);
        assert_eq!(spec.status, Some(TaskStatus::Completed));
    }
}
