//! Pure decision functions for task access. Every mutation handler consults
//! these before touching the store; a denial means no side effect happened.

use uuid::Uuid;

use crate::auth::extractors::Actor;
use crate::error::ApiError;
use crate::tasks::dto::TaskPatch;
use crate::tasks::repo_types::TaskStatus;

/// Statuses a regular user may move their own task to. The workflow is
/// one-directional: an assignee can advance a task but never reopen or
/// cancel it.
const ASSIGNEE_STATUSES: [TaskStatus; 2] = [TaskStatus::InProgress, TaskStatus::Completed];

pub fn authorize_view(actor: &Actor, assigned_to: Uuid) -> Result<(), ApiError> {
    if actor.is_admin() || actor.id == assigned_to {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You are not authorized to view this task".into(),
        ))
    }
}

/// Collection scoping: non-admins are silently restricted to tasks assigned
/// to them. Never an error: the actor simply does not see others' tasks.
pub fn list_scope(actor: &Actor) -> Option<Uuid> {
    if actor.is_admin() {
        None
    } else {
        Some(actor.id)
    }
}

pub fn authorize_create(actor: &Actor) -> Result<(), ApiError> {
    actor.require_admin()
}

/// Admins may change any field of any task. An assignee may only submit a
/// patch whose keys are exactly {status}, and only to advance the workflow;
/// anything else rejects the update in full.
pub fn authorize_update(
    actor: &Actor,
    assigned_to: Uuid,
    patch: &TaskPatch,
) -> Result<(), ApiError> {
    if actor.is_admin() {
        return Ok(());
    }
    if actor.id != assigned_to {
        return Err(ApiError::Forbidden(
            "You are not authorized to update this task".into(),
        ));
    }
    if !patch.touches_only_status() {
        return Err(ApiError::Forbidden(
            "You may only update the status of this task".into(),
        ));
    }
    match patch.status {
        None => Ok(()),
        Some(status) if ASSIGNEE_STATUSES.contains(&status) => Ok(()),
        Some(_) => Err(ApiError::Forbidden(
            "Status can only be set to in-progress or completed".into(),
        )),
    }
}

/// Deletion is admin-only. An earlier generation of this policy also let the
/// task's creator delete it; to restore that, accept `created_by == actor.id`
/// here. This function is the single source of truth for the rule.
pub fn authorize_delete(actor: &Actor, _created_by: Uuid) -> Result<(), ApiError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You are not authorized to delete this task".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::Role;
    use serde_json::json;

    fn admin() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role: Role::Admin,
        }
    }

    fn user() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role: Role::User,
        }
    }

    fn patch(value: serde_json::Value) -> TaskPatch {
        TaskPatch::from_value(&value).expect("patch should parse")
    }

    #[test]
    fn admin_views_any_task() {
        let actor = admin();
        assert!(authorize_view(&actor, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn assignee_views_own_task_only() {
        let actor = user();
        assert!(authorize_view(&actor, actor.id).is_ok());
        assert!(matches!(
            authorize_view(&actor, Uuid::new_v4()),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn list_scope_is_none_for_admin_and_self_for_user() {
        assert_eq!(list_scope(&admin()), None);
        let actor = user();
        assert_eq!(list_scope(&actor), Some(actor.id));
    }

    #[test]
    fn only_admin_creates_tasks() {
        assert!(authorize_create(&admin()).is_ok());
        assert!(matches!(
            authorize_create(&user()),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_may_patch_any_field_of_any_task() {
        let actor = admin();
        let p = patch(json!({"title": "new", "status": "cancelled", "assignedTo": Uuid::new_v4()}));
        assert!(authorize_update(&actor, Uuid::new_v4(), &p).is_ok());
    }

    #[test]
    fn assignee_may_advance_status() {
        let actor = user();
        for status in ["in-progress", "completed"] {
            let p = patch(json!({ "status": status }));
            assert!(authorize_update(&actor, actor.id, &p).is_ok());
        }
    }

    #[test]
    fn assignee_may_not_reopen_or_cancel() {
        let actor = user();
        for status in ["pending", "cancelled"] {
            let p = patch(json!({ "status": status }));
            assert!(matches!(
                authorize_update(&actor, actor.id, &p),
                Err(ApiError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn any_extra_key_rejects_the_whole_update() {
        let actor = user();
        let p = patch(json!({"status": "completed", "title": "x"}));
        assert!(matches!(
            authorize_update(&actor, actor.id, &p),
            Err(ApiError::Forbidden(_))
        ));
        // Even a key the server does not know about.
        let p = patch(json!({"status": "completed", "priority": "high"}));
        assert!(matches!(
            authorize_update(&actor, actor.id, &p),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn non_assignee_cannot_update_even_status() {
        let actor = user();
        let p = patch(json!({"status": "completed"}));
        assert!(matches!(
            authorize_update(&actor, Uuid::new_v4(), &p),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn delete_is_admin_only_even_for_the_creator() {
        let actor = user();
        // The actor created the task; the current policy still refuses.
        assert!(matches!(
            authorize_delete(&actor, actor.id),
            Err(ApiError::Forbidden(_))
        ));
        assert!(authorize_delete(&admin(), Uuid::new_v4()).is_ok());
    }
}
