use crate::auth::extractors::Actor;
use crate::error::ApiError;
use crate::users::repo_types::{Role, User};

/// Admin accounts are permanently undeletable through this interface,
/// regardless of who asks, another admin or the account itself included.
pub fn authorize_user_delete(actor: &Actor, target: &User) -> Result<(), ApiError> {
    actor.require_admin()?;
    if target.is_admin() {
        return Err(ApiError::Forbidden(
            "Admin accounts cannot be deleted".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    fn actor(role: Role) -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role,
        }
    }

    fn target(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Target".into(),
            email: "target@example.com".into(),
            password_hash: "hash".into(),
            role,
            profile_picture_url: None,
            google_id: None,
            email_verified: true,
            created_at: datetime!(2024-06-01 12:00 UTC),
        }
    }

    #[test]
    fn admin_may_delete_regular_user() {
        assert!(authorize_user_delete(&actor(Role::Admin), &target(Role::User)).is_ok());
    }

    #[test]
    fn admin_target_is_never_deletable() {
        assert!(matches!(
            authorize_user_delete(&actor(Role::Admin), &target(Role::Admin)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn non_admin_actor_is_refused() {
        assert!(matches!(
            authorize_user_delete(&actor(Role::User), &target(Role::User)),
            Err(ApiError::Forbidden(_))
        ));
    }
}
