use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{Role, User};

/// Public part of a user returned to clients. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_picture_url: Option<String>,
    pub email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            profile_picture_url: u.profile_picture_url,
            email_verified: u.email_verified,
            created_at: u.created_at,
        }
    }
}

/// Self-service profile update: only name and email are editable here.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePictureRequest {
    pub profile_picture_url: String,
}

/// Admin update of another user. A `password` key in the request body is
/// not representable here and is therefore dropped before it can reach
/// the store.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn public_user_serialization_omits_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::User,
            profile_picture_url: None,
            google_id: None,
            email_verified: true,
            created_at: datetime!(2024-06-01 12:00 UTC),
        };

        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("emailVerified"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn admin_update_request_drops_password_key() {
        let req: AdminUpdateUserRequest = serde_json::from_str(
            r#"{"name":"x","role":"admin","password":"sneaky"}"#,
        )
        .unwrap();
        assert_eq!(req.name.as_deref(), Some("x"));
        assert_eq!(req.role, Some(Role::Admin));
    }
}
