use axum::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::ApiError;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// What an external identity provider vouches for after verifying a credential.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub external_id: String,
    pub email: String,
    pub name: String,
    pub picture_url: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, ApiError>;
}

/// Verifies Google ID tokens against the tokeninfo endpoint and checks the
/// audience matches our client id.
pub struct GoogleVerifier {
    http: Client,
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    sub: String,
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleVerifier {
    pub fn new(client_id: String) -> Self {
        Self {
            http: Client::new(),
            client_id,
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, ApiError> {
        if self.client_id.is_empty() {
            return Err(ApiError::Unauthorized(
                "Google sign-in is not configured".into(),
            ));
        }

        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "google tokeninfo request failed");
                ApiError::Unauthorized("Could not verify Google token".into())
            })?;

        if !response.status().is_success() {
            return Err(ApiError::Unauthorized("Invalid Google token".into()));
        }

        let info: GoogleTokenInfo = response.json().await.map_err(|e| {
            warn!(error = %e, "google tokeninfo response was not parseable");
            ApiError::Unauthorized("Could not verify Google token".into())
        })?;

        if info.aud != self.client_id {
            return Err(ApiError::Unauthorized("Google token audience mismatch".into()));
        }

        let name = info.name.unwrap_or_else(|| info.email.clone());
        Ok(VerifiedIdentity {
            external_id: info.sub,
            email: info.email,
            name,
            picture_url: info.picture,
        })
    }
}
