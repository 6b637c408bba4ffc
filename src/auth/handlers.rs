use axum::{
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, GoogleLoginRequest, LoginRequest,
            MessageResponse, RefreshRequest, ResetPasswordRequest, SignupRequest,
            VerifyEmailRequest,
        },
        jwt::JwtKeys,
        otp::{OtpPayload, PendingSignup},
        password::{hash_password, unusable_password_hash, verify_password},
        validate::{normalize_email, validate_email, validate_new_password},
    },
    email::OutboundEmail,
    error::ApiError,
    state::AppState,
    users::{
        dto::PublicUser,
        repo_types::{Role, User},
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/request-verification", post(request_verification))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/login", post(login))
        .route("/auth/google-login", post(google_login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/refresh", post(refresh))
}

fn issue_token_pair(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

/// Resolve the role a signup may take. Admin requires the shared secret
/// in the `admin-secret` header.
fn requested_role(
    state: &AppState,
    headers: &HeaderMap,
    requested: Option<Role>,
) -> Result<Role, ApiError> {
    match requested {
        Some(Role::Admin) => {
            let supplied = headers.get("admin-secret").and_then(|v| v.to_str().ok());
            if supplied == Some(state.config.admin_secret.as_str()) {
                Ok(Role::Admin)
            } else {
                warn!("admin signup attempted without a matching admin secret");
                Err(ApiError::Forbidden(
                    "Not authorized to create admin user".into(),
                ))
            }
        }
        Some(Role::User) | None => Ok(Role::User),
    }
}

fn validate_signup(payload: &SignupRequest, email: &str) -> Result<(), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("Please provide your name".into()));
    }
    validate_email(email)?;
    validate_new_password(&payload.password)
}

/// Direct signup: the account is created immediately and the email is
/// marked verified. The OTP-gated path is `request_verification` +
/// `verify_email` below.
#[instrument(skip(state, headers, payload))]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&payload.email);
    validate_signup(&payload, &email)?;
    let role = requested_role(&state, &headers, payload.role)?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, payload.name.trim(), &email, &hash, role, true).await?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((StatusCode::CREATED, Json(issue_token_pair(&state, user)?)))
}

/// OTP-gated signup, step one: park the signup data in the one-time-code
/// registry and email the code. No account exists until `verify_email`.
#[instrument(skip(state, headers, payload))]
pub async fn request_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    validate_signup(&payload, &email)?;
    let role = requested_role(&state, &headers, payload.role)?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    // The plaintext password never enters the registry.
    let password_hash = hash_password(&payload.password)?;
    let pending = PendingSignup {
        name: payload.name.trim().to_string(),
        email: email.clone(),
        password_hash,
        role,
    };
    let code = state
        .otp
        .issue(&email, OtpPayload::PendingSignup(pending))
        .await;

    let sent = state
        .mailer
        .send(OutboundEmail {
            to: email.clone(),
            subject: "Email Verification Code".into(),
            text: format!(
                "Your verification code is: {code}. It will expire in 10 minutes."
            ),
            html: format!(
                "<h1>Verify your email</h1>\
                 <p>Your verification code is: <strong>{code}</strong></p>\
                 <p>This code will expire in 10 minutes.</p>"
            ),
        })
        .await;
    if !sent {
        warn!(email = %email, "verification email was not delivered");
    }

    Ok(Json(MessageResponse::success(
        "Verification code sent to email",
    )))
}

/// OTP-gated signup, step two: consume the code and create the account.
#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = normalize_email(&payload.email);

    let pending = match state.otp.consume(&email, &payload.code).await {
        Ok(OtpPayload::PendingSignup(pending)) => pending,
        // A matched code with a reset payload means the caller mixed up the
        // flows; the entry is gone either way and the answer is generic.
        Ok(_) | Err(_) => {
            warn!(email = %email, "email verification failed");
            return Err(ApiError::Validation(
                "Invalid or expired verification code".into(),
            ));
        }
    };

    if User::find_by_email(&state.db, &pending.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already in use".into()));
    }

    let user = User::create(
        &state.db,
        &pending.name,
        &pending.email,
        &pending.password_hash,
        pending.role,
        true,
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user verified and created");
    Ok((StatusCode::CREATED, Json(issue_token_pair(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Please provide email and password".into(),
        ));
    }
    let email = normalize_email(&payload.email);

    // One generic message for both unknown email and bad password, so the
    // response never reveals whether the account exists.
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "login with unknown email");
            ApiError::Unauthorized("Incorrect email or password".into())
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(ApiError::Unauthorized("Incorrect email or password".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_token_pair(&state, user)?))
}

/// Exchange a Google ID token for a session. Creates the local account on
/// first sight; never fails because the account already exists.
#[instrument(skip(state, payload))]
pub async fn google_login(
    State(state): State<AppState>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let identity = state.identity.verify(&payload.id_token).await?;
    let email = normalize_email(&identity.email);

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(user) => user,
        None => {
            let hash = unusable_password_hash()?;
            let user = User::create_external(
                &state.db,
                &identity.name,
                &email,
                &hash,
                &identity.external_id,
                identity.picture_url.as_deref(),
            )
            .await?;
            info!(user_id = %user.id, email = %user.email, "account created from google identity");
            user
        }
    };

    info!(user_id = %user.id, "google login");
    Ok(Json(issue_token_pair(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user found with that email address".into()))?;

    let code = state
        .otp
        .issue(&email, OtpPayload::PasswordReset { user_id: user.id })
        .await;

    // Delivery failure does not roll back issuance; the user can retry.
    let sent = state
        .mailer
        .send(OutboundEmail {
            to: email.clone(),
            subject: "Password Reset Code".into(),
            text: format!(
                "Your password reset code is: {code}. It will expire in 10 minutes."
            ),
            html: format!(
                "<h1>Password Reset</h1>\
                 <p>Your password reset code is: <strong>{code}</strong></p>\
                 <p>This code will expire in 10 minutes.</p>"
            ),
        })
        .await;
    if !sent {
        warn!(email = %email, "password reset email was not delivered");
    }

    info!(user_id = %user.id, "password reset code issued");
    Ok(Json(MessageResponse::success(
        "Password reset code sent to email",
    )))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_new_password(&payload.new_password)?;
    let email = normalize_email(&payload.email);

    let user_id = match state.otp.consume(&email, &payload.code).await {
        Ok(OtpPayload::PasswordReset { user_id }) => user_id,
        Ok(_) | Err(_) => {
            warn!(email = %email, "password reset failed");
            return Err(ApiError::Validation("Invalid or expired reset code".into()));
        }
    };

    let hash = hash_password(&payload.new_password)?;
    if User::update_password(&state.db, user_id, &hash).await? == 0 {
        return Err(ApiError::NotFound("User not found".into()));
    }
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %user.id, "password has been reset");
    Ok(Json(issue_token_pair(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized("The user belonging to this token no longer exists".into())
        })?;

    Ok(Json(issue_token_pair(&state, user)?))
}
