//! Email/password sign-up, sign-in and session endpoints

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use mrs_common::db::models::{Session, User};
use mrs_common::db::users;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::session::{clear_session_cookie, generate_token, hash_token, session_cookie};
use crate::auth::AuthUser;
use crate::error::{ok, ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::validation::{is_valid_email, FieldErrors};
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    /// Bearer token; also set as the session cookie
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CurrentSession {
    pub user: User,
    pub session: Session,
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Open a session for `user` and build the response with its cookie
async fn start_session(
    state: &AppState,
    user: User,
    headers: &HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = generate_token();
    let expires_at = Utc::now() + state.session_ttl;

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim);
    let user_agent = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok());

    users::create_session(
        &state.db,
        &user.id,
        &hash_token(&token),
        expires_at,
        ip_address,
        user_agent,
    )
    .await?;

    let cookie = session_cookie(&token, state.session_ttl.num_seconds());
    Ok((
        [(header::SET_COOKIE, cookie)],
        ok(SessionResponse {
            user,
            token,
            expires_at,
        }),
    ))
}

/// POST /api/auth/sign-up/email
pub async fn sign_up(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<SignUpRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut errors = FieldErrors::new();
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    if !is_valid_email(&email) {
        errors.add("email", "Valid email is required");
    }
    let password = req.password.unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
    let name = errors.require("name", req.name.as_deref(), "Name is required");
    errors.into_result()?;

    let password_hash = hash_password(password).await?;
    let user = users::create_user_with_password(&state.db, &email, &name, &password_hash).await?;
    info!(user_id = %user.id, "User signed up");

    start_session(&state, user, &headers).await
}

/// POST /api/auth/sign-in/email
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
    }

    let Some((user, stored_hash)) = users::find_credentials(&state.db, &email).await? else {
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password(password, stored_hash).await? {
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
    }

    info!(user_id = %user.id, "User signed in");
    start_session(&state, user, &headers).await
}

/// POST /api/auth/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<impl IntoResponse> {
    users::delete_session(&state.db, &auth.token_hash).await?;
    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        ok(serde_json::json!({ "signedOut": true })),
    ))
}

/// GET /api/auth/session
pub async fn current_session(auth: AuthUser) -> ApiResult<impl IntoResponse> {
    Ok(ok(CurrentSession {
        user: auth.user,
        session: auth.session,
    }))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/sign-up/email", post(sign_up))
        .route("/api/auth/sign-in/email", post(sign_in))
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/session", get(current_session))
}
