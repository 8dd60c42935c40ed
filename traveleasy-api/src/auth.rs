use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use traveleasy_core::credentials::{generate_verification_code, hash_password, verify_password};
use traveleasy_core::{Registration, Role, User, VerifyOutcome};
use traveleasy_shared::Masked;
use uuid::Uuid;

use crate::error::{ApiJson, AppError};
use crate::middleware::issue_token;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/verifyemail", post(verify_email))
        .route("/api/auth/resendcode", post(resend_code))
        .route("/api/auth/login", post(login))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    id: Uuid,
    name: String,
    email: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    travel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vehicle: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        let profile = user.provider.as_ref();
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            travel_name: profile.map(|p| p.travel_name.clone()),
            contact: profile.map(|p| p.contact.clone()),
            vehicle: profile.map(|p| p.vehicle.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    email: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendRequest {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<Masked<String>>,
}

fn normalise_email(email: Option<String>) -> Option<String> {
    email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty())
}

async fn within_limit(state: &AppState, kind: &str, email: &str, limit: i64, window: i64) -> Result<(), AppError> {
    if state.limiter.check(&format!("{}:{}", kind, email), limit, window).await {
        Ok(())
    } else {
        warn!("Too many {} attempts for {}", kind, email);
        Err(AppError::TooManyRequests("Too many attempts. Please try again later.".to_string()))
    }
}

/// Runs CPU-bound work such as bcrypt on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Anyhow(anyhow::Error::new(e)))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<Registration>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let new_user = payload.validate()?;

    if state.users.find_by_email(&new_user.email).await?.is_some() {
        return Err(AppError::ConflictError("User with this email already exists".to_string()));
    }

    let password = new_user.password.clone();
    let cost = state.auth.bcrypt_cost;
    let password_hash = blocking(move || hash_password(password.expose(), cost)).await??;

    let code = generate_verification_code();
    let user = User::new(new_user, password_hash, code.clone());
    state.users.create(&user).await?;
    info!("Registered {} user {}", user.role, user.id);

    // The account exists either way; a failed send is recoverable through resendcode.
    let email_sent = match state.mailer.send_verification(&user.email, &user.name, &code).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Verification email to user {} failed: {}", user.id, e);
            false
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully. Please verify your email.",
            "userId": user.id,
            "emailSent": email_sent,
        })),
    ))
}

async fn verify_email(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyRequest>,
) -> Result<Json<Value>, AppError> {
    let code = payload.code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let (email, code) = match (normalise_email(payload.email), code) {
        (Some(email), Some(code)) => (email, code),
        _ => return Err(AppError::ValidationError("Email and code are required".to_string())),
    };

    let rules = &state.business_rules;
    within_limit(&state, "verify", &email, rules.verify_attempt_limit, rules.verify_window_seconds).await?;

    let mut user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))?;

    match user.verify_email(&code)? {
        VerifyOutcome::AlreadyVerified => Ok(Json(json!({ "message": "Email already verified" }))),
        VerifyOutcome::Verified => {
            state.users.update_verification(&user).await?;
            info!("User {} verified their email", user.id);
            Ok(Json(json!({ "message": "Email verified successfully" })))
        }
    }
}

async fn resend_code(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResendRequest>,
) -> Result<Json<Value>, AppError> {
    let email = normalise_email(payload.email)
        .ok_or_else(|| AppError::ValidationError("Email is required".to_string()))?;

    let rules = &state.business_rules;
    within_limit(&state, "resend", &email, rules.verify_attempt_limit, rules.verify_window_seconds).await?;

    let mut user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))?;

    let code = generate_verification_code();
    user.reissue_code(code.clone())?;
    state.users.reissue_code(&user).await?;

    state
        .mailer
        .send_verification(&user.email, &user.name, &code)
        .await
        .map_err(|e| AppError::InternalServerError(format!("Verification email failed: {}", e)))?;

    Ok(Json(json!({ "message": "A new verification code has been sent." })))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let password = payload.password.map(Masked::into_inner).filter(|p| !p.is_empty());
    let (email, password) = match (normalise_email(payload.email), password) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(AppError::ValidationError("Email and password required".to_string())),
    };

    let rules = &state.business_rules;
    within_limit(&state, "login", &email, rules.login_attempt_limit, rules.login_window_seconds).await?;

    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".to_string()))?;

    if !user.is_verified {
        return Err(AppError::AuthorizationError("Email not verified".to_string()));
    }

    let hash = user.password_hash.expose().clone();
    if !blocking(move || verify_password(&password, &hash)).await? {
        return Err(AppError::AuthenticationError("Invalid credentials".to_string()));
    }

    let token = issue_token(&state.auth, &user)?;
    info!("User {} logged in", user.id);

    Ok(Json(json!({
        "message": "Login successful",
        "token": token,
        "user": UserResponse::from(&user),
    })))
}
