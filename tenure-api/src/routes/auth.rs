/// Authentication endpoints
///
/// - `POST /v1/auth/register` - Create an account and get tokens
/// - `POST /v1/auth/login` - Exchange credentials for tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new pair
/// - `GET /v1/auth/me` - Current user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tenure_shared::{
    auth::{
        jwt::{issue_token_pair, validate_refresh_token, TokenPair},
        middleware::AuthContext,
        password,
    },
    models::user::{CreateUser, User, UserRole},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked against the password policy after field validation
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 7, max = 20, message = "Phone must be 7-20 characters"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Returned by register, login and refresh
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub role: UserRole,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

impl AuthResponse {
    fn issue(user: &User, secret: &str) -> ApiResult<Self> {
        Ok(Self {
            user_id: user.id,
            role: user.role,
            tokens: issue_token_pair(user.id, user.role, secret)?,
        })
    }
}

/// Register a new user
///
/// ```text
/// POST /v1/auth/register
/// { "email": "ada@example.com", "password": "correct horse 42", "name": "Ada" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: email already registered
/// - `422 Unprocessable Entity`: invalid email or weak password
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid("password", message))?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash,
            name: req.name,
            phone: req.phone,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let response = AuthResponse::issue(&user, state.jwt_secret())?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email and password
///
/// Unknown email and wrong password produce the same 401 after the same
/// Argon2 work.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let Some(user) = User::find_by_email(&state.db, req.email.trim()).await? else {
        password::verify_dummy(&req.password);
        return Err(invalid());
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse::issue(&user, state.jwt_secret())?))
}

/// Exchange a refresh token for a new pair
///
/// The role is re-read from the database so promotions and demotions take
/// effect on the next refresh.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let claims = validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(AuthResponse::issue(&user, state.jwt_secret())?))
}

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}
