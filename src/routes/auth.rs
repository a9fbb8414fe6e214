/// Authentication routes
///
/// Handles staff registration, login, token refresh, and current user
/// information. Responses follow the `{success, token, user}` wire contract
/// the front end expects.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::auth::{generate_token, hash_password, validate_token, verify_password, Claims, Role};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::middleware::bearer_token;
use crate::validators::{is_valid_email, is_valid_name};

/// Staff registration request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
}

/// Login request. Fields are optional so a missing field renders the
/// domain's own `MISSING_FIELDS` body instead of a framework 400.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// User payload embedded in auth responses
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub status: String,
}

/// Successful authentication response: a fresh bearer token plus the
/// user snapshot the client persists alongside it.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserResponse,
}

type UserRow = (Uuid, String, String, String, String, String, String);

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, status";

fn user_response(row: &UserRow) -> Result<UserResponse, AppError> {
    Ok(UserResponse {
        id: row.0.to_string(),
        email: row.1.clone(),
        first_name: row.3.clone(),
        last_name: row.4.clone(),
        role: Role::parse(&row.5)?,
        status: row.6.clone(),
    })
}

/// POST /auth/register
///
/// Register a new staff member. Returns a bearer token on success.
///
/// # Errors
/// - 400: Validation errors (invalid email/password/name)
/// - 409: Email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let email = is_valid_email(&form.email)?;
    let first_name = is_valid_name(&form.first_name)?;
    let last_name = is_valid_name(&form.last_name)?;
    let password_hash = hash_password(&form.password)?;
    let role = form.role.unwrap_or(Role::Operator);

    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name, role, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, 'active', now(), now())
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&first_name)
    .bind(&last_name)
    .bind(role.as_str())
    .execute(pool.get_ref())
    .await?;

    let token = generate_token(&user_id, &email, role, jwt_config.get_ref())?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "User registered successfully"
    );
    AuditLog::new("REGISTER", "user", "SUCCESS", "User registered")
        .with_resource_id(user_id.to_string())
        .record();

    Ok(HttpResponse::Created().json(AuthResponse {
        success: true,
        token,
        user: UserResponse {
            id: user_id.to_string(),
            email,
            first_name,
            last_name,
            role,
            status: "active".to_string(),
        },
    }))
}

/// POST /auth/login
///
/// Authenticate a staff member with email and password.
///
/// # Errors
/// - 400: Missing email or password
/// - 401: Invalid credentials
/// - 500: Internal server error
///
/// # Security Notes
/// "No such user", "wrong password", and "inactive account" all produce the
/// identical `INVALID_CREDENTIALS` response to prevent user enumeration.
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let (email, password) = match (form.email.as_deref(), form.password.as_deref()) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => {
            return Err(AppError::Validation(ValidationError::MissingFields(
                "email, password".to_string(),
            )))
        }
    };

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    if row.6 != "active" {
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let password_valid = verify_password(password, &row.2)?;
    if !password_valid {
        AuditLog::new("LOGIN", "user", "FAILURE", "Invalid credentials")
            .with_resource_id(row.0.to_string())
            .record();
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let user = user_response(&row)?;
    let token = generate_token(&row.0, &row.1, user.role, jwt_config.get_ref())?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %row.0,
        "User logged in successfully"
    );
    AuditLog::new("LOGIN", "user", "SUCCESS", "User logged in")
        .with_user_id(row.0.to_string())
        .record();

    Ok(HttpResponse::Ok().json(AuthResponse {
        success: true,
        token,
        user,
    }))
}

/// POST /auth/refresh-token
///
/// Exchange a still-valid bearer token for a freshly issued one with a
/// renewed expiry window. Token-bound: no password is involved, and the
/// subject is re-resolved so revoked accounts stop refreshing.
///
/// # Errors
/// - 401: Missing, malformed, invalid, or expired token
/// - 404: Subject no longer exists
/// - 500: Internal server error
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::Auth(AuthError::TokenMissing))?;

    let claims = validate_token(token, jwt_config.get_ref())?;
    let user_id = claims.user_id()?;

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = $1",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::SubjectNotFound))?;

    if row.6 != "active" {
        return Err(AppError::Auth(AuthError::SubjectNotFound));
    }

    let user = user_response(&row)?;
    let new_token = generate_token(&row.0, &row.1, user.role, jwt_config.get_ref())?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %row.0,
        "Token refreshed successfully"
    );
    AuditLog::new("REFRESH", "user", "SUCCESS", "Token refreshed")
        .with_user_id(row.0.to_string())
        .record();

    Ok(HttpResponse::Ok().json(AuthResponse {
        success: true,
        token: new_token,
        user,
    }))
}

/// GET /auth/me
///
/// Get the current authenticated user's information. Claims are injected
/// by the JWT middleware.
///
/// # Errors
/// - 401: Missing or invalid token (handled by middleware)
/// - 404: User no longer exists
/// - 500: Internal server error
pub async fn get_current_user(
    claims: web::ReqData<Claims>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = $1 AND status = 'active'",
        USER_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::SubjectNotFound))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": user_response(&row)?
    })))
}
