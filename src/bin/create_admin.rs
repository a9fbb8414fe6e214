//! Seeds the initial admin account.
//!
//! Usage: `create_admin <email> <password> [first_name] [last_name]`
//! Idempotent: an existing user with the same email is left untouched.

use clientdesk::auth::hash_password;
use clientdesk::configuration::get_configuration;
use clientdesk::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    let mut args = std::env::args().skip(1);
    let (email, password) = match (args.next(), args.next()) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            eprintln!("Usage: create_admin <email> <password> [first_name] [last_name]");
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Missing arguments",
            ));
        }
    };
    let first_name = args.next().unwrap_or_else(|| "Admin".to_string());
    let last_name = args.next().unwrap_or_else(|| "User".to_string());

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to query users: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Query error")
        })?;

    if let Some(id) = existing {
        tracing::info!(user_id = %id, "Admin account already exists, nothing to do");
        return Ok(());
    }

    let password_hash = hash_password(&password).map_err(|e| {
        tracing::error!("Password rejected: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Weak password")
    })?;

    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name, role, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 'admin', 'active', now(), now())
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&first_name)
    .bind(&last_name)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create admin: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Insert error")
    })?;

    tracing::info!(user_id = %user_id, email = %email, "Admin account created");
    Ok(())
}
