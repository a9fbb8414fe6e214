/// JWT token generation and validation.
///
/// Tokens are HS256-signed with the configured secret; validation also pins
/// the issuer. Validation failure is deliberately collapsed into a single
/// `TokenInvalidOrExpired` so callers cannot distinguish tampering from expiry.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, Role};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Generate a signed bearer token for a user.
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_token(
    user_id: &Uuid,
    email: &str,
    role: Role,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(
        *user_id,
        email.to_string(),
        role,
        config.token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate a bearer token and extract its claims.
///
/// # Errors
/// Returns `TokenInvalidOrExpired` if the token is malformed, expired,
/// tampered with, or issued by someone else.
pub fn validate_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::Auth(AuthError::TokenInvalidOrExpired)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            token_expiry: 3600,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();
        let email = "test@example.com";

        let token =
            generate_token(&user_id, email, Role::Manager, &config).expect("Failed to generate token");
        let claims = validate_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, email);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        let result = validate_token("invalid.token.here", &config);

        assert!(result.is_err());
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_token(&user_id, "test@example.com", Role::Operator, &config)
            .expect("Failed to generate token");

        // Tamper with token
        let tampered = format!("{}X", token);
        let result = validate_token(&tampered, &config);

        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_token(&user_id, "test@example.com", Role::Operator, &config)
            .expect("Failed to generate token");

        // Change issuer in validation config
        config.issuer = "wrong-issuer".to_string();
        let result = validate_token(&token, &config);

        assert!(result.is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut config = get_test_config();
        config.token_expiry = -600; // expired well past the default validation leeway

        let token = generate_token(&Uuid::new_v4(), "test@example.com", Role::Operator, &config)
            .expect("Failed to generate token");

        let result = validate_token(&token, &config);
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::TokenInvalidOrExpired))
        ));
    }
}
