//! Authentication utilities: JWT token management

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Request;

pub const ROLE_HOMEOWNER: &str = "homeowner";
pub const ROLE_CLEANER: &str = "cleaner";
pub const ROLE_ADMIN: &str = "admin";

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// User role (homeowner, cleaner, admin)
    pub role: String,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthInfo {
    /// Role check with the admin override — admins can act on any surface.
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role || self.role == ROLE_ADMIN
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// Generate a JWT access token
pub fn generate_token(user_id: Uuid, email: &str, role: &str, secret: &str) -> Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;
    let exp = now + 24 * 60 * 60; // 24 hours

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iat: now,
        exp,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Extract authentication info from a NATS request envelope.
/// A missing or invalid token is UNAUTHORIZED — there is no anonymous path.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    let token = request
        .token
        .as_ref()
        .ok_or_else(|| anyhow!("No authentication provided — JWT token is required"))?;

    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;

    Ok(AuthInfo {
        user_id,
        role: claims.role,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Request;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    fn make_request_with_token(token: Option<String>) -> Request<serde_json::Value> {
        Request {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            token,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let user_id = Uuid::new_v4();
        let token =
            generate_token(user_id, "dana@example.com", ROLE_CLEANER, TEST_SECRET).unwrap();

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "dana@example.com");
        assert_eq!(claims.role, "cleaner");
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let token =
            generate_token(Uuid::new_v4(), "dana@example.com", ROLE_CLEANER, TEST_SECRET).unwrap();
        assert!(validate_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn test_validate_token_malformed() {
        assert!(validate_token("not.a.valid.token", TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_with_valid_token() {
        let user_id = Uuid::new_v4();
        let token =
            generate_token(user_id, "owner@example.com", ROLE_HOMEOWNER, TEST_SECRET).unwrap();

        let request = make_request_with_token(Some(token));
        let auth = extract_auth(&request, TEST_SECRET).unwrap();

        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.role, "homeowner");
    }

    #[test]
    fn test_extract_auth_no_token_fails() {
        let request = make_request_with_token(None);
        assert!(extract_auth(&request, TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_invalid_token_fails() {
        let request = make_request_with_token(Some("bad-token".to_string()));
        assert!(extract_auth(&request, TEST_SECRET).is_err());
    }

    #[test]
    fn test_admin_passes_every_role_check() {
        let admin = AuthInfo { user_id: Uuid::new_v4(), role: ROLE_ADMIN.to_string() };
        assert!(admin.has_role(ROLE_CLEANER));
        assert!(admin.has_role(ROLE_HOMEOWNER));
        assert!(admin.is_admin());

        let cleaner = AuthInfo { user_id: Uuid::new_v4(), role: ROLE_CLEANER.to_string() };
        assert!(cleaner.has_role(ROLE_CLEANER));
        assert!(!cleaner.has_role(ROLE_HOMEOWNER));
        assert!(!cleaner.is_admin());
    }
}
