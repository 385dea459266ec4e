//! Signed access tokens and role checks for callers of the back office.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::AppError;
use crate::config::AuthConfig;

/// Roles in increasing order of privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access to ledgers and reports
    Viewer,
    /// Records and amends petty cash and expenses
    Accountant,
    /// Manages offices and vendors
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Accountant => "accountant",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "viewer" => Some(Role::Viewer),
            "accountant" => Some(Role::Accountant),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub jti: String,
}

impl Claims {
    /// Fail with `Forbidden` unless the holder has at least `required`.
    pub fn require(&self, required: Role) -> Result<(), AppError> {
        if self.role >= required {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                required: required.to_string(),
                actual: self.role.to_string(),
            })
        }
    }
}

/// Issues and verifies HS256 tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: i64,
    issuer: String,
}

impl TokenService {
    pub fn new(secret: &str, expires_in: i64, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
            issuer: issuer.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.secret.expose_secret(),
            config.expires_in_secs,
            config.issuer.clone(),
        )
    }

    pub fn sign(&self, subject: &str, role: Role) -> Result<String, AppError> {
        if subject.trim().is_empty() {
            return Err(AppError::Validation("token subject is required".to_string()));
        }

        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.expires_in)).timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::InvalidToken(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", 60, "pettyledger")
    }

    #[test]
    fn test_sign_and_verify() {
        let tokens = service();
        let token = tokens.sign("amina", Role::Accountant).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "amina");
        assert_eq!(claims.role, Role::Accountant);
        assert_eq!(claims.iss, "pettyledger");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let token = TokenService::new("other-secret", 60, "pettyledger")
            .sign("amina", Role::Admin)
            .unwrap();
        assert!(matches!(
            service().verify(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_rejects_expired_token() {
        let token = TokenService::new("test-secret", -120, "pettyledger")
            .sign("amina", Role::Admin)
            .unwrap();
        assert!(matches!(
            service().verify(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_issuer() {
        let token = TokenService::new("test-secret", 60, "someone-else")
            .sign("amina", Role::Admin)
            .unwrap();
        assert!(service().verify(&token).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(service().verify("not.a.token").is_err());
    }

    #[test]
    fn test_role_hierarchy() {
        let tokens = service();
        let claims = tokens
            .verify(&tokens.sign("amina", Role::Accountant).unwrap())
            .unwrap();

        assert!(claims.require(Role::Viewer).is_ok());
        assert!(claims.require(Role::Accountant).is_ok());
        assert!(matches!(
            claims.require(Role::Admin),
            Err(AppError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::Viewer, Role::Accountant, Role::Admin] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::from_str("root"), None);
    }
}
