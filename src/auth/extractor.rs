// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::claims::JwtClaims;
use super::{AuthError, AuthenticatedUser};
use crate::config::AuthSettings;
use crate::state::AppState;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Bearer token verifier.
///
/// ## Modes
///
/// - **Production** (`AUTH_JWT_SECRET` set): HS256 signature, expiry and
///   (if configured) issuer are verified.
/// - **Development** (no secret): structure and expiry only, no signature
///   check.
pub struct JwtVerifier {
    key: Option<DecodingKey>,
    issuer: Option<String>,
}

impl JwtVerifier {
    pub fn new(settings: &AuthSettings) -> Self {
        Self {
            key: settings
                .jwt_secret
                .as_ref()
                .map(|secret| DecodingKey::from_secret(secret.as_bytes())),
            issuer: settings.issuer.clone(),
        }
    }

    /// Whether signatures are verified.
    pub fn is_production(&self) -> bool {
        self.key.is_some()
    }

    /// Verify a token and extract the user.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = match &self.key {
            Some(key) => self.verify_signed(token, key)?,
            None => self.verify_development(token)?,
        };
        Ok(AuthenticatedUser::from_claims(claims))
    }

    fn verify_signed(&self, token: &str, key: &DecodingKey) -> Result<JwtClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;
        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }

        decode::<JwtClaims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            })
    }

    /// WARNING: This should only be used in development environments.
    fn verify_development(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let claims = jsonwebtoken::dangerous::insecure_decode::<JwtClaims>(token)
            .map_err(|_| AuthError::MalformedToken)?
            .claims;

        let now = Utc::now().timestamp();
        if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
            return Err(AuthError::TokenExpired);
        }
        if let Some(ref issuer) = self.issuer {
            if &claims.iss != issuer {
                return Err(AuthError::InvalidIssuer);
            }
        }
        Ok(claims)
    }
}

/// Extractor for authenticated users.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        Ok(Auth(state.auth.verify(token.trim())?))
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` if no valid authentication is present, instead of rejecting.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::Role;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    /// Unsigned token accepted in development mode.
    pub(crate) fn dev_token(user_id: &str, role: Role) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let header = r#"{"alg":"HS256","typ":"JWT"}"#;
        let claims = json!({
            "sub": user_id,
            "exp": 9_999_999_999i64,
            "iss": "test",
            "role": role.to_string(),
        });
        format!(
            "{}.{}.fake_signature",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    fn signed(secret: &str, claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn production(issuer: Option<&str>) -> JwtVerifier {
        JwtVerifier::new(&AuthSettings {
            jwt_secret: Some("s3cret".to_string()),
            issuer: issuer.map(str::to_string),
        })
    }

    #[test]
    fn development_mode_accepts_unsigned_tokens() {
        let verifier = JwtVerifier::new(&AuthSettings::default());
        assert!(!verifier.is_production());

        let user = verifier.verify(&dev_token("user_123", Role::Admin)).unwrap();
        assert_eq!(user.user_id, "user_123");
        assert!(user.is_admin());
    }

    #[test]
    fn development_mode_rejects_expired_and_garbage() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let verifier = JwtVerifier::new(&AuthSettings::default());
        let expired = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(r#"{"sub":"u","exp":1000}"#)
        );
        assert_eq!(verifier.verify(&expired).unwrap_err(), AuthError::TokenExpired);
        assert_eq!(verifier.verify("not-a-jwt").unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn production_mode_verifies_signature() {
        let verifier = production(None);
        let token = signed("s3cret", json!({ "sub": "user_9", "exp": 9_999_999_999i64 }));
        let user = verifier.verify(&token).unwrap();
        assert_eq!(user.user_id, "user_9");
        assert_eq!(user.role, Role::User);

        let forged = signed("other", json!({ "sub": "user_9", "exp": 9_999_999_999i64 }));
        assert_eq!(verifier.verify(&forged).unwrap_err(), AuthError::InvalidSignature);

        assert!(verifier.verify(&dev_token("user_9", Role::Admin)).is_err());
    }

    #[test]
    fn production_mode_checks_expiry_and_issuer() {
        let verifier = production(Some("pebloq"));
        let expired = signed("s3cret", json!({ "sub": "u", "exp": 1_000, "iss": "pebloq" }));
        assert_eq!(verifier.verify(&expired).unwrap_err(), AuthError::TokenExpired);

        let wrong_issuer = signed("s3cret", json!({ "sub": "u", "exp": 9_999_999_999i64, "iss": "evil" }));
        assert_eq!(verifier.verify(&wrong_issuer).unwrap_err(), AuthError::InvalidIssuer);
    }
}
