use axum::http::HeaderMap;

use crate::schema::{AuthConfig, Operation};

use super::{verify_token, AccessLevel, AuthError};

/// Identity attached to a request after the gate has run.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
    pub access: AccessLevel,
}

#[derive(Debug, Clone)]
pub enum AuthContext {
    Anonymous,
    Authenticated(AuthUser),
}

/// Per-request authorization check combining a schema's auth policy
/// with the operation being attempted.
pub struct AuthGate {
    secret: String,
}

impl AuthGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Decides whether the request may proceed. Anonymous access is only
    /// granted when the schema's policy exempts this operation; otherwise
    /// a valid bearer token is required, and write operations additionally
    /// need at least edit access.
    pub fn authorize(
        &self,
        auth: &AuthConfig,
        operation: Operation,
        headers: &HeaderMap,
    ) -> Result<AuthContext, AuthError> {
        if !auth.requires_auth(operation) {
            // Identify the caller when a credential is present anyway,
            // but never fail an open route over a bad one.
            return Ok(match self.try_identify(headers) {
                Some(user) => AuthContext::Authenticated(user),
                None => AuthContext::Anonymous,
            });
        }

        let token = extract_bearer(headers)?;
        let claims = verify_token(&token, &self.secret)?;
        let user = AuthUser { subject: claims.sub, access: claims.access };

        if operation.is_write() && user.access < AccessLevel::Edit {
            return Err(AuthError::Forbidden(format!(
                "{:?} access cannot {}",
                user.access,
                operation.as_str()
            )));
        }
        Ok(AuthContext::Authenticated(user))
    }

    fn try_identify(&self, headers: &HeaderMap) -> Option<AuthUser> {
        let token = extract_bearer(headers).ok()?;
        let claims = verify_token(&token, &self.secret).ok()?;
        Some(AuthUser { subject: claims.sub, access: claims.access })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers.get("authorization").ok_or(AuthError::MissingCredential)?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Authorization header is not valid UTF-8".to_string()))?;
    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        Some(_) => Err(AuthError::MissingCredential),
        None => Err(AuthError::InvalidToken(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}
