use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;
use tracing::warn;

use crate::controllers::error::ApiError;
use crate::models::{Capability, Role, User};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            warn!("User {} ({:?}) lacks {:?}", self.id, self.role, capability);
            Err(ApiError::Forbidden)
        }
    }
}

/// Разбирает заголовок `Basic base64(email:password)`.
fn parse_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (email, password) = credentials.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let (email, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic)
            .ok_or(ApiError::Unauthorized)?;

        let user = User::find_by_email(&email, &state.db)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or(ApiError::Unauthorized)?;

        // bcrypt медленный, не держим на нём поток рантайма
        let checked = user.clone();
        let valid = tokio::task::spawn_blocking(move || checked.verify_password(&password))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        if !valid {
            return Err(ApiError::Unauthorized);
        }

        let role = user
            .role()
            .ok_or_else(|| ApiError::Internal(format!("user {} has unknown role {}", user.id, user.role)))?;

        Ok(AuthUser { id: user.id, name: user.name, email: user.email, role })
    }
}
