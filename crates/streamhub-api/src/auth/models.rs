use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use streamhub_core::{AppError, Capability, Role};
use uuid::Uuid;

/// Caller identity inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
    pub session_id: Uuid,
}

impl AuthUser {
    /// Fails with `Forbidden` unless the caller's role grants `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.role.can(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Role '{}' is not allowed to perform this action",
                self.role
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Not authenticated".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn require_maps_missing_capability_to_forbidden() {
        assert!(caller(Role::Admin).require(Capability::ManageProducts).is_ok());
        assert!(matches!(
            caller(Role::User).require(Capability::ManageProducts),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            caller(Role::Artist).require(Capability::CreateArtistProfile),
            Err(AppError::Forbidden(_))
        ));
    }
}
