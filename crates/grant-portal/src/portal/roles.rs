use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{CustomClaims, Role};
use super::platform::{IdentityDirectory, PlatformError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleAssignmentError {
    #[error("An email address is required.")]
    MissingEmail,
    #[error("There is no user record corresponding to {0}.")]
    UserNotFound(String),
    #[error("platform failure: {0}")]
    Platform(PlatformError),
}

impl RoleAssignmentError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingEmail => "auth/invalid-email",
            Self::UserNotFound(_) => "auth/user-not-found",
            Self::Platform(_) => "auth/internal-error",
        }
    }

    /// The error value handed back to the caller in place of a success message.
    pub fn error_value(&self) -> RoleAssignmentErrorValue {
        RoleAssignmentErrorValue {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignmentErrorValue {
    pub code: &'static str,
    pub message: String,
}

/// Sets the single `role` custom claim on the account registered to an email.
pub struct RoleAssignmentService {
    identity: Arc<dyn IdentityDirectory>,
}

impl RoleAssignmentService {
    pub fn new(identity: Arc<dyn IdentityDirectory>) -> Self {
        Self { identity }
    }

    pub async fn assign(
        &self,
        email: &str,
        role: Role,
    ) -> Result<RoleAssignment, RoleAssignmentError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(RoleAssignmentError::MissingEmail);
        }

        let account = self
            .identity
            .get_user_by_email(email)
            .await
            .map_err(|err| match err {
                PlatformError::NotFound(_) => RoleAssignmentError::UserNotFound(email.to_string()),
                other => RoleAssignmentError::Platform(other),
            })
            .inspect_err(|err| {
                warn!(%email, %role, error = %err, "role assignment lookup failed");
            })?;

        self.identity
            .set_custom_claims(&account.uid, CustomClaims::with_role(role))
            .await
            .map_err(RoleAssignmentError::Platform)
            .inspect_err(|err| warn!(%email, %role, error = %err, "role claim write failed"))?;

        info!(uid = %account.uid, %role, "role claim assigned");

        Ok(RoleAssignment {
            message: format!("Success! {email} has been made {}.", role.with_article()),
        })
    }
}
