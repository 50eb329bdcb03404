//! Self-service account creation for applicants and reviewers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::domain::{Role, UserId};
use super::fault::FaultKind;
use super::platform::{DocumentStore, IdentityDirectory, PlatformError};
use super::roles::{RoleAssignmentError, RoleAssignmentService};
use super::validation::{account_email_allowed, PasswordRequirements};
use super::whitelist::{normalize_email, ReviewerWhitelist};

/// Sign-up form shared by the applicant and reviewer pages.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub affiliation: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredAccount {
    pub uid: UserId,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("{} accounts cannot be created from the sign-up pages.", .0.as_str())]
    NotSelfService(Role),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("Please enter a valid email address ending in .com, .edu, or .org.")]
    DisallowedEmail(String),
    #[error("Password must contain a special character, a capital letter, and a number.")]
    WeakPassword(PasswordRequirements),
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("This email is not approved for reviewer access.")]
    NotWhitelisted(String),
    #[error("An account already exists for {0}.")]
    EmailInUse(String),
    #[error("role assignment failed: {0}")]
    Role(#[from] RoleAssignmentError),
    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
}

impl RegistrationError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::NotSelfService(_) | Self::NotWhitelisted(_) => FaultKind::PermissionDenied,
            Self::MissingField(_)
            | Self::DisallowedEmail(_)
            | Self::WeakPassword(_)
            | Self::PasswordMismatch => FaultKind::InvalidArgument,
            Self::EmailInUse(_) => FaultKind::FailedPrecondition,
            Self::Role(_) | Self::Platform(_) => FaultKind::Internal,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            Self::Role(_) | Self::Platform(_) => "An internal error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

pub struct AccountRegistration {
    identity: Arc<dyn IdentityDirectory>,
    documents: Arc<dyn DocumentStore>,
    roles: RoleAssignmentService,
    whitelist: Arc<ReviewerWhitelist>,
}

impl AccountRegistration {
    pub fn new(
        identity: Arc<dyn IdentityDirectory>,
        documents: Arc<dyn DocumentStore>,
        whitelist: Arc<ReviewerWhitelist>,
    ) -> Self {
        Self {
            roles: RoleAssignmentService::new(Arc::clone(&identity)),
            identity,
            documents,
            whitelist,
        }
    }

    /// Creates the account, sets its role claim, and writes its profile document.
    ///
    /// Reviewer sign-ups additionally need an active whitelist entry for the email.
    pub async fn register(
        &self,
        role: Role,
        registration: Registration,
    ) -> Result<RegisteredAccount, RegistrationError> {
        if role == Role::Admin {
            return Err(RegistrationError::NotSelfService(role));
        }
        for (field, value) in [
            ("email", &registration.email),
            ("firstName", &registration.first_name),
            ("lastName", &registration.last_name),
            ("affiliation", &registration.affiliation),
        ] {
            if value.trim().is_empty() {
                return Err(RegistrationError::MissingField(field));
            }
        }

        let email = normalize_email(&registration.email);
        if !account_email_allowed(&email) {
            return Err(RegistrationError::DisallowedEmail(email));
        }
        let requirements = PasswordRequirements::check(&registration.password);
        if !requirements.satisfied() {
            return Err(RegistrationError::WeakPassword(requirements));
        }
        if registration.password != registration.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }
        if role == Role::Reviewer && !self.whitelist.is_whitelisted(&email).await? {
            warn!(%email, "reviewer sign-up rejected: email not whitelisted");
            return Err(RegistrationError::NotWhitelisted(email));
        }

        let account = self
            .identity
            .create_user(&email, &registration.password)
            .await
            .map_err(|err| match err {
                PlatformError::AlreadyExists(_) => RegistrationError::EmailInUse(email.clone()),
                other => RegistrationError::Platform(other),
            })?;
        self.roles.assign(&email, role).await?;
        self.documents
            .set(
                role.profile_collection(),
                &account.uid.0,
                json!({
                    "firstName": registration.first_name.trim(),
                    "lastName": registration.last_name.trim(),
                    "affiliation": registration.affiliation.trim(),
                    "title": registration.title.trim(),
                    "email": email,
                    "role": role,
                }),
            )
            .await?;

        info!(uid = %account.uid, %role, "account registered");
        Ok(RegisteredAccount {
            uid: account.uid,
            email,
            role,
        })
    }
}
