//! Test-environment seeding: one account per role, their profile documents, and an open cycle.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::cycle::fetch_current_cycle;
use super::domain::{collections, Role, UserAccount, UserId};
use super::platform::{PlatformError, PortalPlatform};
use super::roles::{RoleAssignmentError, RoleAssignmentService};
use super::validation::{account_email_allowed, PasswordRequirements};

pub const TEST_PASSWORD: &str = "P@ssword123";

/// Document in `settings` whose presence marks the environment as seeded.
pub const SEED_MARKER_ID: &str = "testAccountsInitialized";

pub const SEED_CYCLE_ID: &str = "seed-cycle";

struct TestAccount {
    email: &'static str,
    role: Role,
    first_name: &'static str,
    affiliation: &'static str,
}

const TEST_ACCOUNTS: [TestAccount; 3] = [
    TestAccount {
        email: "admin@test.com",
        role: Role::Admin,
        first_name: "admin",
        affiliation: "ccf",
    },
    TestAccount {
        email: "reviewer@test.com",
        role: Role::Reviewer,
        first_name: "reviewer",
        affiliation: "reviewer hospital",
    },
    TestAccount {
        email: "applicant@test.com",
        role: Role::Applicant,
        first_name: "applicant",
        affiliation: "applicant hospital",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOptions {
    pub cycle_name: String,
    /// Day every grant deadline of the seeded cycle falls on.
    pub deadline: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeededAccount {
    pub email: String,
    pub uid: UserId,
    pub role: Role,
    pub created: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub skipped: bool,
    pub accounts: Vec<SeededAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("account email {0} is not allowed")]
    DisallowedEmail(String),
    #[error("seed password does not meet the account requirements")]
    WeakPassword,
    #[error("deadline {0} cannot be represented")]
    InvalidDeadline(NaiveDate),
    #[error(transparent)]
    Role(#[from] RoleAssignmentError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Seeds the environment once; later runs find the marker and return a skipped report.
pub async fn seed_test_environment(
    platform: &PortalPlatform,
    options: &SeedOptions,
) -> Result<SeedReport, SeedError> {
    let documents = platform.documents.as_ref();
    if documents
        .get(collections::SETTINGS, SEED_MARKER_ID)
        .await?
        .is_some()
    {
        info!("test accounts already initialized");
        return Ok(SeedReport {
            skipped: true,
            ..SeedReport::default()
        });
    }

    if !PasswordRequirements::check(TEST_PASSWORD).satisfied() {
        return Err(SeedError::WeakPassword);
    }

    let roles = RoleAssignmentService::new(platform.identity.clone());
    let mut accounts = Vec::with_capacity(TEST_ACCOUNTS.len());
    for account in &TEST_ACCOUNTS {
        if !account_email_allowed(account.email) {
            return Err(SeedError::DisallowedEmail(account.email.to_string()));
        }

        let (user, created) = ensure_account(platform, account.email).await?;
        roles.assign(account.email, account.role).await?;
        documents
            .set(
                account.role.profile_collection(),
                &user.uid.0,
                json!({
                    "firstName": account.first_name,
                    "lastName": "person",
                    "affiliation": account.affiliation,
                    "email": account.email,
                    "role": account.role,
                }),
            )
            .await?;

        accounts.push(SeededAccount {
            email: account.email.to_string(),
            uid: user.uid,
            role: account.role,
            created,
        });
    }

    let cycle_id = seed_open_cycle(platform, options).await?;
    documents
        .set(
            collections::SETTINGS,
            SEED_MARKER_ID,
            json!({ "initialized": true }),
        )
        .await?;

    info!(accounts = accounts.len(), cycle = ?cycle_id, "test environment seeded");
    Ok(SeedReport {
        skipped: false,
        accounts,
        cycle_id,
    })
}

async fn ensure_account(
    platform: &PortalPlatform,
    email: &str,
) -> Result<(UserAccount, bool), PlatformError> {
    match platform.identity.create_user(email, TEST_PASSWORD).await {
        Ok(account) => Ok((account, true)),
        Err(PlatformError::AlreadyExists(_)) => {
            warn!(%email, "test account already exists");
            let account = platform.identity.get_user_by_email(email).await?;
            Ok((account, false))
        }
        Err(err) => Err(err),
    }
}

/// Adds an open cycle unless one is already current.
async fn seed_open_cycle(
    platform: &PortalPlatform,
    options: &SeedOptions,
) -> Result<Option<String>, SeedError> {
    if fetch_current_cycle(platform.documents.as_ref()).await?.is_some() {
        return Ok(None);
    }

    let deadline = options
        .deadline
        .and_hms_opt(23, 59, 0)
        .map(|moment| moment.and_utc())
        .ok_or(SeedError::InvalidDeadline(options.deadline))?;
    let now = platform.clock.now();

    platform
        .documents
        .set(
            collections::APPLICATION_CYCLES,
            SEED_CYCLE_ID,
            json!({
                "current": true,
                "name": options.cycle_name,
                "stage": "Applications Open",
                "startDate": now,
                "endDate": deadline + Duration::days(90),
                "researchDeadline": deadline,
                "nextGenDeadline": deadline,
                "nonResearchDeadline": deadline,
                "reviewerDeadline": deadline + Duration::days(30),
            }),
        )
        .await?;
    Ok(Some(SEED_CYCLE_ID.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::portal::memory::{FixedClock, MemoryBlobs, MemoryDocuments, MemoryIdentity};

    fn platform(identity: &MemoryIdentity, documents: &MemoryDocuments) -> PortalPlatform {
        PortalPlatform {
            identity: Arc::new(identity.clone()),
            tokens: Arc::new(identity.clone()),
            documents: Arc::new(documents.clone()),
            blobs: Arc::new(MemoryBlobs::default()),
            clock: Arc::new(FixedClock::at(
                Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap(),
            )),
        }
    }

    fn options() -> SeedOptions {
        SeedOptions {
            cycle_name: "Seed Cycle".to_string(),
            deadline: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
        }
    }

    #[tokio::test]
    async fn seeds_accounts_profiles_and_cycle_once() {
        let identity = MemoryIdentity::default();
        let documents = MemoryDocuments::default();
        let platform = platform(&identity, &documents);

        let report = seed_test_environment(&platform, &options())
            .await
            .expect("seeded");
        assert!(!report.skipped);
        assert_eq!(report.accounts.len(), 3);
        assert!(report.accounts.iter().all(|account| account.created));
        assert_eq!(report.cycle_id.as_deref(), Some(SEED_CYCLE_ID));

        for account in &report.accounts {
            let stored = identity.account(&account.uid).expect("account");
            assert_eq!(stored.custom_claims.role, Some(account.role));
            assert_eq!(documents.count(account.role.profile_collection()), 1);
        }

        let cycle = fetch_current_cycle(&documents)
            .await
            .expect("lookup")
            .expect("cycle seeded");
        assert_eq!(
            cycle.cycle.research_deadline,
            Utc.with_ymd_and_hms(2025, 2, 28, 23, 59, 0).unwrap()
        );

        let again = seed_test_environment(&platform, &options())
            .await
            .expect("second run");
        assert!(again.skipped);
        assert_eq!(documents.count(collections::REVIEWERS), 1);
    }

    #[tokio::test]
    async fn existing_accounts_are_reused() {
        let identity = MemoryIdentity::default();
        let documents = MemoryDocuments::default();
        let existing = identity.insert_account("reviewer@test.com", None);
        let platform = platform(&identity, &documents);

        let report = seed_test_environment(&platform, &options())
            .await
            .expect("seeded");
        let reviewer = report
            .accounts
            .iter()
            .find(|account| account.role == Role::Reviewer)
            .expect("reviewer seeded");
        assert_eq!(reviewer.uid, existing.uid);
        assert!(!reviewer.created);
    }
}
