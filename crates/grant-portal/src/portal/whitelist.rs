//! Reviewer whitelist: the emails an administrator has cleared to open reviewer accounts.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::domain::{collections, Caller, Role, StoredDocument};
use super::fault::FaultKind;
use super::platform::{Clock, DocumentStore, PlatformError};
use super::validation::is_valid_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitelistStatus {
    Active,
    Inactive,
}

impl WhitelistStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// Details an administrator enters for a new reviewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhitelistForm {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub affiliation: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistRecord {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub title: String,
    pub added_at: DateTime<Utc>,
    pub added_by: String,
    pub status: WhitelistStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhitelistEntry {
    pub id: String,
    #[serde(flatten)]
    pub record: WhitelistRecord,
}

#[derive(Debug, thiserror::Error)]
pub enum WhitelistError {
    #[error("The function must be called while authenticated.")]
    Unauthenticated,
    #[error("Only administrators can manage the reviewer whitelist.")]
    NotAdmin,
    #[error("`{0}` is not a valid email address.")]
    InvalidEmail(String),
    #[error("Whitelist entry {0} not found.")]
    EntryNotFound(String),
    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
}

impl WhitelistError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Unauthenticated => FaultKind::Unauthenticated,
            Self::NotAdmin => FaultKind::PermissionDenied,
            Self::InvalidEmail(_) => FaultKind::InvalidArgument,
            Self::EntryNotFound(_) => FaultKind::FailedPrecondition,
            Self::Platform(_) => FaultKind::Internal,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            Self::Platform(_) => "An internal error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Emails are stored and matched lower-cased with surrounding whitespace removed.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct ReviewerWhitelist {
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ReviewerWhitelist {
    pub fn new(documents: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { documents, clock }
    }

    /// Records an active entry for the email, attributed to the calling administrator.
    pub async fn add(
        &self,
        caller: Option<&Caller>,
        form: WhitelistForm,
    ) -> Result<WhitelistEntry, WhitelistError> {
        let caller = require_admin(caller)?;
        let email = normalize_email(&form.email);
        if !is_valid_email(&email) {
            return Err(WhitelistError::InvalidEmail(form.email));
        }

        let record = WhitelistRecord {
            email,
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            affiliation: form.affiliation.trim().to_string(),
            title: form.title.trim().to_string(),
            added_at: self.clock.now(),
            added_by: caller.email.clone().unwrap_or_else(|| caller.uid.0.clone()),
            status: WhitelistStatus::Active,
        };
        let id = uuid::Uuid::new_v4().simple().to_string();
        let document = serde_json::to_value(&record)
            .map_err(|err| PlatformError::Malformed(format!("whitelist entry: {err}")))?;

        self.documents
            .set(collections::REVIEWER_WHITELIST, &id, document)
            .await?;
        info!(entry = %id, email = %record.email, admin = %caller.uid, "reviewer whitelisted");
        Ok(WhitelistEntry { id, record })
    }

    /// Every entry, newest first. Entries that no longer parse are skipped.
    pub async fn entries(
        &self,
        caller: Option<&Caller>,
    ) -> Result<Vec<WhitelistEntry>, WhitelistError> {
        require_admin(caller)?;
        let mut entries: Vec<WhitelistEntry> = self
            .documents
            .list(collections::REVIEWER_WHITELIST)
            .await?
            .into_iter()
            .filter_map(parse_entry)
            .collect();
        entries.sort_by(|a, b| b.record.added_at.cmp(&a.record.added_at));
        Ok(entries)
    }

    pub async fn set_status(
        &self,
        caller: Option<&Caller>,
        id: &str,
        status: WhitelistStatus,
    ) -> Result<(), WhitelistError> {
        let caller = require_admin(caller)?;
        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(status));

        self.documents
            .update(collections::REVIEWER_WHITELIST, id, fields)
            .await
            .map_err(|err| match err {
                PlatformError::NotFound(_) => WhitelistError::EntryNotFound(id.to_string()),
                other => WhitelistError::Platform(other),
            })?;
        info!(
            entry = %id,
            status = status.as_str(),
            admin = %caller.uid,
            "whitelist status changed"
        );
        Ok(())
    }

    pub async fn remove(&self, caller: Option<&Caller>, id: &str) -> Result<(), WhitelistError> {
        let caller = require_admin(caller)?;
        if self
            .documents
            .get(collections::REVIEWER_WHITELIST, id)
            .await?
            .is_none()
        {
            return Err(WhitelistError::EntryNotFound(id.to_string()));
        }

        self.documents
            .delete(collections::REVIEWER_WHITELIST, id)
            .await?;
        info!(entry = %id, admin = %caller.uid, "whitelist entry removed");
        Ok(())
    }

    /// True when an active entry exists for the email.
    pub async fn is_whitelisted(&self, email: &str) -> Result<bool, PlatformError> {
        let email = normalize_email(email);
        let matches = self
            .documents
            .find_equal(collections::REVIEWER_WHITELIST, "email", &Value::String(email))
            .await?;

        let active = Some(WhitelistStatus::Active.as_str());
        Ok(matches
            .iter()
            .any(|entry| entry.data.get("status").and_then(Value::as_str) == active))
    }
}

/// Distinct non-empty affiliations across the entries, sorted.
pub fn affiliations(entries: &[WhitelistEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.record.affiliation.trim())
        .filter(|affiliation| !affiliation.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn require_admin(caller: Option<&Caller>) -> Result<&Caller, WhitelistError> {
    let caller = caller.ok_or(WhitelistError::Unauthenticated)?;
    if caller.role == Some(Role::Admin) {
        Ok(caller)
    } else {
        Err(WhitelistError::NotAdmin)
    }
}

fn parse_entry(StoredDocument { id, data }: StoredDocument) -> Option<WhitelistEntry> {
    match serde_json::from_value::<WhitelistRecord>(Value::Object(data)) {
        Ok(record) => Some(WhitelistEntry { id, record }),
        Err(err) => {
            warn!(entry = %id, error = %err, "skipping malformed whitelist entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::domain::UserId;
    use crate::portal::memory::{FixedClock, MemoryDocuments};
    use chrono::{Duration, TimeZone};

    fn admin() -> Caller {
        Caller {
            uid: UserId("uid-admin".to_string()),
            email: Some("admin@test.com".to_string()),
            role: Some(Role::Admin),
        }
    }

    fn form(email: &str, affiliation: &str) -> WhitelistForm {
        WhitelistForm {
            email: email.to_string(),
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            affiliation: affiliation.to_string(),
            title: "MD".to_string(),
        }
    }

    fn whitelist() -> (ReviewerWhitelist, MemoryDocuments, FixedClock) {
        let documents = MemoryDocuments::default();
        let start = Utc
            .with_ymd_and_hms(2025, 1, 10, 9, 0, 0)
            .single()
            .expect("valid instant");
        let clock = FixedClock::at(start);
        let whitelist =
            ReviewerWhitelist::new(Arc::new(documents.clone()), Arc::new(clock.clone()));
        (whitelist, documents, clock)
    }

    #[tokio::test]
    async fn added_emails_are_normalized_and_active() {
        let (whitelist, documents, _) = whitelist();
        let entry = whitelist
            .add(Some(&admin()), form("  Reviewer@Hospital.ORG ", "Mercy"))
            .await
            .expect("added");

        assert_eq!(entry.record.email, "reviewer@hospital.org");
        assert_eq!(entry.record.first_name, "Ada");
        assert_eq!(entry.record.added_by, "admin@test.com");
        assert_eq!(entry.record.status, WhitelistStatus::Active);
        assert_eq!(documents.count(collections::REVIEWER_WHITELIST), 1);

        assert!(whitelist
            .is_whitelisted("REVIEWER@hospital.org ")
            .await
            .expect("lookup"));
        assert!(!whitelist
            .is_whitelisted("other@hospital.org")
            .await
            .expect("lookup"));
    }

    #[tokio::test]
    async fn inactive_entries_do_not_whitelist() {
        let (whitelist, _, _) = whitelist();
        let entry = whitelist
            .add(Some(&admin()), form("reviewer@hospital.org", "Mercy"))
            .await
            .expect("added");

        whitelist
            .set_status(Some(&admin()), &entry.id, WhitelistStatus::Inactive)
            .await
            .expect("deactivated");
        assert!(!whitelist
            .is_whitelisted("reviewer@hospital.org")
            .await
            .expect("lookup"));

        whitelist
            .set_status(Some(&admin()), &entry.id, WhitelistStatus::Active)
            .await
            .expect("reactivated");
        assert!(whitelist
            .is_whitelisted("reviewer@hospital.org")
            .await
            .expect("lookup"));
    }

    #[tokio::test]
    async fn entries_are_listed_newest_first() {
        let (whitelist, _, clock) = whitelist();
        let first = whitelist
            .add(Some(&admin()), form("a@hospital.org", "Mercy"))
            .await
            .expect("added");
        clock.set(clock.now() + Duration::hours(1));
        whitelist
            .add(Some(&admin()), form("b@hospital.org", "General"))
            .await
            .expect("added");
        clock.set(clock.now() + Duration::hours(1));
        let newest = whitelist
            .add(Some(&admin()), form("c@hospital.org", "Mercy"))
            .await
            .expect("added");

        let entries = whitelist.entries(Some(&admin())).await.expect("listed");
        let emails: Vec<_> = entries
            .iter()
            .map(|entry| entry.record.email.as_str())
            .collect();
        assert_eq!(emails, vec!["c@hospital.org", "b@hospital.org", "a@hospital.org"]);
        assert_eq!(entries[0].id, newest.id);
        assert_eq!(entries[2].id, first.id);
        assert_eq!(affiliations(&entries), vec!["General", "Mercy"]);
    }

    #[tokio::test]
    async fn removal_requires_an_existing_entry() {
        let (whitelist, documents, _) = whitelist();
        let entry = whitelist
            .add(Some(&admin()), form("reviewer@hospital.org", "Mercy"))
            .await
            .expect("added");

        whitelist.remove(Some(&admin()), &entry.id).await.expect("removed");
        assert_eq!(documents.count(collections::REVIEWER_WHITELIST), 0);
        assert!(matches!(
            whitelist.remove(Some(&admin()), &entry.id).await,
            Err(WhitelistError::EntryNotFound(_))
        ));
        assert!(matches!(
            whitelist
                .set_status(Some(&admin()), "missing", WhitelistStatus::Active)
                .await,
            Err(WhitelistError::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_administrators_manage_entries() {
        let (whitelist, documents, _) = whitelist();
        let reviewer = Caller {
            role: Some(Role::Reviewer),
            ..admin()
        };

        assert!(matches!(
            whitelist.add(None, form("x@hospital.org", "")).await,
            Err(WhitelistError::Unauthenticated)
        ));
        assert!(matches!(
            whitelist.add(Some(&reviewer), form("x@hospital.org", "")).await,
            Err(WhitelistError::NotAdmin)
        ));
        assert!(matches!(
            whitelist.add(Some(&admin()), form("not an email", "")).await,
            Err(WhitelistError::InvalidEmail(_))
        ));
        assert_eq!(documents.count(collections::REVIEWER_WHITELIST), 0);
    }
}
