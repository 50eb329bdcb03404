use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection names used by the document store.
pub mod collections {
    pub const APPLICATIONS: &str = "applications";
    pub const APPLICATION_CYCLES: &str = "applicationCycles";
    pub const ADMIN_DATA: &str = "admin_data";
    pub const ADMINS: &str = "admins";
    pub const REVIEWERS: &str = "reviewers";
    pub const APPLICANTS: &str = "applicants";
    pub const SETTINGS: &str = "settings";
    pub const REVIEWER_WHITELIST: &str = "reviewer-whitelist";
}

/// Identity-platform account id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Reviewer,
    Applicant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Reviewer => "reviewer",
            Self::Applicant => "applicant",
        }
    }

    /// Role name with its indefinite article, e.g. "an admin".
    pub const fn with_article(self) -> &'static str {
        match self {
            Self::Admin => "an admin",
            Self::Reviewer => "a reviewer",
            Self::Applicant => "an applicant",
        }
    }

    /// Collection holding the profile documents of accounts with this role.
    pub const fn profile_collection(self) -> &'static str {
        match self {
            Self::Admin => collections::ADMINS,
            Self::Reviewer => collections::REVIEWERS,
            Self::Applicant => collections::APPLICANTS,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownTag;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "admin" => Ok(Self::Admin),
            "reviewer" => Ok(Self::Reviewer),
            "applicant" => Ok(Self::Applicant),
            other => Err(UnknownTag(other.to_string())),
        }
    }
}

/// Custom claims attached to an account. The portal only ever sets `role`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl CustomClaims {
    pub fn with_role(role: Role) -> Self {
        Self { role: Some(role) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub uid: UserId,
    pub email: String,
    #[serde(default)]
    pub custom_claims: CustomClaims,
}

/// Verified identity of the caller of an authenticated endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: UserId,
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "research")]
    Research,
    #[serde(rename = "nextgen")]
    NextGen,
    #[serde(rename = "nonresearch")]
    NonResearch,
}

impl GrantType {
    pub const fn ordered() -> [Self; 3] {
        [Self::Research, Self::NextGen, Self::NonResearch]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::NextGen => "nextgen",
            Self::NonResearch => "nonresearch",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = UnknownTag;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ordered()
            .into_iter()
            .find(|grant_type| grant_type.as_str() == raw)
            .ok_or_else(|| UnknownTag(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tag `{0}`")]
pub struct UnknownTag(pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStage {
    #[serde(rename = "Applications Open")]
    ApplicationsOpen,
    #[serde(rename = "Reviewing Applications")]
    ReviewingApplications,
    #[serde(rename = "Reviews Closed")]
    ReviewsClosed,
    #[serde(rename = "Final Decisions")]
    FinalDecisions,
}

impl CycleStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ApplicationsOpen => "Applications Open",
            Self::ReviewingApplications => "Reviewing Applications",
            Self::ReviewsClosed => "Reviews Closed",
            Self::FinalDecisions => "Final Decisions",
        }
    }

    pub const fn accepts_submissions(self) -> bool {
        matches!(self, Self::ApplicationsOpen)
    }
}

/// The submission window described by an `applicationCycles` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCycle {
    pub current: bool,
    pub name: String,
    pub stage: CycleStage,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub research_deadline: DateTime<Utc>,
    pub next_gen_deadline: DateTime<Utc>,
    pub non_research_deadline: DateTime<Utc>,
    pub reviewer_deadline: DateTime<Utc>,
}

impl ApplicationCycle {
    pub fn deadline_for(&self, grant_type: GrantType) -> DateTime<Utc> {
        match grant_type {
            GrantType::Research => self.research_deadline,
            GrantType::NextGen => self.next_gen_deadline,
            GrantType::NonResearch => self.non_research_deadline,
        }
    }
}

/// Cycle document paired with its store id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredCycle {
    pub id: String,
    #[serde(flatten)]
    pub cycle: ApplicationCycle,
}

/// Server-generated fields merged over the applicant's form fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetails {
    pub application_id: ApplicationId,
    pub decision: Decision,
    pub creator_id: UserId,
    pub grant_type: GrantType,
    pub file: String,
    pub application_cycle: String,
    pub submit_time: DateTime<Utc>,
}

/// Owner field that application listings filter on.
pub const APPLICATION_OWNER_FIELD: &str = "creatorId";

/// Application document as written to the `applications` collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDocument {
    pub fields: Map<String, Value>,
    pub details: ApplicationDetails,
}

impl ApplicationDocument {
    pub fn id(&self) -> &ApplicationId {
        &self.details.application_id
    }

    /// Flattens the document; generated details win over submitted keys of the same name.
    pub fn into_fields(self) -> Map<String, Value> {
        let mut merged = self.fields;
        if let Ok(Value::Object(details)) = serde_json::to_value(&self.details) {
            merged.extend(details);
        }
        merged
    }
}

/// A document read back from a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}
