use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::domain::{collections, ApplicationCycle, Caller, Role, StoredCycle, StoredDocument};
use super::fault::FaultKind;
use super::platform::{DocumentStore, PlatformError};

/// Reads the cycle flagged `current`. When several are flagged, the first by id wins.
pub async fn fetch_current_cycle(
    documents: &dyn DocumentStore,
) -> Result<Option<StoredCycle>, PlatformError> {
    let matches = documents
        .find_equal(collections::APPLICATION_CYCLES, "current", &Value::Bool(true))
        .await?;

    if matches.len() > 1 {
        warn!(
            count = matches.len(),
            "multiple application cycles flagged current"
        );
    }

    let Some(StoredDocument { id, data }) = matches.into_iter().next() else {
        return Ok(None);
    };

    let cycle: ApplicationCycle = serde_json::from_value(Value::Object(data)).map_err(|err| {
        PlatformError::Malformed(format!("{}/{id}: {err}", collections::APPLICATION_CYCLES))
    })?;

    Ok(Some(StoredCycle { id, cycle }))
}

/// Deadline dates picked by an administrator; each lands at 23:59 UTC of that day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineUpdate {
    #[serde(default)]
    pub research_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_gen_date: Option<NaiveDate>,
    #[serde(default)]
    pub non_research_date: Option<NaiveDate>,
    #[serde(default)]
    pub reviewer_date: Option<NaiveDate>,
}

impl DeadlineUpdate {
    fn is_empty(&self) -> bool {
        self.research_date.is_none()
            && self.next_gen_date.is_none()
            && self.non_research_date.is_none()
            && self.reviewer_date.is_none()
    }

    fn into_fields(self) -> Result<Map<String, Value>, CycleAdminError> {
        let mut fields = Map::new();
        for (field, date) in [
            ("researchDeadline", self.research_date),
            ("nextGenDeadline", self.next_gen_date),
            ("nonResearchDeadline", self.non_research_date),
            ("reviewerDeadline", self.reviewer_date),
        ] {
            if let Some(date) = date {
                let deadline = end_of_day(date)?;
                fields.insert(field.to_string(), Value::String(deadline.to_rfc3339()));
            }
        }
        Ok(fields)
    }
}

fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>, CycleAdminError> {
    date.and_hms_opt(23, 59, 0)
        .map(|moment| moment.and_utc())
        .ok_or(CycleAdminError::InvalidDeadline(date))
}

#[derive(Debug, thiserror::Error)]
pub enum CycleAdminError {
    #[error("The function must be called while authenticated.")]
    Unauthenticated,
    #[error("Only administrators can change cycle deadlines.")]
    NotAdmin,
    #[error("No deadlines were supplied.")]
    EmptyUpdate,
    #[error("Deadline {0} cannot be represented.")]
    InvalidDeadline(NaiveDate),
    #[error("No current application cycle found.")]
    NoCurrentCycle,
    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
}

impl CycleAdminError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Unauthenticated => FaultKind::Unauthenticated,
            Self::NotAdmin => FaultKind::PermissionDenied,
            Self::EmptyUpdate | Self::InvalidDeadline(_) => FaultKind::InvalidArgument,
            Self::NoCurrentCycle => FaultKind::FailedPrecondition,
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

pub struct CycleService {
    documents: Arc<dyn DocumentStore>,
}

impl CycleService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn current(&self) -> Result<StoredCycle, CycleAdminError> {
        fetch_current_cycle(self.documents.as_ref())
            .await?
            .ok_or(CycleAdminError::NoCurrentCycle)
    }

    /// Writes the supplied deadlines onto the current cycle and returns the stored result.
    pub async fn update_deadlines(
        &self,
        caller: Option<&Caller>,
        update: DeadlineUpdate,
    ) -> Result<StoredCycle, CycleAdminError> {
        let caller = caller.ok_or(CycleAdminError::Unauthenticated)?;
        if caller.role != Some(Role::Admin) {
            return Err(CycleAdminError::NotAdmin);
        }
        if update.is_empty() {
            return Err(CycleAdminError::EmptyUpdate);
        }

        let current = self.current().await?;
        let fields = update.into_fields()?;
        let changed: Vec<String> = fields.keys().cloned().collect();

        self.documents
            .update(collections::APPLICATION_CYCLES, &current.id, fields)
            .await?;
        info!(cycle = %current.id, admin = %caller.uid, ?changed, "cycle deadlines updated");

        self.current().await
    }
}
