use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::cycle::fetch_current_cycle;
use super::domain::{
    collections, ApplicationDetails, ApplicationDocument, ApplicationId, Caller, CycleStage,
    Decision, GrantType, Role, UnknownTag,
};
use super::fault::FaultKind;
use super::platform::{BlobMetadata, PlatformError, PortalPlatform};
use super::validation::{validate_application, ValidationError};
use crate::config::PortalConfig;

/// Raw callable payload. Every field is optional so absence is reported as a fault
/// rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub application: Option<Value>,
    pub grant_type: Option<String>,
    pub file_data: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub success: bool,
    pub application_id: ApplicationId,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("The function must be called while authenticated.")]
    Unauthenticated,
    #[error("Only applicants can submit applications.")]
    NotApplicant,
    #[error("Missing required field `{0}`.")]
    MissingField(&'static str),
    #[error("`application` must be an object.")]
    MalformedApplication,
    #[error("Invalid grant type `{0}`.")]
    UnknownGrantType(String),
    #[error("File type not supported (only application/pdf is accepted).")]
    UnsupportedFileType,
    #[error("File data is not valid base64.")]
    UndecodableFile,
    #[error("PDF file size ({size} bytes) exceeds the {limit} byte limit.")]
    FileTooLarge { size: usize, limit: usize },
    #[error("No current application cycle found.")]
    NoCurrentCycle,
    #[error("Applications are not being accepted (cycle stage: {}).", .0.label())]
    CycleClosed(CycleStage),
    #[error("The {grant_type} application deadline ({deadline}) has passed.")]
    DeadlinePassed {
        grant_type: GrantType,
        deadline: DateTime<Utc>,
    },
    #[error(transparent)]
    InvalidApplication(#[from] ValidationError),
    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
}

impl SubmissionError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Unauthenticated => FaultKind::Unauthenticated,
            Self::NotApplicant => FaultKind::PermissionDenied,
            Self::MissingField(_)
            | Self::MalformedApplication
            | Self::UnknownGrantType(_)
            | Self::UnsupportedFileType
            | Self::UndecodableFile
            | Self::FileTooLarge { .. }
            | Self::InvalidApplication(_) => FaultKind::InvalidArgument,
            Self::NoCurrentCycle | Self::CycleClosed(_) | Self::DeadlinePassed { .. } => {
                FaultKind::FailedPrecondition
            }
            Self::Platform(_) => FaultKind::Internal,
        }
    }

    /// Message safe to return to the caller; platform detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Platform(_) => {
                "An internal error occurred while submitting the application.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Guard pipeline that turns a callable payload into a stored application.
pub struct SubmissionService {
    platform: PortalPlatform,
    config: PortalConfig,
}

impl SubmissionService {
    pub fn new(platform: PortalPlatform, config: PortalConfig) -> Self {
        Self { platform, config }
    }

    pub async fn submit(
        &self,
        caller: Option<&Caller>,
        request: SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let outcome = self.run(caller, request).await;
        if let Err(err) = &outcome {
            let uid = caller.map(|caller| caller.uid.0.as_str()).unwrap_or("-");
            match err.kind() {
                FaultKind::Internal => error!(%uid, error = %err, "application submission failed"),
                kind => warn!(%uid, ?kind, reason = %err, "application submission rejected"),
            }
        }
        outcome
    }

    async fn run(
        &self,
        caller: Option<&Caller>,
        request: SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let caller = caller.ok_or(SubmissionError::Unauthenticated)?;
        if caller.role != Some(Role::Applicant) {
            return Err(SubmissionError::NotApplicant);
        }

        let SubmissionRequest {
            application,
            grant_type,
            file_data,
            file_name,
            file_type,
        } = request;

        let application = application
            .filter(|value| !value.is_null())
            .ok_or(SubmissionError::MissingField("application"))?;
        let grant_type = grant_type
            .filter(|tag| !tag.is_empty())
            .ok_or(SubmissionError::MissingField("grantType"))?;
        let file_data = file_data
            .filter(|data| !data.is_empty())
            .ok_or(SubmissionError::MissingField("fileData"))?;
        let file_name = file_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or(SubmissionError::MissingField("fileName"))?;
        let Value::Object(fields) = application else {
            return Err(SubmissionError::MalformedApplication);
        };

        let grant_type: GrantType = grant_type
            .parse()
            .map_err(|UnknownTag(tag)| SubmissionError::UnknownGrantType(tag))?;

        if file_type.as_deref() != Some(mime::APPLICATION_PDF.essence_str()) {
            return Err(SubmissionError::UnsupportedFileType);
        }
        let bytes = decode_file_data(&file_data)?;
        if bytes.len() > self.config.max_upload_bytes {
            return Err(SubmissionError::FileTooLarge {
                size: bytes.len(),
                limit: self.config.max_upload_bytes,
            });
        }

        let current = fetch_current_cycle(self.platform.documents.as_ref())
            .await?
            .ok_or(SubmissionError::NoCurrentCycle)?;
        let cycle = current.cycle;
        if !cycle.stage.accepts_submissions() {
            return Err(SubmissionError::CycleClosed(cycle.stage));
        }

        let deadline = cycle.deadline_for(grant_type);
        if self.platform.clock.now() > deadline {
            return Err(SubmissionError::DeadlinePassed {
                grant_type,
                deadline,
            });
        }

        validate_application(grant_type, &fields)?;

        let application_id = ApplicationId::generate();
        let stored_name = format!("{application_id}.pdf");
        let blob_path = format!("{}/{stored_name}", self.config.upload_prefix);

        let mut custom = BTreeMap::new();
        custom.insert("uploadedBy".to_string(), caller.uid.0.clone());
        custom.insert("originalName".to_string(), file_name);
        custom.insert("applicationId".to_string(), application_id.0.clone());
        let metadata = BlobMetadata {
            content_type: mime::APPLICATION_PDF.essence_str().to_string(),
            custom,
        };

        let size = bytes.len();
        self.platform
            .blobs
            .upload(&blob_path, bytes, metadata)
            .await?;

        let document = ApplicationDocument {
            fields,
            details: ApplicationDetails {
                application_id: application_id.clone(),
                decision: Decision::Pending,
                creator_id: caller.uid.clone(),
                grant_type,
                file: stored_name,
                application_cycle: cycle.name,
                submit_time: self.platform.clock.now(),
            },
        };

        if let Err(err) = self
            .platform
            .documents
            .set(
                collections::APPLICATIONS,
                &application_id.0,
                Value::Object(document.into_fields()),
            )
            .await
        {
            // No compensating delete: the uploaded blob stays orphaned.
            warn!(
                blob = %blob_path,
                application = %application_id,
                "application write failed after upload"
            );
            return Err(err.into());
        }

        info!(
            application = %application_id,
            uid = %caller.uid,
            %grant_type,
            bytes = size,
            "application submitted"
        );

        Ok(SubmissionReceipt {
            success: true,
            application_id,
            message: "Application submitted successfully.".to_string(),
        })
    }
}

/// Accepts bare base64 or a `data:` URL.
fn decode_file_data(raw: &str) -> Result<Vec<u8>, SubmissionError> {
    let encoded = match raw.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, payload)| payload)
            .ok_or(SubmissionError::UndecodableFile)?,
        None => raw,
    };

    STANDARD
        .decode(encoded.trim())
        .map_err(|_| SubmissionError::UndecodableFile)
}
