use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::config::PortalConfig;
use crate::portal::domain::{
    collections, Caller, CustomClaims, CycleStage, GrantType, Role, StoredDocument, UserAccount,
    UserId,
};
use crate::portal::memory::{FixedClock, MemoryBlobs, MemoryDocuments, MemoryIdentity};
use crate::portal::platform::{
    DocumentStore, IdentityDirectory, PlatformError, PortalPlatform, UserPage,
};
use crate::portal::submission::SubmissionRequest;

pub(super) const CYCLE_ID: &str = "cycle-2025";

pub(super) fn deadline() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 0)
        .single()
        .expect("valid deadline")
}

pub(super) fn cycle_document(stage: CycleStage) -> Value {
    let stage = serde_json::to_value(stage).expect("stage serializes");
    json!({
        "current": true,
        "name": "2025 Cycle",
        "stage": stage,
        "startDate": deadline() - Duration::days(60),
        "endDate": deadline() + Duration::days(90),
        "researchDeadline": deadline(),
        "nextGenDeadline": deadline(),
        "nonResearchDeadline": deadline(),
        "reviewerDeadline": deadline() + Duration::days(30),
    })
}

/// In-memory platform with an open cycle and a clock one day before every deadline.
pub(super) struct Harness {
    pub(super) identity: MemoryIdentity,
    pub(super) documents: MemoryDocuments,
    pub(super) blobs: MemoryBlobs,
    pub(super) clock: FixedClock,
}

impl Harness {
    pub(super) fn new() -> Self {
        let harness = Self::without_cycle();
        harness.documents.insert(
            collections::APPLICATION_CYCLES,
            CYCLE_ID,
            cycle_document(CycleStage::ApplicationsOpen),
        );
        harness
    }

    pub(super) fn without_cycle() -> Self {
        Self {
            identity: MemoryIdentity::default(),
            documents: MemoryDocuments::default(),
            blobs: MemoryBlobs::default(),
            clock: FixedClock::at(deadline() - Duration::days(1)),
        }
    }

    pub(super) fn platform(&self) -> PortalPlatform {
        self.platform_with_documents(Arc::new(self.documents.clone()))
    }

    pub(super) fn platform_with_documents(
        &self,
        documents: Arc<dyn DocumentStore>,
    ) -> PortalPlatform {
        PortalPlatform {
            identity: Arc::new(self.identity.clone()),
            tokens: Arc::new(self.identity.clone()),
            documents,
            blobs: Arc::new(self.blobs.clone()),
            clock: Arc::new(self.clock.clone()),
        }
    }

    pub(super) fn account(&self, email: &str, role: Option<Role>) -> UserAccount {
        self.identity.insert_account(email, role)
    }

    pub(super) fn caller(&self, email: &str, role: Option<Role>) -> Caller {
        let account = self.account(email, role);
        Caller {
            uid: account.uid,
            email: Some(account.email),
            role,
        }
    }

    pub(super) fn applicant(&self) -> Caller {
        self.caller("pi@university.edu", Some(Role::Applicant))
    }

    /// Registers an account with `role` and returns a bearer token for it.
    pub(super) fn bearer(&self, email: &str, role: Option<Role>) -> (UserAccount, String) {
        let account = self.account(email, role);
        let token = self.identity.issue_token(&account.uid);
        (account, token)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn investigator_block() -> Map<String, Value> {
    object(json!({
        "title": "Targeting pediatric gliomas",
        "principalInvestigator": "Dr. Rivera",
        "institution": "Midwest University",
        "department": "Oncology",
        "departmentHead": "Dr. Chen",
        "institutionAddress": "1 College Ave",
        "institutionCityStateZip": "Chicago, IL 60601",
        "institutionPhoneNumber": "312-555-0100",
        "institutionEmail": "grants@midwest.edu",
        "typesOfCancerAddressed": "Glioma",
        "adminOfficialName": "Pat Lee",
        "adminOfficialAddress": "2 College Ave",
        "adminOfficialCityStateZip": "Chicago, IL 60601",
        "adminPhoneNumber": "312-555-0101",
        "adminEmail": "sponsored@midwest.edu",
        "amountRequested": "$50,000",
        "dates": "2025-07-01 to 2026-06-30",
        "einNumber": "12-3456789",
        "signaturePI": "Dr. Rivera",
        "signatureDeptHead": "Dr. Chen",
        "attestationHumanSubjects": true,
        "attestationCertification": true,
    }))
}

pub(super) fn application_fields(grant_type: GrantType) -> Map<String, Value> {
    match grant_type {
        GrantType::Research => {
            let mut fields = investigator_block();
            for question in ["includedPublishedPaper", "creditAgreement", "includedFundingInfo"] {
                fields.insert(question.to_string(), json!("yes"));
            }
            fields.insert("patentApplied".to_string(), json!("no"));
            fields.insert("continuation".to_string(), json!("no"));
            fields
        }
        GrantType::NextGen => investigator_block(),
        GrantType::NonResearch => object(json!({
            "title": "Family lodging fund",
            "requestor": "Jordan Smith",
            "institution": "Children's Hospital",
            "institutionPhoneNumber": "312-555-0200",
            "institutionEmail": "giving@childrens.org",
            "timeframe": "12 months",
            "amountRequested": 15000,
        })),
    }
}

pub(super) fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(len, b'0');
    bytes.truncate(len);
    bytes
}

pub(super) fn request_with_bytes(grant_type: GrantType, bytes: &[u8]) -> SubmissionRequest {
    SubmissionRequest {
        application: Some(Value::Object(application_fields(grant_type))),
        grant_type: Some(grant_type.as_str().to_string()),
        file_data: Some(STANDARD.encode(bytes)),
        file_name: Some("proposal.pdf".to_string()),
        file_type: Some("application/pdf".to_string()),
    }
}

pub(super) fn request(grant_type: GrantType) -> SubmissionRequest {
    request_with_bytes(grant_type, &pdf_bytes(256))
}

pub(super) fn submission_body(grant_type: GrantType) -> Value {
    let request = request(grant_type);
    json!({
        "application": request.application,
        "grantType": request.grant_type,
        "fileData": request.file_data,
        "fileName": request.file_name,
        "fileType": request.file_type,
    })
}

pub(super) fn small_upload_config() -> PortalConfig {
    PortalConfig {
        max_upload_bytes: 1024,
        ..PortalConfig::default()
    }
}

/// Document store whose writes always fail; reads delegate to the wrapped store.
pub(super) struct ReadOnlyDocuments(pub(super) MemoryDocuments);

#[async_trait]
impl DocumentStore for ReadOnlyDocuments {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, PlatformError> {
        self.0.get(collection, id).await
    }

    async fn set(
        &self,
        _collection: &str,
        _id: &str,
        _document: Value,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("document store read only".to_string()))
    }

    async fn update(
        &self,
        _collection: &str,
        _id: &str,
        _fields: Map<String, Value>,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("document store read only".to_string()))
    }

    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, PlatformError> {
        self.0.find_equal(collection, field, value).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, PlatformError> {
        self.0.list(collection).await
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("document store read only".to_string()))
    }
}

pub(super) struct UnavailableDocuments;

#[async_trait]
impl DocumentStore for UnavailableDocuments {
    async fn get(&self, _collection: &str, _id: &str) -> Result<Option<Value>, PlatformError> {
        Err(PlatformError::Unavailable("database offline".to_string()))
    }

    async fn set(
        &self,
        _collection: &str,
        _id: &str,
        _document: Value,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("database offline".to_string()))
    }

    async fn update(
        &self,
        _collection: &str,
        _id: &str,
        _fields: Map<String, Value>,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("database offline".to_string()))
    }

    async fn find_equal(
        &self,
        _collection: &str,
        _field: &str,
        _value: &Value,
    ) -> Result<Vec<StoredDocument>, PlatformError> {
        Err(PlatformError::Unavailable("database offline".to_string()))
    }

    async fn list(&self, _collection: &str) -> Result<Vec<StoredDocument>, PlatformError> {
        Err(PlatformError::Unavailable("database offline".to_string()))
    }

    async fn delete(&self, _collection: &str, _id: &str) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("database offline".to_string()))
    }
}

/// Directory that fails after serving a fixed number of pages.
pub(super) struct FlakyDirectory {
    pub(super) inner: MemoryIdentity,
    pub(super) pages_before_failure: usize,
}

#[async_trait]
impl IdentityDirectory for FlakyDirectory {
    async fn get_user_by_email(&self, email: &str) -> Result<UserAccount, PlatformError> {
        self.inner.get_user_by_email(email).await
    }

    async fn set_custom_claims(
        &self,
        _uid: &UserId,
        _claims: CustomClaims,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::Unavailable("claims service offline".to_string()))
    }

    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<UserPage, PlatformError> {
        if self.inner.pages_served() >= self.pages_before_failure {
            return Err(PlatformError::Unavailable("directory offline".to_string()));
        }
        self.inner.list_users(page_size, page_token).await
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<UserAccount, PlatformError> {
        self.inner.create_user(email, password).await
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
