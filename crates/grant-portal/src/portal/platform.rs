//! Ports onto the managed backend: identity directory, document store, and blob store.
//!
//! Handlers receive these as explicitly constructed clients bundled in [`PortalPlatform`];
//! nothing in the crate reaches for a process-wide SDK handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::domain::{Caller, CustomClaims, StoredDocument, UserAccount, UserId};

/// One page of the account listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPage {
    pub users: Vec<UserAccount>,
    pub next_page_token: Option<String>,
}

/// Account lookups and custom-claim writes.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<UserAccount, PlatformError>;

    /// Replaces the account's custom claims wholesale.
    async fn set_custom_claims(
        &self,
        uid: &UserId,
        claims: CustomClaims,
    ) -> Result<(), PlatformError>;

    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<UserPage, PlatformError>;

    async fn create_user(&self, email: &str, password: &str) -> Result<UserAccount, PlatformError>;
}

/// Resolves a bearer ID token into the caller's identity and role claim.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_id_token(&self, token: &str) -> Result<Caller, PlatformError>;
}

/// Schemaless document collections keyed by id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, PlatformError>;

    /// Creates or fully replaces the document.
    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<(), PlatformError>;

    /// Overwrites only the supplied top-level fields of an existing document.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), PlatformError>;

    /// Equality filter on a single top-level field.
    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, PlatformError>;

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, PlatformError>;

    /// Removes the document. Deleting an absent id succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), PlatformError>;
}

/// Object metadata recorded alongside an uploaded blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobMetadata {
    pub content_type: String,
    pub custom: BTreeMap<String, String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        metadata: BlobMetadata,
    ) -> Result<(), PlatformError>;

    async fn download_url(&self, path: &str) -> Result<String, PlatformError>;

    /// Full paths of every object directly under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, PlatformError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Handles onto every managed service a handler may touch.
#[derive(Clone)]
pub struct PortalPlatform {
    pub identity: Arc<dyn IdentityDirectory>,
    pub tokens: Arc<dyn TokenVerifier>,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
}

/// Error enumeration for managed-platform failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("ID token rejected: {0}")]
    InvalidToken(String),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}
