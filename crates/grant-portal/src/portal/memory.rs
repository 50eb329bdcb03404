//! In-process adapters for the platform ports, used by local runs, seeding, and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::domain::{Caller, CustomClaims, Role, StoredDocument, UserAccount, UserId};
use super::platform::{
    BlobMetadata, BlobStore, Clock, DocumentStore, IdentityDirectory, PlatformError,
    TokenVerifier, UserPage,
};

#[derive(Default)]
struct IdentityState {
    accounts: BTreeMap<UserId, UserAccount>,
    passwords: HashMap<UserId, String>,
    tokens: HashMap<String, UserId>,
    sequence: u64,
    pages_served: usize,
}

impl IdentityState {
    fn next_uid(&mut self) -> UserId {
        self.sequence += 1;
        UserId(format!("uid-{:06}", self.sequence))
    }

    fn find_by_email(&self, email: &str) -> Option<&UserAccount> {
        self.accounts
            .values()
            .find(|account| account.email.eq_ignore_ascii_case(email))
    }
}

/// Account directory and token issuer. Tokens resolve against the live claims.
#[derive(Default, Clone)]
pub struct MemoryIdentity {
    state: Arc<Mutex<IdentityState>>,
}

impl MemoryIdentity {
    /// Registers an account directly, bypassing the password flow.
    pub fn insert_account(&self, email: &str, role: Option<Role>) -> UserAccount {
        let mut state = self.state.lock().expect("identity mutex poisoned");
        let account = UserAccount {
            uid: state.next_uid(),
            email: email.to_string(),
            custom_claims: CustomClaims { role },
        };
        state.accounts.insert(account.uid.clone(), account.clone());
        account
    }

    pub fn issue_token(&self, uid: &UserId) -> String {
        let mut state = self.state.lock().expect("identity mutex poisoned");
        state.sequence += 1;
        let token = format!("token-{}-{}", uid.0, state.sequence);
        state.tokens.insert(token.clone(), uid.clone());
        token
    }

    pub fn account(&self, uid: &UserId) -> Option<UserAccount> {
        let state = self.state.lock().expect("identity mutex poisoned");
        state.accounts.get(uid).cloned()
    }

    pub fn pages_served(&self) -> usize {
        self.state.lock().expect("identity mutex poisoned").pages_served
    }
}

#[async_trait]
impl IdentityDirectory for MemoryIdentity {
    async fn get_user_by_email(&self, email: &str) -> Result<UserAccount, PlatformError> {
        let state = self.state.lock().expect("identity mutex poisoned");
        state
            .find_by_email(email)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("user {email}")))
    }

    async fn set_custom_claims(
        &self,
        uid: &UserId,
        claims: CustomClaims,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().expect("identity mutex poisoned");
        let account = state
            .accounts
            .get_mut(uid)
            .ok_or_else(|| PlatformError::NotFound(format!("user {uid}")))?;
        account.custom_claims = claims;
        Ok(())
    }

    async fn list_users(
        &self,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<UserPage, PlatformError> {
        let mut state = self.state.lock().expect("identity mutex poisoned");
        state.pages_served += 1;

        let after = page_token.map(UserId);
        let mut remaining = state
            .accounts
            .values()
            .filter(|account| after.as_ref().map_or(true, |after| account.uid > *after));

        let users: Vec<UserAccount> = remaining
            .by_ref()
            .take(page_size.max(1) as usize)
            .cloned()
            .collect();
        let more = remaining.next().is_some();
        let next_page_token = match users.last() {
            Some(last) if more => Some(last.uid.0.clone()),
            _ => None,
        };

        Ok(UserPage {
            users,
            next_page_token,
        })
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<UserAccount, PlatformError> {
        let mut state = self.state.lock().expect("identity mutex poisoned");
        if state.find_by_email(email).is_some() {
            return Err(PlatformError::AlreadyExists(format!("user {email}")));
        }

        let account = UserAccount {
            uid: state.next_uid(),
            email: email.to_string(),
            custom_claims: CustomClaims::default(),
        };
        state
            .passwords
            .insert(account.uid.clone(), password.to_string());
        state.accounts.insert(account.uid.clone(), account.clone());
        Ok(account)
    }
}

#[async_trait]
impl TokenVerifier for MemoryIdentity {
    async fn verify_id_token(&self, token: &str) -> Result<Caller, PlatformError> {
        let state = self.state.lock().expect("identity mutex poisoned");
        let account = state
            .tokens
            .get(token)
            .and_then(|uid| state.accounts.get(uid))
            .ok_or_else(|| PlatformError::InvalidToken("unknown token".to_string()))?;

        Ok(Caller {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
            role: account.custom_claims.role,
        })
    }
}

/// Collections of JSON documents keyed by id, ordered for deterministic queries.
#[derive(Default, Clone)]
pub struct MemoryDocuments {
    collections: Arc<Mutex<BTreeMap<String, BTreeMap<String, Value>>>>,
}

impl MemoryDocuments {
    pub fn insert(&self, collection: &str, id: &str, document: Value) {
        let mut guard = self.collections.lock().expect("document mutex poisoned");
        guard
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
    }

    pub fn documents(&self, collection: &str) -> Vec<StoredDocument> {
        let guard = self.collections.lock().expect("document mutex poisoned");
        guard
            .get(collection)
            .into_iter()
            .flat_map(|documents| documents.iter())
            .filter_map(|(id, document)| to_stored(id, document))
            .collect()
    }

    pub fn count(&self, collection: &str) -> usize {
        let guard = self.collections.lock().expect("document mutex poisoned");
        guard.get(collection).map_or(0, BTreeMap::len)
    }
}

fn to_stored(id: &str, document: &Value) -> Option<StoredDocument> {
    match document {
        Value::Object(data) => Some(StoredDocument {
            id: id.to_string(),
            data: data.clone(),
        }),
        _ => None,
    }
}

#[async_trait]
impl DocumentStore for MemoryDocuments {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, PlatformError> {
        let guard = self.collections.lock().expect("document mutex poisoned");
        Ok(guard
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<(), PlatformError> {
        self.insert(collection, id, document);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), PlatformError> {
        let mut guard = self.collections.lock().expect("document mutex poisoned");
        let document = guard
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| PlatformError::NotFound(format!("{collection}/{id}")))?;

        match document {
            Value::Object(existing) => {
                existing.extend(fields);
                Ok(())
            }
            _ => Err(PlatformError::Malformed(format!(
                "{collection}/{id} is not an object"
            ))),
        }
    }

    async fn find_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, PlatformError> {
        let guard = self.collections.lock().expect("document mutex poisoned");
        Ok(guard
            .get(collection)
            .into_iter()
            .flat_map(|documents| documents.iter())
            .filter_map(|(id, document)| to_stored(id, document))
            .filter(|stored| stored.data.get(field) == Some(value))
            .collect())
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, PlatformError> {
        Ok(self.documents(collection))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), PlatformError> {
        let mut guard = self.collections.lock().expect("document mutex poisoned");
        if let Some(documents) = guard.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub metadata: BlobMetadata,
}

#[derive(Clone)]
pub struct MemoryBlobs {
    base_url: String,
    objects: Arc<Mutex<BTreeMap<String, StoredBlob>>>,
}

impl Default for MemoryBlobs {
    fn default() -> Self {
        Self::with_base_url("memory://blobs")
    }
}

impl MemoryBlobs {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Arc::default(),
        }
    }

    pub fn blob(&self, path: &str) -> Option<StoredBlob> {
        let guard = self.objects.lock().expect("blob mutex poisoned");
        guard.get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let guard = self.objects.lock().expect("blob mutex poisoned");
        guard.keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        metadata: BlobMetadata,
    ) -> Result<(), PlatformError> {
        let mut guard = self.objects.lock().expect("blob mutex poisoned");
        guard.insert(path.to_string(), StoredBlob { bytes, metadata });
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, PlatformError> {
        let guard = self.objects.lock().expect("blob mutex poisoned");
        if guard.contains_key(path) {
            Ok(format!("{}/{path}", self.base_url))
        } else {
            Err(PlatformError::NotFound(format!("blob {path}")))
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, PlatformError> {
        let folder = format!("{}/", prefix.trim_end_matches('/'));
        let guard = self.objects.lock().expect("blob mutex poisoned");
        Ok(guard
            .keys()
            .filter(|path| {
                path.strip_prefix(&folder)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }
}

/// Clock pinned to a settable instant.
#[derive(Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock mutex poisoned") = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}
