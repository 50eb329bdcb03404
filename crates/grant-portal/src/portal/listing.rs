use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use super::domain::{collections, Role, StoredDocument, UserId, APPLICATION_OWNER_FIELD};
use super::platform::{DocumentStore, IdentityDirectory, PlatformError};

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("failed to list reviewers: {0}")]
    Reviewers(PlatformError),
    #[error("failed to fetch applications: {0}")]
    Applications(PlatformError),
}

/// Read-only views over accounts and submitted applications.
pub struct ListingService {
    identity: Arc<dyn IdentityDirectory>,
    documents: Arc<dyn DocumentStore>,
    page_size: u32,
}

impl ListingService {
    pub fn new(
        identity: Arc<dyn IdentityDirectory>,
        documents: Arc<dyn DocumentStore>,
        page_size: u32,
    ) -> Self {
        Self {
            identity,
            documents,
            page_size: page_size.max(1),
        }
    }

    /// Walks every page of the account list, one request at a time.
    pub async fn reviewers(&self) -> Result<Vec<UserId>, ListingError> {
        let mut reviewers = Vec::new();
        let mut page_token = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .identity
                .list_users(self.page_size, page_token.take())
                .await
                .map_err(ListingError::Reviewers)
                .inspect_err(|err| error!(error = %err, pages, "account listing failed"))?;
            pages += 1;

            reviewers.extend(
                page.users
                    .into_iter()
                    .filter(|user| user.custom_claims.role == Some(Role::Reviewer))
                    .map(|user| user.uid),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(pages, count = reviewers.len(), "reviewer listing complete");
        Ok(reviewers)
    }

    pub async fn applications_for(
        &self,
        owner: &UserId,
    ) -> Result<Vec<StoredDocument>, ListingError> {
        self.documents
            .find_equal(
                collections::APPLICATIONS,
                APPLICATION_OWNER_FIELD,
                &Value::String(owner.0.clone()),
            )
            .await
            .map_err(ListingError::Applications)
            .inspect_err(|err| error!(owner = %owner, error = %err, "application listing failed"))
    }
}
