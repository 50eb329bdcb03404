//! Grant portal handlers written against injected platform ports: role assignment,
//! account sign-up gated by the reviewer whitelist, application submission, listings, and
//! cycle administration.

pub mod accounts;
pub mod cycle;
pub mod domain;
pub(crate) mod fault;
pub mod listing;
pub mod memory;
pub mod platform;
pub mod roles;
pub mod router;
pub mod seed;
pub mod shell;
pub mod submission;
pub mod validation;
pub mod whitelist;

#[cfg(test)]
mod tests;

pub use accounts::{AccountRegistration, RegisteredAccount, Registration, RegistrationError};
pub use cycle::{fetch_current_cycle, CycleAdminError, CycleService, DeadlineUpdate};
pub use domain::{
    collections, ApplicationCycle, ApplicationDetails, ApplicationDocument, ApplicationId,
    Caller, CustomClaims, CycleStage, Decision, GrantType, Role, StoredCycle, StoredDocument,
    UnknownTag, UserAccount, UserId, APPLICATION_OWNER_FIELD,
};
pub use fault::FaultKind;
pub use listing::{ListingError, ListingService};
pub use memory::{FixedClock, MemoryBlobs, MemoryDocuments, MemoryIdentity, StoredBlob};
pub use platform::{
    BlobMetadata, BlobStore, Clock, DocumentStore, IdentityDirectory, PlatformError,
    PortalPlatform, SystemClock, TokenVerifier, UserPage,
};
pub use roles::{RoleAssignment, RoleAssignmentError, RoleAssignmentService};
pub use router::{portal_router, PortalServices};
pub use seed::{seed_test_environment, SeedError, SeedOptions, SeedReport, SeededAccount};
pub use submission::{SubmissionError, SubmissionReceipt, SubmissionRequest, SubmissionService};
pub use validation::{
    account_email_allowed, is_valid_email, validate_application, PasswordRequirements,
    ValidationError,
};
pub use whitelist::{
    affiliations, normalize_email, ReviewerWhitelist, WhitelistEntry, WhitelistError,
    WhitelistForm, WhitelistRecord, WhitelistStatus,
};
