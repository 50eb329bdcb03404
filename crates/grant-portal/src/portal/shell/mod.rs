//! Front-end shell: page routing, the signed-in session, role gates, and PDF storage helpers.

pub mod gate;
pub mod pages;
pub mod session;
pub mod storage;

pub use gate::{admit, GateDecision, RoleGate};
pub use pages::{PortalPage, UNAUTHORIZED_PATH};
pub use session::{AuthSession, SessionState, SessionUser};
pub use storage::{PdfFile, PdfStorage, StorageError, StoredPdf};
