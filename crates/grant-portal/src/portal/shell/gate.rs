use super::pages::{PortalPage, UNAUTHORIZED_PATH};
use super::session::SessionState;
use crate::portal::domain::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Session still resolving; render nothing yet.
    Pending,
    Allow,
    Redirect(&'static str),
}

/// Guards a page behind a single required role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGate {
    required: Role,
}

impl RoleGate {
    pub const fn new(required: Role) -> Self {
        Self { required }
    }

    /// Gate for the page, or `None` when the page is public.
    pub fn for_page(page: PortalPage) -> Option<Self> {
        page.required_role().map(Self::new)
    }

    pub fn decide(&self, session: &SessionState) -> GateDecision {
        if session.loading {
            return GateDecision::Pending;
        }
        if session.role == Some(self.required) {
            GateDecision::Allow
        } else {
            GateDecision::Redirect(UNAUTHORIZED_PATH)
        }
    }
}

/// Decision for visiting `page` with the given session.
pub fn admit(page: PortalPage, session: &SessionState) -> GateDecision {
    RoleGate::for_page(page).map_or(GateDecision::Allow, |gate| gate.decide(session))
}
