use axum::http::StatusCode;

use crate::portal::domain::{GrantType, Role};

/// Path every role gate sends a mismatched visitor to.
pub const UNAUTHORIZED_PATH: &str = "/protected-page";

/// Pages served by the portal front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalPage {
    Login,
    CreateAccountMenu,
    CreateApplicantAccount,
    CreateReviewerAccount,
    ApplicantDashboard,
    ApplicationForm(GrantType),
    Settings(Role),
    ReviewerDashboard,
    AdminDashboard,
    Unauthorized,
    EmailAction,
    NotFound,
}

impl PortalPage {
    /// Every page with a route of its own; [`PortalPage::NotFound`] is the fallback.
    pub fn routable() -> Vec<Self> {
        let mut pages = vec![
            Self::Login,
            Self::CreateAccountMenu,
            Self::CreateApplicantAccount,
            Self::CreateReviewerAccount,
            Self::ApplicantDashboard,
        ];
        pages.extend(GrantType::ordered().map(Self::ApplicationForm));
        pages.extend([Role::Admin, Role::Applicant, Role::Reviewer].map(Self::Settings));
        pages.extend([
            Self::ReviewerDashboard,
            Self::AdminDashboard,
            Self::Unauthorized,
            Self::EmailAction,
        ]);
        pages
    }

    /// Matches a browser path, ignoring any query string, fragment, or trailing slash.
    pub fn resolve(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        Self::routable()
            .into_iter()
            .find(|page| page.path() == path)
            .unwrap_or(Self::NotFound)
    }

    pub fn path(self) -> String {
        match self {
            Self::Login => "/Login".to_string(),
            Self::CreateAccountMenu => "/create-account-menu".to_string(),
            Self::CreateApplicantAccount => "/create-account-applicants".to_string(),
            Self::CreateReviewerAccount => "/create-account-reviewers".to_string(),
            Self::ApplicantDashboard => "/applicant/dashboard".to_string(),
            Self::ApplicationForm(grant_type) => {
                format!("/applicant/application-form/{grant_type}")
            }
            Self::Settings(role) => format!("/{role}/settings"),
            Self::ReviewerDashboard => "/reviewer/dashboard".to_string(),
            Self::AdminDashboard => "/admin/dashboard".to_string(),
            Self::Unauthorized => UNAUTHORIZED_PATH.to_string(),
            Self::EmailAction => "/email-action".to_string(),
            Self::NotFound => "*".to_string(),
        }
    }

    /// Role a visitor must hold to see the page, if any.
    pub const fn required_role(self) -> Option<Role> {
        match self {
            Self::ApplicantDashboard | Self::ApplicationForm(_) => Some(Role::Applicant),
            Self::Settings(role) => Some(role),
            Self::ReviewerDashboard => Some(Role::Reviewer),
            Self::AdminDashboard => Some(Role::Admin),
            Self::Login
            | Self::CreateAccountMenu
            | Self::CreateApplicantAccount
            | Self::CreateReviewerAccount
            | Self::Unauthorized
            | Self::EmailAction
            | Self::NotFound => None,
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::OK,
        }
    }

    /// Landing page after sign-in for an account holding `role`.
    pub const fn dashboard_for(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminDashboard,
            Role::Reviewer => Self::ReviewerDashboard,
            Role::Applicant => Self::ApplicantDashboard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_routable_page_resolves_to_itself() {
        for page in PortalPage::routable() {
            assert_eq!(PortalPage::resolve(&page.path()), page, "{}", page.path());
        }
    }

    #[test]
    fn unknown_paths_fall_back_to_not_found() {
        assert_eq!(PortalPage::resolve("/"), PortalPage::NotFound);
        assert_eq!(PortalPage::resolve("/login"), PortalPage::NotFound);
        assert_eq!(
            PortalPage::resolve("/applicant/application-form/other"),
            PortalPage::NotFound
        );
        assert_eq!(PortalPage::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn query_strings_and_trailing_slashes_are_ignored() {
        assert_eq!(
            PortalPage::resolve("/email-action?mode=verifyEmail&oobCode=abc"),
            PortalPage::EmailAction
        );
        assert_eq!(
            PortalPage::resolve("/applicant/application-form/nextgen/"),
            PortalPage::ApplicationForm(GrantType::NextGen)
        );
    }

    #[test]
    fn protected_pages_name_their_role() {
        assert_eq!(PortalPage::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            PortalPage::resolve("/reviewer/settings").required_role(),
            Some(Role::Reviewer)
        );
        assert_eq!(PortalPage::Login.required_role(), None);
        assert_eq!(
            PortalPage::dashboard_for(Role::Admin).path(),
            "/admin/dashboard"
        );
    }
}
