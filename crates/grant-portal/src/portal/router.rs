use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::accounts::{AccountRegistration, Registration};
use super::cycle::{CycleAdminError, CycleService, DeadlineUpdate};
use super::domain::{Caller, Role, UserId};
use super::fault::{fault_response, FaultKind};
use super::listing::ListingService;
use super::platform::{PortalPlatform, TokenVerifier};
use super::roles::{RoleAssignmentError, RoleAssignmentService};
use super::submission::{SubmissionRequest, SubmissionService};
use super::whitelist::{
    affiliations, ReviewerWhitelist, WhitelistError, WhitelistForm, WhitelistStatus,
};
use crate::config::PortalConfig;

/// Room for the JSON envelope and form fields around the encoded PDF.
const ENVELOPE_ALLOWANCE: usize = 1024 * 1024;

/// Services behind the portal endpoints, shared across handlers.
#[derive(Clone)]
pub struct PortalServices {
    tokens: Arc<dyn TokenVerifier>,
    roles: Arc<RoleAssignmentService>,
    submissions: Arc<SubmissionService>,
    listings: Arc<ListingService>,
    cycles: Arc<CycleService>,
    whitelist: Arc<ReviewerWhitelist>,
    accounts: Arc<AccountRegistration>,
    body_limit: usize,
}

impl PortalServices {
    pub fn new(platform: PortalPlatform, config: PortalConfig) -> Self {
        let body_limit = config.max_upload_bytes.div_ceil(3) * 4 + ENVELOPE_ALLOWANCE;
        let whitelist = Arc::new(ReviewerWhitelist::new(
            Arc::clone(&platform.documents),
            Arc::clone(&platform.clock),
        ));
        Self {
            tokens: Arc::clone(&platform.tokens),
            roles: Arc::new(RoleAssignmentService::new(Arc::clone(&platform.identity))),
            listings: Arc::new(ListingService::new(
                Arc::clone(&platform.identity),
                Arc::clone(&platform.documents),
                config.reviewer_page_size,
            )),
            cycles: Arc::new(CycleService::new(Arc::clone(&platform.documents))),
            accounts: Arc::new(AccountRegistration::new(
                Arc::clone(&platform.identity),
                Arc::clone(&platform.documents),
                Arc::clone(&whitelist),
            )),
            whitelist,
            submissions: Arc::new(SubmissionService::new(platform, config)),
            body_limit,
        }
    }

    /// Largest request body accepted, sized for a base64-encoded upload at the byte limit.
    pub fn body_limit(&self) -> usize {
        self.body_limit
    }
}

/// Router builder exposing the portal's callable and HTTP endpoints.
pub fn portal_router(services: PortalServices) -> Router {
    let body_limit = services.body_limit;
    Router::new()
        .route("/addReviewerRole", post(add_reviewer_role_handler))
        .route("/addApplicantRole", post(add_applicant_role_handler))
        .route("/addAdminRole", post(add_admin_role_handler))
        .route("/submitApplication", post(submit_application_handler))
        .route(
            "/getAllReviewers",
            get(all_reviewers_handler).post(all_reviewers_handler),
        )
        .route("/getUserApplications", any(user_applications_handler))
        .route("/api/v1/cycle/current", get(current_cycle_handler))
        .route(
            "/api/v1/admin/cycle/deadlines",
            post(update_deadlines_handler),
        )
        .route(
            "/api/v1/accounts/applicants",
            post(register_applicant_handler),
        )
        .route("/api/v1/accounts/reviewers", post(register_reviewer_handler))
        .route(
            "/api/v1/admin/whitelist",
            get(list_whitelist_handler).post(add_whitelist_handler),
        )
        .route(
            "/api/v1/admin/whitelist/:id",
            patch(whitelist_status_handler).delete(remove_whitelist_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(services)
}

#[derive(Debug, Default, Deserialize)]
struct RoleRequest {
    #[serde(default)]
    email: Option<String>,
}

async fn add_reviewer_role_handler(
    State(services): State<PortalServices>,
    body: Bytes,
) -> Response {
    assign_role(&services, body, Role::Reviewer).await
}

async fn add_applicant_role_handler(
    State(services): State<PortalServices>,
    body: Bytes,
) -> Response {
    assign_role(&services, body, Role::Applicant).await
}

async fn add_admin_role_handler(State(services): State<PortalServices>, body: Bytes) -> Response {
    assign_role(&services, body, Role::Admin).await
}

async fn assign_role(services: &PortalServices, body: Bytes, role: Role) -> Response {
    let request: RoleRequest = serde_json::from_slice(&body).unwrap_or_default();
    let email = request.email.unwrap_or_default();

    match services.roles.assign(&email, role).await {
        Ok(assignment) => (StatusCode::OK, Json(assignment)).into_response(),
        Err(err) => {
            let status = match err {
                RoleAssignmentError::MissingEmail => StatusCode::BAD_REQUEST,
                RoleAssignmentError::UserNotFound(_) => StatusCode::NOT_FOUND,
                RoleAssignmentError::Platform(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(err.error_value())).into_response()
        }
    }
}

async fn resolve_caller(tokens: &dyn TokenVerifier, headers: &HeaderMap) -> Option<Caller> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }

    match tokens.verify_id_token(token).await {
        Ok(caller) => Some(caller),
        Err(err) => {
            debug!(error = %err, "bearer token rejected");
            None
        }
    }
}

fn parse_json_body<T>(body: &Bytes) -> Result<T, Response>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        fault_response(
            FaultKind::InvalidArgument,
            &format!("Request body is not valid JSON: {err}"),
        )
    })
}

async fn submit_application_handler(
    State(services): State<PortalServices>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller = resolve_caller(services.tokens.as_ref(), &headers).await;
    let request: SubmissionRequest = match parse_json_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match services.submissions.submit(caller.as_ref(), request).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => fault_response(err.kind(), &err.public_message()),
    }
}

async fn all_reviewers_handler(State(services): State<PortalServices>) -> Response {
    match services.listings.reviewers().await {
        Ok(reviewers) => (StatusCode::OK, Json(json!({ "reviewers": reviewers }))).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error retrieving reviewers",
        )
            .into_response(),
    }
}

async fn user_applications_handler(
    State(services): State<PortalServices>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response();
    }

    let owner = query
        .get("userId")
        .cloned()
        .or_else(|| user_id_from_body(&body))
        .filter(|user_id| !user_id.is_empty());
    let Some(owner) = owner else {
        return (StatusCode::BAD_REQUEST, "Missing userId parameter").into_response();
    };

    match services.listings.applications_for(&UserId(owner)).await {
        Ok(applications) => {
            (StatusCode::OK, Json(json!({ "applications": applications }))).into_response()
        }
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
    }
}

fn cycle_fault(err: CycleAdminError) -> Response {
    if err.kind() == FaultKind::Internal {
        error!(error = %err, "cycle request failed");
    }
    fault_response(err.kind(), &err.public_message())
}

fn user_id_from_body(body: &Bytes) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("userId")?.as_str().map(str::to_string)
}

async fn current_cycle_handler(State(services): State<PortalServices>) -> Response {
    match services.cycles.current().await {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(err) => cycle_fault(err),
    }
}

async fn update_deadlines_handler(
    State(services): State<PortalServices>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller = resolve_caller(services.tokens.as_ref(), &headers).await;
    let update: DeadlineUpdate = match parse_json_body(&body) {
        Ok(update) => update,
        Err(response) => return response,
    };

    match services
        .cycles
        .update_deadlines(caller.as_ref(), update)
        .await
    {
        Ok(cycle) => (StatusCode::OK, Json(cycle)).into_response(),
        Err(err) => cycle_fault(err),
    }
}

async fn register_applicant_handler(
    State(services): State<PortalServices>,
    body: Bytes,
) -> Response {
    register(&services, body, Role::Applicant).await
}

async fn register_reviewer_handler(
    State(services): State<PortalServices>,
    body: Bytes,
) -> Response {
    register(&services, body, Role::Reviewer).await
}

async fn register(services: &PortalServices, body: Bytes, role: Role) -> Response {
    let registration: Registration = match parse_json_body(&body) {
        Ok(registration) => registration,
        Err(response) => return response,
    };

    match services.accounts.register(role, registration).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => {
            if err.kind() == FaultKind::Internal {
                error!(error = %err, %role, "account registration failed");
            }
            fault_response(err.kind(), &err.public_message())
        }
    }
}

fn whitelist_fault(err: WhitelistError) -> Response {
    if err.kind() == FaultKind::Internal {
        error!(error = %err, "whitelist request failed");
    }
    fault_response(err.kind(), &err.public_message())
}

async fn list_whitelist_handler(
    State(services): State<PortalServices>,
    headers: HeaderMap,
) -> Response {
    let caller = resolve_caller(services.tokens.as_ref(), &headers).await;
    match services.whitelist.entries(caller.as_ref()).await {
        Ok(entries) => {
            let affiliations = affiliations(&entries);
            let body = json!({ "entries": entries, "affiliations": affiliations });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => whitelist_fault(err),
    }
}

async fn add_whitelist_handler(
    State(services): State<PortalServices>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller = resolve_caller(services.tokens.as_ref(), &headers).await;
    let form: WhitelistForm = match parse_json_body(&body) {
        Ok(form) => form,
        Err(response) => return response,
    };

    match services.whitelist.add(caller.as_ref(), form).await {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(err) => whitelist_fault(err),
    }
}

#[derive(Debug, Default, Deserialize)]
struct StatusChange {
    #[serde(default)]
    status: Option<WhitelistStatus>,
}

async fn whitelist_status_handler(
    State(services): State<PortalServices>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller = resolve_caller(services.tokens.as_ref(), &headers).await;
    let change: StatusChange = match parse_json_body(&body) {
        Ok(change) => change,
        Err(response) => return response,
    };
    let Some(status) = change.status else {
        return fault_response(
            FaultKind::InvalidArgument,
            "`status` must be \"active\" or \"inactive\".",
        );
    };

    match services
        .whitelist
        .set_status(caller.as_ref(), &id, status)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "id": id, "status": status }))).into_response(),
        Err(err) => whitelist_fault(err),
    }
}

async fn remove_whitelist_handler(
    State(services): State<PortalServices>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let caller = resolve_caller(services.tokens.as_ref(), &headers).await;
    match services.whitelist.remove(caller.as_ref(), &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => whitelist_fault(err),
    }
}
