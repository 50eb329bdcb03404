use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::portal::domain::{Role, UserId};
use crate::portal::platform::TokenVerifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub uid: UserId,
    pub email: Option<String>,
}

/// What the front end knows about the visitor at a given moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<SessionUser>,
    pub role: Option<Role>,
    pub loading: bool,
    /// Sign-in token this state was resolved from.
    pub(crate) resolved_for: Option<String>,
}

impl SessionState {
    fn loading() -> Self {
        Self {
            user: None,
            role: None,
            loading: true,
            resolved_for: None,
        }
    }

    fn signed_out(resolved_for: Option<String>) -> Self {
        Self {
            user: None,
            role: None,
            loading: false,
            resolved_for,
        }
    }
}

/// Follows sign-in changes and republishes the visitor's identity and role.
///
/// The role is read once per change from the token's `role` claim. One listener task backs
/// each session and is aborted when the session is dropped.
pub struct AuthSession {
    state: watch::Receiver<SessionState>,
    sign_in: watch::Receiver<Option<String>>,
    listener: JoinHandle<()>,
}

impl AuthSession {
    /// Starts listening on `sign_in`, which carries the current ID token or `None` when
    /// signed out. Must be called from within a Tokio runtime.
    pub fn spawn(
        tokens: Arc<dyn TokenVerifier>,
        sign_in: watch::Receiver<Option<String>>,
    ) -> Self {
        let (publisher, state) = watch::channel(SessionState::loading());
        let listener = tokio::spawn(listen(tokens, sign_in.clone(), publisher));
        Self {
            state,
            sign_in,
            listener,
        }
    }

    /// Latest published state. Reports `loading` while a newer sign-in is still unresolved.
    pub fn current(&self) -> SessionState {
        let mut state = self.state.borrow().clone();
        if !resolves(&state, &self.sign_in) {
            state.loading = true;
        }
        state
    }

    /// Raw published states. A sign-in change shows up here only once the listener wakes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits until the latest sign-in change has been resolved.
    pub async fn settled(&mut self) -> SessionState {
        let sign_in = self.sign_in.clone();
        if let Ok(state) = self.state.wait_for(|state| resolves(state, &sign_in)).await {
            return state.clone();
        }
        self.current()
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

fn resolves(state: &SessionState, sign_in: &watch::Receiver<Option<String>>) -> bool {
    !state.loading && state.resolved_for == *sign_in.borrow()
}

async fn listen(
    tokens: Arc<dyn TokenVerifier>,
    mut sign_in: watch::Receiver<Option<String>>,
    publisher: watch::Sender<SessionState>,
) {
    loop {
        let token = sign_in.borrow_and_update().clone();
        publisher.send_modify(|state| state.loading = true);

        let next = match &token {
            None => SessionState::signed_out(None),
            Some(raw) => match tokens.verify_id_token(raw).await {
                Ok(caller) => SessionState {
                    user: Some(SessionUser {
                        uid: caller.uid,
                        email: caller.email,
                    }),
                    role: caller.role,
                    loading: false,
                    resolved_for: token.clone(),
                },
                Err(err) => {
                    warn!(error = %err, "sign-in token could not be verified");
                    SessionState::signed_out(token.clone())
                }
            },
        };
        debug!(role = ?next.role, signed_in = next.user.is_some(), "session state resolved");
        publisher.send_replace(next);

        if sign_in.changed().await.is_err() {
            break;
        }
    }
}
