//! Authentication state machine. [`transition`] is pure: it takes the current
//! state and an event and returns the next state plus the host commands to run.
//! All I/O lives in [`super::session`].

use super::{credential::UserProfile, host::HostCommand, validator::ValidationOutcome};
use std::time::Duration;
use url::Url;

/// Why the session ended up unauthenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    Rejected,
    Unreachable,
    /// A later API call answered 401.
    Invalidated,
    LoggedOut,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthState {
    Initializing,
    Authenticated(UserProfile),
    /// Terminal until the next full reload.
    Unauthenticated(UnauthenticatedReason),
}

impl AuthState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthEvent {
    Validated(ValidationOutcome),
    SessionInvalidated,
    LoggedOut,
}

/// Where and when to send the user when the session is gone.
#[derive(Clone, Debug)]
pub struct RedirectPolicy {
    pub sign_in: Url,
    pub parent_root: Url,
    pub grace: Duration,
    pub redirect_on_failure: bool,
}

impl RedirectPolicy {
    fn sign_in_commands(&self) -> Vec<HostCommand> {
        if self.redirect_on_failure {
            vec![HostCommand::Redirect {
                target: self.sign_in.clone(),
                after: self.grace,
            }]
        } else {
            Vec::new()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: AuthState,
    pub commands: Vec<HostCommand>,
}

impl Transition {
    fn stay(state: &AuthState) -> Self {
        Self {
            state: state.clone(),
            commands: Vec::new(),
        }
    }
}

#[must_use]
pub fn transition(state: &AuthState, event: AuthEvent, policy: &RedirectPolicy) -> Transition {
    match (state, event) {
        (AuthState::Initializing, AuthEvent::Validated(outcome)) => match outcome {
            ValidationOutcome::Success(user) => Transition {
                state: AuthState::Authenticated(user),
                commands: Vec::new(),
            },
            ValidationOutcome::Rejected => Transition {
                state: AuthState::Unauthenticated(UnauthenticatedReason::Rejected),
                commands: policy.sign_in_commands(),
            },
            ValidationOutcome::Unreachable => Transition {
                state: AuthState::Unauthenticated(UnauthenticatedReason::Unreachable),
                commands: policy.sign_in_commands(),
            },
        },

        (AuthState::Authenticated(_), AuthEvent::SessionInvalidated) => Transition {
            state: AuthState::Unauthenticated(UnauthenticatedReason::Invalidated),
            commands: policy.sign_in_commands(),
        },

        // Leaving always works locally, whatever the backend says.
        (AuthState::Initializing | AuthState::Authenticated(_), AuthEvent::LoggedOut) => {
            Transition {
                state: AuthState::Unauthenticated(UnauthenticatedReason::LoggedOut),
                commands: vec![HostCommand::Redirect {
                    target: policy.parent_root.clone(),
                    after: Duration::ZERO,
                }],
            }
        }
        (AuthState::Unauthenticated(_), AuthEvent::LoggedOut) => Transition {
            state: state.clone(),
            commands: vec![HostCommand::Redirect {
                target: policy.parent_root.clone(),
                after: Duration::ZERO,
            }],
        },

        // The validator's own outcome settles Initializing; terminal states stay put.
        _ => Transition::stay(state),
    }
}

/// Read-only view handed to consumers.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user: Option<UserProfile>,
    /// `None` while unknown.
    pub is_authenticated: Option<bool>,
    pub loading: bool,
}

impl From<&AuthState> for Session {
    fn from(state: &AuthState) -> Self {
        match state {
            AuthState::Initializing => Self {
                user: None,
                is_authenticated: None,
                loading: true,
            },
            AuthState::Authenticated(user) => Self {
                user: Some(user.clone()),
                is_authenticated: Some(true),
                loading: false,
            },
            AuthState::Unauthenticated(_) => Self {
                user: None,
                is_authenticated: Some(false),
                loading: false,
            },
        }
    }
}
