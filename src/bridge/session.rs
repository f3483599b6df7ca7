//! Async driver for the state machine. [`AuthSession`] owns the only copy of the
//! authentication state; consumers read snapshots or subscribe and call
//! `mount`/`logout`.

use super::{
    config::{BridgeConfig, Variant, LOGOUT_PATH},
    error::TransportError,
    host::{capture_handoff, Host, HostCommand},
    state::{transition, AuthEvent, AuthState, RedirectPolicy, Session},
    store::{NoopTokenStore, TokenStore},
    transport::{AuthTransport, BearerStrategy, CookieStrategy, CredentialStrategy},
    validator::SessionValidator,
};
use reqwest::cookie::Jar;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
}

struct Inner {
    transport: AuthTransport,
    validator: SessionValidator,
    store: Arc<dyn TokenStore>,
    host: Arc<dyn Host>,
    policy: RedirectPolicy,
    state: watch::Sender<AuthState>,
    teardown: watch::Sender<bool>,
    mounted: AtomicBool,
}

impl AuthSession {
    /// Wire a session to an existing transport. `store` must be the same slot
    /// the transport's strategy reads from.
    #[must_use]
    pub fn new(transport: AuthTransport, store: Arc<dyn TokenStore>, host: Arc<dyn Host>) -> Self {
        let config = transport.config();
        let policy = RedirectPolicy {
            sign_in: config.sign_in_url(),
            parent_root: config.parent_root(),
            grace: config.redirect_grace,
            redirect_on_failure: config.redirect_on_failure,
        };
        let (state, _) = watch::channel(AuthState::Initializing);
        let (teardown, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            validator: SessionValidator::new(transport.clone()),
            transport,
            store,
            host,
            policy,
            state,
            teardown,
            mounted: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        inner.transport.on_session_invalidated(move || {
            if let Some(inner) = weak.upgrade() {
                inner.session_invalidated();
            }
        });

        Self { inner }
    }

    /// Build the transport for the configured variant and wire a session to it.
    /// The cookie variant ignores `store` and keeps nothing client-side.
    ///
    /// # Errors
    /// Returns `TransportError::Client` if the HTTP client cannot be built.
    pub fn from_config(
        config: &BridgeConfig,
        store: Arc<dyn TokenStore>,
        jar: Arc<Jar>,
        host: Arc<dyn Host>,
    ) -> Result<Self, TransportError> {
        let (strategy, store): (Arc<dyn CredentialStrategy>, Arc<dyn TokenStore>) =
            match config.variant {
                Variant::Bearer => (Arc::new(BearerStrategy::new(store.clone())), store),
                Variant::Cookie => (
                    Arc::new(CookieStrategy::new(jar)),
                    Arc::new(NoopTokenStore),
                ),
            };
        let transport = AuthTransport::new(config, strategy)?;
        Ok(Self::new(transport, store, host))
    }

    /// Transport shared with the rest of the application.
    #[must_use]
    pub fn transport(&self) -> &AuthTransport {
        &self.inner.transport
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn session(&self) -> Session {
        Session::from(&*self.inner.state.borrow())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Run the page-load sequence: capture a URL handoff (bearer variant), then
    /// validate. Only the first call does any work.
    #[instrument(skip(self), fields(variant = %self.inner.transport.variant()))]
    pub async fn mount(&self) -> Session {
        if self.inner.mounted.swap(true, Ordering::AcqRel) {
            debug!("Session already mounted");
            return self.session();
        }

        if self.inner.transport.variant() == Variant::Bearer {
            self.inner.capture_handoff();
        }

        let teardown = self.inner.teardown.subscribe();
        if *teardown.borrow() {
            return self.session();
        }

        let outcome = tokio::select! {
            outcome = self.inner.validator.validate() => outcome,
            () = torn_down(teardown) => {
                debug!("Torn down during validation, discarding result");
                return self.session();
            }
        };

        self.inner.dispatch(AuthEvent::Validated(outcome));
        self.session()
    }

    /// End the session: clear the credential, tell the backend (best effort),
    /// and send the user back to the parent site.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Session {
        let credential = self.inner.transport.current_credential();
        if let Err(err) = self.inner.store.clear() {
            warn!("Failed to clear credential on logout: {err}");
        }

        let commands = self.inner.apply(AuthEvent::LoggedOut);

        match self
            .inner
            .transport
            .post_empty_as(LOGOUT_PATH, credential)
            .await
        {
            Ok(()) => info!("Logged out"),
            Err(err) => warn!("LogoutFailed: {err}"),
        }

        self.inner.execute(&commands);
        self.session()
    }

    /// The hosting view is going away; results still in flight are dropped.
    pub fn teardown(&self) {
        self.inner.teardown.send_replace(true);
    }
}

impl Inner {
    fn capture_handoff(&self) {
        let handoff = capture_handoff(&self.host.location());

        match &handoff.credential {
            Some(credential) => match self.store.set(credential) {
                Ok(()) => info!("Credential captured from URL"),
                Err(err) => warn!("Failed to persist credential from URL: {err}"),
            },
            None if handoff.stripped.is_some() => warn!("Ignoring malformed auth_token in URL"),
            None => {}
        }

        if let Some(stripped) = handoff.stripped {
            self.host.execute(&HostCommand::ReplaceLocation(stripped));
        }
    }

    fn session_invalidated(&self) {
        if *self.teardown.borrow() {
            return;
        }
        self.dispatch(AuthEvent::SessionInvalidated);
    }

    fn dispatch(&self, event: AuthEvent) {
        let commands = self.apply(event);
        self.execute(&commands);
    }

    /// Move the state forward and return the commands still to execute.
    fn apply(&self, event: AuthEvent) -> Vec<HostCommand> {
        let mut commands = Vec::new();
        self.state.send_if_modified(|state| {
            let next = transition(state, event, &self.policy);
            commands = next.commands;
            if *state == next.state {
                false
            } else {
                debug!(from = kind(state), to = kind(&next.state), "Auth state changed");
                *state = next.state;
                true
            }
        });
        commands
    }

    fn execute(&self, commands: &[HostCommand]) {
        for command in commands {
            info!("{command}");
            self.host.execute(command);
        }
    }
}

/// Resolves once teardown has been signalled.
async fn torn_down(mut teardown: watch::Receiver<bool>) {
    loop {
        if *teardown.borrow_and_update() {
            return;
        }
        if teardown.changed().await.is_err() {
            // Sender gone with the session; nothing will ever signal.
            std::future::pending::<()>().await;
        }
    }
}

fn kind(state: &AuthState) -> &'static str {
    match state {
        AuthState::Initializing => "initializing",
        AuthState::Authenticated(_) => "authenticated",
        AuthState::Unauthenticated(_) => "unauthenticated",
    }
}
