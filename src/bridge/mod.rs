//! Authentication bridge components, leaf first:
//!
//! - [`store`]: the one durable credential slot.
//! - [`transport`]: the only HTTP egress point; attaches credentials and turns
//!   401 bursts into a single session invalidation.
//! - [`validator`]: one call to `/auth/validate-token`, normalized.
//! - [`state`] and [`session`]: pure transitions and the async driver that owns
//!   the state.
//! - [`guard`]: render gating over the current session.
//!
//! The page itself (URL, history, navigation) is behind [`host::Host`].

pub mod config;
pub mod credential;
pub mod error;
pub mod guard;
pub mod host;
pub mod session;
pub mod state;
pub mod store;
pub mod transport;
pub mod validator;

pub use config::{BridgeConfig, Variant};
pub use credential::{Credential, UserProfile, AUTH_TOKEN_KEY};
pub use error::{ConfigError, StoreError, TransportError};
pub use guard::{AuthGuard, GuardView, LoadingIndicator, SpinnerSize};
pub use host::{capture_handoff, Host, HostCommand, MemoryHost};
pub use session::AuthSession;
pub use state::{AuthEvent, AuthState, Session, UnauthenticatedReason};
pub use store::{FileTokenStore, MemoryTokenStore, NoopTokenStore, TokenStore};
pub use transport::{AuthTransport, BearerStrategy, CookieStrategy, CredentialStrategy};
pub use validator::{SessionValidator, ValidationOutcome};
