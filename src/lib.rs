//! # authbridge (shared login for subdomain applications)
//!
//! `authbridge` lets independently deployed single-page applications that live on
//! subdomains reuse the login session issued by a central parent site. The parent
//! site owns sign-in; each child application only has to carry the credential it
//! was handed, prove it against the API, and react when it stops being valid.
//!
//! ## Credential variants
//!
//! - **Cookie session:** the browser's cookie jar carries the session. The bridge
//!   never sees the token; it only asks the API to validate the ambient cookie.
//! - **Bearer token:** the parent site appends `?auth_token=<jwt>` when it sends
//!   the user over. The bridge captures it once, strips it from the visible URL,
//!   persists it, and sends it as `Authorization: Bearer` on every request.
//!
//! ## Flow
//!
//! 1. Page load: the bearer variant captures `auth_token` and replaces the history
//!    entry so back-navigation cannot resurrect the exposed token.
//! 2. The credential is persisted before the first request goes out.
//! 3. `GET /auth/validate-token` decides between `Authenticated` and
//!    `Unauthenticated`.
//! 4. The guard renders protected content, a loading indicator, or a notice.
//! 5. Any later 401 clears the credential and invalidates the session once.
//!
//! Credential values are wrapped in `secrecy` types and must never be logged.

pub mod bridge;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
