//! Boundary to the hosting environment: the visible URL, its history entry, and
//! navigation. The state machine never navigates by itself; it returns
//! [`HostCommand`]s and a single [`Host::execute`] call carries them out.

use super::credential::{Credential, AUTH_TOKEN_KEY};
use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use url::{form_urlencoded, Url};

/// Side effects the bridge asks the host to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCommand {
    /// Replace the current history entry (never push) with this URL.
    ReplaceLocation(Url),
    /// Leave the application, optionally after a grace period.
    Redirect { target: Url, after: Duration },
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaceLocation(url) => write!(f, "replace location: {url}"),
            Self::Redirect { target, after } if after.is_zero() => {
                write!(f, "redirect: {target}")
            }
            Self::Redirect { target, after } => {
                write!(f, "redirect: {target} (after {} ms)", after.as_millis())
            }
        }
    }
}

/// The page the bridge runs in.
pub trait Host: Send + Sync {
    /// Current location, including any query string.
    fn location(&self) -> Url;

    /// Carry out a command. Implementations must not block on a redirect delay.
    fn execute(&self, command: &HostCommand);
}

/// Result of inspecting the URL for a bearer handoff.
#[derive(Debug)]
pub struct Handoff {
    /// Credential found in the URL, when it was well formed.
    pub credential: Option<Credential>,
    /// URL with `auth_token` removed; `None` when the URL did not carry it.
    pub stripped: Option<Url>,
}

/// Find `auth_token` in the query string and build the URL without it.
///
/// Other query segments are kept byte for byte and in order, as is the
/// fragment. A malformed token is still stripped, since it was exposed either
/// way.
#[must_use]
pub fn capture_handoff(url: &Url) -> Handoff {
    let mut token: Option<String> = None;
    let mut kept: Vec<&str> = Vec::new();

    for segment in url.query().unwrap_or_default().split('&') {
        let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
            continue;
        };
        if key == AUTH_TOKEN_KEY {
            // First occurrence wins; later duplicates are dropped with it.
            if token.is_none() {
                token = Some(value.into_owned());
            }
        } else {
            kept.push(segment);
        }
    }

    let Some(token) = token else {
        return Handoff {
            credential: None,
            stripped: None,
        };
    };

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.set_query(Some(&kept.join("&")));
    }

    Handoff {
        credential: Credential::from_handoff(&token),
        stripped: Some(stripped),
    }
}

/// In-process host that applies location replacements and records every command.
#[derive(Debug)]
pub struct MemoryHost {
    location: Mutex<Url>,
    executed: Mutex<Vec<HostCommand>>,
}

impl MemoryHost {
    #[must_use]
    pub fn new(location: Url) -> Self {
        Self {
            location: Mutex::new(location),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Every command executed so far, oldest first.
    #[must_use]
    pub fn executed(&self) -> Vec<HostCommand> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Redirect targets only.
    #[must_use]
    pub fn redirects(&self) -> Vec<Url> {
        self.executed()
            .into_iter()
            .filter_map(|command| match command {
                HostCommand::Redirect { target, .. } => Some(target),
                HostCommand::ReplaceLocation(_) => None,
            })
            .collect()
    }
}

impl Host for MemoryHost {
    fn location(&self) -> Url {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn execute(&self, command: &HostCommand) {
        if let HostCommand::ReplaceLocation(url) = command {
            *self.location.lock().unwrap_or_else(PoisonError::into_inner) = url.clone();
        }
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());
    }
}
