//! Credential and profile types shared by every bridge component.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of the URL query parameter and of the persisted storage key.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Opaque bearer credential (a JWT).
///
/// Debug output is redacted and there is no `Display`; the only ways out are
/// [`Credential::bearer_value`] for header injection and [`Credential::expose`]
/// for the token store.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Parse a credential handed over in a URL. Accepts only JWT-shaped values.
    #[must_use]
    pub fn from_handoff(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        looks_like_jwt(raw).then(|| Self::new(raw))
    }

    /// Raw token, for persistence only.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Value for an `Authorization` header.
    #[must_use]
    pub(crate) fn bearer_value(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

/// Three non-empty base64url segments separated by dots.
fn looks_like_jwt(raw: &str) -> bool {
    let segments: Vec<&str> = raw.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '=')
        })
}

/// User record returned by the validation endpoint. The bridge only cares that it
/// exists; fields are looked up on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Value);

impl UserProfile {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Convenience accessor for string fields such as `name` or `email`.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
