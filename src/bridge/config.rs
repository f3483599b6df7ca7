//! Bridge configuration: where the API lives, where the parent site lives, and
//! which credential variant this deployment uses. Values are public; no secrets
//! belong here.

use super::error::ConfigError;
use std::{fmt, str::FromStr, time::Duration};
use url::Url;

pub const VALIDATE_PATH: &str = "/auth/validate-token";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const DEFAULT_SIGN_IN_PATH: &str = "/auth/signin";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How the credential travels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variant {
    /// Browser-managed session cookie.
    Cookie,
    /// JWT handed over in the URL and sent as `Authorization: Bearer`.
    #[default]
    Bearer,
}

impl Variant {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Cookie => "cookie",
            Variant::Bearer => "bearer",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "cookie" => Ok(Variant::Cookie),
            "bearer" | "jwt" => Ok(Variant::Bearer),
            other => Err(ConfigError::Variant(other.to_string())),
        }
    }
}

/// Everything the bridge needs to run one application mount.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub api_base_url: Url,
    pub parent_origin: Url,
    pub sign_in_path: String,
    pub variant: Variant,
    /// Delay before the automatic redirect after a failed validation.
    pub redirect_grace: Duration,
    /// When false, failures only show the guard's fallback.
    pub redirect_on_failure: bool,
    pub validate_timeout: Duration,
    pub request_timeout: Duration,
}

impl BridgeConfig {
    /// Build a config with defaults for everything but the two origins.
    ///
    /// # Errors
    /// Returns `ConfigError` if either URL is invalid or not http(s).
    pub fn new(api_base_url: &str, parent_origin: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_http_url("api base URL", api_base_url)?,
            parent_origin: parse_http_url("parent origin", parent_origin)?,
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            variant: Variant::default(),
            redirect_grace: Duration::ZERO,
            redirect_on_failure: true,
            validate_timeout: DEFAULT_TIMEOUT,
            request_timeout: DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    #[must_use]
    pub fn with_sign_in_path(mut self, path: &str) -> Self {
        let path = path.trim();
        if !path.is_empty() {
            self.sign_in_path = path.to_string();
        }
        self
    }

    #[must_use]
    pub fn with_redirect_grace(mut self, grace: Duration) -> Self {
        self.redirect_grace = grace;
        self
    }

    #[must_use]
    pub fn with_redirect_on_failure(mut self, enabled: bool) -> Self {
        self.redirect_on_failure = enabled;
        self
    }

    #[must_use]
    pub fn with_validate_timeout(mut self, timeout: Duration) -> Self {
        self.validate_timeout = timeout;
        self
    }

    /// Parent site's sign-in page.
    #[must_use]
    pub fn sign_in_url(&self) -> Url {
        join_path(&self.parent_origin, &self.sign_in_path)
    }

    /// Parent site's root, used after logout.
    #[must_use]
    pub fn parent_root(&self) -> Url {
        join_path(&self.parent_origin, "/")
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn api_url(&self, path: &str) -> Url {
        join_path(&self.api_base_url, path)
    }
}

fn parse_http_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { name, source })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::NotHttp {
            name,
            value: raw.to_string(),
        }),
    }
}

/// Append `path` to the base's own path with exactly one `/` between them.
/// Query strings on `path` are kept.
fn join_path(base: &Url, path: &str) -> Url {
    let (path, query) = match path.trim().split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path.trim(), None),
    };

    let prefix = base.path().trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    let mut url = base.clone();
    url.set_path(&format!("{prefix}/{suffix}"));
    url.set_query(query);
    url.set_fragment(None);
    url
}
