//! Render gate over a [`Session`]. UX only: access control lives on the API, and
//! the guard never navigates. Redirects come from the state machine.

use super::state::Session;
use std::fmt;

pub const DEFAULT_LOADING_MESSAGE: &str = "Checking authentication...";
pub const AUTH_REQUIRED_TITLE: &str = "Authentication Required";
pub const AUTH_REQUIRED_DETAIL: &str = "Redirecting to login...";
pub const AUTH_REQUIRED_STAY_DETAIL: &str = "Sign in on the parent site to continue.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpinnerSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadingIndicator {
    pub size: SpinnerSize,
    /// Empty means no message line.
    pub message: String,
}

impl LoadingIndicator {
    #[must_use]
    pub fn new(size: SpinnerSize, message: impl Into<String>) -> Self {
        Self {
            size,
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadingIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spinner = match self.size {
            SpinnerSize::Small => "[.]",
            SpinnerSize::Medium => "[..]",
            SpinnerSize::Large => "[...]",
        };
        if self.message.is_empty() {
            f.write_str(spinner)
        } else {
            write!(f, "{spinner} {}", self.message)
        }
    }
}

/// What the guard decided to show.
#[derive(Debug, PartialEq, Eq)]
pub enum GuardView<'a, V> {
    Loading(LoadingIndicator),
    Protected(&'a V),
    Fallback(&'a V),
    /// Default notice when no fallback was supplied.
    AuthRequired { redirecting: bool },
    Empty,
}

impl<V> GuardView<'_, V> {
    #[must_use]
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Protected(_))
    }
}

impl<V: fmt::Display> fmt::Display for GuardView<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading(indicator) => fmt::Display::fmt(indicator, f),
            Self::Protected(content) | Self::Fallback(content) => fmt::Display::fmt(content, f),
            Self::AuthRequired { redirecting } => {
                let detail = if *redirecting {
                    AUTH_REQUIRED_DETAIL
                } else {
                    AUTH_REQUIRED_STAY_DETAIL
                };
                write!(f, "{AUTH_REQUIRED_TITLE}\n{detail}")
            }
            Self::Empty => Ok(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthGuard<V> {
    fallback: Option<V>,
    show_loading: bool,
    redirecting: bool,
    loading: LoadingIndicator,
}

impl<V> Default for AuthGuard<V> {
    fn default() -> Self {
        Self {
            fallback: None,
            show_loading: true,
            redirecting: true,
            loading: LoadingIndicator::new(SpinnerSize::Medium, DEFAULT_LOADING_MESSAGE),
        }
    }
}

impl<V> AuthGuard<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: V) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn show_loading(mut self, show: bool) -> Self {
        self.show_loading = show;
        self
    }

    /// Whether a redirect to sign-in follows the notice. Only changes the
    /// notice wording; the guard itself never navigates.
    #[must_use]
    pub fn redirecting(mut self, redirecting: bool) -> Self {
        self.redirecting = redirecting;
        self
    }

    #[must_use]
    pub fn with_loading(mut self, indicator: LoadingIndicator) -> Self {
        self.loading = indicator;
        self
    }

    /// Pick the view for `session`. `content` is returned only for an
    /// authenticated session.
    pub fn render<'a>(&'a self, session: &Session, content: &'a V) -> GuardView<'a, V> {
        if session.loading && self.show_loading {
            return GuardView::Loading(self.loading.clone());
        }

        match session.is_authenticated {
            Some(true) => GuardView::Protected(content),
            Some(false) => self
                .fallback
                .as_ref()
                .map_or(
                    GuardView::AuthRequired {
                        redirecting: self.redirecting,
                    },
                    GuardView::Fallback,
                ),
            None => GuardView::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::credential::UserProfile;
    use serde_json::json;

    fn loading() -> Session {
        Session {
            user: None,
            is_authenticated: None,
            loading: true,
        }
    }

    fn authenticated() -> Session {
        Session {
            user: Some(UserProfile::new(json!({"id": 1}))),
            is_authenticated: Some(true),
            loading: false,
        }
    }

    fn unauthenticated() -> Session {
        Session {
            user: None,
            is_authenticated: Some(false),
            loading: false,
        }
    }

    #[test]
    fn loading_indicator_by_default() {
        let guard = AuthGuard::<String>::new();
        let content = "secret chat".to_string();
        let view = guard.render(&loading(), &content);
        assert_eq!(view.to_string(), "[..] Checking authentication...");
        assert!(!view.is_protected());
    }

    #[test]
    fn loading_can_be_hidden() {
        let guard = AuthGuard::<String>::new().show_loading(false);
        let content = "secret chat".to_string();
        assert_eq!(guard.render(&loading(), &content), GuardView::Empty);
    }

    #[test]
    fn protected_only_when_authenticated() {
        let guard = AuthGuard::new();
        let content = "secret chat".to_string();
        assert_eq!(
            guard.render(&authenticated(), &content),
            GuardView::Protected(&content)
        );
        assert_eq!(
            guard.render(&unauthenticated(), &content),
            GuardView::AuthRequired { redirecting: true }
        );
        assert_eq!(
            guard.render(&unauthenticated(), &content).to_string(),
            "Authentication Required\nRedirecting to login..."
        );
    }

    #[test]
    fn notice_without_redirect() {
        let guard = AuthGuard::new().redirecting(false);
        let content = "secret chat".to_string();
        let view = guard.render(&unauthenticated(), &content);
        assert_eq!(view, GuardView::AuthRequired { redirecting: false });
        assert_eq!(
            view.to_string(),
            "Authentication Required\nSign in on the parent site to continue."
        );
    }

    #[test]
    fn fallback_replaces_notice() {
        let guard = AuthGuard::new().with_fallback("please sign in".to_string());
        let content = "secret chat".to_string();
        let view = guard.render(&unauthenticated(), &content);
        assert_eq!(view.to_string(), "please sign in");
    }

    #[test]
    fn indicator_sizes() {
        assert_eq!(
            LoadingIndicator::new(SpinnerSize::Small, "").to_string(),
            "[.]"
        );
        assert_eq!(
            LoadingIndicator::new(SpinnerSize::Large, "Hold on").to_string(),
            "[...] Hold on"
        );
    }
}
