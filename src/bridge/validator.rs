//! Turns one call to the validation endpoint into a [`ValidationOutcome`].

use super::{
    config::VALIDATE_PATH, credential::UserProfile, error::TransportError,
    transport::AuthTransport,
};
use serde_json::Value;
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use ulid::{Generator, Ulid};

/// Normalized result of a validation attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationOutcome {
    Success(UserProfile),
    /// The API looked at the credential and said no.
    Rejected,
    /// No usable answer: network failure, timeout, server error, bad body.
    Unreachable,
}

pub struct SessionValidator {
    transport: AuthTransport,
    timeout: Duration,
    generator: Mutex<Generator>,
}

impl SessionValidator {
    #[must_use]
    pub fn new(transport: AuthTransport) -> Self {
        let timeout = transport.config().validate_timeout;
        Self {
            transport,
            timeout,
            generator: Mutex::new(Generator::new()),
        }
    }

    /// Ask the API whether the current credential is still good.
    ///
    /// Never fails: every error is folded into `Rejected` or `Unreachable`.
    #[instrument(skip(self), fields(variant = %self.transport.variant()))]
    pub async fn validate(&self) -> ValidationOutcome {
        let path = format!("{VALIDATE_PATH}?t={}", self.cache_buster());

        let outcome = match timeout(self.timeout, self.transport.get_json::<Value>(&path)).await {
            Ok(Ok(body)) => outcome_from_body(body),
            Ok(Err(err)) => outcome_from_error(&err),
            Err(_) => {
                warn!(
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Validation timed out"
                );
                ValidationOutcome::Unreachable
            }
        };

        match &outcome {
            ValidationOutcome::Success(_) => info!("Session validated"),
            ValidationOutcome::Rejected => warn!("Validation rejected"),
            ValidationOutcome::Unreachable => warn!("Validation unreachable"),
        }
        outcome
    }

    /// Strictly increasing within the process.
    fn cache_buster(&self) -> Ulid {
        self.generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .unwrap_or_else(|_| Ulid::new())
    }
}

fn outcome_from_body(body: Value) -> ValidationOutcome {
    let success = body.get("success").is_some_and(is_truthy);
    match body.get("user") {
        Some(user) if success && is_truthy(user) => {
            ValidationOutcome::Success(UserProfile::new(user.clone()))
        }
        _ => ValidationOutcome::Rejected,
    }
}

fn outcome_from_error(err: &TransportError) -> ValidationOutcome {
    if err.is_unreachable() {
        warn!("Validation request failed: {err}");
        ValidationOutcome::Unreachable
    } else {
        ValidationOutcome::Rejected
    }
}

/// JSON truthiness: `false`, `null`, `0` and `""` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::{
        config::BridgeConfig,
        credential::Credential,
        store::{MemoryTokenStore, TokenStore},
        transport::BearerStrategy,
    };
    use anyhow::Result;
    use serde_json::json;
    use std::{net::TcpListener, sync::Arc};
    use wiremock::{
        matchers::{method, path, query_param_is_missing},
        Mock, MockServer, ResponseTemplate,
    };

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn validator(server: &MockServer, store: Arc<MemoryTokenStore>) -> SessionValidator {
        let config = BridgeConfig::new(&server.uri(), "https://example.com")
            .unwrap()
            .with_validate_timeout(Duration::from_millis(200));
        let transport = AuthTransport::new(&config, Arc::new(BearerStrategy::new(store))).unwrap();
        SessionValidator::new(transport)
    }

    async fn respond(template: ResponseTemplate) -> (MockServer, SessionValidator) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(VALIDATE_PATH))
            .respond_with(template)
            .mount(&server)
            .await;
        let validator = validator(&server, Arc::new(MemoryTokenStore::new()));
        (server, validator)
    }

    #[test]
    fn body_mapping() {
        assert_eq!(
            outcome_from_body(json!({"success": true, "user": {"id": 1}})),
            ValidationOutcome::Success(UserProfile::new(json!({"id": 1})))
        );
        assert_eq!(
            outcome_from_body(json!({"success": false})),
            ValidationOutcome::Rejected
        );
        assert_eq!(
            outcome_from_body(json!({"success": true, "user": null})),
            ValidationOutcome::Rejected
        );
        assert_eq!(
            outcome_from_body(json!({"success": true})),
            ValidationOutcome::Rejected
        );
        assert_eq!(outcome_from_body(json!([])), ValidationOutcome::Rejected);
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }

    #[tokio::test]
    async fn success_returns_user() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let (_server, validator) = respond(ResponseTemplate::new(200).set_body_json(
            json!({"success": true, "user": {"id": 1, "name": "Ada"}}),
        ))
        .await;

        match validator.validate().await {
            ValidationOutcome::Success(user) => assert_eq!(user.str_field("name"), Some("Ada")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn explicit_failure_is_rejected() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let (_server, validator) =
            respond(ResponseTemplate::new(200).set_body_json(json!({"success": false}))).await;
        assert_eq!(validator.validate().await, ValidationOutcome::Rejected);

        let (_server, validator) = respond(ResponseTemplate::new(403)).await;
        assert_eq!(validator.validate().await, ValidationOutcome::Rejected);
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_is_rejected_and_clears() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(VALIDATE_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "abc.def.ghi",
        )));
        let validator = validator(&server, store.clone());

        assert_eq!(validator.validate().await, ValidationOutcome::Rejected);
        assert!(store.get().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn server_trouble_is_unreachable() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let (_server, validator) = respond(ResponseTemplate::new(500)).await;
        assert_eq!(validator.validate().await, ValidationOutcome::Unreachable);

        let (_server, validator) =
            respond(ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;
        assert_eq!(validator.validate().await, ValidationOutcome::Unreachable);

        let (_server, validator) = respond(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "user": {"id": 1}}))
                .set_delay(Duration::from_secs(2)),
        )
        .await;
        assert_eq!(validator.validate().await, ValidationOutcome::Unreachable);
        Ok(())
    }

    #[tokio::test]
    async fn every_call_is_cache_busted() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(VALIDATE_PATH))
            .and(query_param_is_missing("t"))
            .respond_with(ResponseTemplate::new(400))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(VALIDATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
            .mount(&server)
            .await;
        let validator = validator(&server, Arc::new(MemoryTokenStore::new()));

        validator.validate().await;
        validator.validate().await;

        let busters: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter_map(|request| {
                request
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == "t")
                    .map(|(_, value)| value.into_owned())
            })
            .collect();
        assert_eq!(busters.len(), 2);
        assert!(busters[0] < busters[1]);
        Ok(())
    }
}
