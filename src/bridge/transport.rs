//! The single HTTP egress point for the bridge.
//!
//! Every request to the API goes through [`AuthTransport`], which asks its
//! [`CredentialStrategy`] to attach the credential and reacts to 401 responses:
//! the credential is cleared, the session-invalidated callback fires once per
//! burst, and the caller still receives [`TransportError::Unauthorized`].
//!
//! Bursts are coalesced with an epoch counter. A request remembers the epoch it
//! was sent under; only a 401 that can move the counter forward from that value
//! performs the invalidation, so N concurrent failures produce one side effect.

use super::{
    config::{BridgeConfig, Variant},
    credential::Credential,
    error::TransportError,
    store::TokenStore,
};
use once_cell::sync::OnceCell;
use reqwest::{
    cookie::Jar, header::AUTHORIZATION, Client, ClientBuilder, Method, RequestBuilder, Response,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, instrument, warn};
use url::Url;

/// Maximum number of error body characters kept in `TransportError::Status`.
const MAX_ERROR_CHARS: usize = 200;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type InvalidatedCallback = Box<dyn Fn() + Send + Sync>;

/// How a credential variant rides along with requests.
pub trait CredentialStrategy: Send + Sync {
    fn variant(&self) -> Variant;

    /// Hook for client-wide settings, such as installing a cookie jar.
    fn configure(&self, builder: ClientBuilder) -> ClientBuilder {
        builder
    }

    /// Credential the next request would carry, if the variant has one.
    fn current(&self) -> Option<Credential>;

    fn attach_credential(
        &self,
        request: RequestBuilder,
        credential: Option<&Credential>,
    ) -> RequestBuilder;

    /// Drop whatever the variant holds after the API answered 401.
    fn on_unauthorized(&self);
}

/// Sends the stored JWT as `Authorization: Bearer <token>`.
pub struct BearerStrategy {
    store: Arc<dyn TokenStore>,
}

impl BearerStrategy {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }
}

impl CredentialStrategy for BearerStrategy {
    fn variant(&self) -> Variant {
        Variant::Bearer
    }

    fn current(&self) -> Option<Credential> {
        self.store.get()
    }

    fn attach_credential(
        &self,
        request: RequestBuilder,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        match credential {
            Some(credential) => request.header(AUTHORIZATION, credential.bearer_value()),
            None => request,
        }
    }

    fn on_unauthorized(&self) {
        if let Err(err) = self.store.clear() {
            warn!("Failed to clear credential after 401: {err}");
        }
    }
}

/// Relies on an ambient cookie jar; never touches the token value.
pub struct CookieStrategy {
    jar: Arc<Jar>,
}

impl CookieStrategy {
    #[must_use]
    pub fn new(jar: Arc<Jar>) -> Self {
        Self { jar }
    }

    /// Seed the jar, as a browser would after the parent site set the cookie.
    pub fn add_cookie(&self, cookie: &str, url: &Url) {
        self.jar.add_cookie_str(cookie, url);
    }
}

impl CredentialStrategy for CookieStrategy {
    fn variant(&self) -> Variant {
        Variant::Cookie
    }

    fn configure(&self, builder: ClientBuilder) -> ClientBuilder {
        builder.cookie_provider(self.jar.clone())
    }

    fn current(&self) -> Option<Credential> {
        None
    }

    fn attach_credential(
        &self,
        request: RequestBuilder,
        _credential: Option<&Credential>,
    ) -> RequestBuilder {
        request
    }

    fn on_unauthorized(&self) {
        // The session cookie belongs to the API; it expires or is replaced there.
        debug!("Cookie session rejected by the API");
    }
}

/// Cloneable handle to the shared HTTP client and invalidation state.
#[derive(Clone)]
pub struct AuthTransport {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    config: BridgeConfig,
    strategy: Arc<dyn CredentialStrategy>,
    epoch: AtomicU64,
    on_invalidated: OnceCell<InvalidatedCallback>,
}

impl fmt::Debug for AuthTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTransport")
            .field("api_base_url", &self.inner.config.api_base_url.as_str())
            .field("variant", &self.inner.strategy.variant())
            .field("epoch", &self.inner.epoch.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl AuthTransport {
    /// Build the transport for a configured API.
    ///
    /// # Errors
    /// Returns `TransportError::Client` if the HTTP client cannot be built.
    pub fn new(
        config: &BridgeConfig,
        strategy: Arc<dyn CredentialStrategy>,
    ) -> Result<Self, TransportError> {
        let builder = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT.min(config.request_timeout))
            .timeout(config.request_timeout);

        let client = strategy
            .configure(builder)
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                config: config.clone(),
                strategy,
                epoch: AtomicU64::new(0),
                on_invalidated: OnceCell::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn variant(&self) -> Variant {
        self.inner.strategy.variant()
    }

    /// Credential the next request would carry.
    #[must_use]
    pub fn current_credential(&self) -> Option<Credential> {
        self.inner.strategy.current()
    }

    /// Register the callback fired once per 401 burst. Only the first
    /// registration is kept.
    pub fn on_session_invalidated(&self, callback: impl Fn() + Send + Sync + 'static) {
        if self.inner.on_invalidated.set(Box::new(callback)).is_err() {
            warn!("Session invalidated callback already registered, ignoring");
        }
    }

    /// GET a JSON document.
    ///
    /// # Errors
    /// See [`TransportError`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let credential = self.current_credential();
        let response = self.send(Method::GET, path, None, credential).await?;
        handle_json_response(response).await
    }

    /// POST a JSON body and decode a JSON reply.
    ///
    /// # Errors
    /// See [`TransportError`].
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let body = serde_json::to_value(body)
            .map_err(|err| TransportError::Decode(format!("Failed to encode request: {err}")))?;
        let credential = self.current_credential();
        let response = self
            .send(Method::POST, path, Some(&body), credential)
            .await?;
        handle_json_response(response).await
    }

    /// POST without a body and ignore the reply body.
    ///
    /// # Errors
    /// See [`TransportError`].
    pub async fn post_empty(&self, path: &str) -> Result<(), TransportError> {
        let credential = self.current_credential();
        self.post_empty_as(path, credential).await
    }

    /// Same as [`Self::post_empty`] but with a credential captured earlier, for
    /// calls made after the store was already cleared.
    pub(crate) async fn post_empty_as(
        &self,
        path: &str,
        credential: Option<Credential>,
    ) -> Result<(), TransportError> {
        let response = self.send(Method::POST, path, None, credential).await?;
        handle_empty_response(response).await
    }

    /// Arbitrary call returning the status and the decoded body (`null` when the
    /// body is empty).
    ///
    /// # Errors
    /// See [`TransportError`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), TransportError> {
        let credential = self.current_credential();
        let response = self.send(method, path, body, credential).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::Unreachable(err.without_url().to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok((status, Value::Null));
        }
        let value = serde_json::from_slice(&bytes)
            .map_err(|err| TransportError::Decode(format!("Failed to decode response: {err}")))?;
        Ok((status, value))
    }

    #[instrument(skip(self, body, credential), fields(variant = %self.variant()))]
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        credential: Option<Credential>,
    ) -> Result<Response, TransportError> {
        let url = self.inner.config.api_url(path);
        let epoch = self.inner.epoch.load(Ordering::Acquire);

        let mut request = self.inner.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        request = self
            .inner
            .strategy
            .attach_credential(request, credential.as_ref());

        let response = request.send().await.map_err(map_request_error)?;
        debug!(status = response.status().as_u16(), "API response");

        if response.status() == StatusCode::UNAUTHORIZED {
            self.invalidate(epoch);
            return Err(TransportError::Unauthorized);
        }

        Ok(response)
    }

    fn invalidate(&self, seen: u64) {
        if self
            .inner
            .epoch
            .compare_exchange(seen, seen.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("401 belongs to a session that was already invalidated");
            return;
        }

        warn!("API answered 401, invalidating session");
        self.inner.strategy.on_unauthorized();
        if let Some(callback) = self.inner.on_invalidated.get() {
            callback();
        }
    }
}

/// Maps network errors into `TransportError`, keeping URLs out of the message.
fn map_request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Unreachable("request timed out".to_string())
    } else if err.is_decode() {
        TransportError::Decode(err.without_url().to_string())
    } else {
        TransportError::Unreachable(err.without_url().to_string())
    }
}

async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| TransportError::Decode(format!("Failed to decode response: {err}")))
    } else {
        Err(status_error(response).await)
    }
}

async fn handle_empty_response(response: Response) -> Result<(), TransportError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(status_error(response).await)
    }
}

async fn status_error(response: Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    debug!(status, body = %body, "API error body");
    TransportError::Status {
        status,
        message: sanitize_body(&body),
    }
}

/// Trims and truncates error bodies before they reach callers.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::store::MemoryTokenStore;
    use anyhow::Result;
    use serde_json::json;
    use std::{net::TcpListener, sync::atomic::AtomicUsize};
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn config(server: &MockServer) -> BridgeConfig {
        BridgeConfig::new(&server.uri(), "https://example.com").unwrap()
    }

    fn bearer(server: &MockServer, store: Arc<MemoryTokenStore>) -> AuthTransport {
        AuthTransport::new(&config(server), Arc::new(BearerStrategy::new(store))).unwrap()
    }

    fn counter(transport: &AuthTransport) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook = fired.clone();
        transport.on_session_invalidated(move || {
            hook.fetch_add(1, Ordering::SeqCst);
        });
        fired
    }

    #[test]
    fn sanitize_body_truncates() {
        assert_eq!(sanitize_body("   "), "Request failed.");
        assert_eq!(sanitize_body(&"x".repeat(500)).len(), MAX_ERROR_CHARS);
        assert_eq!(sanitize_body(" nope \n"), "nope");
    }

    #[tokio::test]
    async fn bearer_header_is_attached() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/rooms"))
            .and(header("authorization", "Bearer abc.def.ghi"))
            .and(header("user-agent", crate::APP_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rooms": []})))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "abc.def.ghi",
        )));
        let transport = bearer(&server, store);
        let body: Value = transport.get_json("/chat/rooms").await?;
        assert_eq!(body, json!({"rooms": []}));
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_clears_and_notifies() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/rooms"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "abc.def.ghi",
        )));
        let transport = bearer(&server, store.clone());
        let fired = counter(&transport);

        let result: Result<Value, TransportError> = transport.get_json("/chat/rooms").await;
        assert!(matches!(result, Err(TransportError::Unauthorized)));
        assert!(store.get().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_unauthorized_coalesce() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
            .expect(3)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "abc.def.ghi",
        )));
        let transport = bearer(&server, store.clone());
        let fired = counter(&transport);

        let (a, b, c) = tokio::join!(
            transport.get_json::<Value>("/a"),
            transport.get_json::<Value>("/b"),
            transport.get_json::<Value>("/c"),
        );
        for result in [a, b, c] {
            assert!(matches!(result, Err(TransportError::Unauthorized)));
        }
        assert!(store.get().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn later_burst_notifies_again() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let transport = bearer(&server, store);
        let fired = counter(&transport);

        let _ = transport.get_json::<Value>("/a").await;
        let _ = transport.get_json::<Value>("/b").await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn other_failures_keep_credential() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(503).set_body_string("  upstream down  "))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "abc.def.ghi",
        )));
        let transport = bearer(&server, store.clone());
        let fired = counter(&transport);

        let err = transport.get_json::<Value>("/boom").await.unwrap_err();
        match &err {
            TransportError::Status { status, message } => {
                assert_eq!(*status, 503);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_unreachable());

        // Reserve a port, then release it so nothing listens there.
        let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
        let offline = AuthTransport::new(
            &BridgeConfig::new(&format!("http://127.0.0.1:{port}"), "https://example.com")?,
            Arc::new(BearerStrategy::new(store.clone())),
        )?;
        let err = offline.get_json::<Value>("/boom").await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));

        assert_eq!(store.get(), Some(Credential::new("abc.def.ghi")));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn cookie_variant_sends_jar_without_header() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .and(header("cookie", "session=s3cr3t"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let strategy = CookieStrategy::new(Arc::new(Jar::default()));
        strategy.add_cookie("session=s3cr3t", &Url::parse(&server.uri())?);
        let transport = AuthTransport::new(&config(&server), Arc::new(strategy))?;

        transport.post_empty("/auth/logout").await?;

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].headers.get("authorization").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn generic_request_returns_status_and_body() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/messages"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/chat/messages/7"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let transport = bearer(&server, Arc::new(MemoryTokenStore::new()));
        let (status, body) = transport
            .request(Method::POST, "/chat/messages", Some(&json!({"text": "hi"})))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"id": 7}));

        let (status, body) = transport
            .request(Method::DELETE, "/chat/messages/7", None)
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        Ok(())
    }

    #[test]
    fn second_callback_is_ignored() {
        let config = BridgeConfig::new("https://api.example.com", "https://example.com").unwrap();
        let transport = AuthTransport::new(
            &config,
            Arc::new(BearerStrategy::new(Arc::new(MemoryTokenStore::new()))),
        )
        .unwrap();
        let fired = counter(&transport);
        transport.on_session_invalidated(|| panic!("must not be registered"));

        transport.invalidate(0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
