//! ADT session management.
//!
//! [`SessionClient`] owns the single authenticated connection of one CLI
//! invocation: it logs in with basic auth, keeps the cookie-backed
//! session alive through the transport's cookie jar, caches the CSRF
//! token, and recovers transparently — exactly once each — from a CSRF
//! rejection (token refresh) or a session expiry (re-login). Any second
//! failure propagates to the caller unchanged.

use reqwest::{Method, Response, StatusCode};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Protocol literals for CSRF and session handling. These are
/// version-dependent server conventions kept in one place so they can
/// be confirmed against the target ADT release.
pub mod consts {
    /// Header carrying the CSRF token in both directions.
    pub const CSRF_TOKEN_HEADER: &str = "x-csrf-token";
    /// Sentinel request value asking the server to issue a token.
    pub const CSRF_FETCH: &str = "fetch";
    /// Sentinel response value marking a rejected token.
    pub const CSRF_REQUIRED: &str = "required";
    /// Header switching the ADT session to stateful mode (lock/unlock).
    pub const SESSION_TYPE_HEADER: &str = "X-sap-adt-sessiontype";
    pub const SESSION_STATEFUL: &str = "stateful";
    /// Mandatory SAP logical client routing parameter.
    pub const SAP_CLIENT_PARAM: &str = "sap-client";
    /// Lightweight resource used for login and token fetches.
    pub const DISCOVERY_PATH: &str = "core/discovery";
    pub const DISCOVERY_ACCEPT: &str = "application/atomsvc+xml";
    /// Root of the ADT resource tree.
    pub const ADT_ROOT: &str = "/sap/bc/adt";
}

/// Low-level HTTP transport: TLS options, timeout, cookie jar.
#[derive(Debug, Clone)]
pub struct Transport {
    client: reqwest::Client,
}

impl Transport {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("abapcli/{}", crate::VERSION))
            .cookie_store(true)
            .timeout(config.http_timeout)
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }
}

/// Lifecycle of the cached CSRF token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    Unset,
    Fetched,
    Expired,
}

/// One HTTP request against the ADT tree. Created per call; the session
/// layer re-validates the CSRF token before any retry, so an envelope
/// never pins a stale token.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: Method,
    /// Path relative to the ADT root, e.g. `oo/classes/zcl_demo`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    /// Request a stateful ADT session (needed around lock/unlock).
    pub stateful: bool,
    pub body: Option<String>,
}

impl RequestEnvelope {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            accept: None,
            content_type: None,
            stateful: false,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Mutating requests must carry the CSRF token.
    fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::OPTIONS)
    }
}

/// Stateful client for one authenticated ADT session.
pub struct SessionClient {
    transport: Transport,
    base_url: String,
    sap_client: String,
    user: String,
    password: String,
    csrf_token: Option<String>,
    token_state: TokenState,
    logged_in: bool,
}

impl SessionClient {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let transport = Transport::new(config)?;

        Ok(Self {
            transport,
            base_url: config.base_url(),
            sap_client: config.client.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            csrf_token: None,
            token_state: TokenState::Unset,
            logged_in: false,
        })
    }

    /// User the session authenticates as. Used as the default
    /// responsible user for created objects.
    pub fn user(&self) -> &str {
        &self.user
    }

    fn adt_url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, consts::ADT_ROOT, path)
    }

    /// Guarantee the next request goes out with valid cookies and a
    /// cached CSRF token. Bad credentials fail with
    /// [`Error::Authentication`] and are never retried.
    pub async fn ensure_authenticated(&mut self) -> Result<()> {
        if self.logged_in {
            return Ok(());
        }
        self.login().await
    }

    /// Return a valid CSRF token, fetching one if none is cached or a
    /// refresh is forced. A fetch response without the token header is a
    /// server contract violation.
    pub async fn csrf_token(&mut self, force_refresh: bool) -> Result<String> {
        if !force_refresh && self.token_state == TokenState::Fetched {
            if let Some(token) = &self.csrf_token {
                return Ok(token.clone());
            }
        }
        self.fetch_token().await
    }

    /// Log in: basic auth against the discovery document, which also
    /// seeds session cookies and the first CSRF token.
    async fn login(&mut self) -> Result<()> {
        debug!(user = %self.user, "Logging in to ADT");

        let response = self
            .transport
            .request(Method::GET, &self.adt_url(consts::DISCOVERY_PATH))
            .query(&[(consts::SAP_CLIENT_PARAM, self.sap_client.as_str())])
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", consts::DISCOVERY_ACCEPT)
            .header(consts::CSRF_TOKEN_HEADER, consts::CSRF_FETCH)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::authentication(&self.user, "invalid credentials"));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::adt(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                body,
            ));
        }

        self.cache_token_from(&response);
        if self.csrf_token.is_none() {
            return Err(Error::Protocol(
                "login response carried no CSRF token header".to_string(),
            ));
        }

        self.logged_in = true;
        debug!(user = %self.user, "ADT session established");
        Ok(())
    }

    /// Fetch a fresh token on the already established session.
    async fn fetch_token(&mut self) -> Result<String> {
        self.ensure_authenticated().await?;

        let response = self
            .transport
            .request(Method::GET, &self.adt_url(consts::DISCOVERY_PATH))
            .query(&[(consts::SAP_CLIENT_PARAM, self.sap_client.as_str())])
            .header("Accept", consts::DISCOVERY_ACCEPT)
            .header(consts::CSRF_TOKEN_HEADER, consts::CSRF_FETCH)
            .send()
            .await?;

        self.cache_token_from(&response);
        match &self.csrf_token {
            Some(token) if self.token_state == TokenState::Fetched => Ok(token.clone()),
            _ => Err(Error::Protocol(
                "token fetch response carried no CSRF token header".to_string(),
            )),
        }
    }

    fn cache_token_from(&mut self, response: &Response) {
        if let Some(token) = response
            .headers()
            .get(consts::CSRF_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if !token.eq_ignore_ascii_case(consts::CSRF_REQUIRED) {
                self.csrf_token = Some(token.to_string());
                self.token_state = TokenState::Fetched;
            }
        }
    }

    /// Execute one request. CSRF rejections and session expiry are each
    /// recovered exactly once; everything else propagates unchanged.
    pub async fn execute(&mut self, envelope: &RequestEnvelope) -> Result<Response> {
        self.ensure_authenticated().await?;

        match self.send_once(envelope).await {
            Ok(response) => Ok(response),
            Err(Error::CsrfRejected) => {
                debug!(path = %envelope.path, "CSRF token rejected, refreshing once");
                self.fetch_token().await?;
                self.send_once(envelope).await
            }
            Err(Error::SessionExpired) => {
                debug!(path = %envelope.path, "ADT session expired, re-authenticating once");
                self.login().await?;
                self.send_once(envelope).await
            }
            Err(e) => Err(e),
        }
    }

    async fn send_once(&mut self, envelope: &RequestEnvelope) -> Result<Response> {
        let mut request = self
            .transport
            .request(envelope.method.clone(), &self.adt_url(&envelope.path))
            .query(&[(consts::SAP_CLIENT_PARAM, self.sap_client.as_str())]);

        for (key, value) in &envelope.query {
            request = request.query(&[(key.as_str(), value.as_str())]);
        }
        if let Some(accept) = &envelope.accept {
            request = request.header("Accept", accept);
        }
        if let Some(content_type) = &envelope.content_type {
            request = request.header("Content-Type", content_type);
        }
        if envelope.stateful {
            request = request.header(consts::SESSION_TYPE_HEADER, consts::SESSION_STATEFUL);
        }
        if envelope.is_mutating() {
            let token = self.csrf_token(false).await?;
            request = request.header(consts::CSRF_TOKEN_HEADER, token);
        }
        if let Some(body) = &envelope.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        self.classify(response).await
    }

    /// Map the raw response to the session-level error vocabulary and
    /// pick up rotated tokens along the way.
    async fn classify(&mut self, response: Response) -> Result<Response> {
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            let rejected = response
                .headers()
                .get(consts::CSRF_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case(consts::CSRF_REQUIRED))
                .unwrap_or(false);
            if rejected {
                self.token_state = TokenState::Expired;
                return Err(Error::CsrfRejected);
            }
        }

        if status == StatusCode::UNAUTHORIZED {
            self.logged_in = false;
            return Err(Error::SessionExpired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::adt(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown"),
                body,
            ));
        }

        self.cache_token_from(&response);
        Ok(response)
    }
}
