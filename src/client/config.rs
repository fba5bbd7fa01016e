//! Gateway configuration and its builder.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use gateway_rpc::{ClientMode, GatewayConfig, ReconnectPolicy};
//!
//! # fn example() -> gateway_rpc::Result<()> {
//! let config = GatewayConfig::builder()
//!     .url("ws://127.0.0.1:18789")
//!     .token("secret")
//!     .mode(ClientMode::Api)
//!     .request_timeout(Duration::from_secs(60))
//!     .reconnect(ReconnectPolicy::default().with_max_attempts(5))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{AuthParams, ClientInfo, ClientMode, ConnectParams, PROTOCOL_VERSION};
use crate::transport::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default time to open the socket.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time to complete the handshake.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-call timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest accepted timeout.
const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Default pending-call limit.
const DEFAULT_MAX_PENDING: usize = 100;

// ============================================================================
// GatewayConfig
// ============================================================================

/// Validated gateway configuration.
///
/// Use [`GatewayConfig::builder()`] to create one.
#[derive(Clone)]
pub struct GatewayConfig {
    url: Url,
    token: String,
    client: ClientInfo,
    min_protocol: u32,
    max_protocol: u32,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    request_timeout: Duration,
    max_pending: usize,
    reconnect: ReconnectPolicy,
}

impl GatewayConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::new()
    }

    /// Returns the gateway URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the client descriptor sent in the handshake.
    #[inline]
    #[must_use]
    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Returns the supported protocol range `(min, max)`, inclusive.
    #[inline]
    #[must_use]
    pub fn protocol_range(&self) -> (u32, u32) {
        (self.min_protocol, self.max_protocol)
    }

    /// Returns the socket open timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the handshake timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Returns the default per-call timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the pending-call limit per connection.
    #[inline]
    #[must_use]
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect(&self) -> &ReconnectPolicy {
        &self.reconnect
    }

    /// Builds the `connect` request parameters.
    pub(crate) fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            min_protocol: self.min_protocol,
            max_protocol: self.max_protocol,
            client: self.client.clone(),
            auth: AuthParams {
                token: self.token.clone(),
            },
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url.as_str())
            .field("token", &"<redacted>")
            .field("client", &self.client)
            .field("protocol", &(self.min_protocol..=self.max_protocol))
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_pending", &self.max_pending)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

// ============================================================================
// GatewayConfigBuilder
// ============================================================================

/// Builder for [`GatewayConfig`].
///
/// `url` and `token` are required; everything else has a default.
#[derive(Default, Clone)]
pub struct GatewayConfigBuilder {
    url: Option<String>,
    token: Option<String>,
    client: ClientInfo,
    protocol_range: Option<(u32, u32)>,
    connect_timeout: Option<Duration>,
    handshake_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_pending: Option<usize>,
    reconnect: Option<ReconnectPolicy>,
}

impl GatewayConfigBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the gateway URL (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the bearer token sent in the handshake.
    #[inline]
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the client identity.
    #[inline]
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client.id = id.into();
        self
    }

    /// Sets the client version.
    #[inline]
    #[must_use]
    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.client.version = version.into();
        self
    }

    /// Sets the platform string.
    #[inline]
    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.client.platform = platform.into();
        self
    }

    /// Sets the usage mode.
    #[inline]
    #[must_use]
    pub fn mode(mut self, mode: ClientMode) -> Self {
        self.client.mode = mode;
        self
    }

    /// Replaces the whole client descriptor.
    #[inline]
    #[must_use]
    pub fn client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    /// Sets the supported protocol range, inclusive.
    #[inline]
    #[must_use]
    pub fn protocol_range(mut self, min: u32, max: u32) -> Self {
        self.protocol_range = Some((min, max));
        self
    }

    /// Sets the socket open timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Sets the default per-call timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the pending-call limit per connection.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, limit: usize) -> Self {
        self.max_pending = Some(limit);
        self
    }

    /// Sets the reconnect policy used by sessions.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = Some(policy);
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL or token is missing
    /// - [`Error::Config`] if the URL is not a `ws`/`wss` URL
    /// - [`Error::Config`] if the protocol range, a timeout (zero or over a
    ///   day), the pending limit or the reconnect policy is invalid
    pub fn build(self) -> Result<GatewayConfig> {
        let url = self.validate_url()?;
        let token = self.validate_token()?;
        let (min_protocol, max_protocol) = self.validate_protocol_range()?;

        let connect_timeout = Self::validate_timeout(
            "connect timeout",
            self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        )?;
        let handshake_timeout = Self::validate_timeout(
            "handshake timeout",
            self.handshake_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
        )?;
        let request_timeout = Self::validate_timeout(
            "request timeout",
            self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        )?;

        let max_pending = self.max_pending.unwrap_or(DEFAULT_MAX_PENDING);
        if max_pending == 0 {
            return Err(Error::config("max_pending must be at least 1"));
        }

        let reconnect = self.reconnect.unwrap_or_default();
        reconnect.validate()?;

        Ok(GatewayConfig {
            url,
            token,
            client: self.client,
            min_protocol,
            max_protocol,
            connect_timeout,
            handshake_timeout,
            request_timeout,
            max_pending,
            reconnect,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl GatewayConfigBuilder {
    /// Validates the gateway URL.
    fn validate_url(&self) -> Result<Url> {
        let raw = self.url.as_deref().ok_or_else(|| {
            Error::config(
                "Gateway URL is required. Use .url() to set it.\n\
                 Example: GatewayConfig::builder().url(\"ws://127.0.0.1:18789\")",
            )
        })?;

        let url = Url::parse(raw)
            .map_err(|e| Error::config(format!("Invalid gateway URL '{raw}': {e}")))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::config(format!(
                "Gateway URL must use ws:// or wss://, got '{other}://'"
            ))),
        }
    }

    /// Validates the token.
    fn validate_token(&self) -> Result<String> {
        match self.token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
            Some(_) => Err(Error::config("Gateway token must not be empty")),
            None => Err(Error::config(
                "Gateway token is required. Use .token() to set it.",
            )),
        }
    }

    /// Validates the protocol range.
    fn validate_protocol_range(&self) -> Result<(u32, u32)> {
        let (min, max) = self
            .protocol_range
            .unwrap_or((PROTOCOL_VERSION, PROTOCOL_VERSION));

        if min > max {
            return Err(Error::config(format!(
                "Protocol range is empty: min {min} > max {max}"
            )));
        }
        Ok((min, max))
    }

    /// Validates a timeout against `(0, MAX_TIMEOUT]`.
    fn validate_timeout(name: &str, value: Duration) -> Result<Duration> {
        if value.is_zero() {
            Err(Error::config(format!("{name} must be non-zero")))
        } else if value > MAX_TIMEOUT {
            Err(Error::config(format!(
                "{name} of {value:?} exceeds the {MAX_TIMEOUT:?} limit"
            )))
        } else {
            Ok(value)
        }
    }
}

impl fmt::Debug for GatewayConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfigBuilder")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("client", &self.client)
            .field("protocol_range", &self.protocol_range)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
