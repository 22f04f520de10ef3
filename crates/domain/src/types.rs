//! Common data types used throughout the client

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};

/// API credentials for request signing
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub security_token: Option<String>,
}

impl Credentials {
    /// Create credentials without a security token
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            security_token: None,
        }
    }

    /// Attach a temporary security token
    #[must_use]
    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }
}

// The secret must never end up in logs, so Debug redacts it.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("security_token", &self.security_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Remote endpoint a connection targets
///
/// Immutable once a connection is established. The scheme is derived from
/// `is_secure`; the port defaults to 443/80 when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: Option<u16>,
    pub is_secure: bool,
    pub base_path: String,
}

impl Endpoint {
    /// Create a secure endpoint with default port and root base path
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), port: None, is_secure: true, base_path: "/".to_string() }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_secure(mut self, is_secure: bool) -> Self {
        self.is_secure = is_secure;
        self
    }

    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// URL scheme derived from the secure flag
    pub fn scheme(&self) -> &'static str {
        if self.is_secure {
            "https"
        } else {
            "http"
        }
    }

    /// Default port for the derived scheme
    pub fn default_port(&self) -> u16 {
        if self.is_secure {
            DEFAULT_HTTPS_PORT
        } else {
            DEFAULT_HTTP_PORT
        }
    }

    /// Effective port, falling back to the scheme default
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.default_port())
    }

    /// `host[:port]` authority; the port is rendered only when it differs
    /// from the scheme default
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) if port != self.default_port() => format!("{}:{}", self.host, port),
            _ => self.host.clone(),
        }
    }

    /// `scheme://host[:port]` base URL for this endpoint
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.authority())
    }
}

/// Proxy settings resolved once at connection construction
///
/// The `no_proxy` list holds host patterns that suppress proxying for
/// matching targets regardless of the explicit proxy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub no_proxy: Vec<String>,
}

impl ProxyConfig {
    /// Create a proxy config without credentials or exclusions
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, user: None, pass: None, no_proxy: Vec::new() }
    }

    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.pass = Some(pass.into());
        self
    }

    #[must_use]
    pub fn with_no_proxy(mut self, patterns: Vec<String>) -> Self {
        self.no_proxy = patterns;
        self
    }

    /// Proxy URL in `http://host:port` form
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Whether the given target host matches the no-proxy exclusion list
    ///
    /// A pattern matches the host exactly or as a domain suffix, so
    /// `example.com` covers both `example.com` and `api.example.com`.
    /// A bare `*` disables proxying entirely.
    pub fn bypasses(&self, host: &str) -> bool {
        self.no_proxy.iter().any(|pattern| {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return false;
            }
            if pattern == "*" {
                return true;
            }
            let domain = pattern.strip_prefix('.').unwrap_or(pattern);
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }
}
