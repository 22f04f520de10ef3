//! Reusable proxy-aware transport.
//!
//! A `TransportConnection` owns the HTTP client(s) for one endpoint and
//! serves many sequential sends. Proxy bypass is evaluated per send
//! against the exclusion list captured at construction, and each send
//! builds its wire body solely from the parameters passed to it.

use std::collections::BTreeMap;
use std::time::Duration;

use querywire_domain::{Endpoint, ProxyConfig};
use reqwest::{header, Client, Method};
use tracing::debug;

use crate::errors::ClientError;
use crate::params::form_encode;

/// Raw wire response, consumed once by the decoder
#[derive(Debug)]
pub struct WireResponse {
    pub status: u16,
    pub headers: header::HeaderMap,
    pub body: String,
}

impl WireResponse {
    /// 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 5xx statuses, the transient-retry range
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Persistent connection to one endpoint.
///
/// Safe for sequential reuse within one logical client. Concurrent calls
/// from multiple tasks sharing one instance need external coordination;
/// use one connection per concurrent caller instead.
pub struct TransportConnection {
    endpoint: Endpoint,
    proxy: Option<ProxyConfig>,
    direct: Client,
    proxied: Option<Client>,
}

impl TransportConnection {
    /// Build the connection and its underlying HTTP client(s).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if a client cannot be constructed or
    /// the proxy specification is invalid.
    pub fn new(
        endpoint: Endpoint,
        proxy: Option<ProxyConfig>,
        timeout: Duration,
        validate_certs: bool,
    ) -> Result<Self, ClientError> {
        let direct = client_builder(timeout, validate_certs)
            .no_proxy()
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {e}")))?;

        let proxied = proxy
            .as_ref()
            .map(|config| {
                let mut upstream = reqwest::Proxy::all(config.url()).map_err(|e| {
                    ClientError::Config(format!("Invalid proxy {}: {e}", config.url()))
                })?;
                if let (Some(user), Some(pass)) = (&config.user, &config.pass) {
                    upstream = upstream.basic_auth(user, pass);
                }
                client_builder(timeout, validate_certs)
                    .proxy(upstream)
                    .build()
                    .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {e}")))
            })
            .transpose()?;

        Ok(Self { endpoint, proxy, direct, proxied })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Final wire path for a caller-supplied path.
    ///
    /// Guarantees a leading slash but preserves the path verbatim
    /// otherwise: repeated internal or leading slashes are never
    /// collapsed, so `folder//image.jpg` becomes `/folder//image.jpg` and
    /// `///folder////image.jpg` is left unchanged.
    pub fn request_path(&self, path: &str) -> String {
        let prefix = self.endpoint.base_path.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{prefix}{path}")
        } else {
            format!("{prefix}/{path}")
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.base_url(), self.request_path(path))
    }

    /// Pick the client for this send: the proxy is bypassed when the
    /// target host matches the exclusion list, for this call only.
    fn client_for_send(&self) -> &Client {
        match (&self.proxied, &self.proxy) {
            (Some(proxied), Some(config)) => {
                if config.bypasses(&self.endpoint.host) {
                    debug!(host = %self.endpoint.host, "proxy bypassed by no_proxy match");
                    &self.direct
                } else {
                    proxied
                }
            }
            _ => &self.direct,
        }
    }

    /// Send one request and await the response.
    ///
    /// Parameters travel as a form-encoded body for methods that carry
    /// one, and as the query string otherwise. Headers are merged from
    /// the caller on top of the wire defaults.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` for connection-level faults and
    /// `ClientError::SerializationContract` for an unusable method token.
    pub async fn send(
        &self,
        method: &str,
        path: &str,
        params: &BTreeMap<String, String>,
        headers: &[(String, String)],
    ) -> Result<WireResponse, ClientError> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| ClientError::SerializationContract(format!("Invalid HTTP method: {method}")))?;

        let encoded = form_encode(params);
        let has_body =
            method == Method::POST || method == Method::PUT || method == Method::PATCH;

        let url = if has_body || encoded.is_empty() {
            self.url_for(path)
        } else {
            format!("{}?{}", self.url_for(path), encoded)
        };

        debug!(%method, %url, "sending wire request");

        let mut request = self.client_for_send().request(method, &url);
        if has_body {
            request = request
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encoded);
        }
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (
                header::HeaderName::from_bytes(name.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                request = request.header(name, value);
            }
        }

        let response = request.send().await.map_err(ClientError::from)?;

        let status = response.status();
        let response_headers = response.headers().clone();
        debug!(%status, %url, "received wire response");

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("Failed to read response body: {e}")))?;

        Ok(WireResponse { status: status.as_u16(), headers: response_headers, body })
    }
}

fn client_builder(timeout: Duration, validate_certs: bool) -> reqwest::ClientBuilder {
    let mut builder = Client::builder().timeout(timeout);
    if !validate_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder
}
