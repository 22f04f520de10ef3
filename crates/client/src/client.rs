//! Query API request execution.
//!
//! `QueryClient` orchestrates one logical call: merge the implicit
//! action/version parameters, sign, send through the reusable transport,
//! classify the response, and retry transient server errors with
//! exponential backoff. Retries reuse the same connection and are
//! invisible to the caller except as latency.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use querywire_domain::constants::{ACTION_PARAM, VERSION_PARAM};
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::decode;
use crate::errors::ClientError;
use crate::sign::{signer_for, RequestSigner, SignedRequest};
use crate::transport::{TransportConnection, WireResponse};

/// Signed-request client for one query API endpoint.
///
/// Holds one [`TransportConnection`] for its lifetime and serves many
/// sequential requests over it.
pub struct QueryClient {
    transport: TransportConnection,
    signer: Arc<dyn RequestSigner>,
    config: ConnectionConfig,
}

impl QueryClient {
    /// Build the client, its transport and its signer from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the transport cannot be built.
    pub fn new(config: ConnectionConfig) -> Result<Self, ClientError> {
        let transport = TransportConnection::new(
            config.endpoint.clone(),
            config.proxy.clone(),
            config.timeout,
            config.validate_certs,
        )?;
        let signer = signer_for(config.signature_scheme, config.credentials.clone());

        Ok(Self { transport, signer, config })
    }

    /// The underlying transport connection.
    pub fn transport(&self) -> &TransportConnection {
        &self.transport
    }

    /// Execute one signed query API call.
    ///
    /// The action identifier and configured API version are merged with
    /// the caller's parameters before signing. Transient (5xx) responses
    /// are retried up to the configured attempt budget; any other
    /// response terminates the loop and is returned as-is, including
    /// application-level errors. When the budget is exhausted the last
    /// received response is returned for the caller to decode.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` for connection-level faults
    /// (never retried unless `retry_transport_faults` is set) and
    /// signing/contract errors unchanged.
    pub async fn make_request(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
        path: &str,
        method: &str,
    ) -> Result<WireResponse, ClientError> {
        self.make_request_with_headers(action, params, path, method, &[]).await
    }

    /// [`make_request`](Self::make_request) with extra caller headers
    /// merged over the wire defaults.
    pub async fn make_request_with_headers(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
        path: &str,
        method: &str,
        headers: &[(String, String)],
    ) -> Result<WireResponse, ClientError> {
        let attempts = self.config.max_attempts.max(1);

        for attempt in 0..attempts {
            // Signed fresh per attempt: the signature covers a new timestamp.
            let signed = self.build_signed(action, params, path, method)?;

            debug!(attempt = attempt + 1, action, method, path, "executing query request");

            match self.transport.send(method, path, &signed.params, headers).await {
                Ok(response) => {
                    if response.is_server_error() && attempt + 1 < attempts {
                        warn!(
                            attempt = attempt + 1,
                            status = response.status,
                            action,
                            "transient server error, retrying"
                        );
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(err @ ClientError::Transport(_))
                    if self.config.retry_transport_faults && attempt + 1 < attempts =>
                {
                    warn!(attempt = attempt + 1, error = %err, action, "transport fault, retrying");
                    self.sleep_with_backoff(attempt + 1).await;
                }
                Err(err) => return Err(err),
            }
        }

        Err(ClientError::Transport(
            "request loop exhausted without producing a result".to_string(),
        ))
    }

    /// Execute a status call and extract its status text.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Decode` when the body is empty or carries no
    /// status element, and the typed server error for error statuses.
    pub async fn get_status(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
        path: &str,
    ) -> Result<String, ClientError> {
        let response = self.make_request(action, params, path, "GET").await?;
        decode::status_text(&response)
    }

    fn build_signed(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
        path: &str,
        method: &str,
    ) -> Result<SignedRequest, ClientError> {
        let mut merged = params.clone();
        merged.insert(ACTION_PARAM.to_string(), action.to_string());
        merged.insert(VERSION_PARAM.to_string(), self.config.api_version.clone());

        let mut request = SignedRequest {
            method: method.to_uppercase(),
            host: self.transport.endpoint().authority(),
            path: self.transport.request_path(path),
            headers: Vec::new(),
            params: merged,
            timestamp: Utc::now(),
        };
        self.signer.sign(&mut request)?;

        Ok(request)
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        let multiplier = 1u32 << shift;
        self.config.base_backoff.saturating_mul(multiplier)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use querywire_domain::constants::{
        ACCESS_KEY_PARAM, SIGNATURE_METHOD_PARAM, SIGNATURE_PARAM, SIGNATURE_VERSION_PARAM,
    };
    use querywire_domain::{Credentials, Endpoint};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> ConnectionConfig {
        let url = url::Url::parse(&server.uri()).unwrap();
        let endpoint = Endpoint::new(url.host_str().unwrap().to_string())
            .with_secure(false)
            .with_port(url.port().unwrap());
        ConnectionConfig::new(Credentials::new("access_key", "secret"), endpoint, "2024-01-01")
            .with_base_backoff(Duration::from_millis(10))
    }

    fn parse_form(body: &[u8]) -> BTreeMap<String, String> {
        url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[tokio::test]
    async fn single_command_carries_auth_and_caller_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"test\": \"secure\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        let params: BTreeMap<String, String> =
            [("par1", "foo"), ("par2", "baz")]
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();

        let response = client.make_request("myCmd", &params, "/", "POST").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"test\": \"secure\"}");

        let requests = server.received_requests().await.unwrap();
        let body = parse_form(&requests[0].body);
        assert_eq!(body.get(ACTION_PARAM).map(String::as_str), Some("myCmd"));
        assert_eq!(body.get(VERSION_PARAM).map(String::as_str), Some("2024-01-01"));
        assert_eq!(body.get(ACCESS_KEY_PARAM).map(String::as_str), Some("access_key"));
        assert_eq!(body.get(SIGNATURE_VERSION_PARAM).map(String::as_str), Some("2"));
        assert_eq!(body.get(SIGNATURE_METHOD_PARAM).map(String::as_str), Some("HmacSHA256"));
        assert!(body.contains_key(SIGNATURE_PARAM));
        assert_eq!(body.get("par1").map(String::as_str), Some("foo"));
        assert_eq!(body.get("par2").map(String::as_str), Some("baz"));
    }

    #[tokio::test]
    async fn sequential_calls_do_not_leak_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"test\": \"secure\"}"))
            .expect(2)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();

        let first: BTreeMap<String, String> =
            [("par1", "foo"), ("par2", "baz")]
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
        let second: BTreeMap<String, String> =
            [("par3", "bar"), ("par4", "narf")]
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();

        client.make_request("myCmd1", &first, "/", "POST").await.unwrap();
        client.make_request("myCmd2", &second, "/", "POST").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body1 = parse_form(&requests[0].body);
        let body2 = parse_form(&requests[1].body);

        assert_eq!(body1.get("par1").map(String::as_str), Some("foo"));
        assert_eq!(body1.get("par2").map(String::as_str), Some("baz"));
        assert!(!body1.contains_key("par3"));

        assert_eq!(body2.get("par3").map(String::as_str), Some("bar"));
        assert_eq!(body2.get("par4").map(String::as_str), Some("narf"));
        assert!(!body2.contains_key("par1"));
    }

    #[tokio::test]
    async fn transient_failure_then_success_within_budget() {
        let server = MockServer::start().await;
        let attempts = std::sync::Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("POST"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(500).set_body_string("{'test': 'fail'}")
                } else {
                    ResponseTemplate::new(200).set_body_string("{'test': 'success'}")
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        let response = client
            .make_request("myCmd1", &BTreeMap::new(), "/temp_fail/", "POST")
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{'test': 'success'}");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string("<code>InvalidAction</code><message>nope</message>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        let response =
            client.make_request("myCmd", &BTreeMap::new(), "/", "POST").await.unwrap();

        assert_eq!(response.status, 400);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);

        match decode::decode(&response) {
            Err(ClientError::Server { status: 400, code, .. }) => {
                assert_eq!(code, "InvalidAction");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_last_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("{'test': 'fail'}"))
            .expect(3)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        let response =
            client.make_request("myCmd", &BTreeMap::new(), "/", "POST").await.unwrap();

        assert_eq!(response.status, 503);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(decode::decode(&response).unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn each_attempt_is_signed_fresh() {
        let server = MockServer::start().await;
        let attempts = std::sync::Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("POST"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200).set_body_string("ok")
                }
            })
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        client.make_request("myCmd", &BTreeMap::new(), "/", "POST").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let body1 = parse_form(&requests[0].body);
        let body2 = parse_form(&requests[1].body);
        // Both attempts carry a complete signature over their own params.
        assert!(body1.contains_key(SIGNATURE_PARAM));
        assert!(body2.contains_key(SIGNATURE_PARAM));
    }

    #[tokio::test]
    async fn transport_faults_are_not_retried_by_default() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Endpoint::new("127.0.0.1").with_secure(false).with_port(port);
        let config = ConnectionConfig::new(
            Credentials::new("access_key", "secret"),
            endpoint,
            "2024-01-01",
        )
        .with_base_backoff(Duration::from_millis(5));

        let client = QueryClient::new(config).unwrap();
        let result = client.make_request("myCmd", &BTreeMap::new(), "/", "POST").await;
        assert!(matches!(result, Err(ClientError::Transport(_))));
    }

    #[tokio::test]
    async fn get_status_extracts_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<status>ok</status>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        let status = client.get_status("getStatus", &BTreeMap::new(), "status").await.unwrap();
        assert_eq!(status, "ok");
    }

    #[tokio::test]
    async fn get_status_blank_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        let result = client.get_status("getStatus", &BTreeMap::new(), "status").await;
        assert!(matches!(result, Err(ClientError::Decode(_))));
    }

    #[tokio::test]
    async fn get_status_error_status_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("<status>error</status>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = QueryClient::new(config_for(&server)).unwrap();
        let result = client.get_status("getStatus", &BTreeMap::new(), "status").await;
        assert!(matches!(result, Err(ClientError::Server { status: 400, .. })));
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let config = ConnectionConfig::new(
            Credentials::new("access_key", "secret"),
            Endpoint::new("api.example.com"),
            "2024-01-01",
        )
        .with_base_backoff(Duration::from_millis(100));
        let client = QueryClient::new(config).unwrap();

        assert_eq!(client.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(client.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(client.backoff_delay(3), Duration::from_millis(400));
        // Shift is capped so the delay stays bounded.
        assert_eq!(client.backoff_delay(40), Duration::from_millis(100 * 256));
    }
}
