//! HTTP adapter for the secret-issuing backend.
//!
//! One `reqwest::Client` is built per fetcher and reused for every request.
//! The endpoint answers `{ "clientSecret": "..." }`; anything else is a parse
//! error. Requests are never retried here.

use crate::config::{AppConfig, ENV_BASE_URL, FetchMethod};
use crate::domain::ports::SecretFetcher;
use crate::domain::session::{ClientSecret, CustomerId, SessionKind};
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const JSON: &str = "application/json";

/// Connect timeout, kept below the overall request timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The ephemeral description of one secret request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub endpoint: Url,
    pub kind: SessionKind,
    pub customer_id: CustomerId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchBody<'a> {
    customer_id: &'a str,
    kind: SessionKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretResponse {
    client_secret: String,
}

#[derive(Clone)]
pub struct HttpSecretFetcher {
    client: Client,
    config: AppConfig,
}

impl HttpSecretFetcher {
    /// Creates a fetcher for the endpoints in `config`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if no base URL is configured or the HTTP
    /// client cannot be constructed.
    pub fn new(config: AppConfig) -> Result<Self> {
        if config.base_url.is_none() {
            return Err(SessionError::Config(format!(
                "HTTP secret fetcher needs a base URL; set {ENV_BASE_URL}"
            )));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.fetch_timeout))
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| SessionError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn request_for(&self, kind: SessionKind, customer: &CustomerId) -> Result<FetchRequest> {
        Ok(FetchRequest {
            endpoint: self.config.endpoint(kind)?,
            kind,
            customer_id: customer.clone(),
        })
    }

    fn build(&self, request: &FetchRequest) -> reqwest::RequestBuilder {
        let builder = match self.config.method {
            FetchMethod::Get => self.client.get(request.endpoint.clone()),
            FetchMethod::Post => self.client.post(request.endpoint.clone()),
        }
        .header(CONTENT_TYPE, JSON)
        .header(ACCEPT, JSON);

        match self.config.method {
            FetchMethod::Get => {
                builder.query(&[("customer_id", request.customer_id.as_str())])
            }
            FetchMethod::Post => builder.json(&FetchBody {
                customer_id: request.customer_id.as_str(),
                kind: request.kind,
            }),
        }
    }
}

#[async_trait]
impl SecretFetcher for HttpSecretFetcher {
    async fn fetch(&self, kind: SessionKind, customer: &CustomerId) -> Result<ClientSecret> {
        let request = self.request_for(kind, customer)?;
        debug!(
            kind = %kind,
            endpoint = %request.endpoint,
            method = ?self.config.method,
            "Sending secret request"
        );

        let response = self.build(&request).send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(kind = %kind, status = status.as_u16(), bytes = body.len(), "Secret response received");

        decode_secret(status, &body)
    }
}

/// Turns a secret-endpoint response into a secret.
///
/// Non-2xx statuses are server errors regardless of the body. A 2xx body must
/// be a JSON object with a non-empty string `clientSecret`.
pub fn decode_secret(status: StatusCode, body: &[u8]) -> Result<ClientSecret> {
    if !status.is_success() {
        return Err(SessionError::Server {
            status: status.as_u16(),
        });
    }

    let parsed: SecretResponse = serde_json::from_slice(body)
        .map_err(|e| SessionError::Parse(format!("invalid secret response: {e}")))?;
    ClientSecret::new(parsed.client_secret)
}

fn map_transport_error(e: reqwest::Error) -> SessionError {
    if e.is_timeout() {
        SessionError::Network("secret request timed out".to_string())
    } else {
        // Strip the URL; query strings carry the customer id.
        SessionError::Network(e.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_secret() {
        let secret = decode_secret(StatusCode::OK, br#"{"clientSecret":"sec_123"}"#).unwrap();
        assert_eq!(secret.expose(), "sec_123");
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let body = br#"{"clientSecret":"seti_1","customer":"cus_1","livemode":false}"#;
        assert_eq!(decode_secret(StatusCode::CREATED, body).unwrap().expose(), "seti_1");
    }

    #[test]
    fn test_decode_server_error_wins_over_body() {
        let err = decode_secret(
            StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"clientSecret":"sec_123"}"#,
        )
        .unwrap_err();
        assert_eq!(err, SessionError::Server { status: 500 });
    }

    #[test]
    fn test_decode_shape_mismatches_are_parse_errors() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"secret":"sec_123"}"#,
            br#"{"clientSecret":42}"#,
            br#"{"clientSecret":""}"#,
            br#""sec_123""#,
        ];
        for body in cases {
            assert!(
                matches!(decode_secret(StatusCode::OK, body), Err(SessionError::Parse(_))),
                "expected parse error for {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_fetcher_requires_base_url() {
        assert!(matches!(
            HttpSecretFetcher::new(AppConfig::default()),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_post_body_shape() {
        let body = serde_json::to_value(FetchBody {
            customer_id: "cus_1",
            kind: SessionKind::BankLink,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "customerId": "cus_1", "kind": "bank-link" })
        );
    }
}
