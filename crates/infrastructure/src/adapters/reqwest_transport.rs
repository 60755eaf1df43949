//! HTTP transport implemented with reqwest.
//!
//! Resolves request paths against the configured API base URL and sends
//! them as they are. Credentials are attached upstream by the pipeline.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use tracing::debug;
use tradepoint_application::ports::{Transport, TransportError};
use tradepoint_domain::{ApiRequest, ApiResponse, HttpMethod, SessionSettings};

/// reqwest-backed [`Transport`].
pub struct ReqwestTransport {
    client: Client,
    settings: SessionSettings,
}

impl ReqwestTransport {
    /// Creates a transport for the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn new(settings: SessionSettings) -> Result<Self, TransportError> {
        settings
            .validate()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let client = Client::builder()
            .user_agent(concat!("tradepoint/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self { client, settings })
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub const fn with_client(client: Client, settings: SessionSettings) -> Self {
        Self { client, settings }
    }

    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Absolute URL for a request, query included.
    fn url(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let mut url = self
            .settings
            .endpoint_url(&request.path)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    fn map_error(error: &reqwest::Error, timeout_ms: u64) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout { timeout_ms };
        }
        if error.is_connect() {
            return TransportError::ConnectionFailed(error.to_string());
        }
        if error.is_body() || error.is_decode() {
            return TransportError::Body(error.to_string());
        }
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(request)?;
        let timeout_ms = self.settings.request_timeout_ms;

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url)
            .header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&e, timeout_ms))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(&e, timeout_ms))?
            .to_vec();

        debug!(
            method = %request.method,
            path = %request.path,
            status,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
        Ok(ApiResponse::new(status, headers, body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transport(base: &str) -> ReqwestTransport {
        ReqwestTransport::new(SessionSettings {
            api_base_url: base.to_string(),
            ..SessionSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_to_reqwest_method() {
        assert_eq!(ReqwestTransport::to_reqwest_method(HttpMethod::Get), Method::GET);
        assert_eq!(ReqwestTransport::to_reqwest_method(HttpMethod::Patch), Method::PATCH);
        assert_eq!(ReqwestTransport::to_reqwest_method(HttpMethod::Delete), Method::DELETE);
    }

    #[test]
    fn test_url_joins_base_path_and_query() {
        let transport = transport("https://shop.example.com/api");
        let request = ApiRequest::get("/inventory/stock/").with_query("page", "2");

        let url = transport.url(&request).unwrap();

        assert_eq!(url.as_str(), "https://shop.example.com/api/inventory/stock/?page=2");
    }

    #[test]
    fn test_relative_path_is_rejected() {
        let transport = transport("https://shop.example.com/api");
        let result = transport.url(&ApiRequest::get("inventory/"));
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = ReqwestTransport::new(SessionSettings {
            api_base_url: "ftp://files.example.com".to_string(),
            ..SessionSettings::default()
        });
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_connection_failure() {
        let transport = transport("http://127.0.0.1:9");
        let result = transport.execute(&ApiRequest::get("/core/users/me/")).await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed(_) | TransportError::Other(_))
        ));
    }
}
