//! # Reqwest Transport
//!
//! `HttpTransport` over `reqwest`. A client is built per exchange so the
//! current TLS identity is always the one presented. Bodies are kept as
//! received; decoding happens in `OutboundResponse::from_wire`. Redirects
//! are returned to the caller, never followed.

use crate::domain::{HttpMethod, OutboundRequest, OutboundResponse, TlsIdentity, TransportError};
use crate::ports::HttpTransport;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Identity, Method};
use std::time::Duration;
use tracing::debug;

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    timeout: Duration,
}

impl ReqwestTransport {
    /// Transport with a per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client(&self, identity: Option<&TlsIdentity>) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .redirect(Policy::none());
        if let Some(identity) = identity {
            let identity = Identity::from_pem(&identity.combined_pem())
                .map_err(|e| TransportError::InvalidIdentity(e.to_string()))?;
            builder = builder.identity(identity);
        }
        builder
            .build()
            .map_err(|e| TransportError::InvalidIdentity(e.to_string()))
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Http(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        identity: Option<&TlsIdentity>,
    ) -> Result<OutboundResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut builder = self.client(identity)?.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(content_type) = request.body.content_type() {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(request.body.serialize());
        }

        debug!(url = %request.url, method = %request.method, "[fg-04] Sending request");
        let response = builder.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?;

        Ok(OutboundResponse::from_wire(status, headers, body.to_vec()))
    }
}
