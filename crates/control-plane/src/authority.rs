use crate::keygen::SigningRequest;
use crate::metrics;
use async_trait::async_trait;
use cfcert_common::{AuthorityCredential, DomainName, ProvisionError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const ORIGIN_REQUEST_TYPE: &str = "origin-ecc";
pub const REQUESTED_VALIDITY_DAYS: u32 = 5475;

const SERVICE_KEY_HEADER: &str = "X-Auth-User-Service-Key";

/// PEM certificate material returned by the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    pem: String,
}

impl SignedCertificate {
    pub fn new(pem: impl Into<String>) -> Self {
        Self { pem: pem.into() }
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }
}

#[async_trait]
pub trait OriginAuthority: Send + Sync {
    /// Single attempt; the caller decides what a failure means.
    async fn sign(&self, request: &SigningRequest, domain: &DomainName) -> Result<SignedCertificate>;
}

#[derive(Debug, Serialize)]
struct OriginCertRequest<'a> {
    csr: &'a str,
    hostnames: [&'a str; 1],
    request_type: &'a str,
    requested_validity: u32,
}

#[derive(Debug, Deserialize)]
struct OriginCertResponse {
    success: bool,
    #[serde(default)]
    result: Option<OriginCertResult>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct OriginCertResult {
    #[serde(default)]
    certificate: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Clone)]
pub struct CloudflareOriginClient {
    http: Client,
    base_url: String,
    credential: AuthorityCredential,
}

impl CloudflareOriginClient {
    pub fn new(http: Client, base_url: impl Into<String>, credential: AuthorityCredential) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    async fn submit(&self, request: &SigningRequest, domain: &DomainName) -> Result<SignedCertificate> {
        let body = OriginCertRequest {
            csr: request.pem(),
            hostnames: [domain.as_str()],
            request_type: ORIGIN_REQUEST_TYPE,
            requested_validity: REQUESTED_VALIDITY_DAYS,
        };

        let url = format!("{}/certificates", self.base_url);
        let builder = self.http.post(&url).json(&body);
        let builder = match &self.credential {
            AuthorityCredential::ApiToken(token) => builder.bearer_auth(token),
            AuthorityCredential::ServiceKey(key) => builder.header(SERVICE_KEY_HEADER, key),
        };

        let response = builder
            .send()
            .await
            .map_err(|err| ProvisionError::transport(format!("failed to send request: {}", err)))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ProvisionError::transport(format!("failed to read response: {}", err)))?;

        let envelope: OriginCertResponse = serde_json::from_slice(&bytes).map_err(|err| {
            ProvisionError::transport(format!(
                "failed to parse response (status {}): {}",
                status, err
            ))
        })?;

        if !envelope.success {
            let message = envelope
                .errors
                .into_iter()
                .next()
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(ProvisionError::rejected(message));
        }

        match envelope.result {
            Some(result) if !result.certificate.is_empty() => {
                Ok(SignedCertificate::new(result.certificate))
            }
            _ => Err(ProvisionError::transport(
                "response reported success without certificate material",
            )),
        }
    }
}

#[async_trait]
impl OriginAuthority for CloudflareOriginClient {
    async fn sign(&self, request: &SigningRequest, domain: &DomainName) -> Result<SignedCertificate> {
        debug!(domain = %domain, request_type = ORIGIN_REQUEST_TYPE, "requesting origin certificate");
        let result = self.submit(request, domain).await;
        match &result {
            Ok(_) => metrics::inc_authority_request("success"),
            Err(ProvisionError::AuthorityRejected(msg)) => {
                warn!(domain = %domain, authority_error = %msg, "origin authority rejected request");
                metrics::inc_authority_request("rejected");
            }
            Err(err) => {
                warn!(domain = %domain, error = %err, "origin authority request failed");
                metrics::inc_authority_request("transport_error");
            }
        }
        result
    }
}
