use crate::error::{ProvisionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain a certificate is provisioned for. Used both as the CSR subject and
/// as the single DNS name the certificate covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ProvisionError::invalid_domain("domain_name must not be empty"));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ProvisionError::invalid_domain(format!(
                "domain_name must not contain whitespace: {:?}",
                raw
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DomainName {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<DomainName> for String {
    fn from(value: DomainName) -> Self {
        value.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, store-assigned certificate identifier (ARN-shaped).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateHandle(String);

impl CertificateHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CertificateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[serde(rename = "EC_prime256v1")]
    EcPrime256v1,
    #[serde(rename = "EC_secp384r1")]
    EcSecp384r1,
    #[serde(rename = "RSA_2048")]
    Rsa2048,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EcPrime256v1 => "EC_prime256v1",
            Self::EcSecp384r1 => "EC_secp384r1",
            Self::Rsa2048 => "RSA_2048",
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EC_prime256v1" => Ok(Self::EcPrime256v1),
            "EC_secp384r1" => Ok(Self::EcSecp384r1),
            "RSA_2048" => Ok(Self::Rsa2048),
            other => Err(ProvisionError::store(format!("unknown key algorithm {}", other))),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    Revoked,
    Failed,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingValidation => "PENDING_VALIDATION",
            Self::Issued => "ISSUED",
            Self::Inactive => "INACTIVE",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for CertificateStatus {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING_VALIDATION" => Ok(Self::PendingValidation),
            "ISSUED" => Ok(Self::Issued),
            "INACTIVE" => Ok(Self::Inactive),
            "EXPIRED" => Ok(Self::Expired),
            "REVOKED" => Ok(Self::Revoked),
            "FAILED" => Ok(Self::Failed),
            other => Err(ProvisionError::store(format!("unknown certificate status {}", other))),
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter a stored certificate must pass before it is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReusePolicy {
    pub status: CertificateStatus,
    pub key_algorithm: KeyAlgorithm,
}

impl Default for ReusePolicy {
    fn default() -> Self {
        Self {
            status: CertificateStatus::Issued,
            key_algorithm: KeyAlgorithm::EcPrime256v1,
        }
    }
}

impl ReusePolicy {
    pub fn admits(&self, cert: &StoredCertificate) -> bool {
        cert.status == self.status && cert.key_algorithm == self.key_algorithm
    }
}

/// The store's view of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCertificate {
    pub handle: CertificateHandle,
    pub domain_name: String,
    pub key_algorithm: KeyAlgorithm,
    pub status: CertificateStatus,
    pub created_at: DateTime<Utc>,
    pub not_after: Option<DateTime<Utc>>,
}

/// State handed back to the resource framework. `id` mirrors the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningRecord {
    pub domain_name: DomainName,
    #[serde(alias = "certificate_arn")]
    pub certificate_handle: CertificateHandle,
    pub id: CertificateHandle,
}

impl ProvisioningRecord {
    pub fn new(domain_name: DomainName, handle: CertificateHandle) -> Self {
        Self {
            domain_name,
            id: handle.clone(),
            certificate_handle: handle,
        }
    }
}

/// Request bodies carry the raw string; `DomainName::parse` runs in the
/// handler so a bad domain maps to `InvalidDomain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsureRequest {
    pub domain_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverQuery {
    pub domain_name: String,
}

/// A record whose handle may be missing, as the framework can hand over
/// partially written state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRef {
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default, alias = "certificate_arn")]
    pub certificate_handle: Option<String>,
}

impl RecordRef {
    pub fn handle(&self) -> CertificateHandle {
        CertificateHandle::new(self.certificate_handle.clone().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceRequest {
    pub record: ProvisioningRecord,
    pub domain_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Provisioned,
    Unprovisioned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub state: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ProvisioningRecord>,
}
