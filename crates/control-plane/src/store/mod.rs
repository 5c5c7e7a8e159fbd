mod database;
mod memory;

pub use database::DatabaseCertificateStore;
pub use memory::MemoryCertificateStore;

use crate::authority::SignedCertificate;
use crate::keygen::GeneratedKey;
use async_trait::async_trait;
use cfcert_common::{
    CertificateHandle, DomainName, ProvisionError, Result, ReusePolicy, StoredCertificate,
};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;
use uuid::Uuid;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

/// A generated key and the certificate issued for it. Import consumes it, so
/// the key does not outlive the provisioning call.
#[derive(Debug)]
pub struct ImportMaterial {
    pub key: GeneratedKey,
    pub certificate: SignedCertificate,
}

#[derive(Debug, Clone, Default)]
pub struct CertificatePage {
    pub items: Vec<StoredCertificate>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// One page of certificates passing `policy`, newest first.
    async fn list_page(
        &self,
        policy: &ReusePolicy,
        next_token: Option<String>,
    ) -> Result<CertificatePage>;

    async fn import(&self, material: ImportMaterial) -> Result<CertificateHandle>;

    /// `Ok(None)` when the handle is unknown.
    async fn describe(&self, handle: &CertificateHandle) -> Result<Option<StoredCertificate>>;

    async fn delete(&self, handle: &CertificateHandle) -> Result<()>;
}

/// Newest certificate for exactly `domain` that passes `policy`. Every page is
/// read before concluding there is none.
pub async fn find_by_domain(
    store: &dyn CertificateStore,
    domain: &DomainName,
    policy: &ReusePolicy,
) -> Result<Option<StoredCertificate>> {
    let mut next_token = None;
    let mut pages = 0usize;
    loop {
        let page = store.list_page(policy, next_token.take()).await?;
        pages += 1;
        let found = page
            .items
            .into_iter()
            .find(|cert| cert.domain_name == domain.as_str() && policy.admits(cert));
        if found.is_some() {
            return Ok(found);
        }
        match page.next_token {
            Some(token) => next_token = Some(token),
            None => {
                debug!(domain = %domain, pages, "no reusable certificate in store");
                return Ok(None);
            }
        }
    }
}

/// Keyset position in the (created_at desc, handle desc) listing order. The
/// next page starts strictly after the last row served, so rows deleted in
/// between never shift a later match out of reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub handle: String,
}

impl PageCursor {
    pub fn after(cert: &StoredCertificate) -> Self {
        Self {
            created_at: cert.created_at,
            handle: cert.handle.as_str().to_string(),
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}|{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.handle
        )
    }

    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || ProvisionError::store(format!("invalid next token {}", token));
        let (ts, handle) = token.split_once('|').ok_or_else(invalid)?;
        let created_at = DateTime::parse_from_rfc3339(ts)
            .map_err(|_| invalid())?
            .with_timezone(&Utc);
        Ok(Self {
            created_at,
            handle: handle.to_string(),
        })
    }

    /// True when `cert` sorts after this position.
    pub fn precedes(&self, cert: &StoredCertificate) -> bool {
        cert.created_at < self.created_at
            || (cert.created_at == self.created_at && cert.handle.as_str() < self.handle.as_str())
    }
}

pub(crate) fn new_handle(region: &str) -> CertificateHandle {
    CertificateHandle::new(format!("arn:cfcert:{}:certificate/{}", region, Uuid::new_v4()))
}

/// What the store learns from the certificate itself at import time.
#[derive(Debug, Clone)]
pub(crate) struct InspectedCertificate {
    pub domain: String,
    pub not_after: Option<DateTime<Utc>>,
}

pub(crate) fn inspect_material(material: &ImportMaterial) -> Result<InspectedCertificate> {
    let (_, pem) = parse_x509_pem(material.certificate.pem().as_bytes())
        .map_err(|err| ProvisionError::store(format!("malformed certificate PEM: {}", err)))?;
    let cert = pem
        .parse_x509()
        .map_err(|err| ProvisionError::store(format!("malformed certificate: {}", err)))?;

    if cert.public_key().raw != material.key.public_key_der().as_slice() {
        return Err(ProvisionError::store(
            "certificate public key does not match the private key",
        ));
    }

    let san_name = cert
        .subject_alternative_name()
        .map_err(|err| ProvisionError::store(format!("invalid subjectAltName: {}", err)))?
        .and_then(|san| {
            san.value.general_names.iter().find_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
        });
    let domain = match san_name {
        Some(name) => name,
        None => cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProvisionError::store("certificate names no domain"))?,
    };

    let not_after = cert.validity().not_after.to_datetime();
    let not_after = DateTime::<Utc>::from_timestamp(not_after.unix_timestamp(), not_after.nanosecond());

    Ok(InspectedCertificate { domain, not_after })
}
