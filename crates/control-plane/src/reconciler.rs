use crate::authority::OriginAuthority;
use crate::keygen::KeyGenerator;
use crate::metrics;
use crate::store::{CertificateStore, ImportMaterial, find_by_domain};
use cfcert_common::models::RecordState;
use cfcert_common::{
    CertificateHandle, CertificateStatus, DomainName, ProvisionError, ProvisioningRecord, Result,
    ReusePolicy,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureAction {
    Reused,
    Issued,
}

impl EnsureAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reused => "reused",
            Self::Issued => "issued",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ensured {
    pub record: ProvisioningRecord,
    pub action: EnsureAction,
}

/// Find-or-create over a single domain. Holds no per-domain state; callers
/// serialize operations on the same domain.
pub struct Reconciler {
    store: Arc<dyn CertificateStore>,
    authority: Arc<dyn OriginAuthority>,
    keygen: Arc<dyn KeyGenerator>,
    policy: ReusePolicy,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn CertificateStore>,
        authority: Arc<dyn OriginAuthority>,
        keygen: Arc<dyn KeyGenerator>,
    ) -> Self {
        let policy = ReusePolicy {
            status: CertificateStatus::Issued,
            key_algorithm: keygen.key_algorithm(),
        };
        Self {
            store,
            authority,
            keygen,
            policy,
        }
    }

    /// Unprovisioned -> Provisioned. Reuses a matching certificate when the
    /// store has one; otherwise generates, signs and imports a new one.
    pub async fn ensure(&self, domain: &DomainName) -> Result<Ensured> {
        match self.ensure_inner(domain).await {
            Ok(ensured) => {
                metrics::inc_ensure_outcome(ensured.action.as_str());
                info!(
                    domain = %domain,
                    handle = %ensured.record.certificate_handle,
                    action = ensured.action.as_str(),
                    "certificate provisioned"
                );
                Ok(ensured)
            }
            Err(err) => {
                metrics::inc_ensure_outcome("failed");
                warn!(domain = %domain, error = %err, "certificate provisioning failed");
                Err(err)
            }
        }
    }

    async fn ensure_inner(&self, domain: &DomainName) -> Result<Ensured> {
        if let Some(existing) = find_by_domain(self.store.as_ref(), domain, &self.policy).await? {
            return Ok(Ensured {
                record: ProvisioningRecord::new(domain.clone(), existing.handle),
                action: EnsureAction::Reused,
            });
        }

        let handle = self.issue(domain).await?;
        Ok(Ensured {
            record: ProvisioningRecord::new(domain.clone(), handle),
            action: EnsureAction::Issued,
        })
    }

    async fn issue(&self, domain: &DomainName) -> Result<CertificateHandle> {
        let (key, request) = self.keygen.generate(domain)?;
        let certificate = self.authority.sign(&request, domain).await?;
        drop(request);
        self.store.import(ImportMaterial { key, certificate }).await
    }

    /// Lookup only. A missing certificate is a `NotFound` error here.
    pub async fn discover(&self, domain: &DomainName) -> Result<ProvisioningRecord> {
        match find_by_domain(self.store.as_ref(), domain, &self.policy).await? {
            Some(existing) => Ok(ProvisioningRecord::new(domain.clone(), existing.handle)),
            None => Err(ProvisionError::not_found(format!(
                "No issued {} certificate found for domain: {}",
                self.policy.key_algorithm, domain
            ))),
        }
    }

    /// Any describe failure counts as drift; the caller forgets the record.
    pub async fn verify(&self, handle: &CertificateHandle) -> RecordState {
        if handle.is_empty() {
            return RecordState::Unprovisioned;
        }
        match self.store.describe(handle).await {
            Ok(Some(_)) => RecordState::Provisioned,
            Ok(None) => {
                info!(handle = %handle, "certificate no longer in store");
                RecordState::Unprovisioned
            }
            Err(err) => {
                warn!(handle = %handle, error = %err, "describe failed, treating certificate as gone");
                RecordState::Unprovisioned
            }
        }
    }

    /// Provisioned -> Retired. On failure the record stays provisioned.
    pub async fn retire(&self, handle: &CertificateHandle) -> Result<()> {
        if handle.is_empty() {
            return Ok(());
        }
        self.store.delete(handle).await?;
        info!(handle = %handle, "certificate retired");
        Ok(())
    }

    /// Domains are never changed in place: a new domain means Retire then Ensure.
    pub async fn replace(
        &self,
        record: &ProvisioningRecord,
        domain: &DomainName,
    ) -> Result<ProvisioningRecord> {
        if &record.domain_name == domain {
            return Ok(record.clone());
        }
        info!(from = %record.domain_name, to = %domain, "replacing certificate for new domain");
        self.retire(&record.certificate_handle).await?;
        Ok(self.ensure(domain).await?.record)
    }
}
