use super::{
    CertificatePage, CertificateStore, ImportMaterial, PageCursor, inspect_material, new_handle,
};
use async_trait::async_trait;
use cfcert_common::{
    CertificateHandle, CertificateStatus, ProvisionError, Result, ReusePolicy, StoredCertificate,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

struct MemoryEntry {
    cert: StoredCertificate,
}

/// Process-local store. Material is validated on import and then dropped;
/// only the summaries are kept, and they do not survive a restart.
#[derive(Clone)]
pub struct MemoryCertificateStore {
    region: String,
    page_size: usize,
    entries: Arc<RwLock<Vec<MemoryEntry>>>,
}

impl MemoryCertificateStore {
    pub fn new(region: impl Into<String>, page_size: usize) -> Self {
        Self {
            region: region.into(),
            page_size: page_size.max(1),
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Adds a pre-existing certificate without material checks.
    #[cfg(test)]
    pub async fn seed(&self, cert: StoredCertificate) {
        self.entries.write().await.push(MemoryEntry { cert });
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl CertificateStore for MemoryCertificateStore {
    async fn list_page(
        &self,
        policy: &ReusePolicy,
        next_token: Option<String>,
    ) -> Result<CertificatePage> {
        let cursor = next_token.as_deref().map(PageCursor::decode).transpose()?;

        let entries = self.entries.read().await;
        let mut matching: Vec<&StoredCertificate> = entries
            .iter()
            .map(|e| &e.cert)
            .filter(|c| policy.admits(c))
            .filter(|c| cursor.as_ref().is_none_or(|cur| cur.precedes(c)))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.handle.as_str().cmp(a.handle.as_str()))
        });

        let items: Vec<StoredCertificate> = matching
            .iter()
            .take(self.page_size)
            .map(|c| (*c).clone())
            .collect();
        let next_token = (matching.len() > items.len())
            .then(|| items.last().map(|last| PageCursor::after(last).encode()))
            .flatten();

        Ok(CertificatePage { items, next_token })
    }

    async fn import(&self, material: ImportMaterial) -> Result<CertificateHandle> {
        let inspected = inspect_material(&material)?;
        let handle = new_handle(&self.region);
        let entry = MemoryEntry {
            cert: StoredCertificate {
                handle: handle.clone(),
                domain_name: inspected.domain,
                key_algorithm: material.key.algorithm(),
                status: CertificateStatus::Issued,
                created_at: Utc::now(),
                not_after: inspected.not_after,
            },
        };
        self.entries.write().await.push(entry);
        info!(handle = %handle, "certificate imported into memory store");
        Ok(handle)
    }

    async fn describe(&self, handle: &CertificateHandle) -> Result<Option<StoredCertificate>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|e| &e.cert.handle == handle)
            .map(|e| e.cert.clone()))
    }

    async fn delete(&self, handle: &CertificateHandle) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| &e.cert.handle != handle);
        if entries.len() == before {
            return Err(ProvisionError::store(format!(
                "certificate {} does not exist",
                handle
            )));
        }
        Ok(())
    }
}
