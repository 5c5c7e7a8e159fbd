use super::{
    CertificatePage, CertificateStore, ImportMaterial, PageCursor, inspect_material, new_handle,
};
use async_trait::async_trait;
use cfcert_common::entities::certificates;
use cfcert_common::{
    CertificateHandle, CertificateStatus, ProvisionError, Result, ReusePolicy, StoredCertificate,
};
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::info;

/// Certificates kept in the `certificates` table.
#[derive(Clone)]
pub struct DatabaseCertificateStore {
    db: DatabaseConnection,
    region: String,
    page_size: u64,
}

impl DatabaseCertificateStore {
    pub fn new(db: DatabaseConnection, region: impl Into<String>, page_size: u64) -> Self {
        Self {
            db,
            region: region.into(),
            page_size: page_size.max(1),
        }
    }
}

fn to_stored(model: certificates::Model) -> Result<StoredCertificate> {
    Ok(StoredCertificate {
        handle: CertificateHandle::new(model.handle),
        domain_name: model.domain,
        key_algorithm: model.key_algorithm.parse()?,
        status: model.status.parse()?,
        created_at: model.created_at.into(),
        not_after: model.not_after.map(Into::into),
    })
}

#[async_trait]
impl CertificateStore for DatabaseCertificateStore {
    async fn list_page(
        &self,
        policy: &ReusePolicy,
        next_token: Option<String>,
    ) -> Result<CertificatePage> {
        let cursor = next_token.as_deref().map(PageCursor::decode).transpose()?;

        let mut query = certificates::Entity::find()
            .filter(certificates::Column::Status.eq(policy.status.as_str()))
            .filter(certificates::Column::KeyAlgorithm.eq(policy.key_algorithm.as_str()));
        if let Some(cursor) = cursor {
            let created_at: DateTimeWithTimeZone = cursor.created_at.into();
            query = query.filter(
                Condition::any()
                    .add(certificates::Column::CreatedAt.lt(created_at))
                    .add(
                        Condition::all()
                            .add(certificates::Column::CreatedAt.eq(created_at))
                            .add(certificates::Column::Handle.lt(cursor.handle)),
                    ),
            );
        }

        // One extra row tells whether another page exists.
        let mut rows = query
            .order_by_desc(certificates::Column::CreatedAt)
            .order_by_desc(certificates::Column::Handle)
            .limit(self.page_size + 1)
            .all(&self.db)
            .await?;
        let has_more = rows.len() as u64 > self.page_size;
        rows.truncate(self.page_size as usize);

        let items = rows.into_iter().map(to_stored).collect::<Result<Vec<_>>>()?;
        let next_token = if has_more {
            items.last().map(|last| PageCursor::after(last).encode())
        } else {
            None
        };

        Ok(CertificatePage { items, next_token })
    }

    async fn import(&self, material: ImportMaterial) -> Result<CertificateHandle> {
        let inspected = inspect_material(&material)?;
        let handle = new_handle(&self.region);

        let active = certificates::ActiveModel {
            handle: Set(handle.as_str().to_string()),
            domain: Set(inspected.domain),
            key_algorithm: Set(material.key.algorithm().as_str().to_string()),
            status: Set(CertificateStatus::Issued.as_str().to_string()),
            cert_pem: Set(material.certificate.pem().to_string()),
            key_pem: Set(material.key.private_key_pem()),
            not_after: Set(inspected.not_after.map(Into::into)),
            created_at: Set(Utc::now().into()),
        };
        active.insert(&self.db).await?;

        info!(handle = %handle, "certificate imported into database store");
        Ok(handle)
    }

    async fn describe(&self, handle: &CertificateHandle) -> Result<Option<StoredCertificate>> {
        certificates::Entity::find_by_id(handle.as_str().to_string())
            .one(&self.db)
            .await?
            .map(to_stored)
            .transpose()
    }

    async fn delete(&self, handle: &CertificateHandle) -> Result<()> {
        let result = certificates::Entity::delete_by_id(handle.as_str().to_string())
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ProvisionError::store(format!(
                "certificate {} does not exist",
                handle
            )));
        }
        Ok(())
    }
}
