use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub handle: String,
    pub domain: String,
    pub key_algorithm: String,
    pub status: String,
    pub cert_pem: String,
    #[serde(skip_serializing)]
    pub key_pem: String,
    pub not_after: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

/// 私钥不进入 Debug 输出
impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("handle", &self.handle)
            .field("domain", &self.domain)
            .field("key_algorithm", &self.key_algorithm)
            .field("status", &self.status)
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"<redacted>")
            .field("not_after", &self.not_after)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        unreachable!("certificates has no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
