pub mod config;
pub mod entities;
pub mod error;
pub mod models;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{ProvisionError, Result};

// 配置相关
pub use config::{AppConfig, AuthorityCredential, ExplicitSettings};

// 领域模型
pub use models::{
    CertificateHandle, CertificateStatus, DomainName, KeyAlgorithm, ProvisioningRecord,
    ReusePolicy, StoredCertificate,
};
