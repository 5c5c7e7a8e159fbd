//! 证书供应统一错误类型定义
//!
//! 全项目共享一个错误类型，协调器、存储、签发客户端和 HTTP 层都直接传播它。

use thiserror::Error;

/// 证书供应统一错误类型
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// 域名不合法 (400)
    #[error("invalid domain name: {0}")]
    InvalidDomain(String),

    /// 没有可复用的证书 (404)
    #[error("{0}")]
    NotFound(String),

    /// 密钥或 CSR 生成失败 (500)
    #[error("failed to generate private key: {0}")]
    KeyGen(String),

    /// 无法与签发机构通信，或响应无法解析 (502)
    #[error("failed to request origin certificate: {0}")]
    AuthorityTransport(String),

    /// 签发机构明确拒绝 (502)
    #[error("origin authority error: {0}")]
    AuthorityRejected(String),

    /// 证书存储拒绝了导入/删除/列表操作 (500)
    #[error("certificate store error: {0}")]
    Store(String),

    /// 其他内部错误 (500)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ProvisionError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_domain(msg: impl Into<String>) -> Self {
        Self::InvalidDomain(msg.into())
    }

    pub fn key_gen(msg: impl Into<String>) -> Self {
        Self::KeyGen(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::AuthorityTransport(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::AuthorityRejected(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// 判断是否为客户端错误（4xx）
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidDomain(_) | Self::NotFound(_))
    }

    /// 判断是否为服务端错误（5xx）
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// 签发机构相关的故障
    pub fn is_authority_fault(&self) -> bool {
        matches!(self, Self::AuthorityTransport(_) | Self::AuthorityRejected(_))
    }

    /// 获取 HTTP 状态码
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidDomain(_) => 400,
            Self::NotFound(_) => 404,
            Self::AuthorityTransport(_) | Self::AuthorityRejected(_) => 502,
            _ => 500,
        }
    }

    /// 获取 HTTP 状态码（axum 类型）
    #[cfg(feature = "control-plane")]
    pub fn axum_status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::from_u16(self.http_status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// 数据库故障统一视为存储故障
impl From<sea_orm::DbErr> for ProvisionError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Store(err.to_string())
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ProvisionError>;

// ============ Axum HTTP 响应支持 ============

#[cfg(feature = "control-plane")]
mod axum_impl {
    use super::*;
    use axum::{
        Json,
        response::{IntoResponse, Response},
    };
    use serde_json::json;

    impl IntoResponse for ProvisionError {
        fn into_response(self) -> Response {
            let status = self.axum_status_code();

            match &self {
                // 客户端错误（4xx）- info 级别
                ProvisionError::InvalidDomain(msg) => {
                    tracing::info!(status = status.as_u16(), reason = %msg, "Invalid domain name");
                }
                ProvisionError::NotFound(msg) => {
                    tracing::info!(status = status.as_u16(), reason = %msg, "Certificate not found");
                }
                // 签发机构错误 - warn 级别，通常与外部服务相关
                ProvisionError::AuthorityTransport(msg) | ProvisionError::AuthorityRejected(msg) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        authority_error = %msg,
                        "Origin authority request failed"
                    );
                }
                ProvisionError::KeyGen(msg) | ProvisionError::Store(msg) => {
                    tracing::error!(status = status.as_u16(), error = %msg, "Provisioning failed");
                }
                ProvisionError::Internal(internal_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        internal_error = ?internal_err,
                        "Internal server error"
                    );
                }
            }

            let body = Json(json!({"error": self.to_string()}));
            (status, body).into_response()
        }
    }
}
