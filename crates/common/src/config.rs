use anyhow::{Result, anyhow};
use std::env;
use std::fmt;

pub const DEFAULT_AUTHORITY_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_CONTROL_PLANE_ADDR: &str = "0.0.0.0:9000";
pub const DEFAULT_LIST_PAGE_SIZE: u64 = 50;

/// Credential presented to the origin authority.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthorityCredential {
    /// Sent as `Authorization: Bearer <token>`.
    ApiToken(String),
    /// Origin CA service key, sent as `X-Auth-User-Service-Key`.
    ServiceKey(String),
}

impl fmt::Debug for AuthorityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiToken(_) => f.write_str("ApiToken(<redacted>)"),
            Self::ServiceKey(_) => f.write_str("ServiceKey(<redacted>)"),
        }
    }
}

/// Values given explicitly (command line), preferred over the environment.
#[derive(Debug, Clone, Default)]
pub struct ExplicitSettings {
    pub region: Option<String>,
    pub api_token: Option<String>,
    pub service_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub region: String,
    pub credential: AuthorityCredential,
    pub authority_url: String,
    pub database_url: Option<String>,
    pub control_plane_addr: String,
    pub list_page_size: u64,
}

impl AppConfig {
    pub fn from_env(explicit: ExplicitSettings) -> Result<Self> {
        // Load .env early so process env reads pick it up.
        let _ = dotenvy::dotenv();
        Self::resolve_with(explicit, |key| env::var(key).ok())
    }

    pub fn resolve_with<F>(explicit: ExplicitSettings, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = pick(explicit.region, lookup("AWS_REGION"));
        let api_token = pick(explicit.api_token, lookup("CLOUDFLARE_API_TOKEN"));
        let service_key = pick(explicit.service_key, lookup("CLOUDFLARE_SERVICE_API_TOKEN"));

        let mut missing = Vec::new();
        if region.is_none() {
            missing.push("region must be set via --region or the AWS_REGION environment variable");
        }
        let credential = match (api_token, service_key) {
            (Some(token), _) => Some(AuthorityCredential::ApiToken(token)),
            (None, Some(key)) => Some(AuthorityCredential::ServiceKey(key)),
            (None, None) => {
                missing.push(
                    "an authority credential must be set via --api-token/--service-key or the \
                     CLOUDFLARE_API_TOKEN/CLOUDFLARE_SERVICE_API_TOKEN environment variables",
                );
                None
            }
        };

        let (Some(region), Some(credential)) = (region, credential) else {
            return Err(anyhow!("missing configuration: {}", missing.join("; ")));
        };

        let authority_url = non_empty(lookup("AUTHORITY_URL"))
            .unwrap_or_else(|| DEFAULT_AUTHORITY_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let database_url = non_empty(lookup("DATABASE_URL"));
        let control_plane_addr = non_empty(lookup("CONTROL_PLANE_ADDR"))
            .unwrap_or_else(|| DEFAULT_CONTROL_PLANE_ADDR.to_string());
        let list_page_size = match non_empty(lookup("LIST_PAGE_SIZE")) {
            Some(raw) => {
                let size: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("LIST_PAGE_SIZE must be a positive integer"))?;
                if size == 0 {
                    return Err(anyhow!("LIST_PAGE_SIZE must be at least 1"));
                }
                size
            }
            None => DEFAULT_LIST_PAGE_SIZE,
        };

        Ok(Self {
            region,
            credential,
            authority_url,
            database_url,
            control_plane_addr,
            list_page_size,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn pick(explicit: Option<String>, fallback: Option<String>) -> Option<String> {
    non_empty(explicit).or_else(|| non_empty(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let explicit = ExplicitSettings {
            region: Some("eu-west-1".to_string()),
            api_token: Some("explicit-token".to_string()),
            service_key: None,
        };
        let config = AppConfig::resolve_with(
            explicit,
            env_of(&[("AWS_REGION", "us-east-1"), ("CLOUDFLARE_API_TOKEN", "env-token")]),
        )
        .unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(
            config.credential,
            AuthorityCredential::ApiToken("explicit-token".to_string())
        );
    }

    #[test]
    fn empty_explicit_value_falls_back_to_environment() {
        let explicit = ExplicitSettings {
            region: Some(String::new()),
            ..Default::default()
        };
        let config = AppConfig::resolve_with(
            explicit,
            env_of(&[("AWS_REGION", "ap-southeast-2"), ("CLOUDFLARE_SERVICE_API_TOKEN", "v1.0-key")]),
        )
        .unwrap();
        assert_eq!(config.region, "ap-southeast-2");
        assert_eq!(
            config.credential,
            AuthorityCredential::ServiceKey("v1.0-key".to_string())
        );
        assert_eq!(config.authority_url, DEFAULT_AUTHORITY_URL);
        assert_eq!(config.list_page_size, DEFAULT_LIST_PAGE_SIZE);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn api_token_preferred_over_service_key() {
        let config = AppConfig::resolve_with(
            ExplicitSettings::default(),
            env_of(&[
                ("AWS_REGION", "us-east-1"),
                ("CLOUDFLARE_API_TOKEN", "token"),
                ("CLOUDFLARE_SERVICE_API_TOKEN", "key"),
            ]),
        )
        .unwrap();
        assert!(matches!(config.credential, AuthorityCredential::ApiToken(_)));
    }

    #[test]
    fn missing_region_and_credential_are_both_reported() {
        let err = AppConfig::resolve_with(ExplicitSettings::default(), env_of(&[])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("AWS_REGION"));
        assert!(msg.contains("CLOUDFLARE_API_TOKEN"));
    }

    #[test]
    fn page_size_must_be_positive() {
        let err = AppConfig::resolve_with(
            ExplicitSettings::default(),
            env_of(&[
                ("AWS_REGION", "us-east-1"),
                ("CLOUDFLARE_API_TOKEN", "token"),
                ("LIST_PAGE_SIZE", "0"),
            ]),
        );
        assert!(err.is_err());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let rendered = format!("{:?}", AuthorityCredential::ApiToken("secret".to_string()));
        assert!(!rendered.contains("secret"));
    }
}
