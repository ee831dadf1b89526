use crate::modules::template::{
    GitParams, StorageParams, TemplateParams, UserParams, VaultParams,
};
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("missing context value: {0}")]
    Missing(&'static str),
    #[error("public ip lookup failed: {0}")]
    PublicIp(String),
}

#[derive(Clone)]
pub struct UserClaims {
    pub idep: String,
    pub family_name: String,
    pub given_name: String,
    pub email: String,
}

pub struct UserPrefs {
    pub service_password: Option<Zeroizing<String>>,
    pub git_name: String,
    pub git_email: String,
    pub git_credentials_cache_duration: u32,
    pub api_token: Option<Zeroizing<String>>,
}

pub struct VaultConnection {
    pub addr: String,
    pub token: Zeroizing<String>,
    pub mount: String,
}

pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: Zeroizing<String>,
    pub session_token: Option<Zeroizing<String>>,
    pub default_region: String,
    pub endpoint: String,
}

/// Identity and credential sources consumed by the template renderer. Each
/// getter is a plain lookup; only the public IP involves a network hop.
#[allow(async_fn_in_trait)]
pub trait ContextProvider {
    fn user_claims(&self) -> Result<UserClaims, ContextError>;
    fn user_prefs(&self) -> Result<UserPrefs, ContextError>;
    fn vault_connection(&self) -> Result<VaultConnection, ContextError>;
    fn storage_credentials(&self) -> Result<StorageCredentials, ContextError>;
    async fn public_ip(&self) -> Result<String, ContextError>;
}

/// Builds the template parameter set from a provider. The display name is
/// "family given", and both the vault top directory and the storage bucket
/// derive from the login id.
pub async fn assemble_template_params<C: ContextProvider>(
    context: &C,
) -> Result<TemplateParams, ContextError> {
    let claims = context.user_claims()?;
    let prefs = context.user_prefs()?;
    let vault = context.vault_connection()?;
    let storage = context.storage_credentials()?;
    let ip = context.public_ip().await?;

    Ok(TemplateParams {
        user: UserParams {
            name: format!("{} {}", claims.family_name, claims.given_name),
            email: claims.email,
            password: prefs.service_password,
            ip,
            idep: claims.idep.clone(),
        },
        git: GitParams {
            name: prefs.git_name,
            email: prefs.git_email,
            credentials_cache_duration: prefs.git_credentials_cache_duration,
        },
        vault: VaultParams {
            addr: vault.addr,
            token: vault.token,
            mount: vault.mount,
            top_dir: format!("/{}", claims.idep),
        },
        s3: StorageParams {
            access_key_id: storage.access_key_id,
            secret_access_key: storage.secret_access_key,
            session_token: storage.session_token,
            default_region: storage.default_region,
            endpoint: storage.endpoint,
            bucket_name: claims.idep,
        },
        api_token: prefs.api_token,
    })
}

/// Environment-backed provider for the CLI and local development.
///
/// SLIPWAY_IDEP is required; everything else falls back to an empty value or
/// a sensible default. The public IP comes from SLIPWAY_PUBLIC_IP when set,
/// otherwise from an HTTP echo endpoint (SLIPWAY_PUBLIC_IP_ENDPOINT).
pub struct EnvContext {
    http: reqwest::Client,
}

impl EnvContext {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for EnvContext {
    fn default() -> Self {
        Self::new()
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_secret(name: &str) -> Option<Zeroizing<String>> {
    env_opt(name).map(Zeroizing::new)
}

impl ContextProvider for EnvContext {
    fn user_claims(&self) -> Result<UserClaims, ContextError> {
        Ok(UserClaims {
            idep: env_opt("SLIPWAY_IDEP").ok_or(ContextError::Missing("SLIPWAY_IDEP"))?,
            family_name: env_opt("SLIPWAY_FAMILY_NAME").unwrap_or_default(),
            given_name: env_opt("SLIPWAY_GIVEN_NAME").unwrap_or_default(),
            email: env_opt("SLIPWAY_EMAIL").unwrap_or_default(),
        })
    }

    fn user_prefs(&self) -> Result<UserPrefs, ContextError> {
        let claims = self.user_claims()?;
        Ok(UserPrefs {
            service_password: env_secret("SLIPWAY_SERVICE_PASSWORD"),
            git_name: env_opt("SLIPWAY_GIT_NAME").unwrap_or_else(|| claims.idep.clone()),
            git_email: env_opt("SLIPWAY_GIT_EMAIL").unwrap_or(claims.email),
            git_credentials_cache_duration: env_opt("SLIPWAY_GIT_CACHE_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            api_token: env_secret("SLIPWAY_API_TOKEN"),
        })
    }

    fn vault_connection(&self) -> Result<VaultConnection, ContextError> {
        Ok(VaultConnection {
            addr: env_opt("VAULT_ADDR").unwrap_or_default(),
            token: env_secret("VAULT_TOKEN").unwrap_or_else(|| Zeroizing::new(String::new())),
            mount: env_opt("VAULT_MOUNT").unwrap_or_else(|| "secret".to_string()),
        })
    }

    fn storage_credentials(&self) -> Result<StorageCredentials, ContextError> {
        Ok(StorageCredentials {
            access_key_id: env_opt("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: env_secret("AWS_SECRET_ACCESS_KEY")
                .unwrap_or_else(|| Zeroizing::new(String::new())),
            session_token: env_secret("AWS_SESSION_TOKEN"),
            default_region: env_opt("AWS_DEFAULT_REGION")
                .unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: env_opt("AWS_S3_ENDPOINT").unwrap_or_default(),
        })
    }

    async fn public_ip(&self) -> Result<String, ContextError> {
        if let Some(ip) = env_opt("SLIPWAY_PUBLIC_IP") {
            return Ok(ip);
        }
        let endpoint = env_opt("SLIPWAY_PUBLIC_IP_ENDPOINT")
            .unwrap_or_else(|| "https://api.ipify.org".to_string());
        let response = self
            .http
            .get(&endpoint)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ContextError::PublicIp(e.to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|e| ContextError::PublicIp(e.to_string()))?;
        Ok(text.trim().to_string())
    }
}
