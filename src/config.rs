//! # Configuration Management
//!
//! Static deployment parameters for the vault: the user pool and its hosted
//! sign-in domain, redirect URIs, the storage bucket binding and session
//! limits. The document lives in Cloudflare KV under the `config` key and is
//! loaded once per isolate, falling back to defaults for missing fields.
//! The URL signing key is a worker secret and never stored in KV.
//!
//! ## Example
//!
//! The expected JSON format in KV storage:
//! ```json
//! {
//!   "region": "ap-south-1",
//!   "user_pool_id": "ap-south-1_AbCdEf123",
//!   "user_pool_client_id": "1example23456789",
//!   "identity_pool_id": "ap-south-1:0f3a9c1e-1111-2222-3333-444455556666",
//!   "cognito_domain": "vault.auth.ap-south-1.amazoncognito.com",
//!   "redirect_sign_in": "https://vault.example.com/",
//!   "redirect_sign_out": "https://vault.example.com/",
//!   "bucket_name": "STORAGE_BUCKET"
//! }
//! ```

use serde::{Deserialize, Serialize};
use worker::kv::KvStore;
use worker::Env;

use crate::constants::{
    CLIENT_SECRET_SECRET, DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_REGION, DEFAULT_SESSION_TTL_SECS,
    MIN_SESSION_TTL_SECS, MIN_SIGNING_KEY_LEN, STORAGE_BUCKET_NAME, STORAGE_CONFIG_KV_NAME,
    URL_SIGNING_KEY_SECRET,
};
use crate::errors::{AppError, AppResult};
use crate::logging::Logger;

/// Configuration structure for the vault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Region of the user pool, identity pool and hosted UI.
    pub region: String,

    pub user_pool_id: String,

    pub user_pool_client_id: String,

    /// Kept for parity with the deployment; must share `region`.
    pub identity_pool_id: String,

    /// Hosted sign-in domain, without scheme.
    pub cognito_domain: String,

    /// Where the hosted UI sends the browser back with `?code=`.
    pub redirect_sign_in: String,

    pub redirect_sign_out: String,

    /// R2 bucket binding name.
    pub bucket_name: String,

    pub oauth_scopes: Vec<String>,

    /// Identity providers offered as buttons on the login page.
    pub social_providers: Vec<String>,

    pub session_ttl_secs: u64,

    pub max_upload_size: u64,

    /// HMAC key for object URLs, read from the worker secret.
    #[serde(skip)]
    pub url_signing_key: Vec<u8>,

    /// Set for confidential app clients only.
    #[serde(skip)]
    pub client_secret: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            user_pool_id: String::new(),
            user_pool_client_id: String::new(),
            identity_pool_id: String::new(),
            cognito_domain: String::new(),
            redirect_sign_in: "http://localhost:8787/".to_string(),
            redirect_sign_out: "http://localhost:8787/".to_string(),
            bucket_name: STORAGE_BUCKET_NAME.to_string(),
            oauth_scopes: vec!["email".to_string(), "profile".to_string(), "openid".to_string()],
            social_providers: vec!["Google".to_string()],
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            url_signing_key: Vec::new(),
            client_secret: None,
        }
    }
}

impl Config {
    /// Loads configuration from KV storage with fallback to defaults, then
    /// attaches the secrets and validates the result.
    pub async fn load(env: &Env, logger: &Logger) -> AppResult<Self> {
        let kv = env.kv(STORAGE_CONFIG_KV_NAME)?;
        let mut config = Self::load_document(&kv, logger).await?;

        config.url_signing_key = env
            .secret(URL_SIGNING_KEY_SECRET)
            .map_err(|_| AppError::Config(format!("missing secret {}", URL_SIGNING_KEY_SECRET)))?
            .to_string()
            .into_bytes();
        config.client_secret = env
            .secret(CLIENT_SECRET_SECRET)
            .ok()
            .map(|secret| secret.to_string());

        config.validate()?;
        Ok(config)
    }

    async fn load_document(kv: &KvStore, logger: &Logger) -> AppResult<Self> {
        match kv.get("config").json::<Self>().await? {
            Some(config) => {
                logger.info("Configuration loaded from KV storage", None);
                Ok(config)
            }
            None => {
                logger.warn("Config not found in KV, using default", None);
                Ok(Self::default())
            }
        }
    }

    /// Rejects configurations the vault cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let required = [
            ("region", &self.region),
            ("user_pool_id", &self.user_pool_id),
            ("user_pool_client_id", &self.user_pool_client_id),
            ("identity_pool_id", &self.identity_pool_id),
            ("cognito_domain", &self.cognito_domain),
            ("bucket_name", &self.bucket_name),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AppError::Config(format!("{} must not be empty", name)));
        }

        if self.cognito_domain.contains("://") || self.cognito_domain.contains('/') {
            return Err(AppError::Config(
                "cognito_domain must be a bare host name".to_string(),
            ));
        }

        for (name, uri) in [
            ("redirect_sign_in", &self.redirect_sign_in),
            ("redirect_sign_out", &self.redirect_sign_out),
        ] {
            if !is_allowed_redirect(uri) {
                return Err(AppError::Config(format!(
                    "{} must be an https URL or a localhost URL",
                    name
                )));
            }
        }

        match self.identity_pool_id.split_once(':') {
            Some((region, id)) if region == self.region && !id.is_empty() => {}
            _ => {
                return Err(AppError::Config(format!(
                    "identity_pool_id must look like {}:<uuid>",
                    self.region
                )))
            }
        }

        if !self.user_pool_id.starts_with(&format!("{}_", self.region)) {
            return Err(AppError::Config(format!(
                "user_pool_id must belong to region {}",
                self.region
            )));
        }

        if self.oauth_scopes.iter().all(|scope| scope != "openid") {
            return Err(AppError::Config(
                "oauth_scopes must include openid".to_string(),
            ));
        }

        if self.url_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(AppError::Config(format!(
                "{} must be at least {} bytes",
                URL_SIGNING_KEY_SECRET, MIN_SIGNING_KEY_LEN
            )));
        }

        if self.session_ttl_secs < MIN_SESSION_TTL_SECS {
            return Err(AppError::Config(format!(
                "session_ttl_secs must be at least {}",
                MIN_SESSION_TTL_SECS
            )));
        }

        if self.max_upload_size == 0 {
            return Err(AppError::Config(
                "max_upload_size must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn hosted_ui_base(&self) -> String {
        format!("https://{}", self.cognito_domain)
    }

    /// Endpoint of the user pool API used for password sign-in and sign-up.
    pub fn identity_api_endpoint(&self) -> String {
        format!("https://cognito-idp.{}.amazonaws.com/", self.region)
    }
}

fn is_allowed_redirect(uri: &str) -> bool {
    uri.starts_with("https://")
        || uri.starts_with("http://localhost")
        || uri.starts_with("http://127.0.0.1")
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        region: "ap-south-1".to_string(),
        user_pool_id: "ap-south-1_AbCdEf123".to_string(),
        user_pool_client_id: "client-123".to_string(),
        identity_pool_id: "ap-south-1:0f3a9c1e-1111-2222-3333-444455556666".to_string(),
        cognito_domain: "vault.auth.ap-south-1.amazoncognito.com".to_string(),
        redirect_sign_in: "http://localhost:8787/".to_string(),
        redirect_sign_out: "http://localhost:8787/".to_string(),
        url_signing_key: b"0123456789abcdef0123456789abcdef".to_vec(),
        ..Config::default()
    }
}
