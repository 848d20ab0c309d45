//! Configuration module
//!
//! Settings are read from the process environment (optionally seeded from a
//! `.env` file) into [`PublisherConfig`] and validated before anything starts.

use std::env;

use base64::{engine::general_purpose, Engine as _};

use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const FETCH_TIMEOUT_SECS: u64 = 600;
const MAX_SOURCE_SIZE_MB: u64 = 2048;
const RUN_TIMEOUT_SECS: u64 = 3600;
const TOKEN_REFRESH_SKEW_SECS: i64 = 60;
const STAGING_PREFIX: &str = "staging";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const YOUTUBE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/youtube/v3";
const YOUTUBE_WATCH_BASE_URL: &str = "https://www.youtube.com/watch?v=";

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
}

/// Full configuration of the publishing service
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    pub base: BaseConfig,
    pub database_url: String,
    /// Base64-encoded 32-byte key sealing stored tokens
    pub encryption_key: String,
    // Staging storage
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub staging_prefix: String,
    /// Directory for local artifacts; system temp dir when unset
    pub artifact_dir: Option<String>,
    // Authorization provider
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub oauth_auth_url: String,
    pub oauth_token_url: String,
    pub oauth_userinfo_url: String,
    // Destination platform
    pub youtube_upload_base_url: String,
    pub youtube_watch_base_url: String,
    // Pipeline
    pub fetch_timeout_secs: u64,
    pub max_source_size_bytes: u64,
    /// 0 disables the per-run timeout
    pub run_timeout_secs: u64,
    pub token_refresh_skew_secs: i64,
    // Source URL guard
    // Example: "cdn.example.com,videos.example.org"
    pub url_upload_allowlist: Option<Vec<String>>,
    pub allow_private_source_ips: bool,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PublisherConfig>);

impl Config {
    fn inner(&self) -> &PublisherConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PublisherConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn encryption_key(&self) -> &str {
        &self.inner().encryption_key
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend.unwrap_or(StorageBackend::S3)
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    /// `S3_REGION`, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.inner()
            .s3_region
            .as_deref()
            .or(self.inner().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn staging_prefix(&self) -> &str {
        &self.inner().staging_prefix
    }

    pub fn artifact_dir(&self) -> Option<&str> {
        self.inner().artifact_dir.as_deref()
    }

    pub fn google_client_id(&self) -> &str {
        &self.inner().google_client_id
    }

    pub fn google_client_secret(&self) -> &str {
        &self.inner().google_client_secret
    }

    pub fn google_redirect_uri(&self) -> &str {
        &self.inner().google_redirect_uri
    }

    pub fn oauth_auth_url(&self) -> &str {
        &self.inner().oauth_auth_url
    }

    pub fn oauth_token_url(&self) -> &str {
        &self.inner().oauth_token_url
    }

    pub fn oauth_userinfo_url(&self) -> &str {
        &self.inner().oauth_userinfo_url
    }

    pub fn youtube_upload_base_url(&self) -> &str {
        &self.inner().youtube_upload_base_url
    }

    pub fn youtube_watch_base_url(&self) -> &str {
        &self.inner().youtube_watch_base_url
    }

    pub fn fetch_timeout_secs(&self) -> u64 {
        self.inner().fetch_timeout_secs
    }

    pub fn max_source_size_bytes(&self) -> u64 {
        self.inner().max_source_size_bytes
    }

    pub fn run_timeout_secs(&self) -> u64 {
        self.inner().run_timeout_secs
    }

    pub fn token_refresh_skew_secs(&self) -> i64 {
        self.inner().token_refresh_skew_secs
    }

    pub fn url_upload_allowlist(&self) -> Option<&[String]> {
        self.inner().url_upload_allowlist.as_deref()
    }

    pub fn allow_private_source_ips(&self) -> bool {
        self.inner().allow_private_source_ips
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool_or(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| v.trim().to_lowercase())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl PublisherConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build from an arbitrary key lookup. Does not validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = var("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: parse_or(var("DB_MAX_CONNECTIONS"), MAX_CONNECTIONS),
            db_timeout_seconds: parse_or(var("DB_TIMEOUT_SECONDS"), CONNECTION_TIMEOUT_SECS),
            environment,
        };

        let storage_backend = var("STORAGE_BACKEND")
            .map(|s| s.parse::<StorageBackend>())
            .transpose()?;

        Ok(PublisherConfig {
            base,
            database_url: var("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            encryption_key: var("ENCRYPTION_KEY")
                .ok_or_else(|| anyhow::anyhow!("ENCRYPTION_KEY must be set to seal stored tokens"))?,
            storage_backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            staging_prefix: var("STAGING_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|| STAGING_PREFIX.to_string()),
            artifact_dir: var("ARTIFACT_DIR"),
            google_client_id: var("GOOGLE_CLIENT_ID")
                .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLIENT_ID must be set"))?,
            google_client_secret: var("GOOGLE_CLIENT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("GOOGLE_CLIENT_SECRET must be set"))?,
            google_redirect_uri: var("GOOGLE_REDIRECT_URI")
                .ok_or_else(|| anyhow::anyhow!("GOOGLE_REDIRECT_URI must be set"))?,
            oauth_auth_url: var("OAUTH_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.to_string()),
            oauth_token_url: var("OAUTH_TOKEN_URL")
                .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            oauth_userinfo_url: var("OAUTH_USERINFO_URL")
                .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string()),
            youtube_upload_base_url: var("YOUTUBE_UPLOAD_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| YOUTUBE_UPLOAD_BASE_URL.to_string()),
            youtube_watch_base_url: var("YOUTUBE_WATCH_BASE_URL")
                .unwrap_or_else(|| YOUTUBE_WATCH_BASE_URL.to_string()),
            fetch_timeout_secs: parse_or(var("FETCH_TIMEOUT_SECS"), FETCH_TIMEOUT_SECS),
            max_source_size_bytes: parse_or(var("MAX_SOURCE_SIZE_MB"), MAX_SOURCE_SIZE_MB)
                * 1024
                * 1024,
            run_timeout_secs: parse_or(var("RUN_TIMEOUT_SECS"), RUN_TIMEOUT_SECS),
            token_refresh_skew_secs: parse_or(
                var("TOKEN_REFRESH_SKEW_SECS"),
                TOKEN_REFRESH_SKEW_SECS,
            ),
            url_upload_allowlist: var("URL_UPLOAD_ALLOWLIST").map(|s| {
                s.split(',')
                    .map(|domain| domain.trim().to_lowercase())
                    .filter(|domain| !domain.is_empty())
                    .collect()
            }),
            allow_private_source_ips: parse_bool_or(var("ALLOW_PRIVATE_SOURCE_IPS"), false),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        let key = general_purpose::STANDARD
            .decode(self.encryption_key.trim())
            .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be base64 encoded"))?;
        if key.len() != 32 {
            return Err(anyhow::anyhow!("ENCRYPTION_KEY must decode to 32 bytes"));
        }

        if !self.google_redirect_uri.starts_with("http://")
            && !self.google_redirect_uri.starts_with("https://")
        {
            return Err(anyhow::anyhow!("GOOGLE_REDIRECT_URI must be an absolute URL"));
        }

        if self.max_source_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_SOURCE_SIZE_MB must be greater than 0"));
        }

        if self.staging_prefix.is_empty() {
            return Err(anyhow::anyhow!("STAGING_PREFIX cannot be empty"));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DATABASE_URL", "postgresql://localhost/relaycast".to_string()),
            (
                "ENCRYPTION_KEY",
                general_purpose::STANDARD.encode([3u8; 32]),
            ),
            ("GOOGLE_CLIENT_ID", "client-id".to_string()),
            ("GOOGLE_CLIENT_SECRET", "client-secret".to_string()),
            (
                "GOOGLE_REDIRECT_URI",
                "http://localhost:3000/auth/callback".to_string(),
            ),
            ("STORAGE_BACKEND", "local".to_string()),
            ("LOCAL_STORAGE_PATH", "/tmp/relaycast".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<PublisherConfig, anyhow::Error> {
        PublisherConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.base.server_port, 3000);
        assert_eq!(config.staging_prefix, "staging");
        assert_eq!(config.max_source_size_bytes, 2048 * 1024 * 1024);
        assert_eq!(config.run_timeout_secs, 3600);
        assert_eq!(config.token_refresh_skew_secs, 60);
        assert_eq!(config.oauth_token_url, GOOGLE_TOKEN_URL);
        assert!(!config.allow_private_source_ips);
        assert!(config.url_upload_allowlist.is_none());
    }

    #[test]
    fn test_missing_required_settings_fail() {
        for key in ["DATABASE_URL", "ENCRYPTION_KEY", "GOOGLE_CLIENT_ID"] {
            let mut env = base_env();
            env.remove(key);
            let err = load(&env).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut env = base_env();
        env.insert("ENVIRONMENT", "production".to_string());
        assert!(load(&env).is_err());

        env.insert("CORS_ORIGINS", "https://app.example.com".to_string());
        let config = Config(Box::new(load(&env).unwrap()));
        assert!(config.is_production());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut env = base_env();
        env.insert("ENCRYPTION_KEY", general_purpose::STANDARD.encode([1u8; 16]));
        assert!(load(&env).unwrap().validate().is_err());

        let mut env = base_env();
        env.insert("STORAGE_BACKEND", "s3".to_string());
        let err = load(&env).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));

        env.insert("S3_BUCKET", "bucket".to_string());
        env.insert("AWS_REGION", "eu-west-1".to_string());
        let config = Config(Box::new(load(&env).unwrap()));
        config.validate().unwrap();
        assert_eq!(config.s3_region(), Some("eu-west-1"));
    }

    #[test]
    fn test_allowlist_and_prefix_normalized() {
        let mut env = base_env();
        env.insert("URL_UPLOAD_ALLOWLIST", " CDN.example.com, ,videos.example.org".to_string());
        env.insert("STAGING_PREFIX", "/uploads/".to_string());
        let config = load(&env).unwrap();
        assert_eq!(
            config.url_upload_allowlist.unwrap(),
            vec!["cdn.example.com", "videos.example.org"]
        );
        assert_eq!(config.staging_prefix, "uploads");
    }
}
