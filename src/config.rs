use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// COS connection configuration
#[derive(Clone, Deserialize)]
pub struct CosConfig {
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Replaces the computed bucket URL, e.g. a custom domain
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Replaces the computed service URL used to list buckets
    #[serde(default)]
    pub service_endpoint: Option<String>,
    /// Signature validity in seconds
    #[serde(default = "default_sign_expire")]
    pub sign_expire: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

// Default values
fn default_app_id() -> String {
    "1306582638".to_string()
}

fn default_region() -> String {
    "ap-shanghai".to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_sign_expire() -> u64 {
    7200 // 2 hours
}

fn default_timeout() -> u64 {
    24 * 3600
}

impl Default for CosConfig {
    fn default() -> Self {
        Self {
            secret_id: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            app_id: default_app_id(),
            region: default_region(),
            scheme: default_scheme(),
            endpoint: None,
            service_endpoint: None,
            sign_expire: default_sign_expire(),
            timeout: default_timeout(),
        }
    }
}

impl std::fmt::Debug for CosConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .field("bucket", &self.bucket)
            .field("app_id", &self.app_id)
            .field("region", &self.region)
            .field("scheme", &self.scheme)
            .field("endpoint", &self.endpoint)
            .field("service_endpoint", &self.service_endpoint)
            .field("sign_expire", &self.sign_expire)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CosConfig {
    /// Config for a bucket with the default app id and region
    pub fn new(
        bucket: impl Into<String>,
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    /// Load configuration from file and environment variables
    ///
    /// An explicit `path` must exist; otherwise the default locations are
    /// searched and missing files fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_from_file()?,
        };
        config.apply_overrides(|key| env::var(key).ok());
        tracing::debug!(
            "COS config: bucket={}, region={}, app_id={}",
            config.bucket,
            config.region,
            config.app_id
        );
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration from coskit.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["coskit.toml", "config.toml", "data/coskit.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                return Self::load_from_path(Path::new(path));
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Apply overrides from a variable lookup
    /// Format: COSKIT_<KEY>
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("COSKIT_SECRET_ID") {
            self.secret_id = val;
        }
        if let Some(val) = lookup("COSKIT_SECRET_KEY") {
            self.secret_key = val;
        }
        if let Some(val) = lookup("COSKIT_BUCKET") {
            self.bucket = val;
        }
        if let Some(val) = lookup("COSKIT_APP_ID") {
            if !val.trim().is_empty() {
                self.app_id = val;
            }
        }
        if let Some(val) = lookup("COSKIT_REGION") {
            if !val.trim().is_empty() {
                self.region = val;
            }
        }
        if let Some(val) = lookup("COSKIT_SCHEME") {
            if !val.trim().is_empty() {
                self.scheme = val;
            }
        }
        if let Some(val) = lookup("COSKIT_ENDPOINT") {
            self.endpoint = Some(val).filter(|v| !v.trim().is_empty());
        }
        if let Some(val) = lookup("COSKIT_SERVICE_ENDPOINT") {
            self.service_endpoint = Some(val).filter(|v| !v.trim().is_empty());
        }
        if let Some(val) = lookup("COSKIT_SIGN_EXPIRE") {
            if let Ok(secs) = val.parse() {
                self.sign_expire = secs;
            }
        }
        if let Some(val) = lookup("COSKIT_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.timeout = secs;
            }
        }
    }

    /// Bucket endpoint, e.g. `https://photos-1306582638.cos.ap-shanghai.myqcloud.com`
    pub fn bucket_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "{}://{}-{}.cos.{}.myqcloud.com",
                self.scheme, self.bucket, self.app_id, self.region
            ),
        }
    }

    /// Endpoint used to list all buckets of the account
    pub fn service_url(&self) -> String {
        if let Some(endpoint) = &self.service_endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        if self.region.is_empty() {
            return format!("{}://service.cos.myqcloud.com", self.scheme);
        }
        format!("{}://cos.{}.myqcloud.com", self.scheme, self.region)
    }

    pub fn sign_expire(&self) -> Duration {
        Duration::from_secs(self.sign_expire)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
