use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// CORS allowed origins. Empty allows any origin (development mode).
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

fn default_http_port() -> u16 {
    8080
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_addr: default_bind_addr(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            advisor: AdvisorConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Full connection URL. Defaults to a SQLite file inside `data_dir`.
    #[serde(default)]
    pub url: Option<String>,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            url: None,
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!(
                "sqlite://{}?mode=rwc",
                std::path::Path::new(&self.data_dir)
                    .join("vexec.db")
                    .display()
            ),
        }
    }
}

/// A login account created or refreshed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub name: String,
    #[serde(default = "default_user_role")]
    pub role: String,
    #[serde(default)]
    pub company_id: Option<String>,
    /// Plaintext password, hashed at seed time
    #[serde(default)]
    pub password: Option<String>,
    /// Pre-computed bcrypt hash; wins over `password`
    #[serde(default)]
    pub password_hash: Option<String>,
}

fn default_user_role() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_expire_secs")]
    pub token_expire_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expire_secs: default_token_expire_secs(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
            bcrypt_cost: default_bcrypt_cost(),
            users: Vec::new(),
        }
    }
}

fn default_token_expire_secs() -> u64 {
    86400
}

fn default_cookie_name() -> String {
    "vexec_token".to_string()
}

fn default_bcrypt_cost() -> u32 {
    12
}

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_advisor_enabled")]
    pub enabled: bool,
    /// Falls back to the `ANTHROPIC_API_KEY` environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_advisor_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_advisor_max_tokens")]
    pub max_tokens: u32,
}

fn default_advisor_enabled() -> bool {
    true
}

fn default_advisor_timeout_secs() -> u64 {
    60
}

fn default_advisor_max_tokens() -> u32 {
    2048
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: default_advisor_enabled(),
            api_key: None,
            model: None,
            base_url: None,
            timeout_secs: default_advisor_timeout_secs(),
            max_tokens: default_advisor_max_tokens(),
        }
    }
}

impl AdvisorConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(API_KEY_ENV)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

fn default_max_file_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
        }
    }
}
