use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Top-level configuration, loaded from `~/.echoquill/config.toml`.
///
/// The confidential client secret is deliberately absent: the exchange proxy
/// reads it from `ECHOQUILL_CLIENT_SECRET` at startup and it is never written
/// to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub oauth: OAuthConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Public (non-confidential) client id registered with the platform.
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Where the CLI reaches the exchange proxy.
    #[serde(default = "default_proxy_base_url")]
    pub base_url: String,
    /// Optional shared key the proxy requires on `/oauth/exchange`.
    #[serde(default)]
    pub access_key: Option<String>,
    /// Bind address for `echoquill proxy`.
    #[serde(default = "default_proxy_host")]
    pub host: String,
    #[serde(default = "default_proxy_port")]
    pub port: u16,
    /// Identity-provider endpoints the proxy talks to.
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_platform_api_base")]
    pub api_base: String,
    /// Posts requested per fetch (platform caps apply).
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; `~` is expanded.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:3000/callback".into()
}

fn default_scopes() -> String {
    "post.read users.read post.write offline.access".into()
}

fn default_authorize_url() -> String {
    "https://x.com/i/oauth2/authorize".into()
}

fn default_proxy_base_url() -> String {
    "http://127.0.0.1:8787".into()
}

fn default_proxy_host() -> String {
    "127.0.0.1".into()
}

fn default_proxy_port() -> u16 {
    8787
}

fn default_token_url() -> String {
    "https://api.x.com/2/oauth2/token".into()
}

fn default_profile_url() -> String {
    "https://api.x.com/2/users/me".into()
}

fn default_platform_api_base() -> String {
    "https://api.x.com/2".into()
}

fn default_fetch_limit() -> u8 {
    50
}

fn default_completion_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

fn default_completion_model() -> String {
    "meta-llama/llama-3.3-70b-instruct:free".into()
}

fn default_db_path() -> String {
    "~/.echoquill/echoquill.db".into()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            authorize_url: default_authorize_url(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: default_proxy_base_url(),
            access_key: None,
            host: default_proxy_host(),
            port: default_proxy_port(),
            token_url: default_token_url(),
            profile_url: default_profile_url(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base: default_platform_api_base(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            model: default_completion_model(),
            api_key: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            oauth: OAuthConfig::default(),
            proxy: ProxyConfig::default(),
            platform: PlatformConfig::default(),
            completion: CompletionConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("could not find home directory".into()))?;
        let echoquill_dir = home.join(".echoquill");
        let config_path = echoquill_dir.join("config.toml");

        if !echoquill_dir.exists() {
            fs::create_dir_all(&echoquill_dir)?;
        }

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)?;
            let mut config: Config = toml::from_str(&contents)
                .map_err(|e| ConfigError::Load(format!("could not parse config file: {e}")))?;
            config.config_path.clone_from(&config_path);
            config.workspace_dir = echoquill_dir;
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        } else {
            let mut config = Self {
                config_path: config_path.clone(),
                workspace_dir: echoquill_dir,
                ..Self::default()
            };
            config.save()?;
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Load(format!("could not serialize config: {e}")))?;
        fs::write(&self.config_path, toml_str)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("ECHOQUILL_CLIENT_ID")
            && !id.is_empty()
        {
            self.oauth.client_id = id;
        }

        if let Ok(uri) = std::env::var("ECHOQUILL_REDIRECT_URI")
            && !uri.is_empty()
        {
            self.oauth.redirect_uri = uri;
        }

        if let Ok(url) = std::env::var("ECHOQUILL_PROXY_URL")
            && !url.is_empty()
        {
            self.proxy.base_url = url;
        }

        if let Ok(key) = std::env::var("ECHOQUILL_PROXY_ACCESS_KEY")
            && !key.is_empty()
        {
            self.proxy.access_key = Some(key);
        }

        if let Ok(port_str) =
            std::env::var("ECHOQUILL_PROXY_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.proxy.port = port;
        }

        if let Ok(base) = std::env::var("ECHOQUILL_PLATFORM_API")
            && !base.is_empty()
        {
            self.platform.api_base = base;
        }

        if let Ok(key) = std::env::var("ECHOQUILL_COMPLETION_API_KEY")
            .or_else(|_| std::env::var("COMPLETION_API_KEY"))
            && !key.is_empty()
        {
            self.completion.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("ECHOQUILL_MODEL")
            && !model.is_empty()
        {
            self.completion.model = model;
        }

        if let Ok(path) = std::env::var("ECHOQUILL_DB")
            && !path.is_empty()
        {
            self.storage.db_path = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.redirect_uri.is_empty() {
            return Err(ConfigError::Validation("redirect_uri must be set".into()));
        }
        if self.completion.model.is_empty() {
            return Err(ConfigError::Validation(
                "completion.model must be set".into(),
            ));
        }
        if self.platform.fetch_limit == 0 || self.platform.fetch_limit > 100 {
            return Err(ConfigError::Validation(
                "platform.fetch_limit must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }

    /// Database path with `~` expanded.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.db_path).into_owned())
    }
}
