//! Settings file management

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::deploy::apply::ContentRoots;
use crate::logs::LogLevel;
use crate::models::deployment::Credentials;

/// Agent settings
#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Also log to a rolling file under the layout's logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// GitHub repository and credentials
    #[serde(default)]
    pub github: GithubSettings,

    /// WordPress content directories
    #[serde(default)]
    pub content: ContentSettings,

    /// Change paths under this prefix belong to the agent itself and are never deployed
    #[serde(default = "default_self_path")]
    pub self_path: String,

    /// Local HTTP server
    #[serde(default)]
    pub server: ServerSettings,

    /// Maximum number of queued deployment triggers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_self_path() -> String {
    "plugins/wp-gitdeploy".to_string()
}

fn default_queue_capacity() -> usize {
    16
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::INFO,
            log_to_file: false,
            github: GithubSettings::default(),
            content: ContentSettings::default(),
            self_path: default_self_path(),
            server: ServerSettings::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// GitHub settings
#[derive(Debug, Serialize, Deserialize)]
pub struct GithubSettings {
    /// Repository owner
    #[serde(default)]
    pub username: String,

    /// Personal access token. Never written back out.
    #[serde(default = "empty_token", skip_serializing)]
    pub token: SecretString,

    /// Repository name
    #[serde(default)]
    pub repository: String,

    /// Branch to deploy from
    #[serde(default = "default_branch")]
    pub branch: String,

    /// API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for the whole snapshot download, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn empty_token() -> SecretString {
    SecretString::from(String::new())
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    1000
}

impl GithubSettings {
    pub fn credentials(&self) -> Credentials {
        use secrecy::ExposeSecret;

        Credentials {
            username: self.username.clone(),
            token: SecretString::from(self.token.expose_secret().to_string()),
            repository: self.repository.clone(),
            branch: self.branch.clone(),
        }
    }
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: empty_token(),
            repository: String::new(),
            branch: default_branch(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// WordPress content directories.
///
/// Each root defaults to a subdirectory of `content_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSettings {
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    #[serde(default)]
    pub plugins_dir: Option<PathBuf>,

    #[serde(default)]
    pub themes_dir: Option<PathBuf>,

    #[serde(default)]
    pub mu_plugins_dir: Option<PathBuf>,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("/var/www/html/wp-content")
}

impl ContentSettings {
    pub fn roots(&self) -> ContentRoots {
        ContentRoots {
            plugins: self
                .plugins_dir
                .clone()
                .unwrap_or_else(|| self.content_dir.join("plugins")),
            themes: self
                .themes_dir
                .clone()
                .unwrap_or_else(|| self.content_dir.join("themes")),
            mu_plugins: self
                .mu_plugins_dir
                .clone()
                .unwrap_or_else(|| self.content_dir.join("mu-plugins")),
        }
    }
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            plugins_dir: None,
            themes_dir: None,
            mu_plugins_dir: None,
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8787
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}
