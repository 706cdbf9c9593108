use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{ClientError, ClientResult};

#[derive(Parser, Debug)]
#[command(name = "superblog", about = "A command-line client for Super Blog")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the blog API
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Path to data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the credential pair
    Login { username: String, password: String },
    /// Forget the stored credential pair
    Logout,
    /// Create an account (does not log in)
    Register { username: String, password: String },
    /// Show who the stored credentials belong to
    Whoami,
    /// List posts, optionally filtered by a search query
    Posts {
        #[arg(short, long)]
        search: Option<String>,
    },
    /// List posts in a category
    Category { name: String },
    /// List categories
    Categories,
    /// Show a post with its comments
    Post { slug: String },
    /// Comment on a post
    Comment { slug: String, content: String },
    /// Create a post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        #[arg(long)]
        content_file: Option<PathBuf>,
        #[arg(long)]
        category: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Edit a post you own
    Edit {
        slug: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        #[arg(long)]
        content_file: Option<PathBuf>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete a post
    Delete { slug: String },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub login_path: String,
    /// Body field carrying the login name, `username` or `email`.
    pub login_field: String,
    pub refresh_path: String,
    pub register_path: String,
    pub refresh_on_expiry: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/api/token/".to_string(),
            login_field: "username".to_string(),
            refresh_path: "/api/token/refresh/".to_string(),
            register_path: "/api/user/register/".to_string(),
            refresh_on_expiry: true,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli)?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref base_url) = cli.base_url {
            config.server.base_url = base_url.clone();
        }

        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("superblog.db"));
        }

        config.base_url()?;
        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> anyhow::Result<PathBuf> {
        match cli.data_dir.clone() {
            Some(dir) => Ok(dir),
            None => dirs::home_dir()
                .map(|home| home.join(".superblog"))
                .ok_or_else(|| anyhow::anyhow!("Could not determine home directory")),
        }
    }

    pub fn db_path(&self) -> ClientResult<&PathBuf> {
        self.storage
            .path
            .as_ref()
            .ok_or_else(|| ClientError::Config("storage path is not set".into()))
    }

    pub fn base_url(&self) -> ClientResult<url::Url> {
        let url = url::Url::parse(&self.server.base_url)
            .map_err(|e| ClientError::Config(format!("base_url: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "base_url: {} cannot be used as a base",
                self.server.base_url
            )));
        }
        Ok(url)
    }

    /// Storage scope for persisted client state, `scheme://host:port`.
    pub fn origin(&self) -> ClientResult<String> {
        Ok(self.base_url()?.origin().ascii_serialization())
    }
}
