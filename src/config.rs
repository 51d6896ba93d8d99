use std::env;
use std::path::PathBuf;

use clap::Parser;

/// Applied unconditionally on a GET miss when configured: redirects the
/// client instead of falling through to index/error-document handling.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub protocol: String,
    pub host_name: Option<String>,
    pub replace_key_prefix_with: String,
    pub http_redirect_code: u16,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub directory: PathBuf,
    pub port: u16,
    pub hostname: String,
    pub silent: bool,
    pub index_document: Option<String>,
    pub error_document: Option<String>,
    pub routing_rule: Option<RoutingRule>,
}

impl ServerConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            port: 4578,
            hostname: "localhost".to_string(),
            silent: false,
            index_document: None,
            error_document: None,
            routing_rule: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn index_document(mut self, doc: impl Into<String>) -> Self {
        self.index_document = Some(doc.into());
        self
    }

    pub fn error_document(mut self, doc: impl Into<String>) -> Self {
        self.error_document = Some(doc.into());
        self
    }

    pub fn routing_rule(mut self, rule: RoutingRule) -> Self {
        self.routing_rule = Some(rule);
        self
    }

    /// Builds a config from environment variables, falling back to the
    /// same defaults as [`ServerConfig::new`].
    pub fn from_env() -> anyhow::Result<Self> {
        let directory = env::var("RUSTBUCKET_DIRECTORY").unwrap_or_else(|_| ".".to_string());
        let mut config = ServerConfig::new(PathBuf::from(directory));
        if let Ok(port) = env::var("RUSTBUCKET_PORT") {
            config = config.port(port.parse()?);
        }
        if let Ok(hostname) = env::var("RUSTBUCKET_HOSTNAME") {
            config = config.hostname(hostname);
        }
        if let Ok(silent) = env::var("RUSTBUCKET_SILENT") {
            config = config.silent(silent.parse().unwrap_or(false));
        }
        if let Ok(index) = env::var("RUSTBUCKET_INDEX_DOCUMENT") {
            config = config.index_document(index);
        }
        if let Ok(error) = env::var("RUSTBUCKET_ERROR_DOCUMENT") {
            config = config.error_document(error);
        }
        Ok(config)
    }
}

/// A filesystem-backed, single-process S3-compatible object store.
#[derive(Debug, Parser)]
#[command(name = "rustbucket", version, about)]
pub struct Cli {
    /// Directory to serve buckets from.
    #[arg(default_value = ".")]
    pub directory: PathBuf,

    #[arg(short, long, env = "RUSTBUCKET_PORT", default_value_t = 4578)]
    pub port: u16,

    #[arg(long, env = "RUSTBUCKET_HOSTNAME", default_value = "localhost")]
    pub hostname: String,

    /// Suppress request logging.
    #[arg(short, long, env = "RUSTBUCKET_SILENT")]
    pub silent: bool,

    /// Served at a bucket's root when static-site mode is enabled and a
    /// key ending in `/` is requested.
    #[arg(long = "index-document", env = "RUSTBUCKET_INDEX_DOCUMENT")]
    pub index_document: Option<String>,

    /// Served, with its own status code, when a static-site GET misses.
    #[arg(long = "error-document", env = "RUSTBUCKET_ERROR_DOCUMENT")]
    pub error_document: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new(self.directory)
            .port(self.port)
            .hostname(self.hostname)
            .silent(self.silent);
        if let Some(index) = self.index_document {
            config = config.index_document(index);
        }
        if let Some(error) = self.error_document {
            config = config.error_document(error);
        }
        config
    }
}
