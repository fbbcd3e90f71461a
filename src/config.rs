//! Runtime configuration for vertex-gateway.
//!
//! Configuration is loaded from a JSON file, then selected fields are
//! overridden from the environment. Every section is optional and falls back
//! to defaults, so an empty `{}` file is a valid configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "vertex-gateway", about = "OpenAI-compatible gateway for Vertex AI Gemini")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Vertex AI project, location and credentials.
    pub vertex: VertexConfig,

    /// Client-facing model aliases.
    pub models: ModelsConfig,

    /// Generation defaults applied to every chat request.
    pub generation: GenerationDefaults,

    /// Streaming response settings.
    pub streaming: StreamingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:5000").
    pub listen: String,

    /// Upstream request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Bearer token clients must present. `None` leaves the API open.
    pub api_key: Option<String>,

    /// Allow any origin, method and header.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 300,
            api_key: None,
            cors: true,
        }
    }
}

/// Vertex AI endpoint and credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VertexConfig {
    /// Google Cloud project ID.
    pub project_id: String,

    /// Vertex AI region.
    pub location: String,

    /// Override for `https://{location}-aiplatform.googleapis.com`.
    pub base_url: Option<String>,

    /// Fixed OAuth2 access token. When unset, `token_command` is used.
    pub access_token: Option<String>,

    /// Command printing an access token on stdout.
    pub token_command: Vec<String>,

    /// How long a command-issued token is reused, in seconds.
    pub token_ttl_secs: u64,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project_id: "cursor-use-api".to_string(),
            location: "us-central1".to_string(),
            base_url: None,
            access_token: None,
            token_command: vec![
                "gcloud".to_string(),
                "auth".to_string(),
                "print-access-token".to_string(),
            ],
            token_ttl_secs: 45 * 60,
        }
    }
}

impl VertexConfig {
    /// Base URL of the regional Vertex AI endpoint, without a trailing slash.
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }
}

/// Model alias tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Chat alias → Vertex model ID.
    pub chat: BTreeMap<String, String>,

    /// Model used for unknown chat aliases.
    pub default_chat: String,

    /// Embedding alias → Vertex model ID.
    pub embeddings: BTreeMap<String, String>,

    /// Model used for unknown embedding aliases.
    pub default_embedding: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let chat = [
            ("gpt-4", "gemini-2.5-pro"),
            ("gpt-4-turbo", "gemini-2.5-pro"),
            ("gpt-4-vision-preview", "gemini-2.5-pro"),
            ("gpt-4o", "gemini-2.5-flash"),
            ("gpt-3.5-turbo", "gemini-2.5-flash"),
            ("gpt-3.5-turbo-16k", "gemini-2.5-flash"),
            ("gemini-pro", "gemini-2.5-pro"),
            ("gemini-flash", "gemini-2.5-flash"),
        ];
        let embeddings = [
            ("text-embedding-3-small", "text-embedding-004"),
            ("text-embedding-3-large", "text-embedding-004"),
            ("text-embedding-ada-002", "text-embedding-004"),
        ];

        Self {
            chat: chat
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            default_chat: "gemini-2.5-pro".to_string(),
            embeddings: embeddings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            default_embedding: "text-embedding-004".to_string(),
        }
    }
}

/// Generation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    /// Temperature used when the request does not set one.
    pub temperature: f64,

    /// Send `BLOCK_NONE` for every harm category.
    pub safety_block_none: bool,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            safety_block_none: true,
        }
    }
}

/// Streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Re-chunk streamed text at sentence boundaries.
    pub sentence_buffering: bool,

    /// Flush the sentence buffer once it holds this many characters.
    pub max_buffer_chars: usize,

    /// Capacity of the channel between the upstream task and the response.
    pub channel_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            sentence_buffering: true,
            max_buffer_chars: 200,
            channel_capacity: 32,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(project) = first(&["PROJECT_ID", "GOOGLE_CLOUD_PROJECT"]) {
            self.vertex.project_id = project;
        }
        if let Some(location) = first(&["LOCATION", "GOOGLE_CLOUD_LOCATION"]) {
            self.vertex.location = location;
        }
        if let Some(token) = first(&["VERTEX_ACCESS_TOKEN", "GOOGLE_ACCESS_TOKEN"]) {
            self.vertex.access_token = Some(token);
        }
        if let Some(key) = first(&["GATEWAY_API_KEY"]) {
            self.server.api_key = Some(key);
        }
        if let Some(port) = first(&["PORT"]) {
            let host = self
                .server
                .listen
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.listen = format!("{host}:{}", port.trim());
        }
    }
}
