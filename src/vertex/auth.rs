//! OAuth2 access tokens for Vertex AI.
//!
//! Either a fixed token from configuration, or one obtained by running an
//! external command (`gcloud auth print-access-token` by default) and reused
//! until its configured lifetime runs out.

use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::VertexConfig;
use crate::vertex::VertexError;

/// Source of bearer tokens for upstream calls.
pub enum TokenSource {
    Static(SecretString),
    Command(CommandToken),
}

impl TokenSource {
    /// Pick the token source described by the Vertex config.
    pub fn from_config(config: &VertexConfig) -> Result<Self, VertexError> {
        if let Some(token) = config.access_token.as_ref().filter(|t| !t.is_empty()) {
            info!("Using configured Vertex AI access token");
            return Ok(TokenSource::Static(SecretString::from(token.clone())));
        }

        let (program, args) = config
            .token_command
            .split_first()
            .ok_or_else(|| VertexError::Token("token_command is empty".to_string()))?;

        info!(command = %config.token_command.join(" "), "Using command-issued access tokens");
        Ok(TokenSource::Command(CommandToken::new(
            program.clone(),
            args.to_vec(),
            Duration::from_secs(config.token_ttl_secs),
        )))
    }

    /// Return a token valid for the next request.
    pub async fn token(&self) -> Result<SecretString, VertexError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Command(cmd) => cmd.token().await,
        }
    }
}

/// A token printed by an external command, cached for `ttl`.
pub struct CommandToken {
    program: String,
    args: Vec<String>,
    ttl: Duration,
    cached: Mutex<Option<(SecretString, Instant)>>,
}

impl CommandToken {
    pub fn new(program: String, args: Vec<String>, ttl: Duration) -> Self {
        Self {
            program,
            args,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<SecretString, VertexError> {
        let mut cached = self.cached.lock().await;

        if let Some((token, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                return Ok(token.clone());
            }
        }

        let token = self.fetch().await?;
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }

    async fn fetch(&self) -> Result<SecretString, VertexError> {
        debug!(program = %self.program, "Fetching access token");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| VertexError::Token(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VertexError::Token(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(VertexError::Token(format!(
                "{} printed an empty token",
                self.program
            )));
        }

        Ok(SecretString::from(token))
    }
}

/// `Bearer <token>` header value.
pub fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let config = VertexConfig {
            access_token: Some("ya29.static".to_string()),
            ..Default::default()
        };
        let source = TokenSource::from_config(&config).unwrap();
        let token = source.token().await.unwrap();
        assert_eq!(token.expose_secret(), "ya29.static");
        assert_eq!(bearer(&token), "Bearer ya29.static");
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let config = VertexConfig {
            token_command: vec![],
            ..Default::default()
        };
        assert!(matches!(
            TokenSource::from_config(&config),
            Err(VertexError::Token(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_token_is_trimmed_and_cached() {
        let cmd = CommandToken::new(
            "echo".to_string(),
            vec!["  ya29.from-cmd  ".to_string()],
            Duration::from_secs(60),
        );
        let first = cmd.token().await.unwrap();
        assert_eq!(first.expose_secret(), "ya29.from-cmd");
        assert!(cmd.cached.lock().await.is_some());
        let second = cmd.token().await.unwrap();
        assert_eq!(second.expose_secret(), "ya29.from-cmd");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_an_error() {
        let cmd = CommandToken::new("false".to_string(), vec![], Duration::from_secs(60));
        assert!(matches!(cmd.token().await, Err(VertexError::Token(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let cmd = CommandToken::new(
            "definitely-not-a-real-binary-xyz".to_string(),
            vec![],
            Duration::from_secs(60),
        );
        assert!(matches!(cmd.token().await, Err(VertexError::Token(_))));
    }
}
