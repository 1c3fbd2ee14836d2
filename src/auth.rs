//! Модуль получения OAuth токена Google
//!
//! Токен берется из конфигурации, а если его нет - из
//! `gcloud auth print-access-token`. Полученный от gcloud токен кэшируется
//! и обновляется до истечения часового срока жизни.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::process::Command;

use crate::error::{PipelineError, Result};

/// Токены gcloud живут час, обновляем с запасом
const TOKEN_TTL: Duration = Duration::from_secs(45 * 60);

pub struct TokenSource {
    configured: Option<String>,
    cached: Mutex<Option<(String, Instant)>>,
}

impl TokenSource {
    pub fn new(configured: Option<String>) -> Self {
        Self {
            configured: configured.filter(|t| !t.trim().is_empty()),
            cached: Mutex::new(None),
        }
    }

    /// Токен задан явно (не требуется gcloud)
    pub fn is_static(&self) -> bool {
        self.configured.is_some()
    }

    pub async fn token(&self) -> Result<String> {
        if let Some(token) = &self.configured {
            return Ok(token.clone());
        }

        let cached = self.cached.lock().clone();
        if let Some((token, fetched_at)) = cached {
            if fetched_at.elapsed() < TOKEN_TTL {
                return Ok(token);
            }
        }

        let token = print_access_token().await?;
        *self.cached.lock() = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}

async fn print_access_token() -> Result<String> {
    log::debug!("Requesting access token from gcloud");
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| {
            PipelineError::Configuration(format!(
                "No access token configured and gcloud is unavailable: {}",
                e
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Configuration(format!(
            "gcloud auth print-access-token failed: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(PipelineError::Configuration(
            "gcloud returned an empty access token".to_string(),
        ));
    }
    Ok(token)
}
