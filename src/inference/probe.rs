//! Model availability checks.

use crate::error::{QuizbankError, Result};
use crate::sources::base_url;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// Subset of the inference server's `/info` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    #[serde(default)]
    pub max_input_length: Option<usize>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Checks that an inference server is up and serving the expected model.
pub struct ModelProbe {
    client: reqwest::Client,
}

impl ModelProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(QuizbankError::Http)?;
        Ok(Self { client })
    }

    /// Fetch `/info` and verify the served model matches `expected_model`.
    #[instrument(skip(self))]
    pub async fn ensure_ready(&self, base: &str, expected_model: &str) -> Result<ModelInfo> {
        let start = Instant::now();
        let url = base_url(base)?.join("info")?;

        let res = self.client.get(url).send().await.map_err(|e| {
            QuizbankError::ModelUnavailable(format!("{} unreachable: {}", base, e))
        })?;
        if !res.status().is_success() {
            return Err(QuizbankError::ModelUnavailable(format!(
                "{} answered {}",
                base,
                res.status()
            )));
        }

        let info: ModelInfo = res.json().await.map_err(|e| {
            QuizbankError::ModelUnavailable(format!("{} returned malformed info: {}", base, e))
        })?;

        if info.model_id != expected_model {
            return Err(QuizbankError::ModelUnavailable(format!(
                "{} serves '{}', expected '{}'",
                base, info.model_id, expected_model
            )));
        }

        info!(
            "Model '{}' ready at {} in {:.2} seconds",
            info.model_id,
            base,
            start.elapsed().as_secs_f64()
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_router;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    #[tokio::test]
    async fn test_probe_checks_model_id() {
        let router = Router::new().route(
            "/info",
            get(|| async { Json(json!({"model_id": "BAAI/bge-m3", "max_input_length": 8192})) }),
        );
        let base = spawn_router(router).await;
        let probe = ModelProbe::new(Duration::from_secs(5)).unwrap();

        let info = probe.ensure_ready(&base, "BAAI/bge-m3").await.unwrap();
        assert_eq!(info.max_input_length, Some(8192));

        let err = probe.ensure_ready(&base, "BAAI/bge-reranker-v2-m3").await.unwrap_err();
        assert!(matches!(err, QuizbankError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let probe = ModelProbe::new(Duration::from_secs(1)).unwrap();
        let err = probe.ensure_ready("http://127.0.0.1:1", "m").await.unwrap_err();
        assert!(matches!(err, QuizbankError::ModelUnavailable(_)));
    }
}
