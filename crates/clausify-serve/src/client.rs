//! HTTP client for a running classification service.

use clausify_core::Prediction;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::routes::HealthResponse;

pub const DEFAULT_URL: &str = "http://127.0.0.1:8001";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct ClassifierClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClassifierClient {
    /// `base_url` like `http://127.0.0.1:8001`; a trailing slash is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);
        let resp = self.client.get(&url).send().await?;
        Self::parse(resp).await
    }

    pub async fn classify(&self, text: &str) -> Result<Prediction, ClientError> {
        let url = format!("{}/classify", self.base_url);
        debug!(url = %url, chars = text.len(), "classify request");
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use clausify_ai::Classify;

    use crate::{AppState, router};

    struct Fixed;

    impl Classify for Fixed {
        fn classify(&mut self, text: &str) -> anyhow::Result<Prediction> {
            anyhow::ensure!(text != "boom", "refusing to classify");
            Ok(Prediction {
                label: "Exclusivity".into(),
                scores: BTreeMap::from([("Exclusivity".to_string(), 1.0)]),
            })
        }

        fn labels(&self) -> Vec<String> {
            vec!["Exclusivity".into()]
        }
    }

    async fn spawn_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(Box::new(Fixed)));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[test]
    fn trims_trailing_slash() {
        let client = ClassifierClient::new("http://127.0.0.1:8001/");
        assert_eq!(client.base_url(), DEFAULT_URL);
    }

    #[tokio::test]
    async fn health_and_classify_against_live_server() {
        let client = ClassifierClient::new(spawn_server().await);
        assert_eq!(client.health().await.unwrap().status, "ok");

        let prediction = client.classify("Company grants exclusive rights.").await.unwrap();
        assert_eq!(prediction.label, "Exclusivity");
        assert_eq!(prediction.scores["Exclusivity"], 1.0);
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_body() {
        let client = ClassifierClient::new(spawn_server().await);
        match client.classify("boom").await {
            Err(ClientError::Server { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("refusing to classify"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }
}
