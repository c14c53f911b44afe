//! `/health` and `/classify`.

use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use clausify_ai::Classify;
use clausify_core::Prediction;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ApiError;

/// Shared model handle. Inference needs `&mut`, so requests take turns.
pub type SharedClassifier = Arc<Mutex<Box<dyn Classify + Send>>>;

#[derive(Clone)]
pub struct AppState {
    classifier: SharedClassifier,
}

impl AppState {
    pub fn new(classifier: Box<dyn Classify + Send>) -> Self {
        Self {
            classifier: Arc::new(Mutex::new(classifier)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/classify", post(classify))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<Prediction>, ApiError> {
    let classifier = state.classifier.clone();
    let chars = req.text.chars().count();

    let result = tokio::task::spawn_blocking(move || {
        // A panic in an earlier request leaves the model itself usable.
        let mut guard = classifier.lock().unwrap_or_else(PoisonError::into_inner);
        guard.classify(&req.text)
    })
    .await
    .map_err(|e| ApiError::internal(format!("inference task failed: {e}")))?;

    match result {
        Ok(prediction) => {
            debug!(chars, label = %prediction.label, "classified");
            Ok(Json(prediction))
        }
        Err(e) => {
            error!(chars, error = %e, "classification failed");
            Err(ApiError::internal(format!("{e:#}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    /// Labels every text containing "terminat" as termination.
    struct KeywordClassifier;

    impl Classify for KeywordClassifier {
        fn classify(&mut self, text: &str) -> anyhow::Result<Prediction> {
            let termination = text.to_lowercase().contains("terminat");
            let p = if termination { 0.9 } else { 0.1 };
            let scores = BTreeMap::from([
                ("Non-Compete".to_string(), 1.0 - p),
                ("Termination For Convenience".to_string(), p),
            ]);
            Ok(Prediction {
                label: if termination {
                    "Termination For Convenience"
                } else {
                    "Non-Compete"
                }
                .to_string(),
                scores,
            })
        }

        fn labels(&self) -> Vec<String> {
            vec!["Non-Compete".into(), "Termination For Convenience".into()]
        }
    }

    struct FailingClassifier;

    impl Classify for FailingClassifier {
        fn classify(&mut self, _text: &str) -> anyhow::Result<Prediction> {
            anyhow::bail!("session exploded")
        }

        fn labels(&self) -> Vec<String> {
            vec![]
        }
    }

    /// Panics on the text "panic", otherwise behaves like `KeywordClassifier`.
    struct PanickyClassifier;

    impl Classify for PanickyClassifier {
        fn classify(&mut self, text: &str) -> anyhow::Result<Prediction> {
            assert_ne!(text, "panic", "inference panicked");
            KeywordClassifier.classify(text)
        }

        fn labels(&self) -> Vec<String> {
            KeywordClassifier.labels()
        }
    }

    fn app(classifier: Box<dyn Classify + Send>) -> Router {
        router(AppState::new(classifier))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn classify_request(body: &str) -> Request<Body> {
        Request::post("/classify")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let resp = app(Box::new(FailingClassifier))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn classify_returns_label_and_scores() {
        let resp = app(Box::new(KeywordClassifier))
            .oneshot(classify_request(
                r#"{"text": "Either party may terminate this Agreement for convenience."}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["label"], "Termination For Convenience");
        let scores = json["scores"].as_object().unwrap();
        assert_eq!(scores.len(), 2);
        let total: f64 = scores.values().map(|v| v.as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn empty_text_is_accepted() {
        let resp = app(Box::new(KeywordClassifier))
            .oneshot(classify_request(r#"{"text": ""}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["label"], "Non-Compete");
    }

    #[tokio::test]
    async fn inference_failure_is_500_with_error_body() {
        let resp = app(Box::new(FailingClassifier))
            .oneshot(classify_request(r#"{"text": "anything"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(json["error"].as_str().unwrap().contains("session exploded"));
    }

    #[tokio::test]
    async fn service_recovers_after_inference_panic() {
        let app = app(Box::new(PanickyClassifier));

        let resp = app
            .clone()
            .oneshot(classify_request(r#"{"text": "panic"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = app
            .oneshot(classify_request(r#"{"text": "Customer may terminate on notice."}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["label"], "Termination For Convenience");
    }

    #[tokio::test]
    async fn malformed_body_is_client_error() {
        let resp = app(Box::new(KeywordClassifier))
            .oneshot(classify_request(r#"{"txt": 1"#))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn missing_text_field_is_client_error() {
        let resp = app(Box::new(KeywordClassifier))
            .oneshot(classify_request(r#"{"body": "x"}"#))
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
    }
}
