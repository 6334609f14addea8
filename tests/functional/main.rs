// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the webhook HTTP surface.
//!
//! These tests drive the `/validate` and health routers in-process with
//! `tower::ServiceExt::oneshot`, WITHOUT TLS or a bound socket.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_denied_review
//! ```

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use akri_admission_webhook::health::{HealthState, create_router};
use akri_admission_webhook::webhooks::create_webhook_router;
use akri_admission_webhook::{Check, ValidationProfile, Validator, WebhookState};

use common::*;

fn webhook(checks: &[Check]) -> (Router, Arc<HealthState>) {
    let health = Arc::new(HealthState::new());
    let validator = Validator::new(ValidationProfile::new(checks.iter().copied())).unwrap();
    let state = Arc::new(WebhookState::new(validator, health.clone()));
    (create_webhook_router(state), health)
}

fn post(content_type: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/validate");
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn review(router: Router, uid: &str, object: Option<Value>) -> Value {
    let body = to_bytes(&admission_review(uid, object));
    let (status, body) = send(router, post(Some("application/json"), body)).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

mod validate_endpoint {
    use super::*;

    #[tokio::test]
    async fn test_allowed_review() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let body = review(router, "705ab4f5-6393-11e8-b7cc-42010a800002", Some(good())).await;
        assert_eq!(
            body,
            json!({
                "apiVersion": "admission.k8s.io/v1",
                "kind": "AdmissionReview",
                "response": {
                    "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                    "allowed": true
                }
            })
        );
    }

    #[tokio::test]
    async fn test_denied_review() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let object = ConfigurationBuilder::new("zeroconf")
            .container(ContainerBuilder::new("broker").limit("cpu", "100m"))
            .build();
        let body = review(router, "uid-denied", Some(object)).await;
        assert_eq!(body["response"]["uid"], json!("uid-denied"));
        assert_eq!(body["response"]["allowed"], json!(false));
        let message = body["response"]["status"]["message"].as_str().unwrap();
        assert!(message.contains(PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_review_without_object_denied() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let body = review(router, "uid-empty", None).await;
        assert_eq!(body["response"]["allowed"], json!(false));
        assert_eq!(
            body["response"]["status"]["message"],
            json!("AdmissionReview Request Object contains no data")
        );
    }

    #[tokio::test]
    async fn test_review_without_containers_denied() {
        let (router, _) = webhook(&Check::ALL);
        let object = ConfigurationBuilder::new("zeroconf").build();
        let body = review(router, "uid", Some(object)).await;
        assert_eq!(body["response"]["allowed"], json!(false));
        assert_eq!(
            body["response"]["status"]["message"],
            json!("Configuration has no containers")
        );
    }

    #[tokio::test]
    async fn test_response_echoes_v1beta1() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let mut envelope = admission_review("uid", Some(mult()));
        envelope["apiVersion"] = json!("admission.k8s.io/v1beta1");
        let (status, body) = send(
            router,
            post(Some("application/json"), to_bytes(&envelope)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["apiVersion"], json!("admission.k8s.io/v1beta1"));
        assert_eq!(body["response"]["allowed"], json!(true));
    }

    #[tokio::test]
    async fn test_content_type_with_charset_accepted() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let body = to_bytes(&admission_review("uid", Some(good())));
        let (status, _) = send(router, post(Some("application/json; charset=utf-8"), body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_content_type_rejected() {
        let (router, health) = webhook(&[Check::Placeholder]);
        let body = to_bytes(&admission_review("uid", Some(good())));
        let (status, body) = send(router, post(Some("text/plain"), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.is_empty());
        assert!(
            health
                .metrics
                .encode()
                .contains("akri_webhook_transport_errors_total{status=\"400\"} 1")
        );
    }

    #[tokio::test]
    async fn test_missing_content_type_rejected() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let body = to_bytes(&admission_review("uid", Some(good())));
        let (status, _) = send(router, post(None, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_undecodable_body_rejected() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let (status, _) = send(router, post(Some("application/json"), b"{not json".to_vec())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_review_without_request_rejected() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let body = to_bytes(&json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview"
        }));
        let (status, _) = send(router, post(Some("application/json"), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_not_allowed() {
        let (router, _) = webhook(&[Check::Placeholder]);
        let request = Request::builder()
            .method("GET")
            .uri("/validate")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(router, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_admissions_recorded() {
        let (router, health) = webhook(&[Check::Placeholder]);
        review(router.clone(), "a", Some(good())).await;
        review(router, "b", None).await;

        let metrics = health.metrics.encode();
        assert!(metrics.contains("akri_webhook_admissions_total{allowed=\"true\"} 1"));
        assert!(metrics.contains("akri_webhook_admissions_total{allowed=\"false\"} 1"));
        assert!(metrics.contains("akri_webhook_admission_rejections_total{code=\"EmptyObject\"} 1"));
    }
}

mod health_endpoint {
    use super::*;

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(router, request).await
    }

    #[tokio::test]
    async fn test_healthz() {
        let router = create_router(Arc::new(HealthState::new()));
        let (status, body) = get(router, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_readyz_follows_state() {
        let state = Arc::new(HealthState::new());
        let (status, _) = get(create_router(state.clone()), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready(true).await;
        let (status, body) = get(create_router(state), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ready");
    }

    #[tokio::test]
    async fn test_metrics_exposed() {
        let state = Arc::new(HealthState::new());
        state
            .metrics
            .record_admission(false, Some("MissingPlaceholder"), 0.001);
        let (status, body) = get(create_router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains("akri_webhook_admission_rejections_total"));
        assert!(body.contains("akri_webhook_admission_duration_seconds"));
    }
}
