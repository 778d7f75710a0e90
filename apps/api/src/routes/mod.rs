pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};

use crate::reviews::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/reviews",
            get(handlers::handle_list_reviews).post(handlers::handle_create_review),
        )
        .route(
            "/api/v1/reviews/:id",
            get(handlers::handle_get_review).delete(handlers::handle_delete_review),
        )
        .route(
            "/api/v1/reviews/:id/document",
            get(handlers::handle_get_document),
        )
        .route("/api/v1/previews/:handle", get(handlers::handle_get_preview))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::analysis::AnalysisReply;
    use crate::config::Config;
    use crate::reviews::ingest::IngestTimeouts;
    use crate::reviews::testing::{ScriptedAnalysis, TestStores};
    use crate::reviews::ReviewService;

    const FEEDBACK: &str = r#"{"overallScore": 74, "ATS": {"score": 70, "tips": []}}"#;
    const BOUNDARY: &str = "analyxa-test-boundary";

    fn app(analysis: ScriptedAnalysis, api_token: Option<&str>) -> (Router, AppState) {
        let t = TestStores::new(analysis);
        let state = AppState {
            reviews: Arc::new(ReviewService::new(t.stores(), IngestTimeouts::default())),
            config: Config::for_tests(api_token),
        };
        (build_router(state.clone()), state)
    }

    fn upload_body(file: &[u8]) -> Body {
        let mut body = Vec::new();
        for (name, value) in [
            ("company-name", "Acme"),
            ("job-title", "Engineer"),
            ("job-description", "Build reliable services"),
        ] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn upload_request(file: &[u8]) -> Request<Body> {
        Request::post("/api/v1/reviews")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(upload_body(file))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app(ScriptedAnalysis::failing("unused"), None);

        let response = router.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["service"], "analyxa-api");
    }

    #[tokio::test]
    async fn test_upload_then_list_and_fetch() {
        let (router, state) = app(ScriptedAnalysis::replying(AnalysisReply::text(FEEDBACK)), None);

        let created = router
            .clone()
            .oneshot(upload_request(b"%PDF-1.4 resume"))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = json(created).await;
        assert_eq!(created["status"], "Analysis complete");
        let id = created["id"].as_str().unwrap().to_string();

        let listed = json(router.clone().oneshot(get("/api/v1/reviews")).await.unwrap()).await;
        assert_eq!(listed["reviews"].as_array().unwrap().len(), 1);
        assert_eq!(listed["skipped_count"], 0);
        let review = &listed["reviews"][0];
        assert_eq!(review["id"], id.as_str());
        assert_eq!(review["status"], "complete");
        assert_eq!(review["feedback"]["overallScore"], 74);

        let preview_url = review["preview_url"].as_str().unwrap().to_string();
        let preview = router.clone().oneshot(get(&preview_url)).await.unwrap();
        assert_eq!(preview.status(), StatusCode::OK);
        assert_eq!(preview.headers()[header::CONTENT_TYPE], "image/png");

        let document = router
            .clone()
            .oneshot(get(&format!("/api/v1/reviews/{id}/document")))
            .await
            .unwrap();
        assert_eq!(document.status(), StatusCode::OK);
        let bytes = to_bytes(document.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4 resume");

        state.reviews.shutdown().await;
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected_before_any_remote_call() {
        let (router, state) = app(ScriptedAnalysis::replying(AnalysisReply::text(FEEDBACK)), None);

        let response = router.oneshot(upload_request(b"")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["code"], "VALIDATION_ERROR");
        assert!(state.reviews.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_pdf_is_rejected_before_any_remote_call() {
        let (router, state) = app(ScriptedAnalysis::replying(AnalysisReply::text(FEEDBACK)), None);

        let response = router.oneshot(upload_request(b"GIF89a not a resume")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["code"], "VALIDATION_ERROR");
        state.reviews.refresh().await;
        assert!(state.reviews.list().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_disconnect_does_not_cancel_ingestion() {
        let analysis =
            ScriptedAnalysis::replying(AnalysisReply::text(FEEDBACK)).delayed(Duration::from_secs(5));
        let (router, state) = app(analysis, None);

        // Abandon the request while the analysis is still running.
        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            router.oneshot(upload_request(b"%PDF-1.4")),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        state.reviews.refresh().await;
        let reviews = state.reviews.list().await;
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].status, "complete");
        state.reviews.shutdown().await;
    }

    #[tokio::test]
    async fn test_analysis_failure_reports_draft() {
        let (router, state) = app(ScriptedAnalysis::failing("overloaded"), None);

        let response = router.clone().oneshot(upload_request(b"%PDF-1.4")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json(response).await;
        assert_eq!(body["error"]["code"], "ANALYSIS_FAILED");
        let draft_id = body["error"]["draft_id"].as_str().unwrap().to_string();

        let review = router
            .oneshot(get(&format!("/api/v1/reviews/{draft_id}")))
            .await
            .unwrap();
        assert_eq!(review.status(), StatusCode::OK);
        assert_eq!(json(review).await["status"], "pending");
        state.reviews.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_review_is_404() {
        let (router, _) = app(ScriptedAnalysis::failing("unused"), None);

        let response = router.oneshot(get("/api/v1/reviews/missing")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_releases_preview() {
        let (router, state) = app(ScriptedAnalysis::replying(AnalysisReply::text(FEEDBACK)), None);
        let created = json(
            router
                .clone()
                .oneshot(upload_request(b"%PDF-1.4"))
                .await
                .unwrap(),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();
        let listed = json(router.clone().oneshot(get("/api/v1/reviews")).await.unwrap()).await;
        let preview_url = listed["reviews"][0]["preview_url"].as_str().unwrap().to_string();

        let deleted = router
            .clone()
            .oneshot(
                Request::delete(format!("/api/v1/reviews/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(deleted.status(), StatusCode::OK);
        let report = json(deleted).await;
        assert_eq!(report["kv_deleted"], true);
        assert_eq!(report["preview_released"], true);
        let preview = router.oneshot(get(&preview_url)).await.unwrap();
        assert_eq!(preview.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.reviews.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn test_token_required_when_configured() {
        let (router, _) = app(ScriptedAnalysis::failing("unused"), Some("s3cret"));

        let anonymous = router.clone().oneshot(get("/api/v1/reviews")).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(anonymous).await["error"]["code"], "NOT_AUTHENTICATED");

        let wrong = router
            .clone()
            .oneshot(
                Request::get("/api/v1/reviews")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let authorized = router
            .clone()
            .oneshot(
                Request::get("/api/v1/reviews")
                    .header(header::AUTHORIZATION, "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(authorized.status(), StatusCode::OK);

        let health = router.oneshot(get("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
