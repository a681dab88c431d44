use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use trade_opportunities::api::{router, AppState};
use trade_opportunities::auth::{AllowAll, AuthGate, TokenIssuer};
use trade_opportunities::clock::{Clock, ManualClock};
use trade_opportunities::config::{AuthConfig, ReportConfig};
use trade_opportunities::error::{ApiError, Result as ApiResult};
use trade_opportunities::rate_limit::{RateLimitConfig, SlidingWindowLimiter};
use trade_opportunities::report::{GeminiReportGenerator, ReportGenerator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const T0: Duration = Duration::from_secs(1_700_000_000);

struct StaticReports;

#[async_trait]
impl ReportGenerator for StaticReports {
    async fn generate_report(&self, sector: &str) -> ApiResult<String> {
        Ok(format!("# {} Sector Analysis\n\nAll signals nominal.", sector))
    }
}

struct FailingReports;

#[async_trait]
impl ReportGenerator for FailingReports {
    async fn generate_report(&self, _sector: &str) -> ApiResult<String> {
        Err(ApiError::Downstream)
    }
}

/// Build application state around a manual clock and a stub report backend
fn test_state(
    max_requests: u32,
    reports: Arc<dyn ReportGenerator>,
) -> (AppState, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let issuer = Arc::new(
        TokenIssuer::new(&AuthConfig {
            secret: Some("integration-test-secret".to_string()),
            ttl_minutes: 30,
        })
        .unwrap(),
    );
    let limiter = Arc::new(SlidingWindowLimiter::new(RateLimitConfig {
        max_requests,
        window_secs: 60,
    }));
    let gate = AuthGate::new(
        Arc::clone(&issuer),
        limiter,
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    let state = AppState {
        gate,
        issuer,
        credentials: Arc::new(AllowAll),
        reports,
        clock: Arc::clone(&clock) as Arc<dyn Clock>,
        metrics: None,
        report_configured: true,
    };
    (state, clock)
}

async fn login(app: &Router, username: &str, password: &str) -> Response {
    let credentials = BASE64.encode(format!("{}:{}", username, password));
    app.clone()
        .oneshot(
            Request::builder()
                .uri("/auth/login")
                .method("POST")
                .header("Authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn login_token(app: &Router, username: &str) -> String {
    let response = login(app, username, "password").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

async fn analyze(app: &Router, sector: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder()
        .uri(format!("/analyze/{}", sector))
        .method("GET");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_login_issues_bearer_token() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);

    let response = login(&app, "alice", "hunter2").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 30 * 60);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_token_endpoint_is_an_alias_for_login() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);

    let credentials = BASE64.encode("alice:hunter2");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/token")
                .method("POST")
                .header("Authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_without_credentials_is_unauthorized() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/login")
                .method("POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get("WWW-Authenticate").unwrap(), "Basic");
}

#[tokio::test]
async fn test_login_with_empty_username_is_rejected() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);

    let response = login(&app, "", "password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_analyze_requires_a_token() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);

    let response = analyze(&app, "technology", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("WWW-Authenticate").unwrap(),
        "Bearer"
    );

    let response = analyze(&app, "technology", Some("not-a-jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_analyze_returns_report_with_rate_limit_headers() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);
    let token = login_token(&app, "alice").await;

    let response = analyze(&app, "pharmaceuticals", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "10");
    assert_eq!(
        response.headers().get("X-RateLimit-Remaining").unwrap(),
        "9"
    );
    assert_eq!(response.headers().get("X-RateLimit-Reset").unwrap(), "60");

    let body = json_body(response).await;
    assert_eq!(body["sector"], "pharmaceuticals");
    assert!(body["report"]
        .as_str()
        .unwrap()
        .contains("pharmaceuticals Sector Analysis"));
    assert!(!body["generated_at"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_sector_is_normalized_before_analysis() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);
    let token = login_token(&app, "alice").await;

    let response = analyze(&app, "Technology", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sector"], "technology");
}

#[tokio::test]
async fn test_rate_limit_end_to_end() {
    let (state, clock) = test_state(10, Arc::new(StaticReports));
    let app = router(state);
    let token = login_token(&app, "alice").await;

    // Ten requests inside the first minute are all admitted.
    for i in 0..10u32 {
        clock.set(T0 + Duration::from_secs(u64::from(i) * 5));
        let response = analyze(&app, "technology", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} admitted", i);
        assert_eq!(
            response
                .headers()
                .get("X-RateLimit-Remaining")
                .unwrap()
                .to_str()
                .unwrap(),
            (10 - i - 1).to_string()
        );
    }

    // The eleventh, one second before the first slot frees, is rejected.
    clock.set(T0 + Duration::from_secs(59));
    let response = analyze(&app, "technology", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("Retry-After").unwrap(), "1");
    assert_eq!(
        response.headers().get("X-RateLimit-Remaining").unwrap(),
        "0"
    );

    // Once the first request has left the window, quota frees up again.
    clock.set(T0 + Duration::from_secs(61));
    let response = analyze(&app, "technology", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_is_per_user() {
    let (state, _) = test_state(1, Arc::new(StaticReports));
    let app = router(state);
    let alice = login_token(&app, "alice").await;
    let bob = login_token(&app, "bob").await;

    assert_eq!(
        analyze(&app, "banking", Some(&alice)).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        analyze(&app, "banking", Some(&alice)).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        analyze(&app, "banking", Some(&bob)).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (state, clock) = test_state(10, Arc::new(StaticReports));
    let app = router(state);
    let token = login_token(&app, "alice").await;

    clock.advance(Duration::from_secs(30 * 60));
    let response = analyze(&app, "technology", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Token has expired");
}

#[tokio::test]
async fn test_invalid_sector_consumes_no_quota() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);
    let token = login_token(&app, "alice").await;

    let response = analyze(&app, "bad%21sector%21", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/rate-limit")
                .method("GET")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["limit"], 10);
    assert_eq!(body["used"], 0);
    assert_eq!(body["remaining"], 10);
}

#[tokio::test]
async fn test_rate_limit_info_reflects_usage_without_consuming() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);
    let token = login_token(&app, "alice").await;

    analyze(&app, "technology", Some(&token)).await;
    analyze(&app, "technology", Some(&token)).await;

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/rate-limit")
                    .method("GET")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["used"], 2);
        assert_eq!(body["remaining"], 8);
        assert_eq!(body["reset_in"], 60);
    }
}

#[tokio::test]
async fn test_downstream_failure_is_opaque() {
    let (state, _) = test_state(10, Arc::new(FailingReports));
    let app = router(state);
    let token = login_token(&app, "alice").await;

    let response = analyze(&app, "technology", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(response).await;
    assert_eq!(body["error"], "Report generation failed");
}

#[tokio::test]
async fn test_root_and_health_endpoints() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Trade Opportunities API");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_degrades_without_report_backend() {
    let (mut state, _) = test_state(10, Arc::new(StaticReports));
    state.report_configured = false;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_metrics_endpoint_absent_without_recorder() {
    let (state, _) = test_state(10, Arc::new(StaticReports));
    let app = router(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gemini_client_parses_backend_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": "# Technology Sector Analysis" }] } }
            ]
        })))
        .mount(&mock_server)
        .await;

    let generator = GeminiReportGenerator::new(&ReportConfig {
        api_key: Some("test-key".to_string()),
        base_url: mock_server.uri(),
        model: "gemini-pro".to_string(),
        timeout_secs: 5,
    })
    .unwrap();

    let report = generator.generate_report("technology").await.unwrap();
    assert!(report.contains("Technology Sector Analysis"));
}

#[tokio::test]
async fn test_gemini_client_maps_backend_errors_to_downstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let generator = GeminiReportGenerator::new(&ReportConfig {
        api_key: Some("test-key".to_string()),
        base_url: mock_server.uri(),
        model: "gemini-pro".to_string(),
        timeout_secs: 5,
    })
    .unwrap();

    let err = generator.generate_report("technology").await.unwrap_err();
    assert!(matches!(err, ApiError::Downstream));
}

#[tokio::test]
async fn test_full_stack_with_http_report_backend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": "# Banking Sector Analysis" }] } }
            ]
        })))
        .mount(&mock_server)
        .await;

    let generator = GeminiReportGenerator::new(&ReportConfig {
        api_key: Some("test-key".to_string()),
        base_url: mock_server.uri(),
        model: "gemini-pro".to_string(),
        timeout_secs: 5,
    })
    .unwrap();

    let (mut state, _) = test_state(10, Arc::new(StaticReports));
    state.reports = Arc::new(generator);
    let app = router(state);
    let token = login_token(&app, "alice").await;

    let response = analyze(&app, "banking", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["report"]
        .as_str()
        .unwrap()
        .contains("Banking Sector Analysis"));
}
