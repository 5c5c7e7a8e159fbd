use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use cfcert_common::models::{
    DiscoverQuery, EnsureRequest, RecordRef, RecordState, ReplaceRequest, VerifyResponse,
};
use cfcert_common::{DomainName, ProvisionError, ProvisioningRecord};
use serde_json::{Value as JsonValue, json};
use tower_http::trace::TraceLayer;

type ApiResult<T> = std::result::Result<T, ProvisionError>;

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/certificates",
            post(ensure_certificate).get(discover_certificate),
        )
        .route("/api/v1/certificates/verify", post(verify_certificate))
        .route("/api/v1/certificates/replace", post(replace_certificate))
        .route("/api/v1/certificates/retire", post(retire_certificate))
        .route("/api/v1/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .route_layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ensure_certificate(
    State(state): State<AppState>,
    Json(payload): Json<EnsureRequest>,
) -> ApiResult<Json<ProvisioningRecord>> {
    let domain = DomainName::parse(payload.domain_name)?;
    let ensured = state.reconciler.ensure(&domain).await?;
    Ok(Json(ensured.record))
}

async fn discover_certificate(
    State(state): State<AppState>,
    Query(query): Query<DiscoverQuery>,
) -> ApiResult<Json<ProvisioningRecord>> {
    let domain = DomainName::parse(query.domain_name)?;
    let record = state.reconciler.discover(&domain).await?;
    Ok(Json(record))
}

async fn verify_certificate(
    State(state): State<AppState>,
    Json(payload): Json<RecordRef>,
) -> Json<VerifyResponse> {
    let handle = payload.handle();
    let verified = state.reconciler.verify(&handle).await;
    // 只有域名仍然合法时才回传记录
    let record = match verified {
        RecordState::Provisioned => payload
            .domain_name
            .and_then(|d| DomainName::parse(d).ok())
            .map(|domain| ProvisioningRecord::new(domain, handle)),
        RecordState::Unprovisioned => None,
    };
    Json(VerifyResponse {
        state: verified,
        record,
    })
}

async fn replace_certificate(
    State(state): State<AppState>,
    Json(payload): Json<ReplaceRequest>,
) -> ApiResult<Json<ProvisioningRecord>> {
    let domain = DomainName::parse(payload.domain_name)?;
    let record = state.reconciler.replace(&payload.record, &domain).await?;
    Ok(Json(record))
}

async fn retire_certificate(
    State(state): State<AppState>,
    Json(payload): Json<RecordRef>,
) -> ApiResult<Json<JsonValue>> {
    state.reconciler.retire(&payload.handle()).await?;
    Ok(Json(json!({"retired": true})))
}

async fn metrics_handler() -> Response {
    metrics::render_metrics()
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::CloudflareOriginClient;
    use crate::keygen::EcdsaP256Generator;
    use crate::reconciler::Reconciler;
    use crate::reconciler::tests::harness;
    use crate::store::MemoryCertificateStore;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use cfcert_common::AuthorityCredential;
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn app() -> axum::Router {
        router(AppState {
            reconciler: Arc::new(harness(10).reconciler),
        })
    }

    async fn call(app: &axum::Router, req: Request<Body>) -> (StatusCode, JsonValue) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(JsonValue::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: JsonValue) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn ensure_then_discover_returns_same_record() {
        let app = app();
        let (status, created) = call(
            &app,
            post_json("/api/v1/certificates", json!({"domain_name": "api.example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["domain_name"], "api.example.com");
        assert_eq!(created["id"], created["certificate_handle"]);

        let (status, found) = call(
            &app,
            get("/api/v1/certificates?domain_name=api.example.com"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn empty_domain_is_bad_request() {
        let app = app();
        let (status, body) = call(
            &app,
            post_json("/api/v1/certificates", json!({"domain_name": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("error").is_some());
    }

    #[tokio::test]
    async fn discover_without_certificate_is_not_found() {
        let app = app();
        let (status, body) = call(&app, get("/api/v1/certificates?domain_name=none.example.com")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body["error"],
            "No issued EC_prime256v1 certificate found for domain: none.example.com"
        );
    }

    #[tokio::test]
    async fn verify_and_retire_lifecycle() {
        let app = app();
        let (_, record) = call(
            &app,
            post_json("/api/v1/certificates", json!({"domain_name": "example.com"})),
        )
        .await;

        let legacy = json!({
            "domain_name": "example.com",
            "certificate_arn": record["certificate_handle"],
        });
        let (status, verified) = call(&app, post_json("/api/v1/certificates/verify", legacy.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["state"], "provisioned");
        assert_eq!(verified["record"], record);

        let (status, retired) = call(&app, post_json("/api/v1/certificates/retire", record.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retired, json!({"retired": true}));

        let (_, verified) = call(&app, post_json("/api/v1/certificates/verify", legacy)).await;
        assert_eq!(verified["state"], "unprovisioned");
        assert!(verified.get("record").is_none());
    }

    #[tokio::test]
    async fn retire_without_handle_is_noop() {
        let app = app();
        let (status, body) = call(
            &app,
            post_json("/api/v1/certificates/retire", json!({"domain_name": "example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["retired"], true);
    }

    #[tokio::test]
    async fn replace_moves_record_to_new_domain() {
        let app = app();
        let (_, record) = call(
            &app,
            post_json("/api/v1/certificates", json!({"domain_name": "old.example.com"})),
        )
        .await;

        let (status, replaced) = call(
            &app,
            post_json(
                "/api/v1/certificates/replace",
                json!({"record": record, "domain_name": "new.example.com"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replaced["domain_name"], "new.example.com");
        assert_ne!(replaced["certificate_handle"], record["certificate_handle"]);
    }

    #[tokio::test]
    async fn authority_rejection_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/certificates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{"code": 1010, "message": "Failed to validate requested hostname"}],
                "result": null
            })))
            .mount(&server)
            .await;

        let authority = CloudflareOriginClient::new(
            reqwest::Client::new(),
            server.uri(),
            AuthorityCredential::ApiToken("token".to_string()),
        );
        let reconciler = Reconciler::new(
            Arc::new(MemoryCertificateStore::new("test", 10)),
            Arc::new(authority),
            Arc::new(EcdsaP256Generator),
        );
        let app = router(AppState {
            reconciler: Arc::new(reconciler),
        });

        let (status, body) = call(
            &app,
            post_json("/api/v1/certificates", json!({"domain_name": "example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body["error"],
            "origin authority error: Failed to validate requested hostname"
        );
    }

    #[tokio::test]
    async fn health_and_metrics_routes() {
        let app = app();
        let response = app.clone().oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/v1/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("cfcert_control_http_requests_total"));
    }
}
