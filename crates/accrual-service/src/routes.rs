//! 路由配置模块

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use loyalty_shared::observability::middleware as obs_middleware;
use tower_http::timeout::TimeoutLayer;

use crate::{handlers, state::AppState};

/// 积分计算 API 路由（挂载在 /api 下）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(handlers::orders::register_order))
        .route("/orders/{number}", get(handlers::orders::get_order))
        .route("/goods", post(handlers::goods::register_rule))
}

/// 构建完整的应用路由：业务 API、探针与可观测性中间件
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::models::AccrualStatus;
    use crate::test_support::InMemoryAccrualRepository;
    use crate::worker::OrderProcessingWorker;

    fn app(repo: Arc<InMemoryAccrualRepository>) -> Router {
        build_router(AppState::new(repo), Duration::from_secs(5))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_order_returns_no_content() {
        let repo = Arc::new(InMemoryAccrualRepository::default());

        let response = app(repo).oneshot(get("/api/orders/12345678903")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_register_order_then_duplicate() {
        let repo = Arc::new(InMemoryAccrualRepository::default());
        let body = json!({
            "order": "2377225624",
            "goods": [{"description": "encrypt data", "price": 100.0}]
        });

        let first = app(repo.clone())
            .oneshot(post_json("/api/orders", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);

        let second = app(repo.clone())
            .oneshot(post_json("/api/orders", body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["code"], "ORDER_ALREADY_REGISTERED");

        let lookup = app(repo).oneshot(get("/api/orders/2377225624")).await.unwrap();
        assert_eq!(lookup.status(), StatusCode::OK);
        assert_eq!(
            body_json(lookup).await,
            json!({"order": "2377225624", "status": "REGISTERED"})
        );
    }

    #[tokio::test]
    async fn test_register_order_rejects_invalid_payload() {
        let repo = Arc::new(InMemoryAccrualRepository::default());

        let no_goods = app(repo.clone())
            .oneshot(post_json("/api/orders", json!({"order": "1", "goods": []})))
            .await
            .unwrap();
        assert_eq!(no_goods.status(), StatusCode::BAD_REQUEST);

        let negative = app(repo.clone())
            .oneshot(post_json(
                "/api/orders",
                json!({"order": "1", "goods": [{"description": "tea", "price": -1}]}),
            ))
            .await
            .unwrap();
        assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

        let malformed = app(repo)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/orders")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_rule() {
        let repo = Arc::new(InMemoryAccrualRepository::default());
        let rule = json!({"match": "Bork", "reward": 10, "reward_type": "%"});

        let created = app(repo.clone())
            .oneshot(post_json("/api/goods", rule.clone()))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);

        let duplicate = app(repo.clone())
            .oneshot(post_json("/api/goods", rule))
            .await
            .unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let bad_type = app(repo)
            .oneshot(post_json(
                "/api/goods",
                json!({"match": "Acme", "reward": 5, "reward_type": "bonus"}),
            ))
            .await
            .unwrap();
        assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_order_processed_by_worker_reports_accrual() {
        let repo = Arc::new(InMemoryAccrualRepository::default());

        app(repo.clone())
            .oneshot(post_json(
                "/api/goods",
                json!({"match": "encrypt", "reward": 10, "reward_type": "%"}),
            ))
            .await
            .unwrap();
        app(repo.clone())
            .oneshot(post_json(
                "/api/orders",
                json!({
                    "order": "2377225624",
                    "goods": [{"description": "encrypt data", "price": 100.0}]
                }),
            ))
            .await
            .unwrap();

        let worker = OrderProcessingWorker::new(repo.clone(), Duration::from_secs(1), None);
        let report = worker.run_cycle().await;
        assert_eq!(report.processed, 1);
        assert_eq!(repo.status_of("2377225624"), Some(AccrualStatus::Processed));

        let lookup = app(repo).oneshot(get("/api/orders/2377225624")).await.unwrap();
        assert_eq!(
            body_json(lookup).await,
            json!({"order": "2377225624", "status": "PROCESSED", "accrual": 10.0})
        );
    }

    #[tokio::test]
    async fn test_probes() {
        let repo = Arc::new(InMemoryAccrualRepository::default());

        let health = app(repo.clone()).oneshot(get("/health")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let ready = app(repo).oneshot(get("/ready")).await.unwrap();
        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(body_json(ready).await["checks"]["database"], "ok");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let repo = Arc::new(InMemoryAccrualRepository::default());
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap();

        let response = app(repo).oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "req-42");
    }
}
