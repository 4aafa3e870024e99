//! 积分计算服务客户端测试
//!
//! 使用 wiremock 模拟积分计算服务，覆盖 200 / 204 / 非预期状态码、请求超时与熔断行为。

use std::time::Duration;

use loyalty::{AccrualClient, AccrualClientError, AccrualLookup, AccrualLookupService, UpstreamStatus};
use loyalty_shared::Amount;
use loyalty_shared::circuit_breaker::CircuitState;
use loyalty_shared::config::AccrualClientConfig;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORDER: &str = "2377225624";

fn client_for(server: &MockServer) -> AccrualClient {
    AccrualClient::new(&AccrualClientConfig {
        base_url: server.uri(),
        request_timeout_ms: 500,
        breaker_open_timeout_ms: 100,
        ..Default::default()
    })
    .unwrap()
}

async fn respond(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/orders/{ORDER}")))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_known_result_is_decoded() {
    let server = MockServer::start().await;
    respond(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "order": ORDER,
            "status": "PROCESSED",
            "accrual": 729.98
        })),
    )
    .await;

    let lookup = client_for(&server).get_accrual_info(ORDER).await.unwrap();

    match lookup {
        AccrualLookup::Known(info) => {
            assert_eq!(info.order, ORDER);
            assert_eq!(info.status, UpstreamStatus::Processed);
            assert_eq!(info.accrual, Some(Amount::from_minor(729_98)));
        }
        other => panic!("expected known result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_content_is_not_yet_known() {
    let server = MockServer::start().await;
    respond(&server, ResponseTemplate::new(204)).await;
    let client = client_for(&server);

    for _ in 0..5 {
        let lookup = client.get_accrual_info(ORDER).await.unwrap();
        assert_eq!(lookup, AccrualLookup::NotYetKnown);
    }

    // 204 在熔断器内按成功计数
    assert_eq!(client.breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_unexpected_status_is_error() {
    let server = MockServer::start().await;
    respond(&server, ResponseTemplate::new(429)).await;

    let err = client_for(&server).get_accrual_info(ORDER).await.unwrap_err();

    assert!(matches!(err, AccrualClientError::UnexpectedStatus(429)));
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    respond(&server, ResponseTemplate::new(200).set_body_string("not json")).await;

    let err = client_for(&server).get_accrual_info(ORDER).await.unwrap_err();

    assert!(matches!(err, AccrualClientError::Decode(_)));
}

#[tokio::test]
async fn test_slow_response_times_out_as_failure() {
    let server = MockServer::start().await;
    // 延迟超过客户端 500ms 的请求超时
    respond(
        &server,
        ResponseTemplate::new(204).set_delay(Duration::from_millis(1500)),
    )
    .await;
    let client = client_for(&server);

    let err = client.get_accrual_info(ORDER).await.unwrap_err();

    match &err {
        AccrualClientError::Transport(e) => assert!(e.is_timeout()),
        other => panic!("expected transport timeout, got {other:?}"),
    }
    assert!(!err.is_unavailable());
    assert_eq!(client.breaker().counts().total_failures, 1);
}

#[tokio::test]
async fn test_breaker_opens_and_short_circuits() {
    let server = MockServer::start().await;
    respond(&server, ResponseTemplate::new(500)).await;
    let client = client_for(&server);

    // 默认 min_requests = 3：第 4 次失败后跳闸
    for _ in 0..4 {
        let err = client.get_accrual_info(ORDER).await.unwrap_err();
        assert!(matches!(err, AccrualClientError::UnexpectedStatus(500)));
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    let err = client.get_accrual_info(ORDER).await.unwrap_err();
    assert!(err.is_unavailable());

    let received = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 4);
}

#[tokio::test]
async fn test_breaker_recovers_after_cooldown() {
    let server = MockServer::start().await;
    respond(&server, ResponseTemplate::new(500)).await;
    let client = client_for(&server);

    for _ in 0..4 {
        let _ = client.get_accrual_info(ORDER).await;
    }
    assert_eq!(client.breaker().state(), CircuitState::Open);

    server.reset().await;
    respond(&server, ResponseTemplate::new(204)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    // 半开状态放行两次探测，均成功后恢复
    assert_eq!(client.breaker().state(), CircuitState::HalfOpen);
    for _ in 0..2 {
        assert_eq!(
            client.get_accrual_info(ORDER).await.unwrap(),
            AccrualLookup::NotYetKnown
        );
    }
    assert_eq!(client.breaker().state(), CircuitState::Closed);
}
