use std::sync::Arc;

use chrono::Utc;
use dynprice_api::app::services::{Services, build_in_memory_services};
use dynprice_core::ProductId;
use dynprice_events::{BusMessage, EventBus, InMemoryEventBus};
use dynprice_infra::TopicConfig;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    bus: Arc<InMemoryEventBus>,
    services: Option<Services>,
    handle: tokio::task::JoinHandle<()>,
}

fn topics() -> TopicConfig {
    TopicConfig {
        catalog: "catalog.events".into(),
        orders: "order.events".into(),
        prices: "pricing.events".into(),
        group_id: "pricing".into(),
        consumer_name: "worker-1".into(),
    }
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory services, bound to an ephemeral port.
        let (services, bus) = build_in_memory_services(&topics());
        let app = dynprice_api::app::build_app(services.prices.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            bus,
            services: Some(services),
            handle,
        }
    }

    async fn publish(&self, topic: &str, body: serde_json::Value) {
        self.bus
            .publish(topic, BusMessage::new("test", serde_json::to_vec(&body).unwrap()))
            .await
            .unwrap();
    }

    async fn stop(mut self) {
        if let Some(services) = self.services.take() {
            services.shutdown().await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn catalog_event(id: ProductId, base: f64, stock: i64) -> serde_json::Value {
    json!({
        "type": "product_created",
        "ts": Utc::now(),
        "payload": {"id": id, "name": "Lamp", "base_price": base, "stock": stock},
    })
}

fn order_event(id: ProductId, qty: i64) -> serde_json::Value {
    json!({
        "type": "order_placed",
        "ts": Utc::now(),
        "payload": {"product_id": id, "qty": qty, "status": "placed"},
    })
}

/// Poll until the price endpoint reports `expected`.
async fn price_eventually(client: &reqwest::Client, base_url: &str, id: ProductId, expected: f64) -> serde_json::Value {
    // Events are consumed asynchronously; poll briefly until the consumer catches up.
    for _ in 0..100 {
        let res = client
            .get(format!("{}/prices/{}", base_url, id))
            .send()
            .await
            .unwrap();

        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["current_price"].as_f64() == Some(expected) {
                return body;
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("price for {id} did not reach {expected} within timeout");
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    srv.stop().await;
}

#[tokio::test]
async fn malformed_product_id_is_bad_request() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/prices/not-a-uuid", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    srv.stop().await;
}

#[tokio::test]
async fn product_without_snapshot_is_not_found() {
    let srv = TestServer::spawn().await;

    let res = reqwest::get(format!("{}/prices/{}", srv.base_url, ProductId::new()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unknown_product");
    assert!(body["message"].as_str().unwrap().contains("no catalog snapshot"));

    srv.stop().await;
}

#[tokio::test]
async fn catalog_and_order_events_drive_the_read_api() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let id = ProductId::new();

    srv.publish("catalog.events", catalog_event(id, 100.0, 5)).await;
    let body = price_eventually(&client, &srv.base_url, id, 120.0).await;
    assert_eq!(body["product_id"].as_str().unwrap(), id.to_string());
    assert!(body["updated_at"].is_string());

    // 100 * (1 + 0.10 + 0.20)
    srv.publish("order.events", order_event(id, 5)).await;
    price_eventually(&client, &srv.base_url, id, 130.0).await;

    // Demand caps at +30%; low stock adds +20%.
    srv.publish("order.events", order_event(id, 40)).await;
    price_eventually(&client, &srv.base_url, id, 150.0).await;

    srv.stop().await;
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let srv = TestServer::spawn().await;

    let res = reqwest::Client::new()
        .get(format!("{}/health", srv.base_url))
        .header("Origin", "http://docs.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    srv.stop().await;
}
