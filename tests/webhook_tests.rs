//! Webhook endpoint served on a real socket.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use reqwest::{Client, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use common::{text_update_json, Fixture};
use housing_helpdesk::config::DispatchConfig;
use housing_helpdesk::dispatch::{DispatchSnapshot, UpdateWorkerPool};
use housing_helpdesk::webhook::{create_router, WebhookState};

const TOKEN: &str = "123456:TEST-token";

struct TestServer {
    address: String,
    fixture: Arc<Fixture>,
    pool: UpdateWorkerPool,
    shutdown: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let fixture = Arc::new(Fixture::new());
        let pool = UpdateWorkerPool::start(Arc::new(FixtureHandler(fixture.clone())), &DispatchConfig::default());
        let router = create_router(WebhookState::new(TOKEN, pool.handle()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            address: format!("http://{addr}"),
            fixture,
            pool,
            shutdown,
            server,
        }
    }

    async fn stop(self) -> (Arc<Fixture>, DispatchSnapshot) {
        self.shutdown.send(()).ok();
        self.server.await.unwrap();
        let stats = self.pool.shutdown().await;
        (self.fixture, stats)
    }
}

struct FixtureHandler(Arc<Fixture>);

#[async_trait::async_trait]
impl housing_helpdesk::dispatch::UpdateHandler for FixtureHandler {
    async fn handle(&self, update: teloxide::types::Update) -> anyhow::Result<()> {
        housing_helpdesk::bot::process_update(&self.0.services, update).await
    }
}

#[tokio::test]
async fn test_valid_update_is_acknowledged_and_processed() {
    let server = TestServer::spawn().await;

    let response = Client::new()
        .post(format!("{}/{TOKEN}", server.address))
        .json(&text_update_json(1, 555, "/start"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    let (fixture, stats) = server.stop().await;
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.completed, 1);
    let sent = fixture.messenger.take();
    assert_eq!(sent[0].text(), Some("Привет! Выберите режим работы:"));
}

#[tokio::test]
async fn test_malformed_body_returns_error() {
    let server = TestServer::spawn().await;

    let response = Client::new()
        .post(format!("{}/{TOKEN}", server.address))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "Error");

    let (_, stats) = server.stop().await;
    assert_eq!(stats.accepted, 0);
}

#[tokio::test]
async fn test_wrong_token_is_not_found() {
    let server = TestServer::spawn().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/not-the-token", server.address))
        .json(&text_update_json(2, 555, "/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("{}/{TOKEN}", server.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let (_, stats) = server.stop().await;
    assert_eq!(stats.accepted, 0);
}
