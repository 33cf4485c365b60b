//! Webhook gateway tests over a real listener.

use cadence::bot::{Bot, BotHandle, bot_channel};
use cadence::channels::{RecordingSender, serve};
use cadence::clock::ManualClock;
use cadence::messages::MessageTemplates;
use cadence::plan::{ProgressState, TaskPlan};
use cadence::store::MemoryStore;
use chrono::NaiveDate;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Harness {
    base: String,
    store: MemoryStore,
    sender: RecordingSender,
    cancel: CancellationToken,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn start(force_send: bool) -> Harness {
    let plan = TaskPlan::from_json_str(r#"{"1": "Read <chapter> 1", "2": "Read chapter 2"}"#)
        .expect("plan");
    let store = MemoryStore::with_state(ProgressState::fresh(plan));
    let sender = RecordingSender::new();
    let bot = Bot::new(
        Box::new(store.clone()),
        Arc::new(sender.clone()),
        Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2026, 10, 18).expect("date"),
        )),
        MessageTemplates::new("Sam", 17, "IST"),
    );
    let (handle, server): (BotHandle, _) = bot_channel(bot, 8);
    server.spawn();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr: SocketAddr = listener.local_addr().expect("addr");
    let cancel = CancellationToken::new();
    tokio::spawn(serve(listener, handle, force_send, cancel.clone()));

    Harness {
        base: format!("http://{addr}"),
        store,
        sender,
        cancel,
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let h = start(false).await;
    let body: serde_json::Value = reqwest::get(format!("{}/health", h.base))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn whatsapp_reply_returns_twiml_and_advances() {
    let h = start(false).await;
    let response = reqwest::Client::new()
        .post(format!("{}/whatsapp", h.base))
        .form(&[("Body", "I\u{2019}ll do it"), ("From", "whatsapp:+919800000000")])
        .send()
        .await
        .expect("request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/xml")
    );
    let body = response.text().await.expect("body");
    assert!(body.contains("<Response><Message>Marked as done. 💪</Message></Response>"));

    let state = h.store.snapshot().expect("state");
    assert_eq!(state.current_day, 2);
    assert_eq!(state.streak, 1);
    assert_eq!(h.sender.sent().len(), 1);
}

#[tokio::test]
async fn unrecognized_reply_gets_help_without_state_change() {
    let h = start(false).await;
    let body = reqwest::Client::new()
        .post(format!("{}/whatsapp", h.base))
        .form(&[("Body", "hello")])
        .send()
        .await
        .expect("request")
        .text()
        .await
        .expect("body");

    assert!(body.contains("Commands:"));
    assert!(body.contains("&quot;restart&quot;"));
    assert_eq!(h.store.snapshot().expect("state").revision, 0);
    assert!(h.sender.sent().is_empty());
}

#[tokio::test]
async fn dispatch_endpoint_honors_guard_and_force() {
    let h = start(false).await;
    let client = reqwest::Client::new();
    let url = format!("{}/dispatch", h.base);

    let first: serde_json::Value = client
        .post(&url)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(first["outcome"], "sent");
    assert_eq!(first["day"], 1);
    assert_eq!(first["date"], "2026-10-18");

    let second: serde_json::Value = client
        .post(&url)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(second["outcome"], "already_sent");

    let forced: serde_json::Value = client
        .post(format!("{url}?force=true"))
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(forced["outcome"], "sent");
    assert_eq!(h.sender.sent().len(), 2);
}

#[tokio::test]
async fn force_send_option_applies_to_every_on_demand_dispatch() {
    let h = start(true).await;
    let client = reqwest::Client::new();
    for _ in 0..2 {
        let status = client
            .post(format!("{}/dispatch", h.base))
            .send()
            .await
            .expect("request")
            .status();
        assert_eq!(status, reqwest::StatusCode::OK);
    }
    assert_eq!(h.sender.sent().len(), 2);
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let h = start(false).await;
    h.sender.set_failing(true);
    let response = reqwest::Client::new()
        .post(format!("{}/dispatch", h.base))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    assert_eq!(h.store.snapshot().expect("state").last_sent_on, None);
}

#[tokio::test]
async fn status_endpoint_reports_progress() {
    let h = start(false).await;
    let body: serde_json::Value = reqwest::get(format!("{}/status", h.base))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");
    assert_eq!(body["current_day"], 1);
    assert_eq!(body["total_days"], 2);
    assert_eq!(body["sent_today"], false);
    assert_eq!(body["current_task"], "Read <chapter> 1");
}
