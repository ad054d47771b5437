use httpmock::prelude::*;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use transauto::adapters::CsvStore;
use transauto::config::{AppConfig, StoreBackend};
use transauto::domain::model::ChapterRow;
use transauto::domain::ports::RowStore;
use transauto::server::{self, AppState};
use transauto::IntakeService;

const DOCUMENT: &str = "book";
const SOURCE_TEXT: &str = "The studio opened early. Everyone was ready.\n\nThe director arrived late. Nobody minded.";

struct TestApp {
    base_url: String,
    intake: Arc<IntakeService>,
    csv_dir: TempDir,
    handle: JoinHandle<()>,
}

impl TestApp {
    async fn row(&self, row: u32) -> ChapterRow {
        CsvStore::new(self.csv_dir.path())
            .read_row(DOCUMENT, row)
            .await
            .unwrap()
            .unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn test_config(mock: &MockServer, csv_dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.store.backend = StoreBackend::Csv;
    config.store.csv_dir = csv_dir.path().to_string_lossy().to_string();
    config.store.document_id = Some(DOCUMENT.to_string());
    config.ai.api_key = Some("sk-test".to_string());
    config.ai.api_base = mock.base_url();
    config.telegram.bot_token = Some("TOKEN".to_string());
    config.telegram.chat_id = Some("1001".to_string());
    config.telegram.api_base = mock.base_url();
    config
}

async fn spawn_app(mock: &MockServer) -> TestApp {
    let csv_dir = TempDir::new().unwrap();
    let config = test_config(mock, &csv_dir);
    let (engine, intake) = config.build_services().unwrap();
    let state = AppState::new(engine, Arc::clone(&intake), config.store.document_id.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = server::serve_with_listener(listener, state).await;
    });

    TestApp {
        base_url: format!("http://{}", addr),
        intake,
        csv_dir,
        handle,
    }
}

fn mock_telegram(mock: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let send = mock.mock(|when, then| {
        when.method(POST).path("/botTOKEN/SendMessage");
        then.status(200).json_body(json!({
            "ok": true,
            "result": {
                "message_id": 1,
                "date": 0,
                "chat": { "id": 1001, "type": "private" },
                "text": "ok"
            }
        }));
    });
    let answer = mock.mock(|when, then| {
        when.method(POST).path("/botTOKEN/AnswerCallbackQuery");
        then.status(200).json_body(json!({ "ok": true, "result": true }));
    });
    (send, answer)
}

fn callback_update(update_id: i64, data: &str) -> Value {
    json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cb-{}", update_id),
            "from": { "id": 7, "is_bot": false, "first_name": "Reviewer" },
            "chat_instance": "42",
            "data": data,
            "message": {
                "message_id": 3,
                "date": 1700000000,
                "chat": { "id": 1001, "type": "private", "first_name": "Reviewer" },
                "text": "review"
            }
        }
    })
}

async fn post_update(app: &TestApp, update: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/webhook/telegram", app.base_url))
        .json(&update)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_full_approval_flow_over_webhook() {
    let mock = MockServer::start();
    let (send_mock, answer_mock) = mock_telegram(&mock);
    let translate_mock = mock.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("\"temperature\":0.3");
        then.status(200)
            .json_body(json!({ "choices": [{ "message": { "content": "스튜디오가 일찍 열었다." } }] }));
    });
    let adapt_mock = mock.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("\"temperature\":0.4");
        then.status(200)
            .json_body(json!({ "choices": [{ "message": { "content": "스튜디오는 아침 일찍 문을 열었다." } }] }));
    });

    let app = spawn_app(&mock).await;

    let report = tokio_test::assert_ok!(app.intake.ingest(DOCUMENT, SOURCE_TEXT).await);
    assert_eq!(report.chapter_count, 2);
    assert_eq!(report.requests_sent, 2);
    send_mock.assert_hits(2);
    assert_eq!(app.row(2).await.status, "CHAPTER_REVIEW");

    // 第 1 章：核可章節 -> 翻譯
    let (status, body) = post_update(&app, callback_update(1, "ap_ch:0:book")).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["outcome"], json!({ "outcome": "advanced", "to": "TRANSLATION" }));
    translate_mock.assert_hits(1);

    let row = app.row(2).await;
    assert_eq!(row.translated_text, "스튜디오가 일찍 열었다.");
    assert_eq!(row.status, "TRANSLATION");

    // 平台重送同一個 update：不重新翻譯，只重送待審請求
    let (status, body) = post_update(&app, callback_update(1, "ap_ch:0:book")).await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"]["outcome"], json!("redelivered"));
    translate_mock.assert_hits(1);

    // 核可翻譯 -> 改寫
    let (_, body) = post_update(&app, callback_update(2, "ap_tr:0:book")).await;
    assert_eq!(body["outcome"], json!({ "outcome": "advanced", "to": "ADAPTATION" }));
    adapt_mock.assert_hits(1);
    assert_eq!(app.row(2).await.adapted_text, "스튜디오는 아침 일찍 문을 열었다.");

    // 核可改寫 -> 完成
    let (_, body) = post_update(&app, callback_update(3, "ap_ad:0:book")).await;
    assert_eq!(body["outcome"], json!({ "outcome": "advanced", "to": "COMPLETED" }));
    let row = app.row(2).await;
    assert_eq!(row.final_text, "스튜디오는 아침 일찍 문을 열었다.");
    assert_eq!(row.status, "COMPLETED");

    // 完成後的舊按鈕沒有作用
    let (_, body) = post_update(&app, callback_update(4, "re_tr:0:book")).await;
    assert_eq!(body["outcome"], json!({ "outcome": "stale", "current": "COMPLETED" }));
    assert_eq!(app.row(2).await.status, "COMPLETED");

    // 第 2 章：退回後再核可也無效
    let (_, body) = post_update(&app, callback_update(5, "re_ch:1:book")).await;
    assert_eq!(body["outcome"]["outcome"], json!("rejected"));
    let (_, body) = post_update(&app, callback_update(6, "ap_ch:1:book")).await;
    assert_eq!(body["outcome"]["outcome"], json!("stale"));
    assert_eq!(app.row(3).await.status, "REJECTED");
    translate_mock.assert_hits(1);

    assert!(answer_mock.hits() >= 6);
}

#[tokio::test]
async fn test_invalid_and_non_callback_updates_are_acknowledged() {
    let mock = MockServer::start();
    let (_send, answer_mock) = mock_telegram(&mock);
    let app = spawn_app(&mock).await;

    let (status, body) = post_update(&app, callback_update(1, "garbage")).await;
    assert_eq!(status, 200);
    assert_eq!(body["outcome"]["outcome"], json!("invalid"));
    answer_mock.assert_hits(1);

    let (status, body) = post_update(
        &app,
        json!({
            "update_id": 2,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "chat": { "id": 1, "type": "private", "first_name": "Reviewer" },
                "from": { "id": 1, "is_bot": false, "first_name": "Reviewer" },
                "text": "/start"
            }
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn test_transformation_failure_returns_500_and_keeps_status() {
    let mock = MockServer::start();
    let _telegram = mock_telegram(&mock);
    let openai_mock = mock.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(503).body("overloaded");
    });

    let app = spawn_app(&mock).await;
    app.intake.ingest(DOCUMENT, SOURCE_TEXT).await.unwrap();

    let (status, body) = post_update(&app, callback_update(1, "ap_ch:0:book")).await;
    assert_eq!(status, 500);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("overloaded"));
    openai_mock.assert_hits(1);

    let row = app.row(2).await;
    assert_eq!(row.status, "CHAPTER_REVIEW");
    assert!(row.translated_text.is_empty());
}

#[tokio::test]
async fn test_rest_endpoints() {
    let mock = MockServer::start();
    let _telegram = mock_telegram(&mock);
    let app = spawn_app(&mock).await;
    app.intake.ingest(DOCUMENT, SOURCE_TEXT).await.unwrap();
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["store"], json!("csv"));
    assert_eq!(health["notifier"], json!("telegram"));
    assert_eq!(health["default_document"], json!(true));

    let chapters: Value = client
        .get(format!("{}/api/documents/{}/chapters", app.base_url, DOCUMENT))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chapters["chapters"].as_array().unwrap().len(), 2);
    assert_eq!(chapters["chapters"][1]["chapter_number"], json!(2));
    assert_eq!(chapters["chapters"][1]["status"], json!("CHAPTER_REVIEW"));

    // document_id 省略時使用預設文件
    let response = client
        .post(format!("{}/api/approve", app.base_url))
        .json(&json!({ "chapter_index": 1, "stage": "chapter", "action": "reject" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["outcome"]["outcome"], json!("rejected"));
    assert_eq!(app.row(3).await.status, "REJECTED");

    let response = client
        .post(format!("{}/api/approve", app.base_url))
        .json(&json!({ "chapter_index": 0, "stage": "publishing", "action": "approve" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    for body in [
        json!({ "chapter_index": -1, "stage": "chapter", "action": "approve" }),
        json!({ "stage": "chapter", "action": "approve" }),
    ] {
        let response = client
            .post(format!("{}/api/approve", app.base_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], json!(false));
    }

    let response = client
        .post(format!("{}/api/projects", app.base_url))
        .json(&json!({ "name": "Storyboard" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["document_id"], json!("Storyboard_Trans"));
    assert!(app.csv_dir.path().join("Storyboard_Trans.csv").exists());

    let projects: Value = client
        .get(format!("{}/api/projects", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(projects["success"], json!(true));
    let ids: Vec<&str> = projects["projects"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert!(ids.contains(&DOCUMENT));
    assert!(ids.contains(&"Storyboard_Trans"));
}
