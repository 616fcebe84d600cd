use fund_ingest::adapters::{FileRepository, LocalStorage};
use fund_ingest::domain::model::NewDocument;
use fund_ingest::domain::ports::{DocumentRepository, Storage};
use fund_ingest::{AppConfig, Application, RunMode};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;

const STATEMENT: &str = "\
Date,Call Number,Amount,Description
2024-01-15,Call 1,\"$1,000,000\",Initial capital call
2024-06-30,Call 2,\"$500,000\",Follow-on

Date,Type,Amount,Recallable,Description
2024-03-01,Return of Capital,\"$250,000\",no,Partial exit
2024-09-30,Income,\"$50,000\",no,Dividend
";

fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.storage.data_dir = dir.path().join("data").display().to_string();
    config
}

async fn rpc(addr: SocketAddr, method: &str, params: Value) -> Value {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    reqwest::Client::new()
        .post(format!("http://{}", addr))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap()
}

/// Polls documents.get.v1 until the document reaches a final status.
async fn wait_for_document(addr: SocketAddr, document_id: u64) -> Value {
    for _ in 0..100 {
        let response = rpc(addr, "documents.get.v1", json!({ "document_id": document_id })).await;
        let document = response["result"].clone();
        if document["status"] == "completed" || document["status"] == "failed" {
            return document;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("document {} did not finish in time", document_id);
}

#[tokio::test]
async fn test_upload_process_and_read_ledger() {
    let dir = TempDir::new().unwrap();
    let app = Application::start(&test_config(&dir), RunMode::Prod)
        .await
        .unwrap();
    let addr = app.local_addr();

    let response = rpc(
        addr,
        "documents.upload.v1",
        json!({ "fund_id": 1, "file_name": "q1.csv", "content": STATEMENT }),
    )
    .await;
    assert_eq!(response["result"]["status"], "pending");
    let document_id = response["result"]["document_id"].as_u64().unwrap();

    let document = wait_for_document(addr, document_id).await;
    assert_eq!(document["status"], "completed");
    assert_eq!(document["fund_id"], 1);
    assert_eq!(document["stats"]["tables"], 2);
    assert_eq!(document["stats"]["capital_calls"], 2);
    assert_eq!(document["stats"]["distributions"], 2);

    let ledger = rpc(addr, "funds.ledger.v1", json!({ "fund_id": 1 })).await["result"].clone();
    assert_eq!(ledger["capital_calls"].as_array().unwrap().len(), 2);
    assert_eq!(ledger["distributions"].as_array().unwrap().len(), 2);
    assert_eq!(ledger["totals"]["capital_called"], 1_500_000.0);
    assert_eq!(ledger["totals"]["distributed"], 300_000.0);
    assert_eq!(ledger["capital_calls"][0]["call_date"], "2024-01-15");

    // 其他基金不受影響
    let other = rpc(addr, "funds.ledger.v1", json!({ "fund_id": 2 })).await["result"].clone();
    assert!(other["capital_calls"].as_array().unwrap().is_empty());

    let listed = rpc(addr, "documents.list.v1", json!({ "fund_id": 1 })).await;
    assert_eq!(listed["result"]["documents"].as_array().unwrap().len(), 1);

    app.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_document_is_marked_failed() {
    let dir = TempDir::new().unwrap();
    let app = Application::start(&test_config(&dir), RunMode::Prod)
        .await
        .unwrap();
    let addr = app.local_addr();

    let response = rpc(
        addr,
        "documents.upload.v1",
        json!({ "fund_id": 3, "file_name": "statement.pdf", "content": "%PDF-1.7" }),
    )
    .await;
    let document_id = response["result"]["document_id"].as_u64().unwrap();

    let document = wait_for_document(addr, document_id).await;
    assert_eq!(document["status"], "failed");
    assert!(document["error_message"]
        .as_str()
        .unwrap()
        .contains("statement.pdf"));

    let ledger = rpc(addr, "funds.ledger.v1", json!({ "fund_id": 3 })).await["result"].clone();
    assert_eq!(ledger["totals"]["capital_called"], 0.0);

    app.shutdown().await;
}

#[tokio::test]
async fn test_request_errors_use_rpc_codes() {
    let dir = TempDir::new().unwrap();
    let app = Application::start(&test_config(&dir), RunMode::Prod)
        .await
        .unwrap();
    let addr = app.local_addr();

    let response = rpc(
        addr,
        "documents.upload.v1",
        json!({ "fund_id": 0, "file_name": "q1.csv", "content": STATEMENT }),
    )
    .await;
    assert_eq!(response["error"]["code"], 4000);

    // 必須恰好提供一種來源
    let response = rpc(
        addr,
        "documents.upload.v1",
        json!({ "fund_id": 1, "file_name": "q1.csv" }),
    )
    .await;
    assert_eq!(response["error"]["code"], 4000);

    let response = rpc(
        addr,
        "documents.upload.v1",
        json!({ "fund_id": 1, "file_name": "../q1.csv", "content": STATEMENT }),
    )
    .await;
    assert_eq!(response["error"]["code"], 4000);

    let response = rpc(addr, "documents.get.v1", json!({ "document_id": 999 })).await;
    assert_eq!(response["error"]["code"], 4001);
    assert_eq!(response["error"]["message"], "document 999 not found");

    app.shutdown().await;
}

#[tokio::test]
async fn test_upload_by_url() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let statement_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/statements/q2.csv");
            then.status(200)
                .header("Content-Type", "text/csv")
                .body(STATEMENT);
        })
        .await;

    let app = Application::start(&test_config(&dir), RunMode::Prod)
        .await
        .unwrap();
    let addr = app.local_addr();

    let response = rpc(
        addr,
        "documents.upload.v1",
        json!({ "fund_id": 5, "url": server.url("/statements/q2.csv") }),
    )
    .await;
    let document_id = response["result"]["document_id"].as_u64().unwrap();
    statement_mock.assert_async().await;

    let document = wait_for_document(addr, document_id).await;
    assert_eq!(document["status"], "completed");
    assert_eq!(document["file_name"], "q2.csv");

    app.shutdown().await;
}

#[tokio::test]
async fn test_health_reports_mode_and_workers() {
    let dir = TempDir::new().unwrap();

    let app = Application::start(&test_config(&dir), RunMode::Prod)
        .await
        .unwrap();
    let health = rpc(app.local_addr(), "health.v1", json!([])).await["result"].clone();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["mode"], "prod");
    assert_eq!(health["workers"], 2);
    assert_eq!(health["worker_restarts"], 0);
    app.shutdown().await;

    let app = Application::start(&test_config(&dir), RunMode::Dev)
        .await
        .unwrap();
    let health = rpc(app.local_addr(), "health.v1", json!([])).await["result"].clone();
    assert_eq!(health["mode"], "dev");
    assert_eq!(health["workers"], 1);
    app.shutdown().await;
}

#[tokio::test]
async fn test_pending_documents_are_recovered_on_start() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    // 模擬上次執行中斷：文件已儲存但尚未處理
    {
        let storage = LocalStorage::new(config.data_dir());
        let repository = FileRepository::open(storage.clone()).await.unwrap();
        let document = repository
            .create_document(NewDocument {
                fund_id: 9,
                file_name: "q3.csv".to_string(),
            })
            .await
            .unwrap();
        storage
            .write_file(&document.file_path, STATEMENT.as_bytes())
            .await
            .unwrap();
    }

    let app = Application::start(&config, RunMode::Prod).await.unwrap();
    let document = wait_for_document(app.local_addr(), 1).await;
    assert_eq!(document["status"], "completed");
    assert_eq!(document["stats"]["capital_calls"], 2);
    app.shutdown().await;
}
