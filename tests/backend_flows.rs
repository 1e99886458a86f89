use std::io::Read;
use std::sync::mpsc;
use std::thread;

use boq_table_editor::backend::{BackendClient, DocumentKind, PresentationFormat};
use boq_table_editor::config::{BackendConfig, Theme};
use boq_table_editor::costing::CostingFactors;
use boq_table_editor::error::BoqError;
use boq_table_editor::session::{Workspace, STITCHED_CONTAINER};
use boq_table_editor::table::FileId;
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

/// A recorded request: method, path and body.
type Seen = (String, String, String);

/// Serve the canned responses in order, then stop.
fn fake_backend(responses: Vec<(u16, Value)>) -> (BackendClient, mpsc::Receiver<Seen>) {
    let server = Server::http("127.0.0.1:0").expect("bind fake backend");
    let port = server.server_addr().to_ip().expect("ip listener").port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let mut payload = String::new();
            let _ = request.as_reader().read_to_string(&mut payload);
            let _ = tx.send((request.method().to_string(), request.url().to_string(), payload));
            let header = Header::from_bytes("Content-Type", "application/json").expect("header");
            let response = Response::from_string(body.to_string())
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });

    let client = BackendClient::new(&BackendConfig {
        base_url: format!("http://127.0.0.1:{}", port),
        timeout_secs: 5,
    })
    .expect("client");
    (client, rx)
}

const STITCHED: &str = "<table border=\"1\"><thead><tr><th>Item</th><th>Qty</th><th>Total</th></tr></thead>\
    <tbody><tr><td>Chair</td><td>2</td><td>100</td></tr><tr><td></td><td></td><td></td></tr></tbody></table>";

#[tokio::test]
async fn fetch_normalizes_stitched_table() {
    let (client, rx) = fake_backend(vec![(
        200,
        json!({"success": true, "stitched_html": STITCHED, "row_count": 2, "page_count": 1}),
    )]);
    let mut ws = Workspace::new(Theme::default());
    let file_id = FileId::from("abc123");

    let report = ws.load_from_backend(&client, STITCHED_CONTAINER, &file_id).await.unwrap();
    assert_eq!(report.data_rows, 1);
    assert_eq!(report.empty_rows_removed, 1);
    assert!(ws.snapshots().contains(&file_id));
    assert_eq!(ws.context.current_file, Some(file_id));

    let (method, url, _) = rx.recv().unwrap();
    assert_eq!(method, "POST");
    assert_eq!(url, "/stitch-tables/abc123");
}

#[tokio::test]
async fn missing_file_keeps_table_and_lists_alternatives() {
    let (client, _rx) = fake_backend(vec![
        (200, json!({"success": true, "stitched_html": STITCHED})),
        (
            404,
            json!({"error": "File not found", "available_files": [{"id": "f9", "name": "tender.pdf"}]}),
        ),
    ]);
    let mut ws = Workspace::new(Theme::default());
    ws.load_from_backend(&client, STITCHED_CONTAINER, &FileId::from("f1")).await.unwrap();
    let before = ws.tables(STITCHED_CONTAINER).unwrap().to_vec();

    let err = ws
        .load_from_backend(&client, STITCHED_CONTAINER, &FileId::from("gone"))
        .await
        .unwrap_err();
    match &err {
        BoqError::UpstreamNotFound { available_files, .. } => assert_eq!(available_files[0].id, "f9"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(ws.tables(STITCHED_CONTAINER).unwrap(), before.as_slice());
    let html = ws.html(STITCHED_CONTAINER).unwrap();
    assert!(html.contains("data-file-id=\"f9\">tender.pdf</a>"));
    assert!(html.contains("Chair"));
}

#[tokio::test]
async fn bad_request_carries_details_and_keys() {
    let (client, _rx) = fake_backend(vec![(
        400,
        json!({
            "error": "No tables found to stitch",
            "details": "No layoutParsingResults found",
            "available_keys": ["status", "logId"],
            "hint": "Try extracting again"
        }),
    )]);
    let err = client.stitch_tables(&FileId::from("f1")).await.unwrap_err();
    match err {
        BoqError::UpstreamBadRequest {
            message,
            details,
            hint,
            available_keys,
        } => {
            assert_eq!(message, "No tables found to stitch");
            assert_eq!(details.as_deref(), Some("No layoutParsingResults found"));
            assert_eq!(hint.as_deref(), Some("Try extracting again"));
            assert_eq!(available_keys, vec!["status", "logId"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn costing_round_trip_renders_and_summarizes() {
    let (client, rx) = fake_backend(vec![
        (200, json!({"success": true, "stitched_html": STITCHED})),
        (
            200,
            json!({
                "success": true,
                "result": [{
                    "headers": ["Item", "Qty", "Total", "total_original", "Actions"],
                    "rows": [{"Item": "Chair", "Qty": "2", "Total": "150.00", "total_original": "100", "Actions": ""}]
                }]
            }),
        ),
    ]);
    let mut ws = Workspace::new(Theme::default());
    let file_id = FileId::from("f1");
    ws.load_from_backend(&client, STITCHED_CONTAINER, &file_id).await.unwrap();

    let factors = CostingFactors {
        net_margin: 20.0,
        ..CostingFactors::neutral()
    };
    let outcome = ws
        .submit_costing(&client, STITCHED_CONTAINER, &factors, 0.05)
        .await
        .unwrap();
    assert_eq!(outcome.summary.subtotal_display(), "150.00");
    assert_eq!(outcome.summary.grand_total_display(), "157.50");
    assert!(!outcome.html.contains("contenteditable"));
    assert!(!outcome.html.contains(">Actions<"));
    assert_eq!(ws.context.costing_file, Some(file_id));

    let _stitch = rx.recv().unwrap();
    let (_, url, body) = rx.recv().unwrap();
    assert_eq!(url, "/costing");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["file_id"], "f1");
    assert_eq!(body["factors"]["net_margin"], 20.0);
    assert_eq!(body["table_data"]["headers"], json!(["Item", "Qty", "Total"]));
    assert_eq!(body["table_data"]["rows"][0]["Item"], "Chair");
}

#[tokio::test]
async fn costing_failure_is_an_upstream_error() {
    let (client, _rx) = fake_backend(vec![
        (200, json!({"success": true, "stitched_html": STITCHED})),
        (200, json!({"success": false, "error": "No costing sheet"})),
    ]);
    let mut ws = Workspace::new(Theme::default());
    ws.load_from_backend(&client, STITCHED_CONTAINER, &FileId::from("f1")).await.unwrap();
    let err = ws
        .submit_costing(&client, STITCHED_CONTAINER, &CostingFactors::neutral(), 0.05)
        .await
        .unwrap_err();
    assert!(matches!(err, BoqError::Upstream { ref message, .. } if message == "No costing sheet"));
    assert!(ws.context.costing_file.is_none());
    assert!(ws.container(STITCHED_CONTAINER).unwrap().diagnostic.is_some());
}

#[tokio::test]
async fn generate_presentation_sends_format() {
    let (client, rx) = fake_backend(vec![(200, json!({"success": true, "file_path": "out/deck.pdf"}))]);
    let document = client
        .generate(DocumentKind::Presentation, &FileId::from("f1"), Some(PresentationFormat::Pdf))
        .await
        .unwrap();
    assert_eq!(document.file_path.as_deref(), Some("out/deck.pdf"));

    let (_, url, body) = rx.recv().unwrap();
    assert_eq!(url, "/generate-presentation/f1");
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"format": "pdf"}));
}

#[tokio::test]
async fn server_error_maps_to_upstream() {
    let (client, _rx) = fake_backend(vec![(500, json!({"error": "boom"}))]);
    let err = client
        .generate(DocumentKind::ZeroCosting, &FileId::from("f1"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, BoqError::Upstream { status: 500, .. }));
}
