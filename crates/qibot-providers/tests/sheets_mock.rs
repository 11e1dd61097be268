use std::time::Duration;

use qibot_core::{Feedback, PersistenceSink, PlanInquiry, SupportOutcome};
use qibot_providers::{SheetsSettings, SheetsSink};
use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sink(server: &MockServer) -> SheetsSink {
    SheetsSink::new(SheetsSettings {
        spreadsheet_id: "sheet-1".to_string(),
        access_token: "sheets-token".to_string(),
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn appended_row(server_requests: &[wiremock::Request]) -> Vec<String> {
    let body: Value = serde_json::from_slice(&server_requests[0].body).unwrap();
    body["values"][0]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_support_outcome_is_appended_to_second_tab() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet-1/values/P%C3%A1gina2!A:E:append"))
        .and(query_param("valueInputOption", "RAW"))
        .and(header("authorization", "Bearer sheets-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    sink(&mock_server)
        .save_support(&SupportOutcome {
            name: "Maria Silva".to_string(),
            problem: "Sem internet".to_string(),
            description: "Sem internet desde ontem".to_string(),
            status: "Resolved by assistant".to_string(),
        })
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let row = appended_row(&requests);
    assert_eq!(row.len(), 5);
    assert_eq!(row[1], "Maria Silva");
    assert_eq!(row[4], "Resolved by assistant");
    // dd/mm/YYYY HH:MM:SS
    assert_eq!(row[0].len(), 19);
    assert_eq!(&row[0][2..3], "/");
}

#[tokio::test]
async fn test_plan_inquiry_uses_seven_columns() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet-1/values/P%C3%A1gina3!A:G:append"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    sink(&mock_server)
        .save_plan_inquiry(&PlanInquiry {
            name: "Ana".to_string(),
            situation: "Current Customer".to_string(),
            current_plan: "QI FIBRA BASIC".to_string(),
            desired_plan: "QI FIBRA PREMIUM TOP".to_string(),
            phone: "44999991234".to_string(),
            notes: "Interesse em: QI FIBRA PREMIUM TOP | Plano atual: QI FIBRA BASIC".to_string(),
        })
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let row = appended_row(&requests);
    assert_eq!(row.len(), 7);
    assert_eq!(row[5], "44999991234");
}

#[tokio::test]
async fn test_rejected_write_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            r#"{"error":{"code":403,"message":"The caller does not have permission"}}"#,
        ))
        .mount(&mock_server)
        .await;

    let err = sink(&mock_server)
        .save_feedback(&Feedback {
            name: "Maria".to_string(),
            service: "Technical Support".to_string(),
            rating: "Bom".to_string(),
            comment: String::new(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not have permission"));
}

#[tokio::test]
async fn test_headers_written_to_every_tab() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(query_param("valueInputOption", "RAW"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(3)
        .mount(&mock_server)
        .await;

    sink(&mock_server).write_headers().await.unwrap();
}
