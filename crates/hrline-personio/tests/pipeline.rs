//! Full Personio runs against a local mock API

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use hrline_core::{HttpConfig, ReqwestTransport, count_lines};
use hrline_personio::{Destination, PersonioConfig, run};
use hrline_report::{Reporter, ReporterConfig, SlackWebhook};
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn records(ids: std::ops::Range<u64>) -> Vec<Value> {
    ids.map(|id| json!({ "id": id, "attributes": {} })).collect()
}

async fn mount_get(server: &MockServer, endpoint: &str, query: &[(&str, &str)], body: Value) {
    let mut mock = Mock::given(method("GET")).and(path(format!("/v1/{endpoint}")));
    for (k, v) in query {
        mock = mock.and(query_param(*k, *v));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn start_personio(rt: &Runtime, token_status: u16) -> MockServer {
    rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth"))
            .respond_with(ResponseTemplate::new(token_status).set_body_json(
                json!({ "success": true, "data": { "token": "papi-test", "expires_in": 86400 } }),
            ))
            .mount(&server)
            .await;

        mount_get(
            &server,
            "company/employees",
            &[("offset", "0"), ("limit", "200")],
            json!({ "success": true, "data": records(0..2), "metadata": { "total_elements": 2 } }),
        )
        .await;
        mount_get(
            &server,
            "company/time-off-types",
            &[],
            json!({ "success": true, "data": records(0..3) }),
        )
        .await;
        mount_get(
            &server,
            "company/attendances",
            &[("start_date", "2024-01-01"), ("end_date", "2024-01-31")],
            json!({ "success": true, "data": records(0..1), "metadata": { "total_elements": 1 } }),
        )
        .await;
        for (page, ids) in [("1", 0..2), ("2", 2..3)] {
            mount_get(
                &server,
                "company/absence-periods",
                &[("offset", page), ("limit", "200")],
                json!({ "success": true, "data": records(ids), "metadata": { "total_pages": 2 } }),
            )
            .await;
        }
        Mock::given(method("GET"))
            .and(path("/v1/company/attendances/projects"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hooks/run"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        server
    })
}

fn config(server: &MockServer, data_dir: &Path) -> PersonioConfig {
    PersonioConfig {
        base_url: format!("{}/v1", server.uri()),
        token_url: format!("{}/v1/auth", server.uri()),
        client_id: "client".into(),
        client_secret: "secret".into(),
        data_dir: data_dir.to_path_buf(),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 1, 31),
        max_retries: 0,
        notify_start: false,
        ..Default::default()
    }
}

fn requests_to(rt: &Runtime, server: &MockServer, prefix: &str) -> Vec<wiremock::Request> {
    rt.block_on(server.received_requests())
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .collect()
}

#[test]
fn full_run_isolates_failed_resource() {
    let rt = Runtime::new().unwrap();
    let server = start_personio(&rt, 200);
    let dir = tempfile::tempdir().unwrap();
    let reporter = Reporter::new(ReporterConfig::new(dir.path().join("logs")));

    let output = run(&config(&server, dir.path()), &reporter, None);
    let report = &output.report;

    let summary: Vec<(&str, bool, usize)> = report
        .outcomes
        .iter()
        .map(|o| (o.resource.as_str(), o.is_success(), o.records))
        .collect();
    assert_eq!(
        summary,
        [
            ("employees", true, 2),
            ("time_off_types", true, 3),
            ("attendances", true, 1),
            ("projects", false, 0),
            ("absence_periods", true, 3),
        ]
    );
    assert_eq!(
        report.outcomes[3].detail.as_deref(),
        Some("HTTP 500: upstream exploded")
    );
    assert!(!output.succeeded());

    let tables = dir.path().join("personio_raw");
    assert_eq!(count_lines(&tables.join("employees.jsonl")).unwrap(), 2);
    assert_eq!(count_lines(&tables.join("absence_periods.jsonl")).unwrap(), 3);

    // No channel: nothing delivered, log + summary still written
    assert!(!output.delivery.delivered);
    assert_eq!(output.delivery.artifacts.len(), 2);
    assert!(output.delivery.artifacts.iter().all(|p| p.exists()));

    assert_eq!(requests_to(&rt, &server, "/v1/auth").len(), 1);
}

#[test]
fn rejected_credentials_abort_before_extraction() {
    let rt = Runtime::new().unwrap();
    let server = start_personio(&rt, 401);
    let dir = tempfile::tempdir().unwrap();
    let reporter = Reporter::new(ReporterConfig::new(dir.path().join("logs")));

    let output = run(&config(&server, dir.path()), &reporter, None);

    assert!(output.report.outcomes.is_empty());
    let exception = output.report.exception.as_ref().unwrap();
    assert_eq!(exception.kind, "AuthError");
    assert_eq!(output.delivery.artifacts.len(), 3);
    let error_log = std::fs::read_to_string(&output.delivery.artifacts[2]).unwrap();
    assert!(error_log.starts_with("AuthError: "), "{error_log}");
    assert!(requests_to(&rt, &server, "/v1/company").is_empty());
}

#[test]
fn selected_dry_run_notifies_channel() {
    let rt = Runtime::new().unwrap();
    let server = start_personio(&rt, 200);
    let dir = tempfile::tempdir().unwrap();

    let transport = Arc::new(ReqwestTransport::new(HttpConfig::default()).unwrap());
    let hook = SlackWebhook::new(format!("{}/hooks/run", server.uri()), transport);
    let reporter =
        Reporter::new(ReporterConfig::new(dir.path().join("logs")).with_channel(Box::new(hook)));
    let config = PersonioConfig {
        destination: Destination::Memory,
        only: vec!["time_off_types".into()],
        notify_start: true,
        ..config(&server, dir.path())
    };

    let output = run(&config, &reporter, None);
    assert!(output.succeeded());
    assert!(output.delivery.delivered);
    assert!(!dir.path().join("personio_raw").exists());

    let hooks = requests_to(&rt, &server, "/hooks/run");
    assert_eq!(hooks.len(), 2);
    let start: Value = serde_json::from_slice(&hooks[0].body).unwrap();
    assert!(start["text"].as_str().unwrap().contains("*Sources*: time_off_types"));
    let end: Value = serde_json::from_slice(&hooks[1].body).unwrap();
    let text = end["text"].as_str().unwrap();
    assert!(text.contains("*Job information (1 tables)*"));
    assert!(text.contains("- *Success* for table `time_off_types` (3 records)"));
}

#[test]
fn missing_credentials_reported_as_configuration_error() {
    let rt = Runtime::new().unwrap();
    let server = start_personio(&rt, 200);
    let dir = tempfile::tempdir().unwrap();
    let reporter = Reporter::new(ReporterConfig::new(dir.path().join("logs")));
    let config = PersonioConfig {
        client_secret: String::new(),
        ..config(&server, dir.path())
    };

    let output = run(&config, &reporter, None);
    assert_eq!(
        output.report.exception.as_ref().unwrap().kind,
        "ConfigurationError"
    );
    assert!(requests_to(&rt, &server, "/v1").is_empty());
}

#[test]
fn start_notification_without_channel_aborts_run() {
    let rt = Runtime::new().unwrap();
    let server = start_personio(&rt, 200);
    let dir = tempfile::tempdir().unwrap();
    let reporter = Reporter::new(ReporterConfig::new(dir.path().join("logs")));
    let config = PersonioConfig {
        notify_start: true,
        ..config(&server, dir.path())
    };

    let output = run(&config, &reporter, None);

    assert!(output.report.outcomes.is_empty());
    assert_eq!(
        output.report.exception.as_ref().unwrap().kind,
        "ConfigurationError"
    );
    assert!(!output.succeeded());
    assert_eq!(output.delivery.artifacts.len(), 3);
    assert!(output.delivery.artifacts.iter().all(|p| p.exists()));
    assert!(requests_to(&rt, &server, "/v1").is_empty());
}

#[test]
fn unwritable_data_dir_still_writes_artifacts() {
    let rt = Runtime::new().unwrap();
    let server = start_personio(&rt, 200);
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, "occupied").unwrap();
    let reporter = Reporter::new(ReporterConfig::new(dir.path().join("logs")));

    let output = run(&config(&server, &blocker), &reporter, None);

    assert!(output.report.outcomes.is_empty());
    let exception = output.report.exception.as_ref().unwrap();
    assert_eq!(exception.kind, "SinkError");
    assert!(exception.message.contains("cannot create data directory"), "{}", exception.message);
    assert_eq!(output.delivery.artifacts.len(), 3);
    let error_log = std::fs::read_to_string(&output.delivery.artifacts[2]).unwrap();
    assert!(error_log.starts_with("SinkError: "), "{error_log}");
    assert!(requests_to(&rt, &server, "/v1").is_empty());
}
