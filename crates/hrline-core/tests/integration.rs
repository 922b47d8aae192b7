//! End-to-end extraction against a local mock API (reqwest transport)

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use hrline_core::{
    Extractor, HttpConfig, JsonLinesSink, Orchestrator, PaginationStrategy, ReqwestTransport,
    ResourceSpec, RunMeta, TokenConfig, TokenManager, count_lines,
};
use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(ids: std::ops::Range<u64>, total: u64) -> serde_json::Value {
    let data: Vec<_> = ids.map(|id| json!({ "id": id })).collect();
    json!({ "success": true, "data": data, "metadata": { "total_elements": total } })
}

/// Mock server with a token endpoint and a 5-record employee list (limit 2)
fn start_api(rt: &Runtime) -> MockServer {
    rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({ "success": true, "data": { "token": "tok-1", "expires_in": 3600 } }),
            ))
            .mount(&server)
            .await;
        for (offset, ids) in [("0", 0..2), ("2", 2..4), ("4", 4..5)] {
            Mock::given(method("GET"))
                .and(path("/v1/company/employees"))
                .and(query_param("offset", offset))
                .and(query_param("limit", "2"))
                .and(header("authorization", "Bearer tok-1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(page(ids, 5)))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/v1/company/time-off-types"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        server
    })
}

fn extractor(server: &MockServer) -> Extractor {
    let transport = Arc::new(ReqwestTransport::new(HttpConfig::default()).unwrap());
    let tokens = Arc::new(TokenManager::new(
        transport.clone(),
        TokenConfig::new(format!("{}/v1/auth", server.uri()), "client", "secret"),
    ));
    Extractor::new(transport, tokens, format!("{}/v1", server.uri()))
}

fn token_requests(rt: &Runtime, server: &MockServer) -> usize {
    let requests = rt.block_on(server.received_requests()).unwrap_or_default();
    requests
        .iter()
        .filter(|r| r.url.path() == "/v1/auth")
        .count()
}

#[test]
fn offset_resource_lands_in_jsonl() {
    let rt = Runtime::new().unwrap();
    let server = start_api(&rt);
    let ex = extractor(&server);
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonLinesSink::new(dir.path()).unwrap();
    let cancel = AtomicBool::new(false);

    let resources = [
        ResourceSpec::new(
            "employees",
            "company/employees",
            PaginationStrategy::offset(2, "metadata.total_elements"),
        ),
        ResourceSpec::new(
            "time_off_types",
            "company/time-off-types",
            PaginationStrategy::SinglePage,
        ),
    ];
    let report = Orchestrator::new(&ex, &sink)
        .cancel_flag(&cancel)
        .run(&RunMeta::new("load_personio", sink_name(&sink), "personio"), &resources);

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[0].is_success());
    assert_eq!(report.outcomes[0].records, 5);
    assert_eq!(
        report.outcomes[1].detail.as_deref(),
        Some("HTTP 503: maintenance")
    );
    assert_eq!(count_lines(&sink.table_path("employees")).unwrap(), 5);
    assert_eq!(token_requests(&rt, &server), 1);
}

#[test]
fn concurrent_callers_share_one_token_request() {
    let rt = Runtime::new().unwrap();
    let server = start_api(&rt);
    let ex = extractor(&server);

    let tokens: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..6).map(|_| s.spawn(|| ex.tokens().get_token())).collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert!(tokens.iter().all(|t| t == "tok-1"));
    assert_eq!(token_requests(&rt, &server), 1);
}

fn sink_name(sink: &JsonLinesSink) -> String {
    use hrline_core::Sink;
    sink.describe()
}
