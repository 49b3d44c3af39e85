use actionhub_config::RuntimeSettings;
use actionhub_connectors::humanitix;
use actionhub_connectors::ReqwestTransport;
use actionhub_core::{ErrorKind, JsonMap};
use actionhub_registry::{
    ActionRegistry, CredentialBag, ExecutionContext, FetchRequest, Transport, TransportError,
    TransportResponse,
};
use async_trait::async_trait;
use httpmock::prelude::*;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers every request with the same response and remembers what was asked.
struct StubTransport {
    response: TransportResponse,
    requests: Mutex<Vec<FetchRequest>>,
    calls: AtomicUsize,
}

impl StubTransport {
    fn new(status: u16, body: JsonValue) -> Arc<Self> {
        Arc::new(Self {
            response: TransportResponse::new(status, body),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> FetchRequest {
        self.requests.lock().unwrap().last().cloned().expect("a request was made")
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        Ok(self.response.clone())
    }
}

fn registry_at(base_url: &str) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    humanitix::register_with_base_url(&mut registry, &RuntimeSettings::default(), base_url)
        .unwrap();
    registry
}

fn registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    humanitix::register(&mut registry, &RuntimeSettings::default()).unwrap();
    registry
}

fn with_key(transport: Arc<dyn Transport>) -> ExecutionContext {
    ExecutionContext::new(transport)
        .with_credentials(CredentialBag::new().with("api_key", "test_api_key_123"))
}

fn inputs(value: JsonValue) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn get_events_lists_from_a_data_wrapper() {
    let stub = StubTransport::new(200, json!({"data": [{"id": "e1"}, {"id": "e2"}]}));
    let envelope = registry()
        .execute_action("get_events", JsonMap::new(), &with_key(stub.clone()))
        .await
        .unwrap();

    assert!(envelope.is_ok(), "{envelope:?}");
    let data = envelope.data().unwrap();
    assert_eq!(data["events"], json!([{"id": "e1"}, {"id": "e2"}]));
    assert_eq!(data["total"], json!(2));
    assert_eq!(data["page"], json!(1));
    assert_eq!(data["pageSize"], json!(100));
    assert_eq!(data["has_more"], json!(false));
    assert_eq!(stub.calls(), 1);

    let request = stub.last_request();
    assert_eq!(request.url, "https://api.humanitix.com/v1/events");
    assert_eq!(request.query_value("page"), Some("1"));
    assert_eq!(request.query_value("pageSize"), Some("100"));
}

#[tokio::test]
async fn get_events_by_id_returns_the_event() {
    let stub = StubTransport::new(200, json!({"id": "e1", "name": "Demo"}));
    let envelope = registry()
        .execute_action(
            "get_events",
            inputs(json!({"event_id": "e1", "since": "2025-01-01"})),
            &with_key(stub.clone()),
        )
        .await
        .unwrap();

    let data = envelope.data().expect("success");
    assert_eq!(data.len(), 1);
    assert_eq!(data["event"], json!({"id": "e1", "name": "Demo"}));

    let request = stub.last_request();
    assert_eq!(request.url, "https://api.humanitix.com/v1/events/e1");
    assert!(request.query_value("since").is_none());
    assert!(request.query_value("page").is_none());
}

#[tokio::test]
async fn get_events_unauthorized_mentions_authentication() {
    let stub = StubTransport::new(
        401,
        json!({"statusCode": 401, "error": "Unauthorized", "message": "Invalid API key"}),
    );
    let envelope = registry()
        .execute_action("get_events", JsonMap::new(), &with_key(stub))
        .await
        .unwrap();

    let failure = envelope.failure_info().expect("failure");
    assert_eq!(failure.kind, ErrorKind::Auth);
    assert_eq!(failure.status_code, Some(401));
    assert!(failure.message.to_lowercase().contains("authentication"));
    assert!(failure.message.contains("Invalid API key"));
}

#[tokio::test]
async fn event_with_a_code_field_is_a_normal_result() {
    let stub = StubTransport::new(200, json!({"id": "e1", "code": "404"}));
    let envelope = registry()
        .execute_action("get_events", inputs(json!({"event_id": "e1"})), &with_key(stub))
        .await
        .unwrap();

    assert!(envelope.is_ok(), "{envelope:?}");
    assert_eq!(envelope.data().unwrap()["event"], json!({"id": "e1", "code": "404"}));
}

#[tokio::test]
async fn unreadable_bodies_are_reported_not_emptied() {
    let cases = [
        (JsonMap::new(), json!("<html>Service Unavailable</html>")),
        (JsonMap::new(), json!({"events": "oops"})),
        (JsonMap::new(), json!({"total": 0})),
        (inputs(json!({"event_id": "e1"})), json!("<html>Bad Gateway</html>")),
        (inputs(json!({"event_id": "e1"})), json!([{"id": "e1"}])),
    ];
    for (inputs, body) in cases {
        let stub = StubTransport::new(200, body.clone());
        let envelope = registry()
            .execute_action("get_events", inputs, &with_key(stub))
            .await
            .unwrap();

        let failure = envelope.failure_info().expect("failure");
        assert_eq!(failure.kind, ErrorKind::Unexpected, "{body}");
        assert!(failure.message.contains("malformed payload"), "{body}");
    }
}

#[tokio::test]
async fn missing_api_key_fails_without_network_calls() {
    let stub = StubTransport::new(200, json!([]));
    let ctx = ExecutionContext::new(stub.clone());
    let envelope = registry()
        .execute_action("get_events", JsonMap::new(), &ctx)
        .await
        .unwrap();

    let failure = envelope.failure_info().expect("failure");
    assert_eq!(failure.kind, ErrorKind::Auth);
    assert!(failure.message.to_lowercase().contains("reconnect"));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn traversal_in_an_identifier_is_rejected_before_fetching() {
    let stub = StubTransport::new(200, json!({}));
    let envelope = registry()
        .execute_action(
            "get_orders",
            inputs(json!({"event_id": "e1", "order_id": "../admin"})),
            &with_key(stub.clone()),
        )
        .await
        .unwrap();
    assert_eq!(envelope.failure_info().unwrap().kind, ErrorKind::Validation);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn get_orders_requires_event_id() {
    let stub = StubTransport::new(200, json!([]));
    let envelope = registry()
        .execute_action("get_orders", JsonMap::new(), &with_key(stub.clone()))
        .await
        .unwrap();
    let failure = envelope.failure_info().unwrap();
    assert_eq!(failure.kind, ErrorKind::Validation);
    assert!(failure.message.contains("event_id"));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn list_walks_pages_until_total_over_http() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(GET)
            .path("/events")
            .query_param("page", "1")
            .query_param("pageSize", "2")
            .header("x-api-key", "test_api_key_123")
            .header("accept", "application/json");
        then.status(200).json_body(json!({
            "events": [{"_id": "evt_001"}, {"_id": "evt_002"}],
            "total": 3
        }));
    });
    let second = server.mock(|when, then| {
        when.method(GET).path("/events").query_param("page", "2");
        then.status(200).json_body(json!({"events": [{"_id": "evt_003"}], "total": 3}));
    });

    let registry = registry_at(&server.base_url());
    let ctx = with_key(Arc::new(ReqwestTransport::from_settings(&RuntimeSettings::default())));
    let envelope = registry
        .execute_action("get_events", inputs(json!({"page_size": 2})), &ctx)
        .await
        .unwrap();

    first.assert();
    second.assert();
    let data = envelope.data().expect("success");
    assert_eq!(data["events"].as_array().unwrap().len(), 3);
    assert_eq!(data["total"], json!(3));
    assert_eq!(data["has_more"], json!(false));
    assert_eq!(data["next_page"], JsonValue::Null);
}

#[tokio::test]
async fn explicit_page_fetches_only_that_page() {
    let server = MockServer::start();
    let page = server.mock(|when, then| {
        when.method(GET)
            .path("/events")
            .query_param("page", "2")
            .query_param("pageSize", "10");
        let events: Vec<JsonValue> = (0..10).map(|i| json!({"_id": i})).collect();
        then.status(200).json_body(json!({"events": events, "total": 50}));
    });

    let registry = registry_at(&server.base_url());
    let ctx = with_key(Arc::new(ReqwestTransport::from_settings(&RuntimeSettings::default())));
    let envelope = registry
        .execute_action("get_events", inputs(json!({"page": 2, "page_size": 10})), &ctx)
        .await
        .unwrap();

    page.assert_hits(1);
    let data = envelope.data().expect("success");
    assert_eq!(data["page"], json!(2));
    assert_eq!(data["pageSize"], json!(10));
    assert_eq!(data["total"], json!(50));
    assert_eq!(data["has_more"], json!(true));
    assert_eq!(data["next_page"], json!(3));
}

#[tokio::test]
async fn max_results_caps_the_listing() {
    let server = MockServer::start();
    let pages = server.mock(|when, then| {
        when.method(GET).path("/tags");
        then.status(200).json_body(json!({"tags": [{"_id": "a"}, {"_id": "b"}]}));
    });

    let registry = registry_at(&server.base_url());
    let ctx = with_key(Arc::new(ReqwestTransport::from_settings(&RuntimeSettings::default())));
    let envelope = registry
        .execute_action("get_tags", inputs(json!({"page_size": 2, "max_results": 3})), &ctx)
        .await
        .unwrap();

    pages.assert_hits(2);
    assert_eq!(envelope.data().unwrap()["tags"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn embedded_not_found_body_becomes_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/events/evt_404");
        then.status(200).json_body(json!({
            "statusCode": 404,
            "error": "Not Found",
            "message": "Event not found"
        }));
    });

    let registry = registry_at(&server.base_url());
    let ctx = with_key(Arc::new(ReqwestTransport::from_settings(&RuntimeSettings::default())));
    let envelope = registry
        .execute_action("get_events", inputs(json!({"event_id": "evt_404"})), &ctx)
        .await
        .unwrap();

    let failure = envelope.failure_info().expect("failure");
    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert_eq!(failure.status_code, Some(404));
    assert!(failure.message.contains("Event not found"));
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/tags");
        then.status(429)
            .header("Retry-After", "30")
            .json_body(json!({"message": "Too many requests"}));
    });

    let registry = registry_at(&server.base_url());
    let ctx = with_key(Arc::new(ReqwestTransport::from_settings(&RuntimeSettings::default())));
    let envelope = registry
        .execute_action("get_tags", JsonMap::new(), &ctx)
        .await
        .unwrap();

    let failure = envelope.failure_info().expect("failure");
    assert_eq!(failure.kind, ErrorKind::RateLimited);
    assert_eq!(failure.retry_after_secs, Some(30));
}

#[tokio::test]
async fn check_in_posts_and_returns_scanning_messages() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/events/evt_001/tickets/tkt_001/check-in")
            .query_param("overrideLocation", "AU")
            .header("x-api-key", "test_api_key_123");
        then.status(200).json_body(json!({
            "scanningMessages": [{"header": "VIP", "message": "Front row"}]
        }));
    });

    let registry = registry_at(&server.base_url());
    let ctx = with_key(Arc::new(ReqwestTransport::from_settings(&RuntimeSettings::default())));
    let envelope = registry
        .execute_action(
            "check_in",
            inputs(json!({
                "event_id": "evt_001",
                "ticket_id": "tkt_001",
                "override_location": "AU"
            })),
            &ctx,
        )
        .await
        .unwrap();

    mock.assert();
    assert_eq!(
        envelope.data().unwrap()["scanning_messages"],
        json!([{"header": "VIP", "message": "Front row"}])
    );
}

#[tokio::test]
async fn check_out_without_messages_reports_an_empty_list() {
    let stub = StubTransport::new(200, json!({}));
    let envelope = registry()
        .execute_action(
            "check_out",
            inputs(json!({"event_id": "e1", "ticket_id": "t 1"})),
            &with_key(stub.clone()),
        )
        .await
        .unwrap();
    assert_eq!(envelope.data().unwrap()["scanning_messages"], json!([]));
    let request = stub.last_request();
    assert_eq!(request.method, actionhub_registry::Method::POST);
    assert_eq!(
        request.url,
        "https://api.humanitix.com/v1/events/e1/tickets/t%201/check-out"
    );
}

#[test]
fn register_all_installs_the_shipped_integrations() {
    let registry = actionhub_connectors::register_all(&RuntimeSettings::default()).unwrap();
    assert_eq!(registry.len(), 6);
    assert!(registry.contains("check_in"));
}
