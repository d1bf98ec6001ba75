//! Integration tests for BatchClient over HTTP.
//!
//! Uses wiremock for the scoring endpoint. Covers the wire contract, retry on
//! non-200 statuses, retry exhaustion, transport failures, lifecycle misuse,
//! cancellation and rate enforcement.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lmunit_client::{BatchClient, ClientConfig, LmunitError, Sleeper, Transport, UnitTestRequest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn test_config(mock_server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_url(format!("{}/v1/lmunit", mock_server.uri()))
        .with_api_key("test-token")
        .with_rate_limit(100)
        .with_max_retries(3)
        .with_base_delay(Duration::from_millis(50))
}

fn create_test_client(
    config: ClientConfig,
) -> (BatchClient, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let client = BatchClient::new(config)
        .expect("failed to create client")
        .with_sleeper(sleeper.clone());
    (client, sleeper)
}

fn body_of(req: &UnitTestRequest) -> serde_json::Value {
    json!({"query": req.query, "response": req.response, "unit_test": req.unit_test})
}

#[tokio::test]
async fn test_wire_contract() {
    let mock_server = MockServer::start().await;
    let request = UnitTestRequest::new("Q1", "R1", "Is it helpful?");

    Mock::given(method("POST"))
        .and(path("/v1/lmunit"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/json"))
        .and(header("user-agent", lmunit_client::USER_AGENT))
        .and(body_json(body_of(&request)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 4})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (mut client, _) = create_test_client(test_config(&mock_server));
    let outcomes = client.run_batch(&[request]).await.expect("batch failed");

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].to_record(), json!({"score": 4}));
    assert_eq!(outcomes[0].attempts, 1);
}

#[tokio::test]
async fn test_example_scenario_retry_after_503() {
    let mock_server = MockServer::start().await;
    let first = UnitTestRequest::new("Q1", "R1", "Is it helpful?");
    let second = UnitTestRequest::new("Q2", "R2", "Is it safe?");

    Mock::given(method("POST"))
        .and(body_json(body_of(&first)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 4})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(body_json(body_of(&second)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(body_json(body_of(&second)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 2})))
        .mount(&mock_server)
        .await;

    let (mut client, sleeper) = create_test_client(test_config(&mock_server));
    let outcomes = client
        .run_batch(&[first, second])
        .await
        .expect("batch failed");

    assert_eq!(outcomes[0].to_record(), json!({"score": 4}));
    assert_eq!(outcomes[1].to_record(), json!({"score": 2}));
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(outcomes[1].attempts, 2);
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_millis(50)]
    );

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let (mut client, sleeper) = create_test_client(test_config(&mock_server));
    let outcomes = client
        .run_batch(&[UnitTestRequest::new("q", "r", "t")])
        .await
        .expect("batch failed");

    match outcomes[0].error() {
        Some(LmunitError::RetriesExhausted {
            attempts,
            last_status,
            last_error,
        }) => {
            assert_eq!(*attempts, 3);
            assert_eq!(*last_status, Some(500));
            assert!(last_error.contains("internal"));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }

    let record = outcomes[0].to_record();
    assert_eq!(record["status"], json!(500));
    assert_eq!(
        *sleeper.delays.lock().unwrap(),
        vec![Duration::from_millis(50), Duration::from_millis(100)]
    );
}

#[tokio::test]
async fn test_failure_does_not_abort_batch() {
    let mock_server = MockServer::start().await;
    let bad = UnitTestRequest::new("bad", "r", "t");

    Mock::given(method("POST"))
        .and(body_json(body_of(&bad)))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 5})))
        .mount(&mock_server)
        .await;

    let requests = vec![
        UnitTestRequest::new("a", "r", "t"),
        bad,
        UnitTestRequest::new("c", "r", "t"),
    ];
    let (mut client, _) = create_test_client(test_config(&mock_server));
    let outcomes = client.run_batch(&requests).await.expect("batch failed");

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].score(), Some(5.0));
    assert_eq!(outcomes[1].error().and_then(LmunitError::last_status), Some(401));
    assert_eq!(outcomes[2].score(), Some(5.0));
}

#[tokio::test]
async fn test_undecodable_success_body_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 1.5})))
        .mount(&mock_server)
        .await;

    let (mut client, _) = create_test_client(test_config(&mock_server));
    let outcomes = client
        .run_batch(&[UnitTestRequest::new("q", "r", "t")])
        .await
        .expect("batch failed");

    assert_eq!(outcomes[0].score(), Some(1.5));
    assert_eq!(outcomes[0].attempts, 2);
}

#[tokio::test]
async fn test_connection_refused_is_fatal_on_last_attempt() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ClientConfig::default()
        .with_url(format!("http://127.0.0.1:{}/v1/lmunit", port))
        .with_api_key("test-token")
        .with_rate_limit(100)
        .with_max_retries(2)
        .with_base_delay(Duration::from_millis(10));
    let (mut client, sleeper) = create_test_client(config);

    let outcomes = client
        .run_batch(&[UnitTestRequest::new("q", "r", "t")])
        .await
        .expect("batch failed");

    assert!(matches!(
        outcomes[0].error(),
        Some(LmunitError::Transport { .. })
    ));
    assert_eq!(outcomes[0].attempts, 2);
    assert_eq!(sleeper.delays.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_submit_before_start_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 1})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _) = create_test_client(test_config(&mock_server));
    let outcome = client.submit(&UnitTestRequest::new("q", "r", "t")).await;

    assert_eq!(outcome.error(), Some(&LmunitError::NotStarted));
    assert_eq!(outcome.attempts, 0);
}

#[tokio::test]
async fn test_cancelled_batch_releases_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"score": 1}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let (mut client, _) = create_test_client(test_config(&mock_server));
    let requests = vec![UnitTestRequest::new("q", "r", "t")];

    let result =
        tokio::time::timeout(Duration::from_millis(200), client.run_batch(&requests)).await;
    assert!(result.is_err(), "batch should still be waiting on the server");
    assert!(!client.session().is_started());

    let outcome = client.submit(&requests[0]).await;
    assert_eq!(outcome.error(), Some(&LmunitError::NotStarted));
}

#[tokio::test]
async fn test_rate_limit_enforced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": 1})))
        .mount(&mock_server)
        .await;

    // M = 15 at R = 10/s takes at least (M - R) / R = 0.5s.
    let config = test_config(&mock_server).with_rate_limit(10);
    let (mut client, _) = create_test_client(config);
    let requests: Vec<_> = (0..15)
        .map(|i| UnitTestRequest::new(format!("q{}", i), "r", "t"))
        .collect();

    let start = Instant::now();
    let outcomes = client.run_batch(&requests).await.expect("batch failed");
    let elapsed = start.elapsed();

    assert!(outcomes.iter().all(|o| o.is_success()));
    assert!(
        elapsed >= Duration::from_millis(480),
        "batch finished too fast: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_client_rejects_missing_api_key() {
    let result = BatchClient::new(ClientConfig::default().with_url("http://localhost/v1/lmunit"));
    assert!(matches!(result, Err(LmunitError::Config { .. })));
}
