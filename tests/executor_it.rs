mod common;

// crates.io
use httpmock::prelude::*;
use reqwest::StatusCode;
use time::Duration;
// self
use common::*;
use github_app_broker::{
	error::{Error, TransientError},
	http::{
		DEFAULT_ACCEPT, DEFAULT_USER_AGENT, ExecutorConfig, ExponentialBackoff, RequestExecutor,
		RequestSpec,
	},
	url::Url,
};

fn url(value: &str) -> Url {
	Url::parse(value).expect("Failed to parse mock server URL.")
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
	let server = ScriptedServer::start(vec![(500, "{}"), (500, "{}"), (200, r#"{"ok":true}"#)]).await;
	let body = test_executor()
		.execute::<serde_json::Value>(&RequestSpec::get(url(&server.url("/app"))))
		.await
		.expect("Third attempt should succeed.");

	assert_eq!(body["ok"], true);
	assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn rate_limited_and_timed_out_responses_are_retried() {
	let server = ScriptedServer::start(vec![(429, "{}"), (408, "{}"), (200, "{}")]).await;

	test_executor()
		.execute::<serde_json::Value>(&RequestSpec::get(url(&server.url("/app"))))
		.await
		.expect("Attempt after 429 and 408 should succeed.");

	assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn client_errors_surface_after_one_attempt() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/app");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"message\":\"Problems parsing JSON\"}");
		})
		.await;
	let err = test_executor()
		.execute::<serde_json::Value>(&RequestSpec::get(url(&server.url("/app"))))
		.await
		.expect_err("A 400 response should not be retried.");

	mock.assert_calls_async(1).await;

	assert!(matches!(&err, Error::Api(api) if api.status == 400));
	assert_eq!(err.to_string(), "GitHub API error: Problems parsing JSON (status: 400)");
}

#[tokio::test]
async fn exhausted_retries_report_attempts_status_and_hint() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/app");
			then.status(503).header("retry-after", "7").body("{}");
		})
		.await;
	let err = test_executor()
		.execute::<serde_json::Value>(&RequestSpec::get(url(&server.url("/app"))))
		.await
		.expect_err("Persistent 503 responses should exhaust the retry budget.");

	mock.assert_calls_async(3).await;

	match err {
		Error::Transient(TransientError::RetriesExhausted {
			attempts,
			status,
			retry_after,
			..
		}) => {
			assert_eq!(attempts, 3);
			assert_eq!(status, Some(503));
			assert_eq!(retry_after, Some(Duration::seconds(7)));
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn requests_carry_accept_user_agent_and_bearer_headers() {
	let server = MockServer::start_async().await;
	let default_accept = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/app")
				.header("accept", DEFAULT_ACCEPT)
				.header("user-agent", DEFAULT_USER_AGENT)
				.header("authorization", "Bearer header-token");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let spec = RequestSpec::get(url(&server.url("/app"))).bearer("header-token");

	test_executor()
		.execute::<serde_json::Value>(&spec)
		.await
		.expect("Request with default headers should match the mock.");
	default_accept.assert_calls_async(1).await;

	let custom = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/installation")
				.header("accept", "application/vnd.github+json")
				.header("user-agent", "custom-agent/2.0");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let executor = RequestExecutor::new(
		ExecutorConfig::default().with_retry(fast_retry()).with_user_agent("custom-agent/2.0"),
	)
	.expect("Executor with a custom user agent should build.");
	let spec =
		RequestSpec::get(url(&server.url("/installation"))).accept("application/vnd.github+json");

	executor
		.execute::<serde_json::Value>(&spec)
		.await
		.expect("Request with overridden headers should match the mock.");
	custom.assert_calls_async(1).await;
}

#[tokio::test]
async fn unexpected_status_is_decoded_as_api_error() {
	let server = MockServer::start_async().await;
	let _not_found = server
		.mock_async(|when, then| {
			when.method(POST).path("/missing");
			then.status(404).header("content-type", "application/json").body(
				"{\"message\":\"Not Found\",\"documentation_url\":\"https://docs.github.com/rest\"}",
			);
		})
		.await;
	let _ok = server
		.mock_async(|when, then| {
			when.method(POST).path("/ok");
			then.status(200).header("content-type", "application/json").body("{}");
		})
		.await;
	let executor = test_executor();
	let err = executor
		.execute::<serde_json::Value>(
			&RequestSpec::post(url(&server.url("/missing"))).expect_status(StatusCode::CREATED),
		)
		.await
		.expect_err("A 404 should not satisfy an expected 201.");

	assert_eq!(err.to_string(), "GitHub API error: Not Found (status: 404)");
	assert!(matches!(
		&err,
		Error::Api(api) if api.documentation_url.as_deref() == Some("https://docs.github.com/rest")
	));

	let err = executor
		.execute::<serde_json::Value>(
			&RequestSpec::post(url(&server.url("/ok"))).expect_status(StatusCode::CREATED),
		)
		.await
		.expect_err("A 200 should not satisfy an expected 201.");

	assert_eq!(err.status(), Some(200));
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/app");
			then.status(200).header("content-type", "application/json").body("not-json");
		})
		.await;
	let err = test_executor()
		.execute::<serde_json::Value>(&RequestSpec::get(url(&server.url("/app"))))
		.await
		.expect_err("Invalid JSON should fail decoding.");

	assert!(matches!(err, Error::Decode { status: 200, .. }));
}

#[tokio::test]
async fn cancellation_abandons_slow_requests() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/slow");
			then.status(200).delay(std::time::Duration::from_secs(5)).body("{}");
		})
		.await;
	let err = test_executor()
		.execute_with_cancel::<serde_json::Value, _>(
			&RequestSpec::get(url(&server.url("/slow"))),
			tokio::time::sleep(std::time::Duration::from_millis(50)),
		)
		.await
		.expect_err("Cancellation should win over the delayed response.");

	assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn cancellation_interrupts_the_backoff_sleep() {
	let server = ScriptedServer::start(vec![(503, "{}")]).await;
	let executor = RequestExecutor::new(
		ExecutorConfig::default()
			.with_retry(ExponentialBackoff::default().with_base_delay(Duration::seconds(2))),
	)
	.expect("Executor with a slow backoff should build.");
	let err = executor
		.execute_with_cancel::<serde_json::Value, _>(
			&RequestSpec::get(url(&server.url("/app"))),
			tokio::time::sleep(std::time::Duration::from_millis(200)),
		)
		.await
		.expect_err("Cancellation should land while the executor waits to retry.");

	assert!(matches!(err, Error::Cancelled));
	assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn connection_failures_retry_only_when_enabled() {
	let target = format!("{}/app", closed_port_url().await);
	let err = test_executor()
		.execute::<serde_json::Value>(&RequestSpec::get(url(&target)))
		.await
		.expect_err("Nothing listens on the probe port.");

	assert!(matches!(err, Error::Transport(_)));

	let executor = RequestExecutor::new(
		ExecutorConfig::default().with_retry(fast_retry().with_transport_retries(true)),
	)
	.expect("Executor with transport retries should build.");
	let err = executor
		.execute::<serde_json::Value>(&RequestSpec::get(url(&target)))
		.await
		.expect_err("Nothing listens on the probe port.");

	assert!(matches!(
		err,
		Error::Transient(TransientError::RetriesExhausted {
			attempts: 3,
			status: None,
			source: Some(_),
			..
		})
	));
}
