mod common;

// std
use std::collections::BTreeMap;
// crates.io
use httpmock::prelude::*;
use time::Duration;
// self
use common::*;
use github_app_broker::{
	auth::RepositorySelection,
	error::{Error, Operation},
	exchange::TokenExchange,
	platform::InstallationTokenRequest,
};

#[tokio::test]
async fn installation_token_posts_a_signed_assertion_and_maps_the_response() {
	let server = MockServer::start_async().await;
	let body = token_body("ghs_exchange", Duration::hours(1));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("accept", "application/vnd.github.v3+json")
				.header_exists("authorization");
			then.status(201).header("content-type", "application/json").body(body);
		})
		.await;
	let client = build_test_client(&server.base_url());
	let token = client.installation_token().await.expect("Exchange should succeed.");

	mock.assert_calls_async(1).await;

	assert_eq!(token.token.expose(), "ghs_exchange");
	assert_eq!(token.permissions.get("contents").map(String::as_str), Some("read"));
	assert_eq!(token.repository_selection, RepositorySelection::Selected);
	assert!(!token.is_expired_within(Duration::minutes(5), time::OffsetDateTime::now_utc()));
	assert_eq!(client.installation_id().as_ref(), TEST_INSTALLATION_ID);
}

#[tokio::test]
async fn narrowed_token_requests_send_a_json_body() {
	let server = MockServer::start_async().await;
	let body = token_body("ghs_narrowed", Duration::hours(1));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).json_body(serde_json::json!({
				"repository_ids": [42],
				"permissions": {"issues": "write"}
			}));
			then.status(201).header("content-type", "application/json").body(body);
		})
		.await;
	let client = build_test_client(&server.base_url());
	let request = InstallationTokenRequest {
		repository_ids: vec![42],
		permissions: BTreeMap::from([("issues".to_owned(), "write".to_owned())]),
		..Default::default()
	};
	let token = client
		.installation_token_with(&request)
		.await
		.expect("Narrowed exchange should succeed.");

	mock.assert_calls_async(1).await;

	assert_eq!(token.token.expose(), "ghs_narrowed");
}

#[tokio::test]
async fn exchange_failures_are_wrapped_with_the_operation() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"message\":\"A JSON web token could not be decoded\"}");
		})
		.await;
	let client = build_test_client(&server.base_url());
	let err = client.exchange().await.expect_err("A 401 should fail the exchange.");

	mock.assert_calls_async(1).await;

	assert!(matches!(err, Error::Operation { operation: Operation::InstallationToken, .. }));
	assert_eq!(err.to_string(), "Failed to get installation token.");
	assert_eq!(err.status(), Some(401));
	assert_eq!(
		err.root().to_string(),
		"GitHub API error: A JSON web token could not be decoded (status: 401)"
	);
}

#[tokio::test]
async fn app_and_installation_metadata_are_fetched() {
	let server = MockServer::start_async().await;
	let app = server
		.mock_async(|when, then| {
			when.method(GET).path("/app").header_exists("authorization");
			then.status(200).header("content-type", "application/json").body(
				r#"{"id":12345,"slug":"broker-app","node_id":"A_1","owner":{"login":"octo-org","id":1,"type":"Organization"},"name":"Broker App","description":null,"external_url":"https://example.com","html_url":"https://github.com/apps/broker-app","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-06-01T00:00:00Z","permissions":{"contents":"read"},"events":["push"]}"#,
			);
		})
		.await;
	let installation = server
		.mock_async(|when, then| {
			when.method(GET).path("/app/installations/67890");
			then.status(200).header("content-type", "application/json").body(
				r#"{"id":67890,"account":{"login":"octo-org","id":1,"type":"Organization"},"repository_selection":"all","permissions":{"contents":"read"},"events":[],"created_at":"2024-01-01T00:00:00Z","updated_at":"2024-06-01T00:00:00Z","suspended_at":"2024-07-01T00:00:00Z","app_id":12345,"target_id":1,"target_type":"Organization"}"#,
			);
		})
		.await;
	let client = build_test_client(&server.base_url());
	let fetched_app = client.app().await.expect("App metadata should decode.");
	let fetched_installation =
		client.installation().await.expect("Installation metadata should decode.");

	app.assert_calls_async(1).await;
	installation.assert_calls_async(1).await;

	assert_eq!(fetched_app.id, 12345);
	assert_eq!(fetched_app.slug.as_deref(), Some("broker-app"));
	assert_eq!(fetched_installation.app_id, 12345);
	assert!(fetched_installation.is_suspended());
}

#[tokio::test]
async fn metadata_failures_name_their_operation() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/app/installations/67890");
			then.status(404)
				.header("content-type", "application/json")
				.body("{\"message\":\"Not Found\"}");
		})
		.await;
	let err = build_test_client(&server.base_url())
		.installation()
		.await
		.expect_err("A 404 should fail the lookup.");

	assert!(matches!(err, Error::Operation { operation: Operation::Installation, .. }));
	assert_eq!(err.to_string(), "Failed to get installation.");
}

#[tokio::test]
async fn enterprise_base_paths_are_preserved() {
	let server = MockServer::start_async().await;
	let body = token_body("ghs_enterprise", Duration::hours(1));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(format!("/api/v3{TOKEN_PATH}"));
			then.status(201).header("content-type", "application/json").body(body);
		})
		.await;
	let client = build_test_client(&server.url("/api/v3"));

	client.installation_token().await.expect("Exchange under /api/v3 should succeed.");
	mock.assert_calls_async(1).await;
}
