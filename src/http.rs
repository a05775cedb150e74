//! Resilient request execution against the platform's REST API.
//!
//! [`RequestExecutor`] sends a [`RequestSpec`] and retries transient failures according to a
//! [`RetryStrategy`]. Discarded bodies are drained so connections return to the pool; the final
//! response decodes into either the expected JSON payload or the platform's error envelope.

pub mod retry;

pub use retry::*;

// std
use std::ops::Deref;
// crates.io
use reqwest::{
	Method, Response, StatusCode,
	header::{ACCEPT, HeaderMap, RETRY_AFTER, USER_AGENT},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ApiError, ConfigError, TransientError, TransportError},
	obs,
	platform::ApiErrorEnvelope,
};

/// Media type requested when a [`RequestSpec`] does not override `Accept`.
pub const DEFAULT_ACCEPT: &str = "application/vnd.github.v3+json";
/// `User-Agent` sent when [`ExecutorConfig::user_agent`] is left at its default.
pub const DEFAULT_USER_AGENT: &str =
	concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Executor configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutorConfig {
	/// Per-attempt timeout applied by the HTTP client.
	pub timeout: Duration,
	/// `User-Agent` header value.
	pub user_agent: String,
	/// Retry policy.
	pub retry: ExponentialBackoff,
}
impl ExecutorConfig {
	const DEFAULT_TIMEOUT: Duration = Duration::seconds(30);

	/// Overrides the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the `User-Agent` header.
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Overrides the retry policy.
	pub fn with_retry(mut self, retry: ExponentialBackoff) -> Self {
		self.retry = retry;

		self
	}
}
impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			timeout: Self::DEFAULT_TIMEOUT,
			user_agent: DEFAULT_USER_AGENT.into(),
			retry: ExponentialBackoff::default(),
		}
	}
}

/// Captures metadata from the most recent HTTP response for error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	fn from_response(response: &Response) -> Self {
		Self {
			status: Some(response.status().as_u16()),
			retry_after: parse_retry_after(response.headers()),
		}
	}
}

/// One logical platform call, replayed verbatim on every attempt.
#[derive(Clone, Debug)]
pub struct RequestSpec {
	method: Method,
	url: Url,
	bearer: Option<String>,
	accept: Option<String>,
	body: Option<serde_json::Value>,
	expected_status: Option<StatusCode>,
}
impl RequestSpec {
	/// Starts a request with an arbitrary method.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, bearer: None, accept: None, body: None, expected_status: None }
	}

	/// Starts a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Starts a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Sends `Authorization: Bearer <token>`.
	pub fn bearer(mut self, token: impl Into<String>) -> Self {
		self.bearer = Some(token.into());

		self
	}

	/// Overrides the `Accept` header.
	pub fn accept(mut self, media_type: impl Into<String>) -> Self {
		self.accept = Some(media_type.into());

		self
	}

	/// Attaches a JSON body.
	pub fn json_body(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Declares the only status treated as success.
	pub fn expect_status(mut self, status: StatusCode) -> Self {
		self.expected_status = Some(status);

		self
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Target URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Declared success status, if any.
	pub fn expected_status(&self) -> Option<StatusCode> {
		self.expected_status
	}

	fn is_expected(&self, status: StatusCode) -> bool {
		match self.expected_status {
			Some(expected) => status == expected,
			None => status.is_success(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with the configured timeout and `User-Agent`.
	pub fn from_config(config: &ExecutorConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(config.timeout.unsigned_abs())
			.user_agent(config.user_agent.as_str())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

/// Sends [`RequestSpec`]s with bounded retries.
///
/// The executor holds no per-request state; clones share the connection pool and can be
/// used from any number of tasks.
#[derive(Clone)]
pub struct RequestExecutor {
	client: ReqwestHttpClient,
	user_agent: String,
	strategy: Arc<dyn RetryStrategy>,
}
impl RequestExecutor {
	/// Builds an executor and its HTTP client from `config`.
	pub fn new(config: ExecutorConfig) -> Result<Self> {
		let client = ReqwestHttpClient::from_config(&config)?;

		Ok(Self::with_client(client, config))
	}

	/// Reuses an existing client; its own timeout settings are left untouched.
	pub fn with_client(client: ReqwestHttpClient, config: ExecutorConfig) -> Self {
		Self { client, user_agent: config.user_agent, strategy: Arc::new(config.retry) }
	}

	/// Replaces the retry policy with a custom strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Active retry policy.
	pub fn strategy(&self) -> &dyn RetryStrategy {
		self.strategy.as_ref()
	}

	/// Executes `spec` and decodes the success body as `T`.
	pub async fn execute<T>(&self, spec: &RequestSpec) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.send(spec).await?;
		let status = response.status();
		let body = response.bytes().await.map_err(TransportError::from)?;

		if !spec.is_expected(status) {
			return Err(decode_api_error(status, &body));
		}

		decode_json(status.as_u16(), &body)
	}

	/// Like [`Self::execute`], but resolves to [`Error::Cancelled`] as soon as `cancel`
	/// completes. The in-flight attempt is dropped.
	pub async fn execute_with_cancel<T, C>(&self, spec: &RequestSpec, cancel: C) -> Result<T>
	where
		T: DeserializeOwned,
		C: Future<Output = ()>,
	{
		tokio::select! {
			biased;
			_ = cancel => Err(Error::Cancelled),
			result = self.execute(spec) => result,
		}
	}

	/// Runs the retry loop and returns the first non-retryable response.
	pub async fn send(&self, spec: &RequestSpec) -> Result<Response> {
		let strategy = self.strategy.as_ref();
		let mut state = BackoffState::new(strategy);

		loop {
			let attempt = state.begin_attempt();
			let (meta, transport) = match self.build(spec).send().await {
				Ok(response) => {
					let status = response.status().as_u16();

					if !strategy.should_retry(RetryInput::Status(status)) {
						return Ok(response);
					}

					let meta = ResponseMetadata::from_response(&response);

					// Drain so the connection can be reused by the next attempt.
					let _ = response.bytes().await;

					(meta, None)
				},
				Err(e) => {
					if e.is_builder() || !strategy.should_retry(RetryInput::Transport) {
						return Err(TransportError::from(e).into());
					}

					(ResponseMetadata::default(), Some(TransportError::from(e)))
				},
			};
			let Some(delay) = state.next_delay() else {
				return Err(TransientError::RetriesExhausted {
					attempts: attempt,
					status: meta.status,
					retry_after: meta.retry_after,
					source: transport,
				}
				.into());
			};

			obs::record_retry(spec.method.as_str(), attempt, meta.status, delay);
			tokio::time::sleep(delay.unsigned_abs()).await;
		}
	}

	fn build(&self, spec: &RequestSpec) -> reqwest::RequestBuilder {
		let mut request = self
			.client
			.request(spec.method.clone(), spec.url.clone())
			.header(ACCEPT, spec.accept.as_deref().unwrap_or(DEFAULT_ACCEPT))
			.header(USER_AGENT, self.user_agent.as_str());

		if let Some(token) = &spec.bearer {
			request = request.bearer_auth(token);
		}
		if let Some(body) = &spec.body {
			request = request.json(body);
		}

		request
	}
}
impl Debug for RequestExecutor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestExecutor")
			.field("user_agent", &self.user_agent)
			.field("max_attempts", &self.strategy.max_attempts())
			.finish_non_exhaustive()
	}
}

fn decode_json<T>(status: u16, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { status, source })
}

fn decode_api_error(status: StatusCode, body: &[u8]) -> Error {
	let code = status.as_u16();

	if body.iter().all(u8::is_ascii_whitespace) {
		let envelope = ApiErrorEnvelope {
			message: status.canonical_reason().unwrap_or("Unexpected status").into(),
			..Default::default()
		};

		return ApiError::from_envelope(code, envelope).into();
	}

	match decode_json::<ApiErrorEnvelope>(code, body) {
		Ok(envelope) => ApiError::from_envelope(code, envelope).into(),
		Err(e) => e,
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
