//! Token exchange against the platform: app assertion in, installation access token out.
//!
//! [`TokenExchange`] is the seam the token cache depends on. [`InstallationClient`] is the real
//! implementation; it signs a fresh assertion for every call and runs the request through the
//! shared [`RequestExecutor`].

// crates.io
use reqwest::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AssertionIssuer, CredentialIdentity, InstallationId},
	error::{ConfigError, Operation},
	http::{ExecutorConfig, RequestExecutor, RequestSpec},
	obs::{self, OpOutcome, OpSpan},
	platform::{App, Installation, InstallationTokenRequest, InstallationTokenResponse},
};

/// Boxed future returned by [`TokenExchange`] implementations.
pub type ExchangeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Source of fresh access tokens for one installation identity.
pub trait TokenExchange
where
	Self: Send + Sync,
{
	/// Identity whose tokens this exchange produces; used as the cache key.
	fn installation_id(&self) -> &InstallationId;

	/// Performs one exchange and returns a newly minted token.
	fn exchange(&self) -> ExchangeFuture<'_, AccessToken>;
}

/// Platform client authenticated as a GitHub App installation.
#[derive(Clone, Debug)]
pub struct InstallationClient {
	identity: CredentialIdentity,
	issuer: AssertionIssuer,
	executor: RequestExecutor,
}
impl InstallationClient {
	/// Creates a client with the default executor configuration.
	pub fn new(identity: CredentialIdentity) -> Result<Self> {
		let executor = RequestExecutor::new(ExecutorConfig::default())?;

		Self::with_executor(identity, executor)
	}

	/// Creates a client that shares an existing executor.
	pub fn with_executor(identity: CredentialIdentity, executor: RequestExecutor) -> Result<Self> {
		let issuer = AssertionIssuer::new(&identity)?;

		Ok(Self { identity, issuer, executor })
	}

	/// Validated identity backing this client.
	pub fn identity(&self) -> &CredentialIdentity {
		&self.identity
	}

	/// Executor used for platform calls.
	pub fn executor(&self) -> &RequestExecutor {
		&self.executor
	}

	/// Exchanges a fresh assertion for an installation access token.
	pub async fn installation_token(&self) -> Result<AccessToken> {
		self.installation_token_with(&InstallationTokenRequest::default()).await
	}

	/// Like [`Self::installation_token`], narrowing the token to `request`'s repositories and
	/// permissions.
	pub async fn installation_token_with(
		&self,
		request: &InstallationTokenRequest,
	) -> Result<AccessToken> {
		const OP: Operation = Operation::InstallationToken;

		let span = OpSpan::new(OP, "installation_token");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = self.identity.endpoint([
					"app",
					"installations",
					self.identity.installation_id().as_ref(),
					"access_tokens",
				]);
				let mut spec = self
					.authorized(RequestSpec::post(url))?
					.expect_status(StatusCode::CREATED);

				if !request.is_empty() {
					let body = serde_json::to_value(request).map_err(ConfigError::RequestBody)?;

					spec = spec.json_body(body);
				}

				let response = self.executor.execute::<InstallationTokenResponse>(&spec).await?;

				Ok::<_, Error>(AccessToken::from(response))
			})
			.await
			.map_err(|e| e.during(OP));

		match &result {
			Ok(_) => obs::record_op_outcome(OP, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(OP, OpOutcome::Failure),
		}

		result
	}

	/// Fetches the app's own metadata.
	pub async fn app(&self) -> Result<App> {
		self.get(Operation::AppInfo, "app", self.identity.endpoint(["app"])).await
	}

	/// Fetches the installation's metadata.
	pub async fn installation(&self) -> Result<Installation> {
		let url = self.identity.endpoint([
			"app",
			"installations",
			self.identity.installation_id().as_ref(),
		]);

		self.get(Operation::Installation, "installation", url).await
	}

	async fn get<T>(&self, operation: Operation, stage: &'static str, url: Url) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		let span = OpSpan::new(operation, stage);

		obs::record_op_outcome(operation, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				let spec = self.authorized(RequestSpec::get(url))?.expect_status(StatusCode::OK);

				self.executor.execute::<T>(&spec).await
			})
			.await
			.map_err(|e| e.during(operation));

		match &result {
			Ok(_) => obs::record_op_outcome(operation, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(operation, OpOutcome::Failure),
		}

		result
	}

	fn authorized(&self, spec: RequestSpec) -> Result<RequestSpec> {
		let assertion = self.issuer.sign()?;

		Ok(spec.bearer(assertion.expose()))
	}
}
impl TokenExchange for InstallationClient {
	fn installation_id(&self) -> &InstallationId {
		self.identity.installation_id()
	}

	fn exchange(&self) -> ExchangeFuture<'_, AccessToken> {
		Box::pin(self.installation_token())
	}
}
