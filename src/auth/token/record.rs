//! Immutable installation access token values with expiry helpers.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret, platform::Repository};

/// Which repositories an installation token can reach.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositorySelection {
	/// Every repository the installation can access.
	#[default]
	All,
	/// Only the repositories chosen for the installation.
	Selected,
}
impl RepositorySelection {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::All => "all",
			Self::Selected => "selected",
		}
	}
}
impl Display for RepositorySelection {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no token value was provided.
	#[error("Token value is required.")]
	MissingToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Scoped, time-limited installation access token.
///
/// Tokens are values: renewal replaces the cached token instead of mutating it.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccessToken {
	/// Token secret; callers must avoid logging it.
	pub token: TokenSecret,
	/// Absolute expiry instant reported by the platform.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Capability name to access level (`contents` → `read`).
	#[serde(default)]
	pub permissions: BTreeMap<String, String>,
	/// Repository reach of the token.
	#[serde(default)]
	pub repository_selection: RepositorySelection,
	/// Repositories the token can access, when the platform lists them.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repositories: Option<Vec<Repository>>,
}
impl AccessToken {
	/// Returns a builder for constructing tokens outside of an exchange (fixtures, fakes).
	pub fn builder() -> AccessTokenBuilder {
		AccessTokenBuilder::default()
	}

	/// Returns `true` once `now + buffer` reaches the expiry instant.
	///
	/// A zero buffer checks literal expiry; a positive buffer answers "expiring soon".
	pub fn is_expired_within(&self, buffer: Duration, now: OffsetDateTime) -> bool {
		now + buffer >= self.expires_at
	}

	/// Returns `true` if the token has expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_within(Duration::ZERO, OffsetDateTime::now_utc())
	}

	/// Remaining lifetime at `now`; negative once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		self.expires_at - now
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("permissions", &self.permissions)
			.field("repository_selection", &self.repository_selection)
			.field("repositories", &self.repositories.as_ref().map(Vec::len))
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug, Default)]
pub struct AccessTokenBuilder {
	token: Option<TokenSecret>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	permissions: BTreeMap<String, String>,
	repository_selection: RepositorySelection,
	repositories: Option<Vec<Repository>>,
}
impl AccessTokenBuilder {
	/// Provides the token value.
	pub fn token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(TokenSecret::new(token));

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the expiry relative to the moment [`Self::build`] runs.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Adds one capability grant.
	pub fn permission(mut self, capability: impl Into<String>, level: impl Into<String>) -> Self {
		self.permissions.insert(capability.into(), level.into());

		self
	}

	/// Sets the repository selection.
	pub fn repository_selection(mut self, selection: RepositorySelection) -> Self {
		self.repository_selection = selection;

		self
	}

	/// Sets the accessible repositories.
	pub fn repositories(mut self, repositories: Vec<Repository>) -> Self {
		self.repositories = Some(repositories);

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let token = self.token.ok_or(AccessTokenBuilderError::MissingToken)?;
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => OffsetDateTime::now_utc() + delta,
			(None, None) => return Err(AccessTokenBuilderError::MissingExpiry),
		};

		Ok(AccessToken {
			token,
			expires_at,
			permissions: self.permissions,
			repository_selection: self.repository_selection,
			repositories: self.repositories,
		})
	}
}
