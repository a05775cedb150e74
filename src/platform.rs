//! Wire shapes exchanged with the platform's REST API.
//!
//! Only the fields the broker (or a typical operator) reads are modelled; unknown fields are
//! ignored on decode.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, RepositorySelection, TokenSecret},
};

/// Repository descriptor attached to installation tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
	/// Numeric repository identifier.
	pub id: u64,
	/// Short repository name.
	pub name: String,
	/// `owner/name`.
	pub full_name: String,
	/// Whether the repository is private.
	#[serde(default)]
	pub private: bool,
}

/// User or organization account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	/// Login handle.
	pub login: String,
	/// Numeric account identifier.
	pub id: u64,
	/// `User` or `Organization`.
	#[serde(rename = "type")]
	pub kind: String,
}

/// App metadata returned by `GET /app`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct App {
	/// Numeric app identifier.
	pub id: u64,
	/// URL-friendly app name.
	pub slug: Option<String>,
	/// GraphQL node identifier.
	#[serde(default)]
	pub node_id: String,
	/// Owning account.
	pub owner: Option<Account>,
	/// Display name.
	pub name: String,
	/// Free-form description.
	pub description: Option<String>,
	/// Homepage configured for the app.
	#[serde(default)]
	pub external_url: String,
	/// Platform page of the app.
	#[serde(default)]
	pub html_url: String,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Last update instant.
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
	/// Capability name to access level requested by the app.
	#[serde(default)]
	pub permissions: BTreeMap<String, String>,
	/// Webhook events the app subscribes to.
	#[serde(default)]
	pub events: Vec<String>,
	/// Number of installations, when the platform reports it.
	pub installations_count: Option<u64>,
}

/// Installation metadata returned by `GET /app/installations/{id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Installation {
	/// Numeric installation identifier.
	pub id: u64,
	/// Account the app is installed on.
	pub account: Option<Account>,
	/// Repository reach of the installation.
	pub repository_selection: RepositorySelection,
	/// Capability name to access level granted to the installation.
	#[serde(default)]
	pub permissions: BTreeMap<String, String>,
	/// Subscribed webhook events.
	#[serde(default)]
	pub events: Vec<String>,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Last update instant.
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
	/// Suspension instant; `None` while the installation is active.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub suspended_at: Option<OffsetDateTime>,
	/// Single file name for single-file installations.
	pub single_file_name: Option<String>,
	/// Whether several single-file paths are configured.
	#[serde(default)]
	pub has_multiple_single_files: bool,
	/// Single-file paths.
	#[serde(default)]
	pub single_file_paths: Vec<String>,
	/// Owning app identifier.
	pub app_id: u64,
	/// Owning app slug.
	pub app_slug: Option<String>,
	/// Target account identifier.
	pub target_id: u64,
	/// Target account type.
	pub target_type: String,
}
impl Installation {
	/// Returns `true` when the installation is suspended.
	pub fn is_suspended(&self) -> bool {
		self.suspended_at.is_some()
	}
}

/// Optional body narrowing an installation token's reach.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationTokenRequest {
	/// Repository names the token should be limited to.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub repositories: Vec<String>,
	/// Repository identifiers the token should be limited to.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub repository_ids: Vec<u64>,
	/// Subset of the installation's permissions.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub permissions: BTreeMap<String, String>,
}
impl InstallationTokenRequest {
	/// Returns `true` when the request narrows nothing and can be sent without a body.
	pub fn is_empty(&self) -> bool {
		self.repositories.is_empty() && self.repository_ids.is_empty() && self.permissions.is_empty()
	}
}

/// Body of `POST /app/installations/{id}/access_tokens`.
#[derive(Clone, Serialize, Deserialize)]
pub struct InstallationTokenResponse {
	/// Token secret.
	pub token: TokenSecret,
	/// Absolute expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Capability name to access level.
	#[serde(default)]
	pub permissions: BTreeMap<String, String>,
	/// Repository reach of the token.
	#[serde(default)]
	pub repository_selection: RepositorySelection,
	/// Repositories the token can access.
	#[serde(default)]
	pub repositories: Option<Vec<Repository>>,
}
impl From<InstallationTokenResponse> for AccessToken {
	fn from(response: InstallationTokenResponse) -> Self {
		Self {
			token: response.token,
			expires_at: response.expires_at,
			permissions: response.permissions,
			repository_selection: response.repository_selection,
			repositories: response.repositories,
		}
	}
}
impl Debug for InstallationTokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InstallationTokenResponse")
			.field("token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("repository_selection", &self.repository_selection)
			.finish_non_exhaustive()
	}
}

/// Error envelope returned by the platform for failed requests.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
	/// Human-readable message.
	#[serde(default)]
	pub message: String,
	/// Documentation link.
	pub documentation_url: Option<String>,
	/// Field-level errors.
	#[serde(default)]
	pub errors: Vec<ApiFieldError>,
}

/// Field-level validation failure inside an [`ApiErrorEnvelope`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFieldError {
	/// Resource the error refers to.
	#[serde(default)]
	pub resource: String,
	/// Offending field.
	#[serde(default)]
	pub field: String,
	/// Machine-readable error code.
	#[serde(default)]
	pub code: String,
}
