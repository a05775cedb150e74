//! App credential configuration and the validated identity built from it.

// crates.io
use rsa::{
	RsaPrivateKey,
	pkcs1::{self, DecodeRsaPrivateKey},
	pkcs8::{PrivateKeyInfo, der::pem},
};
// self
use crate::{
	_prelude::*,
	auth::{AppId, InstallationId},
	error::ConfigError,
};

/// Public REST endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Raw, unvalidated app credentials as they arrive from configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppCredentials {
	/// Numeric app identifier, string encoded.
	pub app_id: String,
	/// PEM-encoded RSA private key (PKCS#1 or PKCS#8).
	pub private_key: String,
	/// Numeric installation identifier, string encoded.
	#[serde(default)]
	pub installation_id: String,
	/// REST API root; defaults to [`DEFAULT_BASE_URL`] when unset or empty.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base_url: Option<String>,
}
impl AppCredentials {
	/// Creates credentials targeting the public platform endpoint.
	pub fn new(
		app_id: impl Into<String>,
		private_key: impl Into<String>,
		installation_id: impl Into<String>,
	) -> Self {
		Self {
			app_id: app_id.into(),
			private_key: private_key.into(),
			installation_id: installation_id.into(),
			base_url: None,
		}
	}

	/// Overrides the REST API root (GitHub Enterprise Server, mock servers).
	pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = Some(base_url.into());

		self
	}
}
impl Debug for AppCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppCredentials")
			.field("app_id", &self.app_id)
			.field("private_key", &"<redacted>")
			.field("installation_id", &self.installation_id)
			.field("base_url", &self.base_url)
			.finish()
	}
}

/// Validated, immutable identity for one app installation.
#[derive(Clone)]
pub struct CredentialIdentity {
	app_id: AppId,
	installation_id: InstallationId,
	signing_key: RsaPrivateKey,
	base_url: Url,
}
impl CredentialIdentity {
	/// Validates `credentials` and parses the signing key.
	pub fn new(credentials: AppCredentials) -> Result<Self, ConfigError> {
		if credentials.app_id.is_empty() {
			return Err(ConfigError::MissingField { field: "app_id" });
		}
		if credentials.private_key.is_empty() {
			return Err(ConfigError::MissingField { field: "private_key" });
		}
		if credentials.installation_id.is_empty() {
			return Err(ConfigError::MissingField { field: "installation_id" });
		}

		let app_id = AppId::new(&credentials.app_id)?;
		let installation_id = InstallationId::new(&credentials.installation_id)?;
		let signing_key = parse_private_key(&credentials.private_key)?;
		let base_url = parse_base_url(credentials.base_url.as_deref())?;

		Ok(Self { app_id, installation_id, signing_key, base_url })
	}

	/// App identifier used as assertion issuer and subject.
	pub fn app_id(&self) -> &AppId {
		&self.app_id
	}

	/// Installation whose tokens this identity exchanges for.
	pub fn installation_id(&self) -> &InstallationId {
		&self.installation_id
	}

	/// RSA key used to sign app assertions.
	pub fn signing_key(&self) -> &RsaPrivateKey {
		&self.signing_key
	}

	/// REST API root.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Appends `segments` to the base URL path.
	pub fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
		let mut url = self.base_url.clone();

		// `parse_base_url` rejects cannot-be-a-base URLs, so segments are always available.
		if let Ok(mut path) = url.path_segments_mut() {
			path.pop_if_empty().extend(segments);
		}

		url
	}
}
impl TryFrom<AppCredentials> for CredentialIdentity {
	type Error = ConfigError;

	fn try_from(credentials: AppCredentials) -> Result<Self, Self::Error> {
		Self::new(credentials)
	}
}
impl Debug for CredentialIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialIdentity")
			.field("app_id", &self.app_id)
			.field("installation_id", &self.installation_id)
			.field("signing_key", &"<redacted>")
			.field("base_url", &self.base_url.as_str())
			.finish()
	}
}

/// Parses a PEM-encoded RSA private key in PKCS#1 or PKCS#8 form.
pub fn parse_private_key(pem_text: &str) -> Result<RsaPrivateKey, ConfigError> {
	let (label, der) = pem::decode_vec(pem_text.trim().as_bytes())
		.map_err(|e| ConfigError::MalformedPem { reason: e.to_string() })?;

	match label {
		PKCS1_LABEL => RsaPrivateKey::from_pkcs1_der(&der).map_err(ConfigError::key_decode),
		PKCS8_LABEL => {
			let info = PrivateKeyInfo::try_from(der.as_slice()).map_err(ConfigError::key_decode)?;

			if info.algorithm.oid != pkcs1::ALGORITHM_OID {
				return Err(ConfigError::NotRsaKey);
			}

			RsaPrivateKey::try_from(info).map_err(ConfigError::key_decode)
		},
		other => Err(ConfigError::UnsupportedKeyType { label: other.to_owned() }),
	}
}

fn parse_base_url(raw: Option<&str>) -> Result<Url, ConfigError> {
	let value = match raw.map(str::trim) {
		Some(value) if !value.is_empty() => value,
		_ => DEFAULT_BASE_URL,
	};
	let url = Url::parse(value)
		.map_err(|source| ConfigError::InvalidBaseUrl { value: value.to_owned(), source })?;

	if url.cannot_be_a_base() {
		return Err(ConfigError::InvalidBaseUrl {
			value: value.to_owned(),
			source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
		});
	}

	Ok(url)
}
