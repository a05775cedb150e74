//! RS256 app assertions that prove the app's identity to the platform.
//!
//! An assertion is never cached: it is cheap to mint and a reused assertion could outlive the
//! validity window the platform expects. [`AssertionIssuer::sign`] therefore mints a fresh
//! one for every request.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::EncodeRsaPrivateKey;
// self
use crate::{
	_prelude::*,
	auth::{AppId, CredentialIdentity},
	error::ConfigError,
};

/// Registered claims carried by every app assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer; the app identifier.
	pub iss: String,
	/// Subject; the app identifier.
	pub sub: String,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
}

/// Signed compact JWT; `Debug` and `Display` keep the value out of logs.
#[derive(Clone)]
pub struct SignedAssertion {
	value: String,
	/// Instant the assertion was minted.
	pub issued_at: OffsetDateTime,
	/// Instant after which the platform rejects the assertion.
	pub expires_at: OffsetDateTime,
}
impl SignedAssertion {
	/// Returns the compact JWT. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.value
	}
}
impl Debug for SignedAssertion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignedAssertion")
			.field("value", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
impl Display for SignedAssertion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Mints app assertions with the identity's RSA key.
#[derive(Clone)]
pub struct AssertionIssuer {
	app_id: AppId,
	key: EncodingKey,
}
impl AssertionIssuer {
	/// Validity window of each assertion.
	pub const VALIDITY: Duration = Duration::minutes(10);

	/// Prepares an issuer for `identity`.
	pub fn new(identity: &CredentialIdentity) -> Result<Self, ConfigError> {
		let der = identity.signing_key().to_pkcs1_der().map_err(ConfigError::key_decode)?;

		Ok(Self { app_id: identity.app_id().clone(), key: EncodingKey::from_rsa_der(der.as_bytes()) })
	}

	/// Signs a fresh assertion valid from now for [`Self::VALIDITY`].
	pub fn sign(&self) -> Result<SignedAssertion> {
		self.sign_at(OffsetDateTime::now_utc())
	}

	/// Signs an assertion issued at `now`.
	pub fn sign_at(&self, now: OffsetDateTime) -> Result<SignedAssertion> {
		let expires_at = now + Self::VALIDITY;
		let claims = AssertionClaims {
			iss: self.app_id.to_string(),
			sub: self.app_id.to_string(),
			iat: now.unix_timestamp(),
			exp: expires_at.unix_timestamp(),
		};
		let value = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
			.map_err(Error::Signing)?;

		Ok(SignedAssertion { value, issued_at: now, expires_at })
	}
}
impl Debug for AssertionIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AssertionIssuer").field("app_id", &self.app_id).finish()
	}
}
