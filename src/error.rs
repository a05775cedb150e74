//! Broker-level error types shared by every layer of the crate.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure that outlived the retry budget.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Platform rejected the request with a structured error body.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Response body could not be decoded.
	#[error("Platform returned malformed JSON (status: {status}).")]
	Decode {
		/// HTTP status code of the undecodable response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The app assertion could not be signed.
	#[error("Failed to sign the app assertion.")]
	Signing(#[source] jsonwebtoken::errors::Error),
	/// The caller cancelled the request before it completed.
	#[error("Request was cancelled.")]
	Cancelled,
	/// Failure annotated with the operation that produced it.
	#[error("Failed to {operation}.")]
	Operation {
		/// Operation in progress when the failure occurred.
		operation: Operation,
		/// Underlying failure.
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	/// Wraps `self` with operation context.
	pub fn during(self, operation: Operation) -> Self {
		Self::Operation { operation, source: Box::new(self) }
	}

	/// Returns the innermost error beneath any [`Error::Operation`] layers.
	pub fn root(&self) -> &Error {
		let mut current = self;

		while let Self::Operation { source, .. } = current {
			current = source;
		}

		current
	}

	/// Returns the HTTP status associated with the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self.root() {
			Self::Api(err) => Some(err.status),
			Self::Decode { status, .. } => Some(*status),
			Self::Transient(TransientError::RetriesExhausted { status, .. }) => *status,
			_ => None,
		}
	}
}

/// Operations that annotate failures surfaced from the exchange client and token cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// `POST /app/installations/{id}/access_tokens`.
	InstallationToken,
	/// `GET /app`.
	AppInfo,
	/// `GET /app/installations/{id}`.
	Installation,
	/// First exchange for an identity with no cached entry.
	CreateToken,
	/// Renewal of a cached entry that reached its renewal buffer.
	RenewToken,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InstallationToken => "installation_token",
			Self::AppInfo => "app_info",
			Self::Installation => "installation",
			Self::CreateToken => "create_token",
			Self::RenewToken => "renew_token",
		}
	}

	const fn describe(self) -> &'static str {
		match self {
			Self::InstallationToken => "get installation token",
			Self::AppInfo => "get app info",
			Self::Installation => "get installation",
			Self::CreateToken => "create new token",
			Self::RenewToken => "renew token",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.describe())
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required credential field was empty.
	#[error("The {field} field is required.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Base URL cannot be parsed.
	#[error("Base URL `{value}` is invalid.")]
	InvalidBaseUrl {
		/// Raw value supplied by the caller.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Private key container could not be decoded.
	#[error("Failed to parse the RSA private key.")]
	KeyDecode {
		/// Underlying decoding failure.
		#[source]
		source: BoxError,
	},
	/// Private key is not a PEM document.
	#[error("Failed to decode PEM block: {reason}.")]
	MalformedPem {
		/// Decoder diagnostic.
		reason: String,
	},
	/// PEM label is neither PKCS#1 nor PKCS#8.
	#[error("Unsupported private key type: {label}.")]
	UnsupportedKeyType {
		/// Label found on the PEM block.
		label: String,
	},
	/// PKCS#8 container holds something other than an RSA key.
	#[error("Key is not an RSA private key.")]
	NotRsaKey,
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a key decoding failure inside [`ConfigError`].
	pub fn key_decode(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::KeyDecode { source: Box::new(src) }
	}
}

/// Temporary failure variants (safe to retry later).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Every attempt ended in a retryable failure.
	#[error("Request failed after {attempts} attempts{}.", last_status(.status))]
	RetriesExhausted {
		/// Attempts performed before giving up.
		attempts: u32,
		/// Status of the final attempt; `None` when it failed at the transport layer.
		status: Option<u16>,
		/// Retry-After hint from the final response, if supplied.
		retry_after: Option<Duration>,
		/// Transport failure of the final attempt, if any.
		#[source]
		source: Option<TransportError>,
	},
}

fn last_status(status: &Option<u16>) -> String {
	status.map(|code| format!(" (last status: {code})")).unwrap_or_default()
}

/// Transport-level failures.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the platform.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Structured platform error decoded from a non-success response.
#[derive(Clone, Debug, ThisError)]
#[error("GitHub API error: {message} (status: {status})")]
pub struct ApiError {
	/// HTTP status code of the response.
	pub status: u16,
	/// Human-readable message supplied by the platform.
	pub message: String,
	/// Link to the relevant platform documentation.
	pub documentation_url: Option<String>,
	/// Field-level validation failures.
	pub errors: Vec<crate::platform::ApiFieldError>,
}
impl ApiError {
	/// Builds an [`ApiError`] from a decoded platform envelope.
	pub fn from_envelope(status: u16, envelope: crate::platform::ApiErrorEnvelope) -> Self {
		Self {
			status,
			message: envelope.message,
			documentation_url: envelope.documentation_url,
			errors: envelope.errors,
		}
	}
}
