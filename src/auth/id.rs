//! Strongly typed numeric identifiers issued by the platform.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		///
		/// The platform transmits identifiers as integers but configuration carries them as
		/// strings, so the canonical form is the validated decimal string.
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}

			/// Returns the identifier as an integer.
			pub fn get(&self) -> u64 {
				// Validation guarantees the string parses.
				self.0.parse().unwrap_or_default()
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl From<std::num::NonZeroU64> for $name {
			fn from(value: std::num::NonZeroU64) -> Self {
				Self(value.to_string())
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (app, installation).
		kind: &'static str,
	},
	/// The identifier is not a decimal integer.
	#[error("{kind} identifier `{value}` is not a valid integer.")]
	NotNumeric {
		/// Kind of identifier (app, installation).
		kind: &'static str,
		/// Rejected input.
		value: String,
	},
	/// The identifier parsed as zero.
	#[error("{kind} identifier must be positive.")]
	NotPositive {
		/// Kind of identifier (app, installation).
		kind: &'static str,
	},
}

def_id! { AppId, "Numeric identifier of a GitHub App.", "App" }
def_id! { InstallationId, "Numeric identifier of a GitHub App installation.", "Installation" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if !view.bytes().all(|b| b.is_ascii_digit()) {
		return Err(IdentifierError::NotNumeric { kind, value: view.to_owned() });
	}

	match view.parse::<u64>() {
		Ok(0) => Err(IdentifierError::NotPositive { kind }),
		Ok(_) => Ok(()),
		Err(_) => Err(IdentifierError::NotNumeric { kind, value: view.to_owned() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_require_positive_integers() {
		let app = AppId::new("12345").expect("App fixture should be considered valid.");

		assert_eq!(app.as_ref(), "12345");
		assert_eq!(app.get(), 12345);
		assert!(matches!(AppId::new(""), Err(IdentifierError::Empty { kind: "App" })));
		assert!(matches!(
			InstallationId::new("invalid-installation-id"),
			Err(IdentifierError::NotNumeric { kind: "Installation", .. })
		));
		assert!(InstallationId::new("-5").is_err(), "Signs must be rejected.");
		assert!(InstallationId::new(" 5").is_err(), "Whitespace must be rejected.");
		assert!(matches!(InstallationId::new("0"), Err(IdentifierError::NotPositive { .. })));
		assert!(AppId::new("99999999999999999999999").is_err(), "Overflow must be rejected.");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let installation: InstallationId =
			serde_json::from_str("\"67890\"").expect("Installation should deserialize successfully.");

		assert_eq!(installation.get(), 67890);
		assert_eq!(format!("{installation:?}"), "Installation(67890)");
		assert!(serde_json::from_str::<InstallationId>("\"abc\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<InstallationId, u8> = HashMap::from_iter([(
			InstallationId::new("67890").expect("Installation used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("67890"), Some(&7));
	}
}
