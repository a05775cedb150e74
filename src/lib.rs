//! GitHub App installation tokens on tap, exchanged with RS256 app assertions and cached behind
//! a single-flight renewal manager.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod error;
pub mod exchange;
pub mod http;
pub mod obs;
pub mod platform;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for unit tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::auth::AppCredentials;

	/// PKCS#8 (`PRIVATE KEY`) RSA key used across tests.
	pub const TEST_PKCS8_KEY: &str = include_str!("../tests/fixtures/app-key-pkcs8.pem");
	/// The same RSA key wrapped as PKCS#1 (`RSA PRIVATE KEY`).
	pub const TEST_PKCS1_KEY: &str = include_str!("../tests/fixtures/app-key-pkcs1.pem");
	/// A PKCS#8 Ed25519 key, valid PEM but not usable for RS256.
	pub const TEST_ED25519_KEY: &str = include_str!("../tests/fixtures/ed25519-pkcs8.pem");
	/// App identifier used by test credentials.
	pub const TEST_APP_ID: &str = "12345";
	/// Installation identifier used by test credentials.
	pub const TEST_INSTALLATION_ID: &str = "67890";

	/// Credentials pointing at `base_url` with the shared test key.
	pub fn test_credentials(base_url: Option<&str>) -> AppCredentials {
		let mut credentials = AppCredentials::new(TEST_APP_ID, TEST_PKCS8_KEY, TEST_INSTALLATION_ID);

		if let Some(base_url) = base_url {
			credentials = credentials.with_base_url(base_url);
		}

		credentials
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
