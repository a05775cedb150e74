//! Shared fixtures for the integration suites.

#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
};
// self
use github_app_broker::{
	auth::{AppCredentials, CredentialIdentity},
	exchange::InstallationClient,
	http::{ExecutorConfig, ExponentialBackoff, RequestExecutor},
};

pub const TEST_PKCS8_KEY: &str = include_str!("../fixtures/app-key-pkcs8.pem");
pub const TEST_APP_ID: &str = "12345";
pub const TEST_INSTALLATION_ID: &str = "67890";
pub const TOKEN_PATH: &str = "/app/installations/67890/access_tokens";

/// Retry policy with millisecond delays so the suites stay fast.
pub fn fast_retry() -> ExponentialBackoff {
	ExponentialBackoff::default().with_base_delay(Duration::milliseconds(10))
}

pub fn test_executor() -> RequestExecutor {
	RequestExecutor::new(ExecutorConfig::default().with_retry(fast_retry()))
		.expect("Failed to build the test request executor.")
}

pub fn test_identity(base_url: &str) -> CredentialIdentity {
	let credentials = AppCredentials::new(TEST_APP_ID, TEST_PKCS8_KEY, TEST_INSTALLATION_ID)
		.with_base_url(base_url);

	CredentialIdentity::new(credentials).expect("Test credentials should be valid.")
}

pub fn build_test_client(base_url: &str) -> InstallationClient {
	InstallationClient::with_executor(test_identity(base_url), test_executor())
		.expect("Test client should accept the shared key.")
}

/// Body of a successful installation token exchange.
pub fn token_body(token: &str, lifetime: Duration) -> String {
	let expires_at = (OffsetDateTime::now_utc() + lifetime)
		.format(&Rfc3339)
		.expect("Expiry should format as RFC 3339.");

	format!(
		r#"{{"token":"{token}","expires_at":"{expires_at}","permissions":{{"contents":"read","metadata":"read"}},"repository_selection":"selected"}}"#
	)
}

/// Minimal HTTP/1.1 responder that replays `script` in order, one response per connection.
///
/// The last scripted response is repeated once the script runs out.
pub struct ScriptedServer {
	base_url: String,
	hits: Arc<AtomicUsize>,
}
impl ScriptedServer {
	pub async fn start(script: Vec<(u16, &'static str)>) -> Self {
		let listener =
			TcpListener::bind("127.0.0.1:0").await.expect("Scripted server should bind.");
		let base_url =
			format!("http://{}", listener.local_addr().expect("Local address should resolve."));
		let hits = Arc::new(AtomicUsize::new(0));
		let counter = hits.clone();

		tokio::spawn(async move {
			let mut script = script.into_iter();
			let mut last = (500, "{}");

			while let Ok((mut stream, _)) = listener.accept().await {
				let (status, body) = script.next().unwrap_or(last);

				last = (status, body);

				read_request(&mut stream).await;
				counter.fetch_add(1, Ordering::SeqCst);

				let response = format!(
					"HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
					body.len()
				);
				let _ = stream.write_all(response.as_bytes()).await;
				let _ = stream.shutdown().await;
			}
		});

		Self { base_url, hits }
	}

	pub fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url)
	}

	pub fn hits(&self) -> usize {
		self.hits.load(Ordering::SeqCst)
	}
}

async fn read_request(stream: &mut TcpStream) {
	let mut buf = Vec::new();
	let mut chunk = [0_u8; 1024];

	let header_end = loop {
		let Ok(read) = stream.read(&mut chunk).await else { return };

		if read == 0 {
			return;
		}

		buf.extend_from_slice(&chunk[..read]);

		if let Some(pos) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
			break pos + 4;
		}
	};
	let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
	let content_length = head
		.lines()
		.find_map(|line| line.strip_prefix("content-length:"))
		.and_then(|value| value.trim().parse::<usize>().ok())
		.unwrap_or(0);

	while buf.len() < header_end + content_length {
		match stream.read(&mut chunk).await {
			Ok(0) | Err(_) => return,
			Ok(read) => buf.extend_from_slice(&chunk[..read]),
		}
	}
}

/// Returns a loopback URL nothing listens on.
pub async fn closed_port_url() -> String {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Probe listener should bind.");
	let addr = listener.local_addr().expect("Local address should resolve.");

	drop(listener);

	format!("http://{addr}")
}
