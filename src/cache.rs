//! In-memory installation token cache with single-flight renewal.
//!
//! [`TokenManager::get_token`] serves the cached token while it is outside the renewal
//! buffer and otherwise renews it. Locking is two-tier: a `parking_lot` map lock that is
//! never held across `.await`, and a per-identity async flight guard that serializes every
//! exchange for that identity, first or renewal, so concurrent callers collapse into one.
//! Failed or cancelled exchanges never touch the cached token.

mod metrics;

pub use metrics::RenewalMetrics;

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::Operation,
	exchange::{InstallationClient, TokenExchange},
	obs::{self, OpOutcome, OpSpan},
};

/// Renewal buffer applied when a non-positive buffer is supplied at construction.
pub const DEFAULT_RENEW_BUFFER: Duration = Duration::minutes(5);

#[derive(Debug)]
struct EntryState {
	token: AccessToken,
	created_at: OffsetDateTime,
	last_used_at: OffsetDateTime,
	renewing: bool,
}

/// Cached token plus bookkeeping for one installation identity.
pub struct CachedTokenEntry {
	state: RwLock<EntryState>,
}
impl CachedTokenEntry {
	fn new(token: AccessToken, now: OffsetDateTime) -> Self {
		Self {
			state: RwLock::new(EntryState {
				token,
				created_at: now,
				last_used_at: now,
				renewing: false,
			}),
		}
	}

	/// Current token.
	pub fn token(&self) -> AccessToken {
		self.state.read().token.clone()
	}

	/// Instant the current token was obtained.
	pub fn created_at(&self) -> OffsetDateTime {
		self.state.read().created_at
	}

	/// Instant of the most recent read.
	pub fn last_used_at(&self) -> OffsetDateTime {
		self.state.read().last_used_at
	}

	/// Returns `true` while a renewal exchange is in flight.
	pub fn is_renewing(&self) -> bool {
		self.state.read().renewing
	}

	fn touch(&self, now: OffsetDateTime) -> AccessToken {
		let mut state = self.state.write();

		state.last_used_at = now;

		state.token.clone()
	}

	fn replace(&self, token: AccessToken, now: OffsetDateTime) {
		let mut state = self.state.write();

		state.token = token;
		state.created_at = now;
		state.renewing = false;
	}

	fn set_renewing(&self, renewing: bool) {
		self.state.write().renewing = renewing;
	}

	fn stats(&self, now: OffsetDateTime) -> CacheEntryStats {
		let state = self.state.read();

		CacheEntryStats {
			created_at: state.created_at,
			last_used_at: state.last_used_at,
			renewing: state.renewing,
			expires_at: state.token.expires_at,
			is_expired: state.token.is_expired_within(Duration::ZERO, now),
		}
	}
}
impl Debug for CachedTokenEntry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("CachedTokenEntry")
			.field("token", &state.token)
			.field("created_at", &state.created_at)
			.field("last_used_at", &state.last_used_at)
			.field("renewing", &state.renewing)
			.finish()
	}
}

/// Clears the entry's renewing flag however the renewal ends, including cancellation.
struct RenewingFlag<'a>(&'a CachedTokenEntry);
impl<'a> RenewingFlag<'a> {
	fn raise(entry: &'a CachedTokenEntry) -> Self {
		entry.set_renewing(true);

		Self(entry)
	}
}
impl Drop for RenewingFlag<'_> {
	fn drop(&mut self) {
		self.0.set_renewing(false);
	}
}

/// Snapshot of one cache entry, for operator display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheEntryStats {
	/// Instant the current token was obtained.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Instant of the most recent read.
	#[serde(with = "time::serde::rfc3339")]
	pub last_used_at: OffsetDateTime,
	/// Whether a renewal is in flight.
	pub renewing: bool,
	/// Expiry of the current token.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Literal expiry, ignoring the renewal buffer.
	pub is_expired: bool,
}

/// Snapshot of the whole cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStats {
	/// Number of cached identities.
	pub total_cached: usize,
	/// Active renewal buffer.
	pub renew_buffer: Duration,
	/// Human-readable rendering of [`Self::renew_buffer`].
	pub renew_buffer_display: String,
	/// Per-identity details keyed by installation id.
	pub entries: BTreeMap<String, CacheEntryStats>,
}

/// Caches installation tokens and renews them before they expire.
///
/// The manager is an explicit instance; clones share one cache and its metrics.
pub struct TokenManager<X = InstallationClient>
where
	X: ?Sized + TokenExchange,
{
	exchange: Arc<X>,
	entries: Arc<RwLock<HashMap<String, Arc<CachedTokenEntry>>>>,
	flight_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
	renew_buffer: Arc<RwLock<Duration>>,
	metrics: Arc<RenewalMetrics>,
}
impl<X> TokenManager<X>
where
	X: ?Sized + TokenExchange,
{
	/// Creates a manager around `exchange`.
	///
	/// A zero or negative `renew_buffer` falls back to [`DEFAULT_RENEW_BUFFER`].
	pub fn new(exchange: impl Into<Arc<X>>, renew_buffer: Duration) -> Self {
		let renew_buffer =
			if renew_buffer.is_positive() { renew_buffer } else { DEFAULT_RENEW_BUFFER };

		Self {
			exchange: exchange.into(),
			entries: Default::default(),
			flight_guards: Default::default(),
			renew_buffer: Arc::new(RwLock::new(renew_buffer)),
			metrics: Default::default(),
		}
	}

	/// Exchange backing this manager.
	pub fn exchange(&self) -> &X {
		&self.exchange
	}

	/// Returns a token that stays valid for at least the renewal buffer, exchanging or
	/// renewing only when needed.
	pub async fn get_token(&self) -> Result<AccessToken> {
		let key = self.cache_key();

		if let Some(token) = self.entry(&key).and_then(|entry| self.serve(&entry)) {
			return Ok(token);
		}

		self.exchange_once(key).await
	}

	/// Like [`Self::get_token`], but resolves to [`Error::Cancelled`] as soon as `cancel`
	/// completes. A cancelled exchange leaves the cache untouched.
	pub async fn get_token_with_cancel<C>(&self, cancel: C) -> Result<AccessToken>
	where
		C: Future<Output = ()>,
	{
		tokio::select! {
			biased;
			_ = cancel => Err(Error::Cancelled),
			result = self.get_token() => result,
		}
	}

	/// Returns `true` when `token` is absent or `now + buffer` has reached its expiry.
	pub fn is_token_expired(&self, token: Option<&AccessToken>, buffer: Duration) -> bool {
		let now = OffsetDateTime::now_utc();

		token.is_none_or(|token| token.is_expired_within(buffer, now))
	}

	/// Returns the cached token without touching `last_used_at` or renewing.
	pub fn cached_token(&self) -> Option<AccessToken> {
		self.entry(&self.cache_key()).map(|entry| entry.token())
	}

	/// Drops the cached token so the next call performs a fresh exchange.
	pub fn invalidate_token(&self) {
		let key = self.cache_key();

		self.entries.write().remove(&key);
	}

	/// Drops every cached token.
	pub fn clear_cache(&self) {
		self.entries.write().clear();
	}

	/// Replaces the renewal buffer; the value is stored as given.
	pub fn set_renew_buffer(&self, buffer: Duration) {
		*self.renew_buffer.write() = buffer;
	}

	/// Active renewal buffer.
	pub fn renew_buffer(&self) -> Duration {
		*self.renew_buffer.read()
	}

	/// Snapshot of the cache for operator display.
	pub fn cache_stats(&self) -> CacheStats {
		let renew_buffer = self.renew_buffer();
		let now = OffsetDateTime::now_utc();
		let entries = self.entries.read();

		CacheStats {
			total_cached: entries.len(),
			renew_buffer,
			renew_buffer_display: renew_buffer.to_string(),
			entries: entries.iter().map(|(key, entry)| (key.clone(), entry.stats(now))).collect(),
		}
	}

	/// Exchange counters.
	pub fn renewal_metrics(&self) -> &RenewalMetrics {
		&self.metrics
	}

	fn cache_key(&self) -> String {
		self.exchange.installation_id().to_string()
	}

	fn entry(&self, key: &str) -> Option<Arc<CachedTokenEntry>> {
		self.entries.read().get(key).cloned()
	}

	fn flight_guard(&self, key: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flight_guards.lock();

		guards.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Touches `entry` and returns its token if it is still outside the renewal buffer.
	fn serve(&self, entry: &CachedTokenEntry) -> Option<AccessToken> {
		let token = entry.touch(OffsetDateTime::now_utc());

		if self.is_token_expired(Some(&token), self.renew_buffer()) {
			return None;
		}

		self.metrics.record_reuse();

		Some(token)
	}

	async fn exchange_once(&self, key: String) -> Result<AccessToken> {
		let guard = self.flight_guard(&key);
		let _flight = guard.lock().await;

		// Re-read under the guard; another caller may have changed the entry while this one
		// waited.
		match self.entry(&key) {
			Some(entry) => match self.serve(&entry) {
				Some(token) => Ok(token),
				None => self.renew(&entry).await,
			},
			None => self.create(key).await,
		}
	}

	async fn create(&self, key: String) -> Result<AccessToken> {
		const OP: Operation = Operation::CreateToken;

		let span = OpSpan::new(OP, "create_token");

		obs::record_op_outcome(OP, OpOutcome::Attempt);
		self.metrics.record_attempt();

		match span.instrument(self.exchange.exchange()).await {
			Ok(token) => {
				let entry = CachedTokenEntry::new(token.clone(), OffsetDateTime::now_utc());

				self.entries.write().insert(key, Arc::new(entry));
				self.metrics.record_success();
				obs::record_op_outcome(OP, OpOutcome::Success);

				Ok(token)
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_op_outcome(OP, OpOutcome::Failure);

				Err(e.during(OP))
			},
		}
	}

	async fn renew(&self, entry: &CachedTokenEntry) -> Result<AccessToken> {
		const OP: Operation = Operation::RenewToken;

		let span = OpSpan::new(OP, "renew_token");

		obs::record_op_outcome(OP, OpOutcome::Attempt);
		self.metrics.record_attempt();

		let _flag = RenewingFlag::raise(entry);

		match span.instrument(self.exchange.exchange()).await {
			Ok(token) => {
				entry.replace(token.clone(), OffsetDateTime::now_utc());
				self.metrics.record_success();
				obs::record_op_outcome(OP, OpOutcome::Success);

				Ok(token)
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::record_op_outcome(OP, OpOutcome::Failure);

				Err(e.during(OP))
			},
		}
	}
}
impl<X> Clone for TokenManager<X>
where
	X: ?Sized + TokenExchange,
{
	fn clone(&self) -> Self {
		Self {
			exchange: self.exchange.clone(),
			entries: self.entries.clone(),
			flight_guards: self.flight_guards.clone(),
			renew_buffer: self.renew_buffer.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
impl<X> Debug for TokenManager<X>
where
	X: ?Sized + TokenExchange,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("installation_id", self.exchange.installation_id())
			.field("total_cached", &self.entries.read().len())
			.field("renew_buffer", &self.renew_buffer())
			.finish()
	}
}
