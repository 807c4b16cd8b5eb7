//! Rate-provider cache
//!
//! One slot per currency code. A slot holds the last good quote, its
//! expiry, and whether a refresh is in flight. The mutex around a slot is
//! never held across an await; waiters park on the slot's `Notify`.
//!
//! A provider call that outlives the fetch timeout keeps running on the
//! blocking pool. Until it returns, the slot's upstream is busy and no new
//! call is started for that code.

use crate::fault::panic_message;
use chrono::{DateTime, Utc};
use forb_core::Number;
use forb_plugin::{CapabilityRegistry, CurrencyPlugin, RateSample};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Source of "now" for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cached rate: 1 unit of the currency is worth `rate` units of
/// `quote_currency`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub rate: Number,
    pub quote_currency: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Empty,
    Fresh,
    Stale,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub fetch_timeout: Duration,
    /// After a failed refresh, no new upstream call for this long
    pub retry_backoff: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

#[derive(Default)]
struct SlotState {
    quote: Option<RateQuote>,
    expires_at: Option<DateTime<Utc>>,
    refreshing: bool,
    last_failure: Option<DateTime<Utc>>,
}

impl SlotState {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.quote.is_some() && self.expires_at.is_some_and(|at| now < at)
    }

    fn state(&self, now: DateTime<Utc>) -> EntryState {
        if self.refreshing {
            EntryState::Refreshing
        } else if self.quote.is_none() {
            EntryState::Empty
        } else if self.is_fresh(now) {
            EntryState::Fresh
        } else {
            EntryState::Stale
        }
    }

    fn backing_off(&self, now: DateTime<Utc>, backoff: Duration) -> bool {
        let Some(failed_at) = self.last_failure else {
            return false;
        };
        chrono::Duration::from_std(backoff).is_ok_and(|b| now < failed_at + b)
    }
}

struct Slot {
    code: String,
    provider: Arc<dyn CurrencyPlugin>,
    state: Mutex<SlotState>,
    refreshed: Notify,
    /// Set while a provider call runs, including one abandoned by a timeout
    upstream_busy: Arc<AtomicBool>,
}

/// Clears the in-flight flag and wakes waiters, even if the refreshing
/// future is dropped mid-fetch.
struct InFlight<'a> {
    slot: &'a Slot,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.slot.state.lock().refreshing = false;
        self.slot.refreshed.notify_waiters();
    }
}

/// Owned by the blocking provider call; clears the busy flag when the call
/// returns, panics, or is never started.
struct UpstreamCall(Arc<AtomicBool>);

impl UpstreamCall {
    fn start(busy: &Arc<AtomicBool>) -> Self {
        busy.store(true, Ordering::SeqCst);
        Self(Arc::clone(busy))
    }
}

impl Drop for UpstreamCall {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum Plan<'a> {
    Serve(Option<RateQuote>),
    Wait(tokio::sync::futures::Notified<'a>),
    Fetch,
}

/// Time-bounded cache in front of every registered currency provider.
///
/// Built once from the registry and shared by reference; the set of codes
/// is fixed at construction.
pub struct RateCache {
    slots: HashMap<String, Arc<Slot>>,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
}

impl RateCache {
    pub fn new(registry: &CapabilityRegistry, settings: CacheSettings) -> Self {
        let slots = registry
            .currencies()
            .iter()
            .map(|c| {
                let code = c.meta().code.clone();
                let slot = Slot {
                    code: code.clone(),
                    provider: c.shared(),
                    state: Mutex::new(SlotState::default()),
                    refreshed: Notify::new(),
                    upstream_busy: Arc::new(AtomicBool::new(false)),
                };
                (code, Arc::new(slot))
            })
            .collect();
        Self { slots, settings, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Derived state of one entry; `None` for codes with no provider.
    pub fn state(&self, code: &str) -> Option<EntryState> {
        let slot = self.slots.get(&code.trim().to_uppercase())?;
        let now = self.clock.now();
        let state = slot.state.lock().state(now);
        Some(state)
    }

    /// Current quote for `code`, refreshing it if expired.
    ///
    /// Never fails: an upstream problem degrades to the last good quote,
    /// or `None` when there has never been one.
    pub async fn get(&self, code: &str) -> Option<RateQuote> {
        let slot = Arc::clone(self.slots.get(&code.trim().to_uppercase())?);
        let now = self.clock.now();

        let plan = {
            let mut state = slot.state.lock();
            if state.is_fresh(now) {
                Plan::Serve(state.quote.clone())
            } else if state.refreshing {
                match &state.quote {
                    Some(stale) => Plan::Serve(Some(stale.clone())),
                    // Registered while the lock is held, so the wake-up cannot be missed
                    None => Plan::Wait(slot.refreshed.notified()),
                }
            } else if state.backing_off(now, self.settings.retry_backoff)
                || slot.upstream_busy.load(Ordering::SeqCst)
            {
                Plan::Serve(state.quote.clone())
            } else {
                state.refreshing = true;
                Plan::Fetch
            }
        };

        match plan {
            Plan::Serve(quote) => quote,
            Plan::Wait(notified) => {
                notified.await;
                let quote = slot.state.lock().quote.clone();
                quote
            }
            Plan::Fetch => self.refresh(&slot).await,
        }
    }

    async fn refresh(&self, slot: &Slot) -> Option<RateQuote> {
        let _in_flight = InFlight { slot };
        debug!(code = %slot.code, "refreshing rate");

        let outcome = self.fetch(slot).await;
        let now = self.clock.now();
        let mut state = slot.state.lock();
        match outcome {
            Ok(sample) => {
                let quote = RateQuote {
                    rate: sample.rate,
                    quote_currency: sample.quote_currency.to_uppercase(),
                    fetched_at: now,
                };
                let ttl = chrono::Duration::from_std(self.settings.ttl).unwrap_or(chrono::Duration::MAX);
                state.expires_at = now.checked_add_signed(ttl).or(Some(DateTime::<Utc>::MAX_UTC));
                state.quote = Some(quote);
                state.last_failure = None;
                debug!(code = %slot.code, "rate fresh");
            }
            Err(reason) => {
                state.last_failure = Some(now);
                let serving = if state.quote.is_some() { "stale" } else { "none" };
                warn!(code = %slot.code, reason = %reason, serving, "rate refresh failed");
            }
        }
        state.quote.clone()
    }

    /// One bounded upstream call. The provider is synchronous, so it runs on
    /// the blocking pool; on timeout it is left to finish there.
    async fn fetch(&self, slot: &Slot) -> Result<RateSample, String> {
        let provider = Arc::clone(&slot.provider);
        let busy = UpstreamCall::start(&slot.upstream_busy);
        let call = tokio::task::spawn_blocking(move || {
            let _busy = busy;
            provider.rate()
        });

        match tokio::time::timeout(self.settings.fetch_timeout, call).await {
            Err(_) => Err(format!("timed out after {:?}", self.settings.fetch_timeout)),
            Ok(Err(join)) if join.is_panic() => {
                Err(format!("panicked: {}", panic_message(&*join.into_panic())))
            }
            Ok(Err(join)) => Err(join.to_string()),
            Ok(Ok(Err(failure))) => Err(failure.message().to_string()),
            Ok(Ok(Ok(None))) => Err("rate unavailable".to_string()),
            Ok(Ok(Ok(Some(sample)))) => {
                if sample.rate.is_zero() || sample.rate.is_negative() {
                    Err(format!("non-positive rate {}", sample.rate))
                } else if sample.quote_currency.trim().is_empty() {
                    Err("empty quote currency".to_string())
                } else {
                    Ok(sample)
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use forb_plugin::{Capability, CurrencyMeta, PluginFailure};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Clock moved by hand
    pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(Utc::now())))
        }

        pub(crate) fn advance(&self, secs: i64) {
            *self.0.lock() += chrono::Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    /// Scriptable provider: the rate it returns can be changed, failures
    /// switched on, and every upstream call is counted.
    pub(crate) struct Upstream {
        pub(crate) code: &'static str,
        pub(crate) rate: Mutex<Option<i64>>,
        pub(crate) failing: Mutex<bool>,
        pub(crate) delay: Duration,
        pub(crate) calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Upstream {
        pub(crate) fn new(code: &'static str, rate: i64) -> Arc<Self> {
            Self::slow(code, rate, Duration::ZERO)
        }

        pub(crate) fn slow(code: &'static str, rate: i64, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                code,
                rate: Mutex::new(Some(rate)),
                failing: Mutex::new(false),
                delay,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Most provider calls ever running at once
        pub(crate) fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl CurrencyPlugin for Upstream {
        fn meta(&self) -> CurrencyMeta {
            CurrencyMeta::new(self.code, "¤", self.code, 2)
        }

        fn rate(&self) -> Result<Option<RateSample>, PluginFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            if *self.failing.lock() {
                return Err(PluginFailure::new("HTTP 503"));
            }
            Ok(self.rate.lock().map(|r| RateSample::new(Number::from_i64(r), "USD")))
        }
    }

    pub(crate) fn cache_with(upstreams: &[Arc<Upstream>], settings: CacheSettings, clock: Arc<ManualClock>) -> RateCache {
        let mut registry = CapabilityRegistry::new();
        for u in upstreams {
            registry
                .register(Capability::CurrencyProvider(Arc::clone(u) as Arc<dyn CurrencyPlugin>))
                .unwrap();
        }
        RateCache::new(&registry, settings).with_clock(clock)
    }

    fn settings() -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(5),
            retry_backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_does_not_refetch() {
        let btc = Upstream::new("BTC", 50_000);
        let clock = ManualClock::new();
        let cache = cache_with(&[Arc::clone(&btc)], settings(), Arc::clone(&clock));

        assert_eq!(cache.state("BTC"), Some(EntryState::Empty));
        let first = cache.get("BTC").await.unwrap();
        assert_eq!(first.rate, Number::from_i64(50_000));
        assert_eq!(first.quote_currency, "USD");
        assert_eq!(cache.state("btc"), Some(EntryState::Fresh));

        clock.advance(59);
        *btc.rate.lock() = Some(1);
        let second = cache.get("BTC").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(btc.calls(), 1);
    }

    #[tokio::test]
    async fn test_expiry_triggers_refetch() {
        let btc = Upstream::new("BTC", 50_000);
        let clock = ManualClock::new();
        let cache = cache_with(&[Arc::clone(&btc)], settings(), Arc::clone(&clock));

        cache.get("BTC").await.unwrap();
        clock.advance(60);
        assert_eq!(cache.state("BTC"), Some(EntryState::Stale));
        *btc.rate.lock() = Some(51_000);
        let refreshed = cache.get("BTC").await.unwrap();
        assert_eq!(refreshed.rate, Number::from_i64(51_000));
        assert_eq!(btc.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_expiry_single_upstream_call() {
        let btc = Upstream::slow("BTC", 50_000, Duration::from_millis(200));
        let clock = ManualClock::new();
        let cache = Arc::new(cache_with(&[Arc::clone(&btc)], settings(), Arc::clone(&clock)));

        cache.get("BTC").await.unwrap();
        clock.advance(61);
        *btc.rate.lock() = Some(52_000);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("BTC").await })
            })
            .collect();
        for task in tasks {
            let quote = task.await.unwrap().unwrap();
            // either the stale value or the refreshed one, never nothing
            assert!(quote.rate == Number::from_i64(50_000) || quote.rate == Number::from_i64(52_000));
        }
        assert_eq!(btc.calls(), 2);
        assert_eq!(cache.get("BTC").await.unwrap().rate, Number::from_i64(52_000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cold_requests_single_upstream_call() {
        let eth = Upstream::slow("ETH", 3_000, Duration::from_millis(200));
        let cache = Arc::new(cache_with(&[Arc::clone(&eth)], settings(), ManualClock::new()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("ETH").await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().map(|q| q.rate), Some(Number::from_i64(3_000)));
        }
        assert_eq!(eth.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_value_served_on_failure() {
        let sol = Upstream::new("SOL", 150);
        let clock = ManualClock::new();
        let cache = cache_with(&[Arc::clone(&sol)], settings(), Arc::clone(&clock));

        let good = cache.get("SOL").await.unwrap();
        clock.advance(120);
        *sol.failing.lock() = true;
        let served = cache.get("SOL").await.unwrap();
        assert_eq!(served, good);
        assert_eq!(cache.state("SOL"), Some(EntryState::Stale));
    }

    #[tokio::test]
    async fn test_null_rate_degrades_like_failure() {
        let sol = Upstream::new("SOL", 150);
        let clock = ManualClock::new();
        let cache = cache_with(&[Arc::clone(&sol)], settings(), Arc::clone(&clock));

        let good = cache.get("SOL").await.unwrap();
        clock.advance(120);
        *sol.rate.lock() = None;
        assert_eq!(cache.get("SOL").await, Some(good));
    }

    #[tokio::test]
    async fn test_cold_failure_is_unavailable() {
        let sol = Upstream::new("SOL", 150);
        *sol.failing.lock() = true;
        let cache = cache_with(&[Arc::clone(&sol)], settings(), ManualClock::new());
        assert_eq!(cache.get("SOL").await, None);
        assert_eq!(cache.state("SOL"), Some(EntryState::Empty));
    }

    #[tokio::test]
    async fn test_unknown_code_is_unavailable() {
        let cache = cache_with(&[], settings(), ManualClock::new());
        assert_eq!(cache.get("XYZ").await, None);
        assert_eq!(cache.state("XYZ"), None);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let slow = Upstream::slow("BTC", 1, Duration::from_millis(500));
        let settings = CacheSettings { fetch_timeout: Duration::from_millis(50), ..settings() };
        let cache = cache_with(&[Arc::clone(&slow)], settings, ManualClock::new());
        assert_eq!(cache.get("BTC").await, None);
        assert_eq!(cache.state("BTC"), Some(EntryState::Empty));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_call_blocks_new_upstream_calls() {
        let slow = Upstream::slow("BTC", 1, Duration::from_millis(400));
        let settings = CacheSettings { fetch_timeout: Duration::from_millis(50), ..settings() };
        let cache = cache_with(&[Arc::clone(&slow)], settings, ManualClock::new());

        for _ in 0..3 {
            assert_eq!(cache.get("BTC").await, None);
        }
        assert_eq!(slow.calls(), 1);

        // The abandoned call returns; the next request may go upstream again.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(cache.get("BTC").await, None);
        assert_eq!(slow.calls(), 2);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(slow.peak(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_requester_does_not_wait_for_refresh() {
        let btc = Upstream::slow("BTC", 50_000, Duration::from_millis(500));
        let clock = ManualClock::new();
        let cache = Arc::new(cache_with(&[Arc::clone(&btc)], settings(), Arc::clone(&clock)));

        let stale = cache.get("BTC").await.unwrap();
        clock.advance(61);
        *btc.rate.lock() = Some(52_000);

        let initiator = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("BTC").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.state("BTC"), Some(EntryState::Refreshing));

        let started = Instant::now();
        let served = cache.get("BTC").await;
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(served, Some(stale));

        let refreshed = initiator.await.unwrap().unwrap();
        assert_eq!(refreshed.rate, Number::from_i64(52_000));
        assert_eq!(cache.state("BTC"), Some(EntryState::Fresh));
        assert_eq!(btc.calls(), 2);
    }

    #[tokio::test]
    async fn test_backoff_suppresses_refetch() {
        let btc = Upstream::new("BTC", 1);
        *btc.failing.lock() = true;
        let clock = ManualClock::new();
        let settings = CacheSettings { retry_backoff: Duration::from_secs(5), ..settings() };
        let cache = cache_with(&[Arc::clone(&btc)], settings, Arc::clone(&clock));

        assert_eq!(cache.get("BTC").await, None);
        assert_eq!(cache.get("BTC").await, None);
        assert_eq!(btc.calls(), 1);

        clock.advance(5);
        *btc.failing.lock() = false;
        assert!(cache.get("BTC").await.is_some());
        assert_eq!(btc.calls(), 2);
    }

    #[tokio::test]
    async fn test_panicking_provider_degrades() {
        struct Panics;
        impl CurrencyPlugin for Panics {
            fn meta(&self) -> CurrencyMeta {
                CurrencyMeta::new("BAD", "B", "Bad", 2)
            }
            fn rate(&self) -> Result<Option<RateSample>, PluginFailure> {
                panic!("upstream parser bug")
            }
        }
        let registry = CapabilityRegistry::new().with_currency(Panics).unwrap();
        let cache = RateCache::new(&registry, settings());
        assert_eq!(cache.get("BAD").await, None);
    }
}
