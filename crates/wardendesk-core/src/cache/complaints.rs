//! Complaint cache with request coalescing.
//!
//! All state lives behind one mutex that is never held across an await.
//! Network fetches run as spawned tasks: callers wait on a shared handle to
//! the task, so several views asking for the same stats or page at once
//! produce a single request, and a fetch finishes even if the view that
//! started it goes away. Each task is tagged with the scope generation it
//! was started under; results that arrive after `clear()` or a hostel switch
//! are dropped instead of being written back.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::api::{ApiError, ComplaintSource};
use crate::models::{
    ComplaintFilter, ComplaintId, ComplaintPage, ComplaintRecord, ComplaintStatus, Pagination,
    StatsSnapshot,
};

use super::{CacheError, CachedData};

// ============================================================================
// Constants
// ============================================================================

/// How long fetched stats and pages are served without hitting the network.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Complaints per page requested from the API.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub page_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ============================================================================
// In-flight fetches
// ============================================================================

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, CacheError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKey {
    Stats,
    Page(u32),
}

/// A running fetch task plus the handle every interested caller awaits.
struct InFlight<T: Clone> {
    id: u64,
    future: SharedFetch<T>,
    abort: AbortHandle,
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn spawn<F>(id: u64, task: F) -> Self
    where
        F: Future<Output = Result<T, CacheError>> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let abort = handle.abort_handle();
        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(CacheError::Discarded),
                Err(e) => Err(CacheError::TaskFailed(e.to_string())),
            }
        }
        .boxed()
        .shared();

        Self { id, future, abort }
    }
}

/// Clears a fetch's in-flight marker when its task ends, including by panic
/// or abort, so loading flags can never stick.
struct InFlightGuard {
    inner: Arc<Mutex<CacheState>>,
    key: FetchKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_state(&self.inner).release(self.key, self.id);
    }
}

enum Lookup<T: Clone> {
    Cached(T),
    Pending(SharedFetch<T>),
}

impl<T: Clone> Lookup<T> {
    async fn resolve(self) -> Result<T, CacheError> {
        match self {
            Lookup::Cached(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await,
        }
    }
}

// ============================================================================
// Cache state
// ============================================================================

#[derive(Default)]
struct CacheState {
    scope: Option<String>,
    /// Bumped whenever cached data is thrown away; fetch tasks compare it
    /// before writing their results back.
    generation: u64,
    next_fetch_id: u64,

    stats: Option<CachedData<StatsSnapshot>>,
    pages: HashMap<u32, CachedData<ComplaintPage>>,

    // The page currently shown to views
    records: Vec<ComplaintRecord>,
    pagination: Option<Pagination>,
    current_page: Option<u32>,
    requested_page: u32,

    last_fetch: Option<Instant>,
    // Last failure per resource, cleared only by that resource's next success
    stats_error: Option<CacheError>,
    page_error: Option<CacheError>,

    stats_in_flight: Option<InFlight<StatsSnapshot>>,
    pages_in_flight: HashMap<u32, InFlight<ComplaintPage>>,
}

fn lock_state(inner: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    // State is plain data; a panic elsewhere cannot leave it half-written
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CacheState {
    fn next_fetch_id(&mut self) -> u64 {
        self.next_fetch_id += 1;
        self.next_fetch_id
    }

    /// Make `hostel` the active scope, dropping another hostel's data.
    /// Returns the tasks of fetches that no longer have a home.
    fn enter_scope(&mut self, hostel: &str) -> Result<Vec<AbortHandle>, CacheError> {
        if hostel.trim().is_empty() {
            return Err(CacheError::EmptyScope);
        }
        if self.scope.as_deref() == Some(hostel) {
            return Ok(Vec::new());
        }
        if let Some(ref previous) = self.scope {
            debug!(from = %previous, to = hostel, "Hostel scope changed, dropping cached data");
        }
        let stale_tasks = self.reset();
        self.scope = Some(hostel.to_string());
        Ok(stale_tasks)
    }

    fn reset(&mut self) -> Vec<AbortHandle> {
        let mut stale_tasks: Vec<AbortHandle> = self
            .pages_in_flight
            .drain()
            .map(|(_, fetch)| fetch.abort)
            .collect();
        if let Some(fetch) = self.stats_in_flight.take() {
            stale_tasks.push(fetch.abort);
        }

        self.scope = None;
        self.generation += 1;
        self.stats = None;
        self.pages.clear();
        self.records.clear();
        self.pagination = None;
        self.current_page = None;
        self.requested_page = 1;
        self.last_fetch = None;
        self.stats_error = None;
        self.page_error = None;

        stale_tasks
    }

    fn release(&mut self, key: FetchKey, id: u64) {
        match key {
            FetchKey::Stats => {
                if self.stats_in_flight.as_ref().is_some_and(|f| f.id == id) {
                    self.stats_in_flight = None;
                }
            }
            FetchKey::Page(page) => {
                if self.pages_in_flight.get(&page).is_some_and(|f| f.id == id) {
                    self.pages_in_flight.remove(&page);
                }
            }
        }
    }

    fn fresh_stats(&self, ttl: Duration) -> Option<StatsSnapshot> {
        self.stats
            .as_ref()
            .filter(|cached| cached.is_fresh(ttl))
            .map(|cached| cached.data)
    }

    fn fresh_page(&self, page: u32, ttl: Duration) -> Option<ComplaintPage> {
        self.pages
            .get(&page)
            .filter(|cached| cached.is_fresh(ttl))
            .map(|cached| cached.data.clone())
    }

    fn show_page(&mut self, page: u32, data: &ComplaintPage) {
        self.records = data.records.clone();
        self.pagination = Some(data.pagination.clone());
        self.current_page = Some(page);
    }

    fn record_failure(&mut self, key: FetchKey, e: ApiError) -> CacheError {
        let err = CacheError::from(e);
        match key {
            FetchKey::Stats => {
                error!(hostel = ?self.scope, error = %err, "Stats fetch failed");
                self.stats_error = Some(err.clone());
            }
            FetchKey::Page(page) => {
                error!(hostel = ?self.scope, page, error = %err, "Complaints fetch failed");
                self.page_error = Some(err.clone());
            }
        }
        err
    }

    /// The error views should show: stats first, since the counts badge
    /// depends on them.
    fn error(&self) -> Option<CacheError> {
        self.stats_error.clone().or_else(|| self.page_error.clone())
    }

    fn finish_stats(
        &mut self,
        generation: u64,
        id: u64,
        result: Result<StatsSnapshot, ApiError>,
    ) -> Result<StatsSnapshot, CacheError> {
        self.release(FetchKey::Stats, id);
        if generation != self.generation {
            debug!("Discarding stats fetched for a previous scope");
            return Err(CacheError::Discarded);
        }

        match result {
            Ok(stats) => {
                self.stats = Some(CachedData::new(stats));
                self.last_fetch = Some(Instant::now());
                self.stats_error = None;
                Ok(stats)
            }
            Err(e) => Err(self.record_failure(FetchKey::Stats, e)),
        }
    }

    fn finish_page(
        &mut self,
        generation: u64,
        id: u64,
        page: u32,
        result: Result<ComplaintPage, ApiError>,
    ) -> Result<ComplaintPage, CacheError> {
        self.release(FetchKey::Page(page), id);
        if generation != self.generation {
            debug!(page, "Discarding complaints fetched for a previous scope");
            return Err(CacheError::Discarded);
        }

        match result {
            Ok(data) => {
                // Only the most recently requested page reaches the views
                if page == self.requested_page {
                    self.show_page(page, &data);
                } else {
                    debug!(page, requested = self.requested_page, "Caching page without showing it");
                }
                self.pages.insert(page, CachedData::new(data.clone()));
                self.last_fetch = Some(Instant::now());
                self.page_error = None;
                Ok(data)
            }
            Err(e) => Err(self.record_failure(FetchKey::Page(page), e)),
        }
    }
}

// ============================================================================
// Snapshot for views
// ============================================================================

/// Read-only view of the cache, for rendering.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub hostel: Option<String>,
    pub records: Vec<ComplaintRecord>,
    pub stats: Option<StatsSnapshot>,
    pub pagination: Option<Pagination>,
    pub current_page: Option<u32>,
    pub is_loading_stats: bool,
    pub is_loading_complaints: bool,
    pub is_stale: bool,
    /// Last stats failure, else last complaints failure
    pub error: Option<CacheError>,
    /// Age of the stats, e.g. "3m ago"
    pub stats_age: Option<String>,
}

// ============================================================================
// ComplaintCache
// ============================================================================

/// Session-scoped cache of complaints and stats for one hostel at a time.
///
/// Clone is cheap and every clone shares the same state, so one instance can
/// be handed to each view that needs it.
#[derive(Clone)]
pub struct ComplaintCache {
    source: Arc<dyn ComplaintSource>,
    config: CacheConfig,
    inner: Arc<Mutex<CacheState>>,
}

impl ComplaintCache {
    pub fn new(source: Arc<dyn ComplaintSource>, config: CacheConfig) -> Self {
        Self {
            source,
            config,
            inner: Arc::new(Mutex::new(CacheState {
                requested_page: 1,
                ..Default::default()
            })),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        lock_state(&self.inner)
    }

    /// Run `f` against the state with `hostel` as the active scope.
    fn with_scope<R>(
        &self,
        hostel: &str,
        f: impl FnOnce(&mut CacheState) -> R,
    ) -> Result<R, CacheError> {
        let (result, stale_tasks) = {
            let mut state = self.state();
            let stale_tasks = state.enter_scope(hostel)?;
            (f(&mut *state), stale_tasks)
        };
        for task in stale_tasks {
            task.abort();
        }
        Ok(result)
    }

    /// Join the running stats fetch, or start one.
    fn stats_fetch(&self, state: &mut CacheState, hostel: &str) -> SharedFetch<StatsSnapshot> {
        if let Some(ref fetch) = state.stats_in_flight {
            debug!(hostel = hostel, "Joining in-flight stats fetch");
            return fetch.future.clone();
        }

        let id = state.next_fetch_id();
        let generation = state.generation;
        let source = Arc::clone(&self.source);
        let inner = Arc::clone(&self.inner);
        let hostel = hostel.to_string();

        debug!(hostel = %hostel, "Fetching stats");
        let fetch = InFlight::spawn(id, async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
                key: FetchKey::Stats,
                id,
            };
            let result = source.fetch_stats(&hostel).await;
            let mut state = lock_state(&inner);
            state.finish_stats(generation, id, result)
        });

        let future = fetch.future.clone();
        state.stats_in_flight = Some(fetch);
        future
    }

    /// Join the running fetch for `page`, or start one.
    fn page_fetch(
        &self,
        state: &mut CacheState,
        hostel: &str,
        page: u32,
    ) -> SharedFetch<ComplaintPage> {
        if let Some(fetch) = state.pages_in_flight.get(&page) {
            debug!(hostel = hostel, page, "Joining in-flight complaints fetch");
            return fetch.future.clone();
        }

        let id = state.next_fetch_id();
        let generation = state.generation;
        let limit = self.config.page_size;
        let source = Arc::clone(&self.source);
        let inner = Arc::clone(&self.inner);
        let hostel = hostel.to_string();

        debug!(hostel = %hostel, page, limit, "Fetching complaints");
        let fetch = InFlight::spawn(id, async move {
            let _guard = InFlightGuard {
                inner: Arc::clone(&inner),
                key: FetchKey::Page(page),
                id,
            };
            let result = source.fetch_complaints(&hostel, page, limit).await;
            let mut state = lock_state(&inner);
            state.finish_page(generation, id, page, result)
        });

        let future = fetch.future.clone();
        state.pages_in_flight.insert(page, fetch);
        future
    }

    /// Prepare the cache for `hostel` once the warden's hostel is known.
    ///
    /// Loads only the stats (cheap, used for the sidebar badge). A no-op when
    /// stats for this hostel are still fresh; joins the pending load when one
    /// is already running.
    pub async fn initialize(&self, hostel: &str) -> Result<(), CacheError> {
        let ttl = self.config.ttl;
        let lookup = self.with_scope(hostel, |state| match state.fresh_stats(ttl) {
            Some(stats) => Lookup::Cached(stats),
            None => Lookup::Pending(self.stats_fetch(state, hostel)),
        })?;
        lookup.resolve().await.map(|_| ())
    }

    /// Current stats for `hostel`, from memory when fresh.
    pub async fn load_stats(
        &self,
        hostel: &str,
        force_refresh: bool,
    ) -> Result<StatsSnapshot, CacheError> {
        let ttl = self.config.ttl;
        let lookup = self.with_scope(hostel, |state| {
            if !force_refresh {
                if let Some(stats) = state.fresh_stats(ttl) {
                    debug!(hostel = hostel, "Serving stats from cache");
                    return Lookup::Cached(stats);
                }
            }
            Lookup::Pending(self.stats_fetch(state, hostel))
        })?;
        lookup.resolve().await
    }

    /// A page of complaints for `hostel`, loading stats alongside when they
    /// are not fresh.
    ///
    /// If a stats load is already running, waits for it first and then only
    /// fetches the complaints.
    ///
    /// A stats failure does not fail the listing: it is kept in
    /// [`ComplaintCache::error`] and the page result is returned.
    pub async fn load_complaints(
        &self,
        hostel: &str,
        force_refresh: bool,
        page: u32,
    ) -> Result<ComplaintPage, CacheError> {
        let page = page.max(1);
        let ttl = self.config.ttl;

        let running_stats = self.with_scope(hostel, |state| {
            state.requested_page = page;
            state.stats_in_flight.as_ref().map(|fetch| fetch.future.clone())
        })?;
        let waited_for_stats = match running_stats {
            Some(fetch) => {
                debug!(hostel = hostel, "Waiting on in-flight stats before loading complaints");
                fetch.await.is_ok()
            }
            None => false,
        };

        let (stats, complaints) = self.with_scope(hostel, |state| {
            // The scope may have been re-entered while we waited
            state.requested_page = page;

            let stats_fresh = state.fresh_stats(ttl).is_some();
            let stats = if stats_fresh && (waited_for_stats || !force_refresh) {
                None
            } else {
                Some(self.stats_fetch(state, hostel))
            };

            let complaints = match state.fresh_page(page, ttl).filter(|_| !force_refresh) {
                Some(cached) => {
                    debug!(hostel = hostel, page, "Serving complaints from cache");
                    state.show_page(page, &cached);
                    Lookup::Cached(cached)
                }
                None => Lookup::Pending(self.page_fetch(state, hostel, page)),
            };

            (stats, complaints)
        })?;

        let stats = async {
            match stats {
                Some(fetch) => fetch.await.map(|_| ()),
                None => Ok(()),
            }
        };
        let (stats, complaints) = futures::join!(stats, complaints.resolve());
        if let Err(e) = stats {
            warn!(hostel = hostel, error = %e, "Stats unavailable, returning complaints alone");
        }
        complaints
    }

    /// Show `page`, from the page cache when fresh. Never reloads stats.
    pub async fn load_page(&self, hostel: &str, page: u32) -> Result<(), CacheError> {
        let page = page.max(1);
        let ttl = self.config.ttl;
        let lookup = self.with_scope(hostel, |state| {
            state.requested_page = page;
            match state.fresh_page(page, ttl) {
                Some(cached) => {
                    debug!(hostel = hostel, page, "Serving page from cache");
                    state.show_page(page, &cached);
                    Lookup::Cached(cached)
                }
                None => Lookup::Pending(self.page_fetch(state, hostel, page)),
            }
        })?;
        lookup.resolve().await.map(|_| ())
    }

    /// Re-fetch stats and `page` from the network regardless of freshness.
    pub async fn refresh(&self, hostel: &str, page: u32) -> Result<(), CacheError> {
        self.with_scope(hostel, |state| {
            state.last_fetch = None;
        })?;
        self.load_complaints(hostel, true, page).await.map(|_| ())
    }

    /// Look up a complaint in the currently shown page.
    pub fn get_by_id(&self, id: ComplaintId) -> Option<ComplaintRecord> {
        self.state().records.iter().find(|r| r.id == id).cloned()
    }

    /// Reflect a status change the server has already confirmed.
    ///
    /// Rewrites the record in the shown page and in the page cache, and moves
    /// one count between stats buckets. Returns `false` when the complaint is
    /// not loaded or the change would move it backwards; callers should
    /// refresh in that case.
    pub fn apply_status_update(&self, id: ComplaintId, new_status: ComplaintStatus) -> bool {
        let mut guard = self.state();
        let state = &mut *guard;

        let Some(record) = state.records.iter_mut().find(|r| r.id == id) else {
            debug!(id = %id, "Status update for a complaint that is not loaded");
            return false;
        };

        let old_status = record.status;
        if old_status == new_status {
            return true;
        }
        if !old_status.can_transition_to(new_status) {
            warn!(id = %id, from = %old_status, to = %new_status, "Refusing backwards status change");
            return false;
        }

        record.mark(new_status, Utc::now());
        let updated = record.clone();

        for cached in state.pages.values_mut() {
            for r in cached.data.records.iter_mut().filter(|r| r.id == id) {
                *r = updated.clone();
            }
        }
        if let Some(ref mut stats) = state.stats {
            stats.data.shift(old_status, new_status);
        }

        debug!(id = %id, from = %old_status, to = %new_status, "Applied status update");
        true
    }

    /// Drop all data and abandon running fetches. Used on logout.
    pub fn clear(&self) {
        let stale_tasks = self.state().reset();
        for task in stale_tasks {
            task.abort();
        }
        debug!("Complaint cache cleared");
    }

    /// True until a fetch succeeds, and again once the TTL has passed since
    /// the last successful fetch.
    pub fn is_stale(&self) -> bool {
        self.state()
            .last_fetch
            .map_or(true, |at| at.elapsed() >= self.config.ttl)
    }

    pub fn hostel(&self) -> Option<String> {
        self.state().scope.clone()
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.state().stats.as_ref().map(|cached| cached.data)
    }

    pub fn complaints(&self) -> Vec<ComplaintRecord> {
        self.state().records.clone()
    }

    /// Shown complaints matching `filter`.
    pub fn filtered(&self, filter: &ComplaintFilter) -> Vec<ComplaintRecord> {
        let state = self.state();
        filter.apply(&state.records).into_iter().cloned().collect()
    }

    pub fn error(&self) -> Option<CacheError> {
        self.state().error()
    }

    /// Time since `page` was fetched, if it is cached.
    pub fn page_age(&self, page: u32) -> Option<Duration> {
        self.state().pages.get(&page).map(|cached| cached.age())
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let state = self.state();
        CacheSnapshot {
            hostel: state.scope.clone(),
            records: state.records.clone(),
            stats: state.stats.as_ref().map(|cached| cached.data),
            pagination: state.pagination.clone(),
            current_page: state.current_page,
            is_loading_stats: state.stats_in_flight.is_some(),
            is_loading_complaints: !state.pages_in_flight.is_empty(),
            is_stale: state
                .last_fetch
                .map_or(true, |at| at.elapsed() >= self.config.ttl),
            error: state.error(),
            stats_age: state.stats.as_ref().map(|cached| cached.age_display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    const HOSTEL: &str = "16B";

    /// Counts requests and answers after a short (virtual) delay.
    struct FakeSource {
        stats_calls: AtomicUsize,
        page_calls: Mutex<Vec<(String, u32)>>,
        fail: AtomicBool,
        /// The next this-many stats requests fail
        failing_stats: AtomicUsize,
        delay: Duration,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                stats_calls: AtomicUsize::new(0),
                page_calls: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                failing_stats: AtomicUsize::new(0),
                delay: Duration::from_millis(10),
            })
        }

        fn stats_calls(&self) -> usize {
            self.stats_calls.load(Ordering::SeqCst)
        }

        fn page_calls(&self) -> usize {
            self.page_calls.lock().unwrap().len()
        }
    }

    fn record(id: i64, status: ComplaintStatus) -> ComplaintRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "status": status.as_str(),
            "category": "Electrical",
            "subcategory": "Fan",
            "student_roll": "21CS1042",
            "room_number": 214
        }))
        .unwrap()
    }

    #[async_trait]
    impl ComplaintSource for FakeSource {
        async fn fetch_stats(&self, _hostel: &str) -> Result<StatsSnapshot, ApiError> {
            self.stats_calls.fetch_add(1, Ordering::SeqCst);
            let fail_once = self
                .failing_stats
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            tokio::time::sleep(self.delay).await;
            if fail_once || self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::ServerError("worker unavailable".to_string()));
            }
            Ok(StatsSnapshot {
                total: 10,
                pending: 4,
                in_progress: 3,
                resolved: 2,
                rejected: 1,
            })
        }

        async fn fetch_complaints(
            &self,
            hostel: &str,
            page: u32,
            limit: u32,
        ) -> Result<ComplaintPage, ApiError> {
            self.page_calls.lock().unwrap().push((hostel.to_string(), page));
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::ServerError("worker unavailable".to_string()));
            }
            let base = i64::from(page) * 100;
            Ok(ComplaintPage {
                records: vec![
                    record(base + 1, ComplaintStatus::Pending),
                    record(base + 2, ComplaintStatus::InProgress),
                ],
                pagination: Pagination {
                    page,
                    limit,
                    total: 30,
                    total_pages: 3,
                },
            })
        }
    }

    fn cache_with(source: &Arc<FakeSource>) -> ComplaintCache {
        ComplaintCache::new(source.clone(), CacheConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_load_stats_within_ttl_hits_network_once() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        for _ in 0..5 {
            let stats = cache.load_stats(HOSTEL, false).await.unwrap();
            assert_eq!(stats.total, 10);
        }
        assert_eq!(source.stats_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_load_stats_share_one_request() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        let (a, b, c) = tokio::join!(
            cache.load_stats(HOSTEL, false),
            cache.load_stats(HOSTEL, false),
            cache.load_stats(HOSTEL, true),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert!(c.is_ok());
        assert_eq!(source.stats_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_initialize_is_deduplicated() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        let (a, b) = tokio::join!(cache.initialize(HOSTEL), cache.initialize(HOSTEL));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.stats_calls(), 1);
        assert_eq!(source.page_calls(), 0);

        // Fresh stats make a later initialize a no-op
        cache.initialize(HOSTEL).await.unwrap();
        assert_eq!(source.stats_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staleness_window() {
        let source = FakeSource::new();
        let cache = cache_with(&source);
        assert!(cache.is_stale());

        cache.load_stats(HOSTEL, false).await.unwrap();
        assert!(!cache.is_stale());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!cache.is_stale());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.is_stale());

        cache.load_stats(HOSTEL, false).await.unwrap();
        assert_eq!(source.stats_calls(), 2);

        cache.clear();
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_ttl_is_honoured() {
        let source = FakeSource::new();
        let cache = ComplaintCache::new(
            source.clone(),
            CacheConfig {
                ttl: Duration::from_secs(1),
                page_size: DEFAULT_PAGE_SIZE,
            },
        );

        cache.load_stats(HOSTEL, false).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.is_stale());
        cache.load_stats(HOSTEL, false).await.unwrap();
        assert_eq!(source.stats_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_then_load_complaints_fetches_each_once() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        cache.initialize(HOSTEL).await.unwrap();
        assert_eq!(source.stats_calls(), 1);
        assert_eq!(source.page_calls(), 0);

        let page = cache.load_complaints(HOSTEL, false, 1).await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(source.stats_calls(), 1);
        assert_eq!(source.page_calls(), 1);
        assert_eq!(source.stats_calls() + source.page_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_complaints_waits_for_running_stats() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        let (init, page) = tokio::join!(
            cache.initialize(HOSTEL),
            cache.load_complaints(HOSTEL, false, 1),
        );
        assert!(init.is_ok());
        assert_eq!(page.unwrap().pagination.page, 1);
        assert_eq!(source.stats_calls(), 1);
        assert_eq!(source.page_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_complaints_from_cold_fetches_stats_too() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        cache.load_complaints(HOSTEL, false, 1).await.unwrap();
        assert_eq!(source.stats_calls(), 1);
        assert_eq!(source.page_calls(), 1);

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.hostel.as_deref(), Some(HOSTEL));
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.current_page, Some(1));
        assert_eq!(snapshot.stats.map(|s| s.total), Some(10));
        assert!(!snapshot.is_loading_stats);
        assert!(!snapshot.is_loading_complaints);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_page_twice_hits_network_once() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        cache.load_page(HOSTEL, 2).await.unwrap();
        cache.load_page(HOSTEL, 2).await.unwrap();
        assert_eq!(source.page_calls(), 1);
        assert_eq!(source.stats_calls(), 0);
        assert_eq!(cache.complaints()[0].id, ComplaintId(201));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_load_page_shares_one_request() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        let (a, b) = tokio::join!(cache.load_page(HOSTEL, 3), cache.load_page(HOSTEL, 3));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.page_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_navigation_serves_cached_pages() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        cache.load_complaints(HOSTEL, false, 1).await.unwrap();
        cache.load_page(HOSTEL, 2).await.unwrap();
        assert_eq!(cache.snapshot().current_page, Some(2));

        cache.load_page(HOSTEL, 1).await.unwrap();
        assert_eq!(cache.snapshot().current_page, Some(1));
        assert_eq!(cache.complaints()[0].id, ComplaintId(101));
        assert_eq!(source.page_calls(), 2);
        assert_eq!(source.stats_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_always_hits_network() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        cache.load_complaints(HOSTEL, false, 1).await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.page_age(1).unwrap() >= Duration::from_secs(60));

        cache.refresh(HOSTEL, 1).await.unwrap();
        assert_eq!(source.stats_calls(), 2);
        assert_eq!(source.page_calls(), 2);
        assert!(!cache.is_stale());
        assert!(cache.page_age(1).unwrap() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_status_update_adjusts_stats() {
        let source = FakeSource::new();
        let cache = cache_with(&source);
        cache.load_complaints(HOSTEL, false, 1).await.unwrap();

        assert!(cache.apply_status_update(ComplaintId(102), ComplaintStatus::Resolved));

        let stats = cache.stats().unwrap();
        assert_eq!(stats.in_progress, 2);
        assert_eq!(stats.resolved, 3);
        assert_eq!(stats.total, 10);

        let updated = cache.get_by_id(ComplaintId(102)).unwrap();
        assert_eq!(updated.status, ComplaintStatus::Resolved);
        assert!(updated.resolved_at.is_some());

        // The page cache carries the change too
        cache.load_page(HOSTEL, 1).await.unwrap();
        assert_eq!(
            cache.get_by_id(ComplaintId(102)).map(|r| r.status),
            Some(ComplaintStatus::Resolved)
        );
        assert_eq!(source.page_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_status_update_for_unknown_id_changes_nothing() {
        let source = FakeSource::new();
        let cache = cache_with(&source);
        cache.load_complaints(HOSTEL, false, 1).await.unwrap();

        let stats_before = cache.stats();
        let records_before = cache.complaints();

        assert!(!cache.apply_status_update(ComplaintId(999), ComplaintStatus::Resolved));
        assert_eq!(cache.stats(), stats_before);
        assert_eq!(cache.complaints(), records_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_status_update_refuses_regression() {
        let source = FakeSource::new();
        let cache = cache_with(&source);
        cache.load_complaints(HOSTEL, false, 1).await.unwrap();

        let stats_before = cache.stats();
        assert!(!cache.apply_status_update(ComplaintId(102), ComplaintStatus::Pending));
        assert_eq!(cache.stats(), stats_before);
        assert_eq!(
            cache.get_by_id(ComplaintId(102)).map(|r| r.status),
            Some(ComplaintStatus::InProgress)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_is_recorded_and_flags_cleared() {
        let source = FakeSource::new();
        source.fail.store(true, Ordering::SeqCst);
        let cache = cache_with(&source);

        let result = cache.load_complaints(HOSTEL, false, 1).await;
        assert!(matches!(result, Err(CacheError::Fetch(_))));

        let snapshot = cache.snapshot();
        assert!(snapshot.error.is_some());
        assert!(!snapshot.is_loading_stats);
        assert!(!snapshot.is_loading_complaints);
        assert!(snapshot.is_stale);

        source.fail.store(false, Ordering::SeqCst);
        cache.refresh(HOSTEL, 1).await.unwrap();
        assert!(cache.error().is_none());
        assert_eq!(cache.complaints().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_failure_still_returns_complaints() {
        let source = FakeSource::new();
        source.failing_stats.store(1, Ordering::SeqCst);
        let cache = cache_with(&source);

        let page = cache.load_complaints(HOSTEL, false, 1).await.unwrap();
        assert_eq!(page.records.len(), 2);

        // The page succeeding must not hide the stats failure
        let snapshot = cache.snapshot();
        assert!(matches!(snapshot.error, Some(CacheError::Fetch(_))));
        assert!(snapshot.stats.is_none());
        assert_eq!(snapshot.records.len(), 2);
        assert!(!snapshot.is_loading_stats);
        assert!(!snapshot.is_loading_complaints);

        cache.load_stats(HOSTEL, false).await.unwrap();
        assert!(cache.error().is_none());
        assert_eq!(source.stats_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_running_stats_are_fetched_again() {
        let source = FakeSource::new();
        source.failing_stats.store(1, Ordering::SeqCst);
        let cache = cache_with(&source);

        let (init, page) = tokio::join!(
            cache.initialize(HOSTEL),
            cache.load_complaints(HOSTEL, false, 1),
        );
        assert!(matches!(init, Err(CacheError::Fetch(_))));
        assert_eq!(page.unwrap().records.len(), 2);

        // The awaited fetch failed, so the listing started its own
        assert_eq!(source.stats_calls(), 2);
        assert_eq!(source.page_calls(), 1);
        assert_eq!(cache.stats().map(|s| s.total), Some(10));
        assert!(cache.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_by_id_does_not_fetch() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        assert!(cache.get_by_id(ComplaintId(101)).is_none());
        assert_eq!(source.page_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_change_drops_previous_hostel() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        cache.load_complaints(HOSTEL, false, 1).await.unwrap();
        cache.initialize("17A").await.unwrap();

        assert_eq!(cache.hostel().as_deref(), Some("17A"));
        assert!(cache.complaints().is_empty());
        assert_eq!(source.stats_calls(), 2);

        cache.load_page("17A", 1).await.unwrap();
        let last = source.page_calls.lock().unwrap().last().cloned();
        assert_eq!(last, Some(("17A".to_string(), 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_in_flight_results() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        let loader = cache.clone();
        let handle = tokio::spawn(async move { loader.load_stats(HOSTEL, false).await });
        // Let the load start; the fake source is still sleeping at 1ms
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(cache.snapshot().is_loading_stats);

        cache.clear();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CacheError::Discarded)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = cache.snapshot();
        assert!(snapshot.stats.is_none());
        assert!(snapshot.hostel.is_none());
        assert!(!snapshot.is_loading_stats);
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_in_flight_page() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        let loader = cache.clone();
        let handle = tokio::spawn(async move { loader.load_complaints(HOSTEL, false, 1).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(cache.snapshot().is_loading_complaints);

        cache.clear();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CacheError::Discarded)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = cache.snapshot();
        assert!(snapshot.records.is_empty());
        assert!(snapshot.pagination.is_none());
        assert!(!snapshot.is_loading_complaints);
        assert!(cache.page_age(1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scope_change_discards_in_flight_page() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        let loader = cache.clone();
        let handle = tokio::spawn(async move { loader.load_page(HOSTEL, 1).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(cache.snapshot().is_loading_complaints);

        cache.initialize("17A").await.unwrap();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CacheError::Discarded)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cache.hostel().as_deref(), Some("17A"));
        assert!(cache.complaints().is_empty());
        assert!(cache.page_age(1).is_none());
        assert!(!cache.snapshot().is_loading_complaints);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_hostel_is_rejected() {
        let source = FakeSource::new();
        let cache = cache_with(&source);

        assert!(matches!(cache.initialize("  ").await, Err(CacheError::EmptyScope)));
        assert_eq!(source.stats_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filtered_applies_to_shown_page() {
        let source = FakeSource::new();
        let cache = cache_with(&source);
        cache.load_complaints(HOSTEL, false, 1).await.unwrap();

        let filter = ComplaintFilter {
            status: Some(ComplaintStatus::Pending),
            ..Default::default()
        };
        let pending = cache.filtered(&filter);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ComplaintId(101));
    }
}
