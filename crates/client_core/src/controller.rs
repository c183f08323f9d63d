//! List view state machine: pagination, filters, debounced search and
//! client-side sort over an offset-paginated endpoint.
//!
//! Every fetch carries a generation number; only the response of the newest
//! generation is applied, so overlapping requests resolve last-write-wins.
//! Background tasks hold weak references to the controller state and stop
//! touching it once the controller is dropped.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{Filter, SortKey, UserRole, UserStatus},
    protocol::PageMeta,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::{
    cache::{QueryCache, DEFAULT_CACHE_CAPACITY},
    debounce::Debouncer,
    error::ClientResult,
    pagination::PageResult,
    query::{clamp_page, ListQuery, PageParams, DEFAULT_PAGE_SIZE, SEARCH_DEBOUNCE},
    sort::{sort_page, ListItem},
    summary::DerivedSummary,
};

#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    type Item: ListItem + Clone + Send + Sync + 'static;

    async fn fetch_page(&self, params: &PageParams) -> ClientResult<PageResult<Self::Item>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub page_size: u32,
    pub debounce: Duration,
    pub cache_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: SEARCH_DEBOUNCE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Immutable snapshot handed to presentation code.
#[derive(Debug, Clone)]
pub struct ListView<T> {
    pub status: FetchStatus,
    pub query: ListQuery,
    /// Current page in display order.
    pub items: Vec<T>,
    /// Current page in server order.
    pub raw_items: Vec<T>,
    pub meta: Option<PageMeta>,
    pub error: Option<String>,
    pub summary: DerivedSummary,
    pub can_go_prev: bool,
    pub can_go_next: bool,
}

impl<T> ListView<T> {
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, FetchStatus::Success | FetchStatus::Error)
    }

    pub fn current_page(&self) -> u32 {
        self.query.page
    }
}

struct ControllerState<T> {
    query: ListQuery,
    status: FetchStatus,
    started: bool,
    result: Option<PageResult<T>>,
    error: Option<String>,
    requested: Option<PageParams>,
    generation: u64,
    cache: QueryCache<T>,
    debounce: Debouncer,
}

impl<T: ListItem + Clone> ControllerState<T> {
    fn view(&self) -> ListView<T> {
        let raw_items = self
            .result
            .as_ref()
            .map(|page| page.items.clone())
            .unwrap_or_default();
        let meta = self.result.as_ref().map(|page| page.meta.clone());
        let summary = DerivedSummary::compute(&raw_items, meta.as_ref(), Utc::now());
        let can_go_prev = meta
            .as_ref()
            .and_then(|meta| meta.has_prev)
            .unwrap_or(self.query.page > 1);
        let can_go_next = meta.as_ref().and_then(|meta| meta.has_next).unwrap_or(false);

        ListView {
            status: self.status,
            query: self.query.clone(),
            items: sort_page(&raw_items, self.query.sort),
            raw_items,
            meta,
            error: self.error.clone(),
            summary,
            can_go_prev,
            can_go_next,
        }
    }
}

struct Shared<S: PageSource> {
    source: Arc<S>,
    state: Mutex<ControllerState<S::Item>>,
    view: watch::Sender<ListView<S::Item>>,
    closed: AtomicBool,
}

impl<S: PageSource> Shared<S> {
    fn publish(&self, state: &ControllerState<S::Item>) {
        self.view.send_replace(state.view());
    }

    /// Issues a fetch when the fetch-relevant parameters differ from the last
    /// request, or unconditionally when `force` is set.
    fn sync(self: &Arc<Self>, state: &mut ControllerState<S::Item>, force: bool) {
        if !state.started {
            self.publish(state);
            return;
        }

        let params = state.query.params();
        if !force && state.requested.as_ref() == Some(&params) {
            self.publish(state);
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        state.requested = Some(params.clone());
        state.status = FetchStatus::Loading;
        state.error = None;
        if let Some(cached) = state.cache.get(&params) {
            state.result = Some(cached.clone());
        }
        self.publish(state);

        debug!(generation, query = %params.cache_key(), "issuing list fetch");
        let source = Arc::clone(&self.source);
        let shared = Arc::downgrade(self);
        tokio::spawn(async move {
            let outcome = source.fetch_page(&params).await;
            if let Some(shared) = shared.upgrade() {
                shared.resolve(generation, params, outcome).await;
            }
        });
    }

    async fn resolve(
        &self,
        generation: u64,
        params: PageParams,
        outcome: ClientResult<PageResult<S::Item>>,
    ) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock().await;
        if generation != state.generation {
            debug!(
                generation,
                latest = state.generation,
                "discarding stale list response"
            );
            return;
        }

        match outcome {
            Ok(page) => {
                state.cache.insert(params, page.clone());
                state.result = Some(page);
                state.status = FetchStatus::Success;
            }
            Err(err) if err.is_unauthorized() => {
                debug!(query = %params.cache_key(), "list requires a session; showing it empty");
                let page = PageResult::empty();
                state.cache.insert(params, page.clone());
                state.result = Some(page);
                state.status = FetchStatus::Success;
            }
            Err(err) => {
                warn!(error = %err, query = %params.cache_key(), "list fetch failed");
                state.result = None;
                state.error = Some(err.to_string());
                state.status = FetchStatus::Error;
            }
        }
        self.publish(&state);
    }

    async fn commit_search(self: &Arc<Self>, value: String) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.state.lock().await;
        if state.query.debounced_search != value {
            state.query.debounced_search = value;
            state.query.page = 1;
        }
        self.sync(&mut state, false);
    }
}

/// Owns one list view's query state and its fetches.
///
/// The controller starts out [`FetchStatus::Idle`]; setters only record state
/// until [`ListQueryController::start`] issues the first fetch.
pub struct ListQueryController<S: PageSource> {
    shared: Arc<Shared<S>>,
}

impl<S: PageSource> ListQueryController<S> {
    pub fn new(source: Arc<S>, options: ControllerOptions) -> Self {
        let query = ListQuery::new(options.page_size);
        Self::with_query(source, options, query)
    }

    pub fn with_query(source: Arc<S>, options: ControllerOptions, query: ListQuery) -> Self {
        let state = ControllerState {
            query,
            status: FetchStatus::Idle,
            started: false,
            result: None,
            error: None,
            requested: None,
            generation: 0,
            cache: QueryCache::new(options.cache_capacity),
            debounce: Debouncer::new(options.debounce),
        };
        let (view, _) = watch::channel(state.view());
        Self {
            shared: Arc::new(Shared {
                source,
                state: Mutex::new(state),
                view,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Issues the initial fetch. Later calls are no-ops unless the query changed.
    pub async fn start(&self) {
        let mut state = self.shared.state.lock().await;
        state.started = true;
        self.shared.sync(&mut state, false);
    }

    pub async fn set_search_term(&self, value: impl Into<String>) {
        let value = value.into();
        let mut state = self.shared.state.lock().await;
        state.query.raw_search.clone_from(&value);

        let shared = Arc::downgrade(&self.shared);
        state.debounce.schedule(async move {
            if let Some(shared) = shared.upgrade() {
                shared.commit_search(value).await;
            }
        });
        self.shared.publish(&state);
    }

    pub async fn set_role_filter(&self, role: Filter<UserRole>) {
        let mut state = self.shared.state.lock().await;
        if state.query.role != role {
            state.query.role = role;
            state.query.page = 1;
        }
        self.shared.sync(&mut state, false);
    }

    pub async fn set_status_filter(&self, status: Filter<UserStatus>) {
        let mut state = self.shared.state.lock().await;
        if state.query.status != status {
            state.query.status = status;
            state.query.page = 1;
        }
        self.shared.sync(&mut state, false);
    }

    /// Re-sorts the current page; never fetches.
    pub async fn set_sort_by(&self, sort: SortKey) {
        let mut state = self.shared.state.lock().await;
        state.query.sort = sort;
        self.shared.publish(&state);
    }

    pub async fn set_current_page(&self, page: i64) {
        self.move_page(|_| page).await;
    }

    pub async fn go_next(&self) {
        self.move_page(|current| current + 1).await;
    }

    pub async fn go_prev(&self) {
        self.move_page(|current| current - 1).await;
    }

    /// The target page is derived from the query under the same lock that
    /// stores it, so back-to-back steps never read a stale page.
    async fn move_page(&self, target: impl FnOnce(i64) -> i64) {
        let mut state = self.shared.state.lock().await;
        state.query.page = clamp_page(target(i64::from(state.query.page)));
        self.shared.sync(&mut state, false);
    }

    /// Restores the default query in one step, dropping any pending search.
    pub async fn reset_filters(&self) {
        let mut state = self.shared.state.lock().await;
        state.debounce.cancel();
        state.query = state.query.reset();
        self.shared.sync(&mut state, false);
    }

    /// Re-issues the last fetch with unchanged parameters.
    pub async fn retry(&self) {
        let mut state = self.shared.state.lock().await;
        let force = state.requested.is_some();
        self.shared.sync(&mut state, force);
    }

    pub fn snapshot(&self) -> ListView<S::Item> {
        self.shared.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListView<S::Item>> {
        self.shared.view.subscribe()
    }

    /// Waits until the latest fetch resolved. Never returns for a controller
    /// that was not started.
    pub async fn wait_settled(&self) -> ListView<S::Item> {
        let mut views = self.subscribe();
        loop {
            {
                let view = views.borrow_and_update();
                if view.is_settled() {
                    return view.clone();
                }
            }
            if views.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    /// Shows what the cache holds for `params` without fetching.
    pub async fn cached(&self, params: &PageParams) -> Option<PageResult<S::Item>> {
        self.shared.state.lock().await.cache.get(params).cloned()
    }
}

impl<S: PageSource> Drop for ListQueryController<S> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Ok(mut state) = self.shared.state.try_lock() {
            state.debounce.cancel();
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
