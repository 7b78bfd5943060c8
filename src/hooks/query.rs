//! Data-fetching hook.
//!
//! Built from the reducer, ref and effect hooks plus the engine's local
//! executor. One run is a single driver future: fetch, retry with delay while
//! retries remain, then optionally sleep and refetch on an interval. Aborting
//! drops the whole driver.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{AbortHandle, LocalBoxFuture, abortable};
use thiserror::Error;
use tracing::debug;

use super::{Deps, Dispatch, Hooks, UpdateQueue};
use crate::error::{FlactError, FlactResult};

/// Default delay between retries of a failed fetch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Failure reported by a query fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query failed: {0}")]
    Failed(String),
    #[error("query was aborted")]
    Aborted,
}

impl QueryError {
    pub fn failed(message: impl fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}

// =============================================================================
// State
// =============================================================================

/// Observable state of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub is_loading: bool,
    pub is_success: bool,
    pub is_error: bool,
    pub is_refetching: bool,
    pub data: Option<T>,
    pub error: Option<QueryError>,
}

impl<T> QueryState<T> {
    fn initial(enabled: bool) -> Self {
        Self {
            is_loading: enabled,
            is_success: false,
            is_error: false,
            is_refetching: false,
            data: None,
            error: None,
        }
    }
}

enum QueryAction<T> {
    Loading,
    Refetching,
    Success(T),
    Set(T),
    Error(QueryError),
}

fn query_reducer<T: Clone>(state: &QueryState<T>, action: QueryAction<T>) -> QueryState<T> {
    let mut next = state.clone();
    match action {
        QueryAction::Loading => next.is_loading = true,
        QueryAction::Refetching => next.is_refetching = true,
        QueryAction::Success(data) => {
            next.data = Some(data);
            next.is_success = true;
            next.is_loading = false;
            next.is_refetching = false;
            next.is_error = false;
            next.error = None;
        }
        QueryAction::Set(data) => next.data = Some(data),
        QueryAction::Error(error) => {
            next.error = Some(error);
            next.is_error = true;
            next.is_success = false;
            next.is_refetching = false;
            next.is_loading = false;
        }
    }
    next
}

// =============================================================================
// Options
// =============================================================================

/// Options of [`Hooks::use_query`].
pub struct QueryOptions<T> {
    enabled: bool,
    retry: u32,
    retry_delay: Duration,
    refetch_interval: Option<Duration>,
    keys: Deps,
    on_success: Option<Rc<dyn Fn(&T)>>,
    on_error: Option<Rc<dyn Fn(&QueryError)>>,
    select: Option<Rc<dyn Fn(T) -> T>>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            refetch_interval: None,
            keys: Deps::once(),
            on_success: None,
            on_error: None,
            select: None,
        }
    }
}

impl<T> QueryOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch automatically on mount and when `keys` change (default `true`)
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Number of retries after a failed fetch
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Refetch this long after every success
    pub fn refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }

    /// Dependencies that restart the query when they change
    pub fn keys(mut self, keys: Deps) -> Self {
        self.keys = keys;
        self
    }

    pub fn on_success(mut self, f: impl Fn(&T) + 'static) -> Self {
        self.on_success = Some(Rc::new(f));
        self
    }

    /// Called for every failed attempt, retried or not
    pub fn on_error(mut self, f: impl Fn(&QueryError) + 'static) -> Self {
        self.on_error = Some(Rc::new(f));
        self
    }

    /// Transform fetched data before it is stored
    pub fn select(mut self, f: impl Fn(T) -> T + 'static) -> Self {
        self.select = Some(Rc::new(f));
        self
    }
}

/// Per-render settings the driver reads at each step.
struct Settings<T> {
    retry: u32,
    retry_delay: Duration,
    refetch_interval: Option<Duration>,
    on_success: Option<Rc<dyn Fn(&T)>>,
    on_error: Option<Rc<dyn Fn(&QueryError)>>,
    select: Option<Rc<dyn Fn(T) -> T>>,
}

impl<T> Clone for Settings<T> {
    fn clone(&self) -> Self {
        Self {
            retry: self.retry,
            retry_delay: self.retry_delay,
            refetch_interval: self.refetch_interval,
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            select: self.select.clone(),
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

type Fetcher<T> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<T, QueryError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Init,
    Refetch,
}

struct QueryCore<T> {
    dispatch: Dispatch<QueryAction<T>>,
    queue: Weak<dyn UpdateQueue>,
    fetcher: RefCell<Option<Fetcher<T>>>,
    settings: RefCell<Option<Settings<T>>>,
    current: Cell<Option<RunKind>>,
    retries_left: Cell<u32>,
    in_flight: RefCell<Option<AbortHandle>>,
}

impl<T: Clone + 'static> QueryCore<T> {
    fn settings(&self) -> Option<Settings<T>> {
        self.settings.borrow().clone()
    }

    fn abort(&self) {
        if let Some(handle) = self.in_flight.borrow_mut().take() {
            handle.abort();
        }
    }

    fn begin(&self, kind: RunKind) {
        if self.current.get() != Some(kind) {
            self.current.set(Some(kind));
            self.dispatch.dispatch(match kind {
                RunKind::Init => QueryAction::Loading,
                RunKind::Refetch => QueryAction::Refetching,
            });
        }
    }

    fn run(self: &Rc<Self>, kind: RunKind) {
        self.abort();
        let Some(queue) = self.queue.upgrade() else {
            return;
        };
        let retry = self.settings.borrow().as_ref().map_or(0, |s| s.retry);
        self.retries_left.set(retry);

        let (driver, handle) = abortable(Rc::clone(self).drive(kind, queue.clone()));
        *self.in_flight.borrow_mut() = Some(handle);
        queue.spawn_local(Box::pin(async move {
            if driver.await.is_err() {
                debug!("query run aborted");
            }
        }));
    }

    async fn drive(self: Rc<Self>, mut kind: RunKind, queue: Rc<dyn UpdateQueue>) {
        let platform = queue.platform();
        drop(queue);
        loop {
            let Some(fetcher) = self.fetcher.borrow().clone() else {
                return;
            };
            self.begin(kind);
            let result = fetcher().await;
            let Some(settings) = self.settings() else {
                return;
            };

            match result {
                Ok(data) => {
                    let stored = match &settings.select {
                        Some(select) => select(data.clone()),
                        None => data.clone(),
                    };
                    self.dispatch.dispatch(QueryAction::Success(stored));
                    if let Some(on_success) = &settings.on_success {
                        on_success(&data);
                    }
                    self.current.set(None);
                    let Some(interval) = settings.refetch_interval else {
                        return;
                    };
                    platform.sleep(interval).await;
                    kind = RunKind::Refetch;
                }
                Err(error) => {
                    let retries_left = self.retries_left.get();
                    if retries_left == 0 {
                        self.dispatch.dispatch(QueryAction::Error(error.clone()));
                        self.current.set(None);
                    }
                    if let Some(on_error) = &settings.on_error {
                        on_error(&error);
                    }
                    if retries_left == 0 {
                        return;
                    }
                    self.retries_left.set(retries_left - 1);
                    platform.sleep(settings.retry_delay).await;
                }
            }
        }
    }
}

// =============================================================================
// Hook
// =============================================================================

/// Result of [`Hooks::use_query`]: state of this render plus controls.
pub struct Query<T> {
    state: QueryState<T>,
    core: Rc<QueryCore<T>>,
}

impl<T: Clone + 'static> Query<T> {
    pub fn state(&self) -> &QueryState<T> {
        &self.state
    }

    /// Start a fresh run (cancels the current one).
    pub fn call(&self) {
        self.core.run(RunKind::Init);
    }

    /// Start a refetch run (cancels the current one).
    pub fn refetch(&self) {
        self.core.run(RunKind::Refetch);
    }

    /// Cancel the in-flight fetch, retry delay or refetch timer.
    pub fn abort(&self) {
        self.core.abort();
    }

    /// Replace loaded data. Fails before the first successful fetch.
    pub fn set_data(&self, f: impl FnOnce(&T) -> T) -> FlactResult<()> {
        let Some(data) = &self.state.data else {
            return Err(FlactError::QueryDataMissing);
        };
        self.core.dispatch.dispatch(QueryAction::Set(f(data)));
        Ok(())
    }
}

impl<T> Deref for Query<T> {
    type Target = QueryState<T>;

    fn deref(&self) -> &QueryState<T> {
        &self.state
    }
}

impl<T> Clone for Query<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Query").field(&self.state).finish()
    }
}

impl Hooks<'_> {
    /// Fetch data asynchronously and expose loading/success/error state.
    ///
    /// With `enabled` (the default) a run starts after mount and again
    /// whenever `keys` change. Unmounting aborts everything in flight.
    pub fn use_query<T, F, Fut>(&mut self, fetch: F, options: QueryOptions<T>) -> Query<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, QueryError>> + 'static,
    {
        let QueryOptions {
            enabled,
            retry,
            retry_delay,
            refetch_interval,
            keys,
            on_success,
            on_error,
            select,
        } = options;

        let (state, dispatch) = self.use_reducer(query_reducer::<T>, || QueryState::initial(enabled));
        let queue = self.owner().queue.clone();
        let core = self
            .use_ref(|| {
                Rc::new(QueryCore {
                    dispatch,
                    queue,
                    fetcher: RefCell::new(None),
                    settings: RefCell::new(None),
                    current: Cell::new(None),
                    retries_left: Cell::new(0),
                    in_flight: RefCell::new(None),
                })
            })
            .current();

        let fetcher: Fetcher<T> = Rc::new(move || fetch().boxed_local());
        *core.fetcher.borrow_mut() = Some(fetcher);
        *core.settings.borrow_mut() = Some(Settings {
            retry,
            retry_delay,
            refetch_interval,
            on_success,
            on_error,
            select,
        });

        let effect_core = Rc::clone(&core);
        self.use_effect(keys, move || {
            if enabled {
                effect_core.run(RunKind::Init);
            }
            move || effect_core.abort()
        });

        Query { state, core }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducer_transitions() {
        let s = QueryState::<i32>::initial(true);
        assert!(s.is_loading);

        let s = query_reducer(&s, QueryAction::Success(3));
        assert!(s.is_success && !s.is_loading);
        assert_eq!(s.data, Some(3));

        let s = query_reducer(&s, QueryAction::Refetching);
        assert!(s.is_refetching);

        let s = query_reducer(&s, QueryAction::Error(QueryError::failed("down")));
        assert!(s.is_error && !s.is_success && !s.is_refetching);
        assert_eq!(s.data, Some(3));

        let s = query_reducer(&s, QueryAction::Set(4));
        assert_eq!(s.data, Some(4));
        assert!(s.is_error);
    }

    #[test]
    fn test_options_defaults() {
        let opts = QueryOptions::<i32>::new();
        assert!(opts.enabled);
        assert_eq!(opts.retry, 0);
        assert_eq!(opts.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(opts.keys.len(), Some(0));
    }
}
