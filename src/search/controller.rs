//! Search controller
//!
//! Turns "input changed" events into cache lookups and debounced fetches, and
//! owns the state the presentation layer renders.
//!
//! Every input event bumps a generation counter. A fetch remembers the
//! generation it was issued under and may only touch display state while that
//! generation is still current, so a slow lookup for an old term can never
//! overwrite the results of a newer one.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::search::cache::QueryCache;
use crate::search::debounce::{DebounceError, Debouncer};
use crate::search::source::{LookupError, SuggestionSource};
use crate::search::types::{Query, SuggestionList};

/// Coarse phase of the controller, derived from [`SearchState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Error,
    Ready,
}

/// State rendered by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchState {
    /// Input text of the latest non-empty event, `None` after an empty one
    pub term: Option<String>,
    pub results: SuggestionList,
    pub is_loading: bool,
    pub error: Option<LookupError>,
    #[serde(skip)]
    generation: u64,
}

impl SearchState {
    pub fn phase(&self) -> Phase {
        if self.is_loading {
            Phase::Loading
        } else if self.error.is_some() {
            Phase::Error
        } else if self.term.is_none() {
            Phase::Idle
        } else {
            Phase::Ready
        }
    }

    /// Number of input events seen so far
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Counters describing how inputs were served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub inputs: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fetches_applied: u64,
    pub stale_discarded: u64,
    pub superseded: u64,
    /// Fetches lost because their timer task was dropped
    pub dropped: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    inputs: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fetches_applied: AtomicU64,
    stale_discarded: AtomicU64,
    superseded: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

impl StatsCounters {
    fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ControllerStats {
        ControllerStats {
            inputs: self.inputs.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            fetches_applied: self.fetches_applied.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

type FetchOutcome = Result<SuggestionList, LookupError>;

/// What an input event knew when it issued its fetch
#[derive(Debug, Clone)]
struct Ticket {
    generation: u64,
    query: Query,
    cache_hit: bool,
}

struct ControllerInner {
    state: watch::Sender<SearchState>,
    cache: Mutex<QueryCache>,
    fetcher: Debouncer<Query, FetchOutcome>,
    stats: StatsCounters,
}

/// Orchestrates input events, the query cache and debounced lookups
#[derive(Clone)]
pub struct SearchController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for SearchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchController")
            .field("state", &*self.inner.state.borrow())
            .field("cached_queries", &self.inner.cache.lock().len())
            .field("fetcher", &self.inner.fetcher)
            .finish()
    }
}

impl SearchController {
    /// Create a controller with an empty cache
    pub fn new(source: Arc<dyn SuggestionSource>, debounce: Duration) -> Self {
        Self::with_cache(source, debounce, QueryCache::new())
    }

    /// Create a controller with a pre-populated cache
    pub fn with_cache(
        source: Arc<dyn SuggestionSource>,
        debounce: Duration,
        cache: QueryCache,
    ) -> Self {
        let fetcher = Debouncer::new(debounce, move |query: Query| source.lookup(query.as_str()));
        let (state, _) = watch::channel(SearchState::default());

        Self {
            inner: Arc::new(ControllerInner {
                state,
                cache: Mutex::new(cache),
                fetcher,
                stats: StatsCounters::default(),
            }),
        }
    }

    /// Handle "input changed to `text`".
    ///
    /// State is updated before this returns: an empty input clears the term,
    /// a cache hit is displayed at once. Non-empty input also submits a
    /// debounced fetch whose completion is applied by the returned task.
    /// Must be called from within a tokio runtime.
    pub fn input_changed(&self, text: &str) -> Option<JoinHandle<()>> {
        let inner = &self.inner;
        StatsCounters::record(&inner.stats.inputs);

        let Some(query) = Query::parse(text) else {
            inner.state.send_modify(|state| {
                state.generation += 1;
                state.term = None;
                state.error = None;
                // Any in-flight fetch now belongs to an old generation
                state.is_loading = false;
            });
            tracing::debug!("empty input, keeping previous results");
            return None;
        };

        let cached = inner.cache.lock().get(&query).map(<[String]>::to_vec);
        let cache_hit = cached.is_some();
        if cache_hit {
            StatsCounters::record(&inner.stats.cache_hits);
        } else {
            StatsCounters::record(&inner.stats.cache_misses);
        }

        let mut generation = 0;
        inner.state.send_modify(|state| {
            state.generation += 1;
            generation = state.generation;
            state.term = Some(text.to_string());
            state.error = None;
            match cached {
                Some(results) => {
                    state.results = results;
                    state.is_loading = false;
                }
                None => state.is_loading = true,
            }
        });

        tracing::debug!(%query, generation, cache_hit, "input changed");

        let ticket = Ticket {
            generation,
            query: query.clone(),
            cache_hit,
        };
        let fetch = inner.fetcher.call(query);
        let inner = Arc::clone(inner);

        Some(tokio::spawn(async move {
            let outcome = fetch.await;
            inner.complete(ticket, outcome);
        }))
    }

    /// Current state
    pub fn snapshot(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn stats(&self) -> ControllerStats {
        self.inner.stats.snapshot()
    }

    /// Cached list for a raw query, if any
    pub fn cached(&self, raw: &str) -> Option<SuggestionList> {
        let query = Query::parse(raw)?;
        self.inner.cache.lock().get(&query).map(<[String]>::to_vec)
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.lock().len()
    }
}

impl ControllerInner {
    fn complete(&self, ticket: Ticket, outcome: Result<FetchOutcome, DebounceError>) {
        let fetched = match outcome {
            Ok(fetched) => fetched,
            Err(DebounceError::Superseded) => {
                StatsCounters::record(&self.stats.superseded);
                tracing::trace!(query = %ticket.query, "fetch superseded before it fired");
                return;
            }
            Err(DebounceError::Dropped) => {
                StatsCounters::record(&self.stats.dropped);
                tracing::warn!(query = %ticket.query, "fetch task dropped before completing");
                // Nothing will settle this generation any more
                self.state.send_if_modified(|state| {
                    let stuck = state.generation == ticket.generation && state.is_loading;
                    if stuck {
                        state.is_loading = false;
                    }
                    stuck
                });
                return;
            }
        };

        // The result is correct for its own query even when it is stale
        if let Ok(results) = &fetched
            && !results.is_empty()
            && self.cache.lock().put(&ticket.query, results.clone())
        {
            tracing::debug!(query = %ticket.query, count = results.len(), "cached results");
        }

        if let Err(error) = &fetched {
            StatsCounters::record(&self.stats.failures);
            tracing::info!(query = %ticket.query, %error, "lookup failed");
        }

        let applied = self.state.send_if_modified(|state| {
            if state.generation != ticket.generation {
                return false;
            }

            state.is_loading = false;
            match fetched {
                Ok(results) => {
                    // A cache hit already shows the best-known answer
                    if !ticket.cache_hit {
                        state.results = results;
                    }
                }
                Err(error) => state.error = Some(error),
            }
            true
        });

        if applied {
            StatsCounters::record(&self.stats.fetches_applied);
        } else {
            StatsCounters::record(&self.stats.stale_discarded);
            tracing::debug!(
                query = %ticket.query,
                generation = ticket.generation,
                "discarding stale fetch result"
            );
        }
    }
}
