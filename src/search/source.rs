//! Suggestion backends
//!
//! [`SuggestionSource`] is the seam between the controller and whatever
//! answers lookups. [`SimulatedSource`] stands in for a remote service: it
//! filters a fixed list of user names and injects latency and random
//! failures according to a [`SourceConfig`].

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, SourceConfig};
use crate::search::types::SuggestionList;

/// Status reported by a simulated backend failure
pub const FAILURE_STATUS: u16 = 500;

/// Built-in dataset of the simulated backend
pub const MOCK_USERS: &[&str] = &[
    "John Doe",
    "Jane Smith",
    "Alex Johnson",
    "Emily Brown",
    "Michael Williams",
    "Sarah Jones",
    "David Miller",
    "Emma Davis",
    "Daniel Garcia",
    "Olivia Martinez",
];

/// Failure of a single lookup
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupError {
    /// Recoverable backend failure; typing again issues a fresh lookup
    #[error("suggestion service unavailable (status {status})")]
    Transient { status: u16 },
}

/// Asynchronous lookup of suggestions for a normalized query
pub trait SuggestionSource: Send + Sync + 'static {
    fn lookup(&self, query: &str) -> BoxFuture<'static, Result<SuggestionList, LookupError>>;
}

/// Outcome decided up front for one simulated lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Roll {
    Fail,
    Respond { after: Duration },
}

/// Simulated remote suggestion service
#[derive(Debug)]
pub struct SimulatedSource {
    dataset: Arc<[String]>,
    config: SourceConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    /// Create a simulated source over [`MOCK_USERS`]
    pub fn new(config: SourceConfig) -> Result<Self, ConfigError> {
        Self::with_dataset(config, MOCK_USERS.iter().copied())
    }

    /// Create a simulated source over a custom dataset
    pub fn with_dataset<I, S>(config: SourceConfig, dataset: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            dataset: dataset.into_iter().map(Into::into).collect(),
            config,
            rng: Mutex::new(rng),
        })
    }

    /// Dataset entries containing the query, case-insensitively, in dataset order
    pub fn matches(&self, query: &str) -> SuggestionList {
        let needle = query.trim().to_lowercase();
        self.dataset
            .iter()
            .filter(|entry| entry.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    fn roll(&self) -> Roll {
        let mut rng = self.rng.lock();

        let roll = rng.random_range(0..self.config.failure_odds_denominator);
        if roll < self.config.failure_odds_numerator {
            return Roll::Fail;
        }

        let (min, max) = (self.config.min_latency_ms, self.config.max_latency_ms);
        let latency_ms = if max > min {
            rng.random_range(min..max)
        } else {
            min
        };

        Roll::Respond {
            after: Duration::from_millis(latency_ms),
        }
    }
}

impl SuggestionSource for SimulatedSource {
    fn lookup(&self, query: &str) -> BoxFuture<'static, Result<SuggestionList, LookupError>> {
        match self.roll() {
            Roll::Fail => {
                tracing::debug!(query, "simulated lookup failure");
                future::ready(Err(LookupError::Transient {
                    status: FAILURE_STATUS,
                }))
                .boxed()
            }
            Roll::Respond { after } => {
                let matches = self.matches(query);
                tracing::trace!(query, latency_ms = after.as_millis() as u64, "simulated lookup");
                async move {
                    tokio::time::sleep(after).await;
                    Ok(matches)
                }
                .boxed()
            }
        }
    }
}
