//! # Search Module
//!
//! The autocomplete query pipeline: keystrokes in, suggestion lists out.
//!
//! ## Key Components
//!
//! - [`source`] - Suggestion backends, including the simulated remote service
//! - [`debounce`] - Collapses bursts of calls into one after a quiet period
//! - [`cache`] - First-write-wins memo of fetched suggestion lists
//! - [`controller`] - Input handling, optimistic cache serving and the stale-result guard
//! - [`outputs`] - Render model derived from controller state
//! - [`types`] - Query normalization

pub mod cache;
pub mod controller;
pub mod debounce;
pub mod outputs;
pub mod source;
pub mod types;

pub use cache::QueryCache;
pub use controller::{ControllerStats, Phase, SearchController, SearchState};
pub use debounce::{DebounceError, DebouncedCall, Debouncer};
pub use outputs::SuggestionView;
pub use source::{LookupError, SimulatedSource, SuggestionSource};
pub use types::{Query, SuggestionList};
