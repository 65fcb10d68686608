pub mod config;
pub mod flatten;
pub mod search;
pub mod service;

pub use search::{SearchController, SearchState, SuggestionView};
pub use service::TypeaheadService;
