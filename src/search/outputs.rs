//! Render model for the suggestion dropdown
//!
//! [`SuggestionView`] is what a presentation layer shows for a given
//! [`SearchState`]. It serializes to tagged JSON for machine consumers and
//! implements `Display` for the terminal driver.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::search::controller::SearchState;

pub const LOADING_MESSAGE: &str = "Loading...Please wait...";
pub const NO_RESULTS_MESSAGE: &str = "No results";
pub const ERROR_PREFIX: &str = "Search error:";

/// What the dropdown shows
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SuggestionView {
    /// No term: nothing is rendered
    Hidden,
    Loading,
    NoResults,
    Suggestions { items: Vec<String> },
    Error { message: String },
}

impl SuggestionView {
    /// Derive the view from controller state.
    ///
    /// An error takes precedence over everything else, then an absent term
    /// hides the dropdown, then loading, then the result list.
    pub fn from_state(state: &SearchState) -> Self {
        if let Some(error) = &state.error {
            return SuggestionView::Error {
                message: error.to_string(),
            };
        }

        if state.term.is_none() {
            return SuggestionView::Hidden;
        }

        if state.is_loading {
            return SuggestionView::Loading;
        }

        if state.results.is_empty() {
            SuggestionView::NoResults
        } else {
            SuggestionView::Suggestions {
                items: state.results.clone(),
            }
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"status":"error","message":"Failed to serialize view"}"#.to_string())
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, SuggestionView::Hidden)
    }
}

impl fmt::Display for SuggestionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionView::Hidden => Ok(()),
            SuggestionView::Loading => f.write_str(LOADING_MESSAGE),
            SuggestionView::NoResults => f.write_str(NO_RESULTS_MESSAGE),
            SuggestionView::Suggestions { items } => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "  {item}")?;
                }
                Ok(())
            }
            SuggestionView::Error { message } => write!(f, "{ERROR_PREFIX} {message}"),
        }
    }
}
