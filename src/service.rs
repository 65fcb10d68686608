use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::search::{QueryCache, SearchController, SearchState, SimulatedSource, SuggestionView};

/// How rendered views are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Line-oriented driver standing in for the input widget.
///
/// Each input line is one "input changed" event; the view is written out
/// whenever it changes.
#[derive(Debug, Clone)]
pub struct TypeaheadService {
    controller: SearchController,
    format: OutputFormat,
}

impl TypeaheadService {
    pub fn new(config: &Config, format: OutputFormat) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let source = SimulatedSource::new(config.source.clone())
            .context("Failed to create simulated suggestion source")?;
        let cache = QueryCache::from_entries(config.seed_cache.clone());

        tracing::info!(
            debounce_ms = config.debounce_ms,
            min_latency_ms = config.source.min_latency_ms,
            max_latency_ms = config.source.max_latency_ms,
            failure_probability = config.source.failure_probability(),
            seeded_queries = cache.len(),
            "Typeahead service configured"
        );

        Ok(Self {
            controller: SearchController::with_cache(Arc::new(source), config.debounce(), cache),
            format,
        })
    }

    pub fn controller(&self) -> &SearchController {
        &self.controller
    }

    /// Feed `input` line by line and write views to `output` until EOF.
    ///
    /// After the last line the driver waits for the final lookup to settle so
    /// the last view written reflects it.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut updates = self.controller.subscribe();
        let mut last_view: Option<SuggestionView> = None;
        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line.context("Failed to read input line")? {
                        Some(text) => {
                            if let Some(handle) = self.controller.input_changed(&text) {
                                in_flight = Some(handle);
                            }
                        }
                        None => break,
                    }
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.render(&mut updates, &mut last_view, output).await?;
                }
            }
        }

        if let Some(handle) = in_flight.take() {
            handle.await.context("Lookup task failed")?;
        }
        self.render(&mut updates, &mut last_view, output).await?;

        let stats = self.controller.stats();
        tracing::info!(
            inputs = stats.inputs,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            stale_discarded = stats.stale_discarded,
            dropped = stats.dropped,
            failures = stats.failures,
            "Input closed"
        );
        Ok(())
    }

    async fn render<W>(
        &self,
        updates: &mut watch::Receiver<SearchState>,
        last_view: &mut Option<SuggestionView>,
        output: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let view = SuggestionView::from_state(&updates.borrow_and_update());
        if last_view.as_ref() == Some(&view) {
            return Ok(());
        }

        let rendered = match self.format {
            OutputFormat::Json => Some(view.to_json()),
            OutputFormat::Text if view.is_hidden() => None,
            OutputFormat::Text => Some(view.to_string()),
        };

        if let Some(rendered) = rendered {
            output
                .write_all(format!("{rendered}\n").as_bytes())
                .await
                .context("Failed to write view")?;
            output.flush().await.context("Failed to flush output")?;
        }

        *last_view = Some(view);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    fn instant_config() -> Config {
        Config {
            debounce_ms: 50,
            source: SourceConfig::instant(),
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_renders_final_view() -> Result<()> {
        let service = TypeaheadService::new(&instant_config(), OutputFormat::Text)?;
        let mut output = Vec::new();

        service.run(&b"jan\nxyz\n"[..], &mut output).await?;

        let output = String::from_utf8(output)?;
        assert_eq!(output.lines().last(), Some("No results"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_serves_seeded_cache() -> Result<()> {
        let mut config = instant_config();
        config
            .seed_cache
            .insert("John".to_string(), vec!["John Doe".to_string()]);
        let service = TypeaheadService::new(&config, OutputFormat::Json)?;
        let mut output = Vec::new();

        service.run(&b"john\n"[..], &mut output).await?;

        let output = String::from_utf8(output)?;
        let views: Vec<SuggestionView> = output
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert!(!views.contains(&SuggestionView::Loading));
        assert_eq!(
            views.last(),
            Some(&SuggestionView::Suggestions {
                items: vec!["John Doe".to_string()]
            })
        );
        Ok(())
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = instant_config();
        config.source.failure_odds_denominator = 0;
        assert!(TypeaheadService::new(&config, OutputFormat::Text).is_err());
    }
}
