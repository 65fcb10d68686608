//! # Configuration Module
//!
//! Settings for the debounce quiet period, the simulated suggestion backend
//! and cache seeding.
//!
//! Values are resolved in three layers: built-in defaults, then an optional
//! TOML file, then command line flags (which clap also fills from environment
//! variables).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default quiet period before a debounced lookup fires
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Default lower bound of simulated lookup latency
pub const DEFAULT_MIN_LATENCY_MS: u64 = 350;

/// Default upper bound (exclusive) of simulated lookup latency
pub const DEFAULT_MAX_LATENCY_MS: u64 = 1350;

/// Default failure odds: one in six lookups fails
pub const DEFAULT_FAILURE_ODDS_NUMERATOR: u32 = 1;
pub const DEFAULT_FAILURE_ODDS_DENOMINATOR: u32 = 6;

/// Directory and file name of the default config location
pub const CONFIG_DIR: &str = "typeahead";
pub const CONFIG_FILE: &str = "config.toml";

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("minimum latency {min_ms}ms exceeds maximum latency {max_ms}ms")]
    InvalidLatencyRange { min_ms: u64, max_ms: u64 },
    #[error("failure odds denominator must be greater than zero")]
    ZeroOddsDenominator,
}

/// Behaviour of the simulated suggestion backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub failure_odds_numerator: u32,
    pub failure_odds_denominator: u32,
    /// Fixed RNG seed for reproducible latency and failures
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: DEFAULT_MIN_LATENCY_MS,
            max_latency_ms: DEFAULT_MAX_LATENCY_MS,
            failure_odds_numerator: DEFAULT_FAILURE_ODDS_NUMERATOR,
            failure_odds_denominator: DEFAULT_FAILURE_ODDS_DENOMINATOR,
            seed: None,
        }
    }
}

impl SourceConfig {
    /// A backend that answers immediately and never fails
    pub fn instant() -> Self {
        Self {
            min_latency_ms: 0,
            max_latency_ms: 0,
            failure_odds_numerator: 0,
            failure_odds_denominator: 1,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_latency_ms > self.max_latency_ms {
            return Err(ConfigError::InvalidLatencyRange {
                min_ms: self.min_latency_ms,
                max_ms: self.max_latency_ms,
            });
        }
        if self.failure_odds_denominator == 0 {
            return Err(ConfigError::ZeroOddsDenominator);
        }
        Ok(())
    }

    /// Probability that a single lookup fails, clamped to `[0, 1]`
    pub fn failure_probability(&self) -> f64 {
        if self.failure_odds_denominator == 0 {
            return 0.0;
        }
        let ratio =
            f64::from(self.failure_odds_numerator) / f64::from(self.failure_odds_denominator);
        ratio.min(1.0)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quiet period in milliseconds
    pub debounce_ms: u64,
    pub source: SourceConfig,
    /// Entries placed in the query cache before the first input
    pub seed_cache: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            source: SourceConfig::default(),
            seed_cache: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))?;

        Ok(config)
    }

    /// Resolve the config file to use.
    ///
    /// An explicit path must exist. Without one, the default location under the
    /// user's config directory is used when present, otherwise the built-in
    /// defaults apply.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        Self::discover_with_default(explicit, default_config_path())
    }

    fn discover_with_default(explicit: Option<&Path>, default: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default {
            Some(path) if path.is_file() => {
                tracing::info!("Using config file {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// Default config file location, `<config dir>/typeahead/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Command line overrides, applied on top of the loaded config
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigOverrides {
    /// Quiet period before a lookup fires, in milliseconds
    #[arg(long, env = "TYPEAHEAD_DEBOUNCE_MS")]
    pub debounce_ms: Option<u64>,

    /// Lower bound of simulated latency, in milliseconds
    #[arg(long, env = "TYPEAHEAD_MIN_LATENCY_MS")]
    pub min_latency_ms: Option<u64>,

    /// Upper bound of simulated latency, in milliseconds
    #[arg(long, env = "TYPEAHEAD_MAX_LATENCY_MS")]
    pub max_latency_ms: Option<u64>,

    /// Failure odds numerator (N in "N out of M lookups fail")
    #[arg(long, env = "TYPEAHEAD_FAILURE_NUMERATOR")]
    pub failure_numerator: Option<u32>,

    /// Failure odds denominator (M in "N out of M lookups fail")
    #[arg(long, env = "TYPEAHEAD_FAILURE_DENOMINATOR")]
    pub failure_denominator: Option<u32>,

    /// RNG seed for reproducible runs
    #[arg(long, env = "TYPEAHEAD_SEED")]
    pub seed: Option<u64>,

    /// Pre-seed the cache, e.g. --seed-cache "john=John Doe|Johnny Cash"
    #[arg(long = "seed-cache", value_parser = parse_seed_entry)]
    pub seed_cache: Vec<(String, Vec<String>)>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut Config) {
        if let Some(debounce_ms) = self.debounce_ms {
            config.debounce_ms = debounce_ms;
        }
        if let Some(min) = self.min_latency_ms {
            config.source.min_latency_ms = min;
        }
        if let Some(max) = self.max_latency_ms {
            config.source.max_latency_ms = max;
        }
        if let Some(numerator) = self.failure_numerator {
            config.source.failure_odds_numerator = numerator;
        }
        if let Some(denominator) = self.failure_denominator {
            config.source.failure_odds_denominator = denominator;
        }
        if let Some(seed) = self.seed {
            config.source.seed = Some(seed);
        }
        config.seed_cache.extend(self.seed_cache);
    }
}

/// Parse a `query=First|Second` cache seed
pub fn parse_seed_entry(raw: &str) -> Result<(String, Vec<String>), String> {
    let (query, items) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected QUERY=ITEM|ITEM, got '{raw}'"))?;

    let query = query.trim();
    if query.is_empty() {
        return Err(format!("cache seed '{raw}' has an empty query"));
    }

    let items = items
        .split('|')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    Ok((query.to_string(), items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.debounce(), Duration::from_millis(400));
        assert_eq!(config.source.min_latency_ms, 350);
        assert_eq!(config.source.max_latency_ms, 1350);
        assert!((config.source.failure_probability() - 1.0 / 6.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut source = SourceConfig::instant();
        source.min_latency_ms = 10;
        assert_eq!(
            source.validate(),
            Err(ConfigError::InvalidLatencyRange {
                min_ms: 10,
                max_ms: 0
            })
        );

        let mut source = SourceConfig::instant();
        source.failure_odds_denominator = 0;
        assert_eq!(source.validate(), Err(ConfigError::ZeroOddsDenominator));
    }

    #[test]
    fn test_failure_probability_is_clamped() {
        let source = SourceConfig {
            failure_odds_numerator: 9,
            failure_odds_denominator: 3,
            ..SourceConfig::instant()
        };
        assert_eq!(source.failure_probability(), 1.0);
        assert_eq!(SourceConfig::instant().failure_probability(), 0.0);
    }

    #[test]
    fn test_load_partial_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
debounce_ms = 250

[source]
max_latency_ms = 500
seed = 7

[seed_cache]
john = ["John Doe"]
"#,
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.source.min_latency_ms, DEFAULT_MIN_LATENCY_MS);
        assert_eq!(config.source.max_latency_ms, 500);
        assert_eq!(config.source.seed, Some(7));
        assert_eq!(
            config.seed_cache.get("john"),
            Some(&vec!["John Doe".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_load_rejects_invalid_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[source]
min_latency_ms = 900
max_latency_ms = 100
"#,
        )?;

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
        Ok(())
    }

    #[test]
    fn test_discover_explicit_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        assert!(Config::discover(Some(&missing)).is_err());
    }

    #[test]
    fn test_discover_uses_default_location_when_present() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let default = temp_dir.path().join(CONFIG_DIR).join(CONFIG_FILE);

        // Nothing at the default location yet
        let config = Config::discover_with_default(None, Some(default.clone()))?;
        assert_eq!(config, Config::default());
        assert_eq!(Config::discover_with_default(None, None)?, Config::default());

        fs::create_dir_all(temp_dir.path().join(CONFIG_DIR))?;
        fs::write(&default, "debounce_ms = 120\n")?;
        let config = Config::discover_with_default(None, Some(default.clone()))?;
        assert_eq!(config.debounce_ms, 120);

        // An explicit path wins over the default location
        let explicit = temp_dir.path().join("explicit.toml");
        fs::write(&explicit, "debounce_ms = 80\n")?;
        let config = Config::discover_with_default(Some(&explicit), Some(default))?;
        assert_eq!(config.debounce_ms, 80);
        Ok(())
    }

    #[test]
    fn test_default_config_path_layout() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with(Path::new(CONFIG_DIR).join(CONFIG_FILE)));
        }
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        let overrides = ConfigOverrides {
            debounce_ms: Some(50),
            max_latency_ms: Some(400),
            failure_numerator: Some(0),
            seed: Some(42),
            seed_cache: vec![("al".to_string(), vec!["Alex Johnson".to_string()])],
            ..Default::default()
        };

        overrides.apply(&mut config);

        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.source.min_latency_ms, DEFAULT_MIN_LATENCY_MS);
        assert_eq!(config.source.max_latency_ms, 400);
        assert_eq!(config.source.failure_odds_numerator, 0);
        assert_eq!(config.source.seed, Some(42));
        assert!(config.seed_cache.contains_key("al"));
    }

    #[test]
    fn test_parse_seed_entry() {
        assert_eq!(
            parse_seed_entry("john=John Doe| Johnny Cash ").unwrap(),
            (
                "john".to_string(),
                vec!["John Doe".to_string(), "Johnny Cash".to_string()]
            )
        );
        assert!(parse_seed_entry("no-separator").is_err());
        assert!(parse_seed_entry(" =John Doe").is_err());
    }
}
