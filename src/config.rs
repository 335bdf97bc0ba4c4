use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::loader::DatasetSettings;
use crate::query::pages::QuerySettings;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RUSTY_TILL_CONFIG";

/// Looked up in the working directory when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "rusty-till.toml";

/// Runtime configuration. Every key is optional:
///
/// ```toml
/// [dataset]
/// default_path = "superstore.xlsx"
/// sheet_name = "superstore_dataset"
///
/// [queries]
/// top_k = 5
/// sample_rows = 5
/// summary_source = "base"   # or "filtered"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub dataset: DatasetSettings,
    pub queries: QuerySettings,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Read a config file. A relative `default_path` is resolved against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config =
            Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))?;

        if config.dataset.default_path.is_relative() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                config.dataset.default_path = dir.join(&config.dataset.default_path);
            }
        }
        Ok(config)
    }

    /// `$RUSTY_TILL_CONFIG`, then `./rusty-till.toml`, then built-in
    /// defaults.
    pub fn discover() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            log::info!("Loading config from {} ({CONFIG_ENV})", path.display());
            return Self::load(&path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            log::info!("Loading config from {}", local.display());
            return Self::load(local);
        }

        log::info!("No {DEFAULT_CONFIG_FILE} found, using defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::query::pages::SummarySource;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.queries.top_k, 5);
        assert_eq!(config.dataset.sheet_name, "superstore_dataset");
        assert_eq!(config.queries.summary_source, SummarySource::Base);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [queries]
            top_k = 10
            summary_source = "filtered"
            "#,
        )
        .unwrap();
        assert_eq!(config.queries.top_k, 10);
        assert_eq!(config.queries.sample_rows, 5);
        assert_eq!(config.queries.summary_source, SummarySource::Filtered);
        assert_eq!(config.dataset.default_path, PathBuf::from("superstore.xlsx"));
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(Config::from_toml_str("[plots]\nwidth = 3\n").is_err());
    }

    #[test]
    fn misspelled_keys_are_rejected() {
        assert!(Config::from_toml_str("[queries]\ntopk = 10\n").is_err());
        assert!(Config::from_toml_str("[dataset]\npath = \"sales.csv\"\n").is_err());
    }

    #[test]
    fn relative_dataset_path_resolves_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[dataset]\ndefault_path = \"data/sales.csv\"").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.dataset.default_path, dir.path().join("data/sales.csv"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/nonexistent/rusty-till.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/rusty-till.toml"));
    }
}
