// src/config.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::fetch::periods::{Period, PERIOD_PLACEHOLDER};

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "CNES_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Run configuration, read once at startup and passed to the pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub download: DownloadConfig,
    pub compile: CompileConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Cache directory for downloaded archives.
    pub destination_folder: PathBuf,
    pub start_year: i32,
    pub start_month: u32,
    /// Remote archive URL with a `{period}` placeholder.
    pub url_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompileConfig {
    /// Only establishments whose `CO_UNIDADE` starts with this are kept.
    pub co_unidade_prefix: String,
    /// Stop after the first period that extracts successfully.
    pub compile_only_last_period: bool,
}

impl Config {
    /// Load from the path in `CNES_CONFIG`, falling back to `config.yaml`.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg = Self::from_yaml(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.download.start_month) {
            bail!(
                "download.start_month must be within 1..=12, got {}",
                self.download.start_month
            );
        }
        if !self.download.url_template.contains(PERIOD_PLACEHOLDER) {
            bail!(
                "download.url_template must contain a {} placeholder",
                PERIOD_PLACEHOLDER
            );
        }
        Ok(())
    }

    pub fn start_period(&self) -> Period {
        Period::new(self.download.start_year, self.download.start_month)
    }

    /// `./cnes_estab_full_<prefix>.csv`
    pub fn output_path(&self) -> PathBuf {
        Path::new(".").join(format!(
            "cnes_estab_full_{}.csv",
            self.compile.co_unidade_prefix
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
download:
  destination_folder: zips
  start_year: 2023
  start_month: 11
  url_template: "https://example.test/BASE_DE_DADOS_CNES_{period}.ZIP"
compile:
  co_unidade_prefix: "35"
  compile_only_last_period: true
"#;

    #[test]
    fn parses_nested_sections() {
        let cfg = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.download.destination_folder, PathBuf::from("zips"));
        assert_eq!(cfg.start_period(), Period::new(2023, 11));
        assert_eq!(cfg.compile.co_unidade_prefix, "35");
        assert!(cfg.compile.compile_only_last_period);
        assert_eq!(
            cfg.output_path(),
            Path::new(".").join("cnes_estab_full_35.csv")
        );
    }

    #[test]
    fn rejects_out_of_range_month() {
        let bad = SAMPLE.replace("start_month: 11", "start_month: 13");
        assert!(Config::from_yaml(&bad).is_err());
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let bad = SAMPLE.replace("{period}", "202401");
        assert!(Config::from_yaml(&bad).is_err());
    }

    #[test]
    fn missing_key_is_an_error() {
        let bad = SAMPLE.replace("  compile_only_last_period: true\n", "");
        assert!(Config::from_yaml(&bad).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(tmp.path().join("nope.yaml")).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.yaml"));
    }
}
