// src/pipeline.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::{fs, path::PathBuf};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    fetch::{self, Period, Periods},
    output,
    process::{self, Extraction},
};

/// Counters for one run, logged once the loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Periods the loop visited.
    pub attempted: usize,
    /// Periods with an archive on disk (cached or downloaded).
    pub fetched: usize,
    /// Periods whose rows reached the output file.
    pub produced: usize,
    /// Produced periods that lacked the establishment-type lookup.
    pub degraded: usize,
    pub failed: usize,
    pub rows: usize,
}

/// Drives fetch → extract → append over the configured periods, one at a time.
pub struct Pipeline {
    config: Config,
    client: Client,
    output_path: PathBuf,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let output_path = config.output_path();
        Ok(Self {
            client: fetch::build_client()?,
            config,
            output_path,
        })
    }

    /// Write the cumulative table somewhere other than the working directory.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    /// Walk back from the month before the current one to the configured start.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_periods(Periods::since(self.config.start_period()))
            .await
    }

    /// Process `periods` in order.
    ///
    /// Per-period failures are logged and skipped; only setup errors (cache directory,
    /// stale output removal) are returned. In only-last-period mode the loop stops after
    /// the first period whose rows were appended, degraded joins included.
    pub async fn run_periods<I>(&self, periods: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = Period>,
    {
        let dest_dir = &self.config.download.destination_folder;
        fs::create_dir_all(dest_dir)
            .with_context(|| format!("creating download folder {}", dest_dir.display()))?;
        output::reset_output(&self.output_path)?;

        let only_last = self.config.compile.compile_only_last_period;
        let mut summary = RunSummary::default();

        for period in periods {
            summary.attempted += 1;
            let start = Instant::now();

            let zip_path = match fetch::fetch_archive(
                &self.client,
                &self.config.download.url_template,
                dest_dir,
                period,
            )
            .await
            {
                Ok(p) => p,
                Err(e) => {
                    error!(%period, error = %format!("{:#}", e), "error downloading archive, skipping period");
                    summary.failed += 1;
                    continue;
                }
            };
            summary.fetched += 1;

            let extraction = match self.extract(zip_path.clone(), period).await {
                Ok(x) => x,
                Err(e) => {
                    error!(
                        %period,
                        zip = %zip_path.display(),
                        error = %format!("{:#}", e),
                        "failed to process archive, skipping period"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            if !extraction.had_all_lookups {
                warn!(%period, "appending rows without establishment-type descriptions");
            }
            match output::append_batch(&extraction.batch, &self.output_path) {
                Ok(rows) => {
                    summary.produced += 1;
                    summary.rows += rows;
                    if !extraction.had_all_lookups {
                        summary.degraded += 1;
                    }
                    info!(%period, rows, elapsed = ?start.elapsed(), "period done");
                }
                Err(e) => {
                    error!(%period, error = %format!("{:#}", e), "failed to append period, skipping");
                    summary.failed += 1;
                    continue;
                }
            }

            if only_last {
                info!(%period, "only the last available period was requested; stopping");
                break;
            }
        }

        info!(
            attempted = summary.attempted,
            produced = summary.produced,
            degraded = summary.degraded,
            failed = summary.failed,
            rows = summary.rows,
            "processing complete, data saved to {}",
            self.output_path.display()
        );
        Ok(summary)
    }

    async fn extract(&self, zip_path: PathBuf, period: Period) -> Result<Extraction> {
        let prefix = self.config.compile.co_unidade_prefix.clone();
        tokio::task::spawn_blocking(move || process::extract(&zip_path, period, &prefix))
            .await
            .context("extraction task panicked")?
    }
}
