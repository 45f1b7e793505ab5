use anyhow::Result;
use cnesscraper::{Config, Pipeline};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config = Config::from_env()?;
    info!(
        start = %config.start_period(),
        prefix = %config.compile.co_unidade_prefix,
        only_last = config.compile.compile_only_last_period,
        dest = %config.download.destination_folder.display(),
        "loaded config"
    );

    // ─── 3) walk periods: fetch → extract → append ───────────────────
    let pipeline = Pipeline::new(config)?;
    let summary = pipeline.run().await?;
    if summary.produced == 0 {
        info!("no period produced data");
    }

    Ok(())
}
