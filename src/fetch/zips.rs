// src/fetch/zips.rs
use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, instrument, warn};
use url::Url;

use super::periods::Period;
use crate::error::FetchError;

/// Some mirrors refuse requests that do not look like a browser.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:130.0) Gecko/20100101 Firefox/130.0";

/// Bytes inspected before anything is written to disk.
const SNIFF_LEN: usize = 1024;

pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("building HTTP client")
}

/// Deterministic cache location for `period` under `dest_dir`.
pub fn archive_path(dest_dir: impl AsRef<Path>, period: Period) -> PathBuf {
    dest_dir
        .as_ref()
        .join(format!("BASE_DE_DADOS_CNES_{}.ZIP", period.key()))
}

/// Check the head of a response body before committing it to the cache.
///
/// Missing releases come back as an HTML page with status 200.
pub fn sniff(head: &[u8]) -> Result<(), FetchError> {
    if head.is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    let is_html = head.windows(5).any(|w| w.eq_ignore_ascii_case(b"<html"))
        || head.starts_with(b"<!DOCTYPE");
    if is_html {
        return Err(FetchError::HtmlPage);
    }
    if !head.starts_with(b"PK") {
        return Err(FetchError::NotZip);
    }
    Ok(())
}

/// Return the cached archive for `period`, downloading it first if needed.
///
/// A cache hit is returned without touching the network or re-validating the file.
/// Downloads stream into a `.part` sibling that is renamed into place once the body
/// ends, so a rejected response or a local write failure never leaves a cache file.
/// A body that passed the sniff is kept even when the server cuts it short of its
/// declared length.
#[instrument(level = "info", skip(client, url_template, dest_dir), fields(period = %period))]
pub async fn fetch_archive(
    client: &Client,
    url_template: &str,
    dest_dir: impl AsRef<Path>,
    period: Period,
) -> Result<PathBuf> {
    let dest_path = archive_path(&dest_dir, period);
    let cached = fs::try_exists(&dest_path)
        .await
        .with_context(|| format!("checking cache file {}", dest_path.display()))?;
    if cached {
        info!(path = %dest_path.display(), "reading from cached file");
        return Ok(dest_path);
    }
    fs::create_dir_all(dest_dir.as_ref())
        .await
        .with_context(|| format!("creating {}", dest_dir.as_ref().display()))?;

    let url = Url::parse(&period.url(url_template))
        .with_context(|| format!("building URL for period {}", period))?;
    info!(%url, "downloading");

    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?;
    if !resp.status().is_success() {
        return Err(FetchError::Status(resp.status()).into());
    }
    let total = resp.content_length();
    let mut stream = resp.bytes_stream();

    // 1) buffer the head and validate it
    let mut head: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
    let mut ended = false;
    while head.len() < SNIFF_LEN {
        match stream.next().await {
            Some(Ok(chunk)) => head.extend_from_slice(&chunk),
            Some(Err(e)) if head.is_empty() => {
                return Err(anyhow::Error::new(e).context(format!("reading body from {}", url)));
            }
            Some(Err(e)) => {
                warn!(error = %e, received = head.len(), "body ended early");
                ended = true;
                break;
            }
            None => {
                ended = true;
                break;
            }
        }
    }
    sniff(&head[..head.len().min(SNIFF_LEN)])?;

    // 2) stream the rest into a partial file
    let part_path = dest_path.with_extension("ZIP.part");
    let rest = if ended { None } else { Some(&mut stream) };
    let written = match write_body(&part_path, head, rest, total).await {
        Ok(n) => n,
        Err(e) => {
            if let Err(rm) = fs::remove_file(&part_path).await {
                warn!(path = %part_path.display(), error = %rm, "could not remove partial download");
            }
            return Err(e.context(format!("downloading {}", url)));
        }
    };

    fs::rename(&part_path, &dest_path)
        .await
        .with_context(|| format!("moving download into {}", dest_path.display()))?;
    info!(path = %dest_path.display(), bytes = written, "downloaded");
    Ok(dest_path)
}

/// Write `head` and then whatever `rest` still yields into `path`.
///
/// Once the head has passed the sniff, a transport error ends the body instead of
/// failing it: what arrived is kept and a short body is logged against `total`. Only
/// local I/O errors fail the write.
async fn write_body<S, B, E>(
    path: &Path,
    head: Vec<u8>,
    rest: Option<&mut S>,
    total: Option<u64>,
) -> Result<u64>
where
    S: futures_util::Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let bar = progress_bar(total);
    let mut file = fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;

    file.write_all(&head).await?;
    let mut written = head.len() as u64;
    bar.inc(head.len() as u64);

    if let Some(stream) = rest {
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(error = %e, written, "body ended early");
                    break;
                }
            };
            let bytes = chunk.as_ref();
            if bytes.is_empty() {
                continue;
            }
            file.write_all(bytes).await?;
            written += bytes.len() as u64;
            bar.inc(bytes.len() as u64);
        }
    }
    file.flush().await?;
    bar.finish_and_clear();

    if let Some(expected) = total {
        if expected != written {
            warn!(expected, written, "content-length mismatch; keeping what arrived");
        }
    }
    Ok(written)
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) if len > 0 => {
            let bar = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::with_template(
                "Downloading [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec})",
            ) {
                bar.set_style(style);
            }
            bar
        }
        _ => {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("Downloading {spinner} {bytes}") {
                bar.set_style(style);
            }
            bar
        }
    }
}
