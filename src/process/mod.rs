// src/process/mod.rs
use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};
use tracing::{info, instrument, warn};
use zip::{read::ZipFile, result::ZipError, ZipArchive};

use crate::error::ExtractError;
use crate::fetch::Period;

pub mod establishment;
pub mod join;
pub mod lookup;
pub mod utils;

use lookup::Lookup;

/// Names of the CSV entries a monthly archive carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryNames {
    pub unit_types: String,
    pub establishments: String,
    pub establishment_types: String,
}

impl EntryNames {
    pub fn for_period(period: Period) -> Self {
        let key = period.key();
        Self {
            unit_types: format!("tbTipoUnidade{}.csv", key),
            establishments: format!("tbEstabelecimento{}.csv", key),
            establishment_types: format!("tbTipoEstabelecimento{}.csv", key),
        }
    }
}

/// One period's enriched table.
#[derive(Debug)]
pub struct Extraction {
    pub batch: RecordBatch,
    /// False when the establishment-type lookup was missing and its columns were blanked.
    pub had_all_lookups: bool,
}

impl Extraction {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Open the archive for `period` and build its filtered, joined table.
///
/// The unit-type and establishment entries are required; the establishment-type entry
/// is missing from older releases and only degrades the join. The archive file itself
/// is never modified or removed, whatever goes wrong.
#[instrument(level = "info", skip(zip_path), fields(zip = %zip_path.as_ref().display(), period = %period))]
pub fn extract<P: AsRef<Path>>(zip_path: P, period: Period, prefix: &str) -> Result<Extraction> {
    let zip_path = zip_path.as_ref();
    let file = File::open(zip_path).map_err(ExtractError::Io)?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| zip_error(zip_path, e))?;
    let names = EntryNames::for_period(period);

    // both required entries are checked before either is read
    for name in [&names.unit_types, &names.establishments] {
        if archive.index_for_name(name).is_none() {
            return Err(ExtractError::MissingEntry(name.clone()).into());
        }
    }

    // lookups are read fresh from every archive
    let unit_types = Lookup::unit_types(open_entry(&mut archive, zip_path, &names.unit_types)?)
        .with_context(|| format!("reading {}", names.unit_types))?;
    let establishments = establishment::read_establishments(
        open_entry(&mut archive, zip_path, &names.establishments)?,
        prefix,
    )
    .with_context(|| format!("reading {}", names.establishments))?;

    let establishment_types =
        match open_entry(&mut archive, zip_path, &names.establishment_types) {
            Ok(entry) => Some(
                Lookup::establishment_types(entry)
                    .with_context(|| format!("reading {}", names.establishment_types))?,
            ),
            Err(ExtractError::MissingEntry(name)) => {
                warn!(
                    entry = %name,
                    zip = %zip_path.display(),
                    "establishment-type table not found, proceeding without it"
                );
                None
            }
            Err(e) => return Err(e.into()),
        };

    let records = join::enrich(
        establishments,
        establishment_types.as_ref(),
        &unit_types,
        period,
    );
    let batch = join::to_record_batch(&records)?;
    info!(
        rows = batch.num_rows(),
        unit_types = unit_types.len(),
        "extracted"
    );

    Ok(Extraction {
        batch,
        had_all_lookups: establishment_types.is_some(),
    })
}

/// Decompressing reader over one entry; nothing is buffered beyond the CSV reader's window.
fn open_entry<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    zip_path: &Path,
    name: &str,
) -> Result<ZipFile<'a, R>, ExtractError> {
    archive.by_name(name).map_err(|e| match e {
        ZipError::FileNotFound => ExtractError::MissingEntry(name.to_string()),
        other => zip_error(zip_path, other),
    })
}

fn zip_error(zip_path: &Path, err: ZipError) -> ExtractError {
    match err {
        ZipError::Io(e) => ExtractError::Io(e),
        other => ExtractError::BadZip {
            path: zip_path.display().to_string(),
            source: other,
        },
    }
}
