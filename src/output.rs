// src/output.rs
use anyhow::{Context, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};
use tracing::{debug, info};

/// Remove any output left over from a previous run. Returns whether one existed.
pub fn reset_output(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
    info!(
        path = %path.display(),
        "output file already exists; it will be re-created"
    );
    Ok(true)
}

/// Append `batch` to the cumulative CSV at `path`.
///
/// The header row is written only when the file does not exist yet, i.e. for the first
/// period of a run. Rows are appended as-is; nothing is deduplicated.
pub fn append_batch(batch: &RecordBatch, path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();
    let write_header = !path.exists();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {} for append", path.display()))?;
    let mut writer = WriterBuilder::new()
        .with_header(write_header)
        .build(BufWriter::new(file));
    writer
        .write(batch)
        .with_context(|| format!("appending to {}", path.display()))?;
    writer
        .into_inner()
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;

    debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        header = write_header,
        "appended"
    );
    Ok(batch.num_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::{
        array::{ArrayRef, Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use std::sync::Arc;
    use tempfile::tempdir;

    fn batch(ids: &[&str], codes: &[Option<i64>]) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("CO_UNIDADE", DataType::Utf8, false),
            Field::new("TP_UNIDADE", DataType::Int64, true),
        ]);
        let cols: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(ids.to_vec())),
            Arc::new(Int64Array::from(codes.to_vec())),
        ];
        RecordBatch::try_new(Arc::new(schema), cols).unwrap()
    }

    #[test]
    fn header_only_on_first_append() -> Result<()> {
        let tmp = tempdir()?;
        let out = tmp.path().join("cnes_estab_full_2.csv");

        append_batch(&batch(&["21", "22"], &[Some(5), None]), &out)?;
        append_batch(&batch(&["23"], &[Some(7)]), &out)?;

        let text = fs::read_to_string(&out)?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["CO_UNIDADE,TP_UNIDADE", "21,5", "22,", "23,7"]);
        Ok(())
    }

    #[test]
    fn empty_first_batch_still_writes_header() -> Result<()> {
        let tmp = tempdir()?;
        let out = tmp.path().join("out.csv");

        assert_eq!(append_batch(&batch(&[], &[]), &out)?, 0);
        append_batch(&batch(&["21"], &[Some(1)]), &out)?;

        let text = fs::read_to_string(&out)?;
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("CO_UNIDADE,TP_UNIDADE"));
        Ok(())
    }

    #[test]
    fn reset_removes_previous_output() -> Result<()> {
        let tmp = tempdir()?;
        let out = tmp.path().join("out.csv");

        assert!(!reset_output(&out)?);
        fs::write(&out, "stale\n")?;
        assert!(reset_output(&out)?);
        assert!(!out.exists());
        Ok(())
    }
}
