use anyhow::Result;
use std::{collections::HashMap, io::Read};

use super::utils::{parse_int, parse_text, CsvEntry};

pub const CO_TIPO_UNIDADE: &str = "CO_TIPO_UNIDADE";
pub const DS_TIPO_UNIDADE: &str = "DS_TIPO_UNIDADE";
pub const CO_TIPO_ESTABELECIMENTO: &str = "CO_TIPO_ESTABELECIMENTO";
pub const DS_TIPO_ESTABELECIMENTO: &str = "DS_TIPO_ESTABELECIMENTO";

/// A code → description reference table read from one archive.
#[derive(Debug, Default)]
pub struct Lookup {
    by_code: HashMap<i64, Option<String>>,
}

impl Lookup {
    /// Read the `code_col`/`desc_col` projection of a lookup entry.
    ///
    /// Rows with an empty code can never match and are skipped; on duplicate codes the
    /// first row wins so a left join never multiplies establishment rows.
    pub fn read<R: Read>(source: R, code_col: &str, desc_col: &str) -> Result<Self> {
        let mut entry = CsvEntry::new(source)?;
        let proj = entry.project(&[code_col, desc_col], &[code_col, desc_col])?;

        let mut by_code = HashMap::new();
        while let Some(record) = entry.next_record()? {
            let Some(code) = parse_int(&proj.get(record, 0), code_col)? else {
                continue;
            };
            by_code
                .entry(code)
                .or_insert_with(|| parse_text(&proj.get(record, 1)));
        }
        Ok(Self { by_code })
    }

    pub fn unit_types<R: Read>(source: R) -> Result<Self> {
        Self::read(source, CO_TIPO_UNIDADE, DS_TIPO_UNIDADE)
    }

    pub fn establishment_types<R: Read>(source: R) -> Result<Self> {
        Self::read(source, CO_TIPO_ESTABELECIMENTO, DS_TIPO_ESTABELECIMENTO)
    }

    /// The matched code and its description, if `code` has a row.
    pub fn get(&self, code: Option<i64>) -> Option<(i64, Option<&str>)> {
        let code = code?;
        self.by_code
            .get(&code)
            .map(|desc| (code, desc.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
