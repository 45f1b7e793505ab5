use anyhow::Result;
use std::io::Read;
use tracing::debug;

use super::lookup::CO_TIPO_ESTABELECIMENTO;
use super::utils::{parse_int, parse_text, CsvEntry};

pub const CO_UNIDADE: &str = "CO_UNIDADE";
pub const CO_CNES: &str = "CO_CNES";
pub const NO_RAZAO_SOCIAL: &str = "NO_RAZAO_SOCIAL";
pub const NO_FANTASIA: &str = "NO_FANTASIA";
pub const NO_LOGRADOURO: &str = "NO_LOGRADOURO";
pub const NU_ENDERECO: &str = "NU_ENDERECO";
pub const NO_COMPLEMENTO: &str = "NO_COMPLEMENTO";
pub const NO_BAIRRO: &str = "NO_BAIRRO";
pub const TP_UNIDADE: &str = "TP_UNIDADE";
pub const CO_MUNICIPIO_GESTOR: &str = "CO_MUNICIPIO_GESTOR";

/// Columns kept from the establishment table, in output order.
pub const COLUMNS: [&str; 11] = [
    CO_UNIDADE,
    CO_CNES,
    NO_RAZAO_SOCIAL,
    NO_FANTASIA,
    NO_LOGRADOURO,
    NU_ENDERECO,
    NO_COMPLEMENTO,
    NO_BAIRRO,
    TP_UNIDADE,
    CO_MUNICIPIO_GESTOR,
    CO_TIPO_ESTABELECIMENTO,
];

/// One health-facility unit as listed in `tbEstabelecimento<period>.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Establishment {
    pub co_unidade: String,
    pub co_cnes: Option<i64>,
    pub no_razao_social: Option<String>,
    pub no_fantasia: Option<String>,
    pub no_logradouro: Option<String>,
    pub nu_endereco: Option<String>,
    pub no_complemento: Option<String>,
    pub no_bairro: Option<String>,
    pub tp_unidade: Option<i64>,
    pub co_municipio_gestor: Option<i64>,
    pub co_tipo_estabelecimento: Option<i64>,
}

/// Read the establishment entry, keeping rows whose `CO_UNIDADE` starts with `prefix`.
///
/// Only `CO_UNIDADE` is mandatory; other projected columns missing from older releases
/// read as null. The prefix match is case-sensitive and applied while records stream
/// past, before any typing: rows for other units are never retained, and malformed
/// numbers in them do not fail the period.
pub fn read_establishments<R: Read>(source: R, prefix: &str) -> Result<Vec<Establishment>> {
    let mut entry = CsvEntry::new(source)?;
    let proj = entry.project(&COLUMNS, &[CO_UNIDADE])?;

    let mut out = Vec::new();
    while let Some(record) = entry.next_record()? {
        let co_unidade = proj.get(record, 0);
        if !co_unidade.starts_with(prefix) {
            continue;
        }
        out.push(Establishment {
            co_unidade,
            co_cnes: parse_int(&proj.get(record, 1), CO_CNES)?,
            no_razao_social: parse_text(&proj.get(record, 2)),
            no_fantasia: parse_text(&proj.get(record, 3)),
            no_logradouro: parse_text(&proj.get(record, 4)),
            nu_endereco: parse_text(&proj.get(record, 5)),
            no_complemento: parse_text(&proj.get(record, 6)),
            no_bairro: parse_text(&proj.get(record, 7)),
            tp_unidade: parse_int(&proj.get(record, 8), TP_UNIDADE)?,
            co_municipio_gestor: parse_int(&proj.get(record, 9), CO_MUNICIPIO_GESTOR)?,
            co_tipo_estabelecimento: parse_int(&proj.get(record, 10), CO_TIPO_ESTABELECIMENTO)?,
        });
    }
    debug!(
        total = entry.records_read(),
        kept = out.len(),
        prefix,
        "filtered establishments"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "CO_UNIDADE;CO_CNES;NU_CNPJ_MANTENEDORA;NO_RAZAO_SOCIAL;NO_FANTASIA;NO_LOGRADOURO;NU_ENDERECO;NO_COMPLEMENTO;NO_BAIRRO;TP_UNIDADE;CO_MUNICIPIO_GESTOR;CO_TIPO_ESTABELECIMENTO";

    #[test]
    fn prefix_filter_keeps_matching_units() -> Result<()> {
        let csv = format!(
            "{}\n1001;1;x;A;A;RUA;1;;CENTRO;2;355030;\n2002;2;x;B;B;RUA;2;;CENTRO;5;355030;20\n2100;3;x;C;C;AV;3;;SUL;7;355030;\n",
            HEADER
        );
        let rows = read_establishments(csv.as_bytes(), "2")?;
        let ids: Vec<_> = rows.iter().map(|r| r.co_unidade.as_str()).collect();
        assert_eq!(ids, vec!["2002", "2100"]);
        assert_eq!(rows[0].tp_unidade, Some(5));
        assert_eq!(rows[0].co_tipo_estabelecimento, Some(20));
        assert_eq!(rows[1].co_tipo_estabelecimento, None);
        assert_eq!(rows[0].no_complemento, None);
        Ok(())
    }

    #[test]
    fn filter_is_case_sensitive_prefix() -> Result<()> {
        let csv = "CO_UNIDADE;CO_CNES\nab1;1\nAB2;2\nxab;3\n";
        let rows = read_establishments(csv.as_bytes(), "AB")?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].co_unidade, "AB2");
        assert_eq!(rows[0].no_fantasia, None);
        Ok(())
    }

    #[test]
    fn bad_number_in_kept_row_fails() {
        let csv = "CO_UNIDADE;CO_CNES\n21;oops\n";
        assert!(read_establishments(csv.as_bytes(), "2").is_err());
        assert!(read_establishments(csv.as_bytes(), "9").is_ok());
    }

    #[test]
    fn missing_unit_id_column_fails() {
        let csv = "CO_CNES;NO_FANTASIA\n1;A\n";
        assert!(read_establishments(csv.as_bytes(), "").is_err());
    }

    /// Hands out one byte per read, so nothing can depend on the whole entry being
    /// buffered up front.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&b, rest)), Some(slot)) => {
                    *slot = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn rows_are_filtered_while_streaming() -> Result<()> {
        let mut csv = String::from("CO_UNIDADE;CO_CNES;NO_FANTASIA\n");
        for i in 0..500 {
            csv.push_str(&format!("1{:04};not-a-number;OTHER CITY\n", i));
        }
        csv.push_str("2001;7;KEPT\n");
        csv.push_str("3001;ragged;row;with;extra;fields;beyond;the;header\n");

        let rows = read_establishments(Trickle(csv.as_bytes()), "2")?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].co_unidade, "2001");
        assert_eq!(rows[0].co_cnes, Some(7));
        assert_eq!(rows[0].no_fantasia.as_deref(), Some("KEPT"));
        Ok(())
    }
}
