use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Int32Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use super::establishment::{self, Establishment};
use super::lookup::{Lookup, CO_TIPO_UNIDADE, DS_TIPO_ESTABELECIMENTO, DS_TIPO_UNIDADE};
use crate::fetch::Period;

/// An establishment with both lookups resolved and its period stamped on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub establishment: Establishment,
    pub ds_tipo_estabelecimento: Option<String>,
    pub co_tipo_unidade: Option<i64>,
    pub ds_tipo_unidade: Option<String>,
    pub year: i32,
    pub month: u32,
}

/// Left-join establishments to the establishment-type and unit-type lookups.
///
/// Every input row yields exactly one output row. With `establishment_types` absent the
/// establishment-type code is nulled and its description left empty for every row.
pub fn enrich(
    establishments: Vec<Establishment>,
    establishment_types: Option<&Lookup>,
    unit_types: &Lookup,
    period: Period,
) -> Vec<EnrichedRecord> {
    establishments
        .into_iter()
        .map(|mut est| {
            let ds_tipo_estabelecimento = match establishment_types {
                Some(lookup) => lookup
                    .get(est.co_tipo_estabelecimento)
                    .and_then(|(_, desc)| desc.map(str::to_string)),
                None => {
                    est.co_tipo_estabelecimento = None;
                    Some(String::new())
                }
            };
            let unit = unit_types.get(est.tp_unidade);
            EnrichedRecord {
                co_tipo_unidade: unit.map(|(code, _)| code),
                ds_tipo_unidade: unit.and_then(|(_, desc)| desc.map(str::to_string)),
                establishment: est,
                ds_tipo_estabelecimento,
                year: period.year,
                month: period.month,
            }
        })
        .collect()
}

/// Fixed column layout of the cumulative output.
pub fn enriched_schema() -> Schema {
    let mut fields: Vec<Field> = establishment::COLUMNS
        .iter()
        .map(|name| Field::new(*name, column_type(name), name != &establishment::CO_UNIDADE))
        .collect();
    fields.push(Field::new(DS_TIPO_ESTABELECIMENTO, DataType::Utf8, true));
    fields.push(Field::new(CO_TIPO_UNIDADE, DataType::Int64, true));
    fields.push(Field::new(DS_TIPO_UNIDADE, DataType::Utf8, true));
    fields.push(Field::new("year", DataType::Int32, false));
    fields.push(Field::new("month", DataType::Int32, false));
    Schema::new(fields)
}

fn column_type(name: &str) -> DataType {
    match name {
        establishment::CO_CNES
        | establishment::TP_UNIDADE
        | establishment::CO_MUNICIPIO_GESTOR
        | super::lookup::CO_TIPO_ESTABELECIMENTO => DataType::Int64,
        _ => DataType::Utf8,
    }
}

/// Build the Arrow batch for one period's enriched rows.
pub fn to_record_batch(records: &[EnrichedRecord]) -> Result<RecordBatch> {
    fn text<F>(records: &[EnrichedRecord], f: F) -> ArrayRef
    where
        F: Fn(&EnrichedRecord) -> Option<&str>,
    {
        Arc::new(records.iter().map(f).collect::<StringArray>())
    }
    fn int<F>(records: &[EnrichedRecord], f: F) -> ArrayRef
    where
        F: Fn(&EnrichedRecord) -> Option<i64>,
    {
        Arc::new(records.iter().map(f).collect::<Int64Array>())
    }

    let columns: Vec<ArrayRef> = vec![
        text(records, |r| Some(r.establishment.co_unidade.as_str())),
        int(records, |r| r.establishment.co_cnes),
        text(records, |r| r.establishment.no_razao_social.as_deref()),
        text(records, |r| r.establishment.no_fantasia.as_deref()),
        text(records, |r| r.establishment.no_logradouro.as_deref()),
        text(records, |r| r.establishment.nu_endereco.as_deref()),
        text(records, |r| r.establishment.no_complemento.as_deref()),
        text(records, |r| r.establishment.no_bairro.as_deref()),
        int(records, |r| r.establishment.tp_unidade),
        int(records, |r| r.establishment.co_municipio_gestor),
        int(records, |r| r.establishment.co_tipo_estabelecimento),
        text(records, |r| r.ds_tipo_estabelecimento.as_deref()),
        int(records, |r| r.co_tipo_unidade),
        text(records, |r| r.ds_tipo_unidade.as_deref()),
        Arc::new(records.iter().map(|r| Some(r.year)).collect::<Int32Array>()),
        Arc::new(
            records
                .iter()
                .map(|r| Some(r.month as i32))
                .collect::<Int32Array>(),
        ),
    ];

    RecordBatch::try_new(Arc::new(enriched_schema()), columns)
        .context("building enriched record batch")
}
