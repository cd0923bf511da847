//! Decoding of result pages fetched straight from the engine.

use serde::Serialize;

use crate::decode::coerce::{coerce_cell, ColumnManifest};
use crate::decode::value::{Item, Record, Value};
use crate::decode::DecodeOptions;
use crate::engine::GetQueryResultsOutput;

/// One page of decoded items plus the token for the next page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultPage {
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Decodes an engine page positionally against the manifest.
///
/// The first page of a result set repeats the column names as its first row;
/// pass `skip_header` for it. Continuation pages carry data only.
pub fn decode_result_page(
    output: GetQueryResultsOutput,
    manifest: &ColumnManifest,
    skip_header: bool,
    options: DecodeOptions,
) -> ResultPage {
    let skip = usize::from(skip_header);
    let items = output
        .result_set
        .rows
        .iter()
        .skip(skip)
        .map(|row| {
            let mut record = Record::new();
            for (column, datum) in manifest.columns().iter().zip(&row.data) {
                let raw = datum.var_char_value.as_deref().unwrap_or_default();
                if raw.is_empty() {
                    if !options.ignore_empty {
                        record.insert(column.name.as_str(), Value::Null);
                    }
                    continue;
                }
                record.insert(
                    column.name.as_str(),
                    coerce_cell(raw, Some(column.data_type.as_str()), options.coercion),
                );
            }
            Item::Record(record)
        })
        .collect();

    ResultPage {
        items,
        next_token: output.next_token,
    }
}
