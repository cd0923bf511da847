//! Result materialization.
//!
//! Turns a finished execution's output into items: line listings for
//! UTILITY/DDL statements, typed records for DML, or raw lines when structured
//! output is disabled.

mod artifact;
mod coerce;
mod page;
mod temporal;
mod value;

pub use artifact::{decode_delimited, decode_listing, decode_raw, DelimitedReader, LineReader};
pub use coerce::{coerce_cell, coerce_record, CoercionOptions, ColumnManifest, ColumnType};
pub use page::{decode_result_page, ResultPage};
pub use temporal::{parse_temporal, TemporalKind};
pub use value::{Item, Record, Value};

use crate::engine::{GetQueryResultsOutput, StatementKind};
use crate::error::{RelayError, Result};
use crate::store::ByteStream;

/// Per-cell decoding settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Drop empty cells from records instead of emitting NULL.
    pub ignore_empty: bool,
    pub coercion: CoercionOptions,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            ignore_empty: true,
            coercion: CoercionOptions::default(),
        }
    }
}

/// Picks the decoding path for a finished execution.
#[derive(Debug, Clone, Copy)]
pub struct ResultDecoder {
    structured: bool,
    options: DecodeOptions,
}

impl ResultDecoder {
    /// `structured = false` passes artifact lines through untouched.
    pub fn new(structured: bool, options: DecodeOptions) -> Self {
        Self {
            structured,
            options,
        }
    }

    pub fn is_structured(&self) -> bool {
        self.structured
    }

    /// Decodes a stored result artifact.
    ///
    /// DML artifacts require the execution's column manifest; listings and
    /// raw output never consult it.
    pub async fn decode_artifact(
        &self,
        stream: ByteStream,
        kind: &StatementKind,
        manifest: Option<&ColumnManifest>,
    ) -> Result<Vec<Item>> {
        if !self.structured {
            return decode_raw(stream).await;
        }
        if kind.is_listing() {
            return decode_listing(stream).await;
        }
        let manifest = manifest.ok_or_else(|| {
            RelayError::decode("Column manifest is required to decode DML results")
        })?;
        decode_delimited(stream, manifest, self.options).await
    }

    /// Decodes a page fetched from the engine's paginated results API.
    pub fn decode_page(
        &self,
        output: GetQueryResultsOutput,
        manifest: &ColumnManifest,
        first_page: bool,
    ) -> ResultPage {
        decode_result_page(output, manifest, first_page, self.options)
    }
}
