//! Result artifact decoding.
//!
//! The engine writes UTILITY/DDL output as a plain line listing (optionally
//! `key<TAB>value`) and DML output as CSV with a header row.

use csv_core::ReadRecordResult;
use futures::StreamExt;
use tracing::debug;

use crate::decode::coerce::{coerce_cell, ColumnManifest};
use crate::decode::value::{Item, Record, Value};
use crate::decode::DecodeOptions;
use crate::error::{RelayError, Result};
use crate::store::ByteStream;

/// Splits a byte stream into text lines without buffering the whole body.
pub struct LineReader {
    stream: ByteStream,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl LineReader {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    /// Returns the next line without its terminator, or `None` at the end.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return to_text(line).map(Some);
            }

            if self.exhausted {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buffer);
                return to_text(rest).map(Some);
            }

            match self.stream.next().await {
                Some(chunk) => self.buffer.extend(chunk?),
                None => self.exhausted = true,
            }
        }
    }
}

fn to_text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| RelayError::decode(format!("Result line is not valid UTF-8: {e}")))
}

/// Raw passthrough: every line, trimmed, untyped.
pub async fn decode_raw(stream: ByteStream) -> Result<Vec<Item>> {
    let mut reader = LineReader::new(stream);
    let mut items = Vec::new();
    while let Some(line) = reader.next_line().await? {
        items.push(Item::Raw(line.trim().to_string()));
    }
    Ok(items)
}

/// UTILITY/DDL listing.
///
/// A line with a tab after its first character becomes `{key: value}`; any
/// other non-blank line becomes `{row: line}`.
pub async fn decode_listing(stream: ByteStream) -> Result<Vec<Item>> {
    let mut reader = LineReader::new(stream);
    let mut items = Vec::new();
    while let Some(line) = reader.next_line().await? {
        if let Some(record) = listing_record(&line) {
            items.push(Item::Record(record));
        }
    }
    debug!("Decoded {} listing lines", items.len());
    Ok(items)
}

fn listing_record(line: &str) -> Option<Record> {
    match line.find('\t') {
        Some(pos) if pos > 0 => {
            let mut parts = line.split('\t');
            let key = parts.next().unwrap_or_default().trim();
            let value = parts.next().unwrap_or_default().trim();
            Some(Record::single(key, value))
        }
        _ => {
            let trimmed = line.trim();
            (!trimmed.is_empty()).then(|| Record::single("row", trimmed))
        }
    }
}

/// Splits a byte stream into CSV records as chunks arrive.
///
/// Quoted fields may span lines and chunk boundaries; parser state carries
/// across chunks so only the record being assembled is held in memory.
pub struct DelimitedReader {
    stream: ByteStream,
    parser: csv_core::Reader,
    chunk: Vec<u8>,
    consumed: usize,
    exhausted: bool,
    output: Vec<u8>,
    output_len: usize,
    ends: Vec<usize>,
    ends_len: usize,
}

impl DelimitedReader {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            parser: csv_core::Reader::new(),
            chunk: Vec::new(),
            consumed: 0,
            exhausted: false,
            output: vec![0; 1024],
            output_len: 0,
            ends: vec![0; 16],
            ends_len: 0,
        }
    }

    /// Returns the fields of the next record, or `None` at the end.
    pub async fn next_record(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            // An empty slice tells the parser the input has ended, so empty
            // chunks are skipped rather than handed over.
            if self.consumed >= self.chunk.len() && !self.exhausted {
                match self.stream.next().await {
                    Some(chunk) => {
                        self.chunk = chunk?;
                        self.consumed = 0;
                        continue;
                    }
                    None => self.exhausted = true,
                }
            }

            let (result, read, written, ended) = self.parser.read_record(
                &self.chunk[self.consumed..],
                &mut self.output[self.output_len..],
                &mut self.ends[self.ends_len..],
            );
            self.consumed += read;
            self.output_len += written;
            self.ends_len += ended;

            match result {
                ReadRecordResult::InputEmpty if self.exhausted => return Ok(None),
                ReadRecordResult::InputEmpty => {}
                ReadRecordResult::OutputFull => {
                    let len = self.output.len();
                    self.output.resize(len * 2, 0);
                }
                ReadRecordResult::OutputEndsFull => {
                    let len = self.ends.len();
                    self.ends.resize(len * 2, 0);
                }
                ReadRecordResult::Record => return self.take_record().map(Some),
                ReadRecordResult::End => return Ok(None),
            }
        }
    }

    fn take_record(&mut self) -> Result<Vec<String>> {
        let mut fields = Vec::with_capacity(self.ends_len);
        let mut start = 0;
        for &end in &self.ends[..self.ends_len] {
            let field = std::str::from_utf8(&self.output[start..end]).map_err(|e| {
                RelayError::decode(format!("Result field is not valid UTF-8: {e}"))
            })?;
            fields.push(field.to_string());
            start = end;
        }
        self.output_len = 0;
        self.ends_len = 0;
        Ok(fields)
    }
}

/// DML rows: CSV with a header row, each cell decoded against the manifest.
pub async fn decode_delimited(
    stream: ByteStream,
    manifest: &ColumnManifest,
    options: DecodeOptions,
) -> Result<Vec<Item>> {
    let mut reader = DelimitedReader::new(stream);
    let Some(headers) = reader.next_record().await? else {
        return Ok(Vec::new());
    };

    let mut items = Vec::new();
    while let Some(row) = reader.next_record().await? {
        let mut record = Record::new();
        for (name, raw) in headers.iter().zip(row) {
            if raw.is_empty() {
                if !options.ignore_empty {
                    record.insert(name.as_str(), Value::Null);
                }
                continue;
            }
            let value = coerce_cell(&raw, manifest.type_of(name), options.coercion);
            record.insert(name.as_str(), value);
        }
        items.push(Item::Record(record));
    }

    debug!("Decoded {} CSV rows", items.len());
    Ok(items)
}
