//! Cursor over the append-only CSV feed.
//!
//! The cursor is a small owned value: it holds the open `csv` reader plus a
//! one-record lookahead so callers can ask [`FeedCursor::has_next`] before
//! consuming anything. The header record is discarded on open. Reaching the
//! end never wraps around on its own; callers either drop the cursor or call
//! [`FeedCursor::reset`].
//!
//! Records are read as bytes. A record that is not valid UTF-8 is still
//! delivered, flagged, so the normalizer can reject it as a malformed row
//! without stalling the feed.

use std::{
    fs::File,
    io::{Cursor, Read},
    path::PathBuf,
    sync::Arc,
};

use csv::{ByteRecord, Reader, ReaderBuilder};

use crate::errors::FeedError;

// ---

/// Where feed records come from.
#[derive(Debug, Clone)]
pub enum FeedSource {
    File(PathBuf),
    /// In-memory feed text, used by tests and tooling.
    Text(Arc<str>),
}

impl FeedSource {
    pub fn name(&self) -> String {
        // ---
        match self {
            FeedSource::File(path) => path.display().to_string(),
            FeedSource::Text(_) => "<inline feed>".to_string(),
        }
    }

    fn open_reader(&self) -> Result<Box<dyn Read + Send>, FeedError> {
        // ---
        match self {
            FeedSource::File(path) => {
                let file = File::open(path).map_err(|source| FeedError::Unavailable {
                    source_name: self.name(),
                    source,
                })?;
                Ok(Box::new(file))
            }
            FeedSource::Text(text) => Ok(Box::new(Cursor::new(text.as_bytes().to_vec()))),
        }
    }
}

/// Feed rows may have any field count; the normalizer decides what fits.
fn reader_builder(has_headers: bool) -> ReaderBuilder {
    // ---
    let mut builder = ReaderBuilder::new();
    builder.has_headers(has_headers).flexible(true);
    builder
}

/// One unconsumed data record with empty fields preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the feed (the header is line 1).
    pub line: usize,
    pub fields: Vec<String>,
    /// Some field was not valid UTF-8; `fields` holds a lossy decoding.
    pub invalid_utf8: bool,
}

impl RawRow {
    /// Parse a single CSV line. Quoted fields may contain commas.
    pub fn parse(line: usize, text: &str) -> Self {
        // ---
        let mut record = ByteRecord::new();
        let mut reader = reader_builder(false).from_reader(text.as_bytes());
        match reader.read_byte_record(&mut record) {
            Ok(true) => RawRow::from_record(line, &record),
            _ => RawRow {
                line,
                fields: Vec::new(),
                invalid_utf8: false,
            },
        }
    }

    fn from_record(line: usize, record: &ByteRecord) -> Self {
        // ---
        let mut invalid_utf8 = false;
        let fields = record
            .iter()
            .map(|bytes| match std::str::from_utf8(bytes) {
                Ok(text) => text.to_string(),
                Err(_) => {
                    invalid_utf8 = true;
                    String::from_utf8_lossy(bytes).into_owned()
                }
            })
            .collect();
        RawRow {
            line,
            fields,
            invalid_utf8,
        }
    }

    /// Identity of the row's content, independent of its position.
    pub fn content_key(&self) -> String {
        self.fields.join(",")
    }

    fn is_blank(&self) -> bool {
        self.fields.iter().all(|field| field.trim().is_empty()) && self.fields.len() <= 1
    }
}

pub struct FeedCursor {
    source: FeedSource,
    reader: Reader<Box<dyn Read + Send>>,
    record: ByteRecord,
    lookahead: Option<RawRow>,
    /// Read failure hit while filling the lookahead, reported after the
    /// buffered row has been handed out.
    pending_error: Option<FeedError>,
}

impl std::fmt::Debug for FeedCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCursor")
            .field("source", &self.source)
            .field("lookahead", &self.lookahead)
            .field("pending_error", &self.pending_error)
            .finish()
    }
}

impl FeedCursor {
    /// Open the source, discard the header and buffer the first data row.
    pub fn open(source: FeedSource) -> Result<Self, FeedError> {
        // ---
        let mut reader = reader_builder(true).from_reader(source.open_reader()?);
        let header = reader
            .byte_headers()
            .map_err(|source| FeedError::Read { line: 1, source })?;
        tracing::debug!(
            "Feed {} header: {} columns",
            source.name(),
            header.len()
        );

        let mut cursor = FeedCursor {
            source,
            reader,
            record: ByteRecord::new(),
            lookahead: None,
            pending_error: None,
        };
        cursor.fill_lookahead()?;
        Ok(cursor)
    }

    pub fn has_next(&self) -> bool {
        self.lookahead.is_some()
    }

    /// Take the buffered row and read ahead one more. `Ok(None)` is end-of-feed.
    ///
    /// A read failure while looking ahead does not cost the buffered row: the
    /// row is returned and the error surfaces on the following call.
    pub fn next_row(&mut self) -> Result<Option<RawRow>, FeedError> {
        // ---
        let Some(row) = self.lookahead.take() else {
            return match self.pending_error.take() {
                Some(e) => Err(e),
                None => Ok(None),
            };
        };
        if let Err(e) = self.fill_lookahead() {
            self.pending_error = Some(e);
        }
        Ok(Some(row))
    }

    /// Drain every remaining row. A read error stops the drain and is
    /// returned next to the rows read before it.
    pub fn read_remaining(&mut self) -> (Vec<RawRow>, Option<FeedError>) {
        // ---
        let mut rows = Vec::new();
        loop {
            match self.next_row() {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => return (rows, None),
                Err(e) => return (rows, Some(e)),
            }
        }
    }

    /// Reopen the same source at its first data row.
    pub fn reset(&mut self) -> Result<(), FeedError> {
        // ---
        tracing::debug!("Resetting feed cursor on {}", self.source.name());
        *self = FeedCursor::open(self.source.clone())?;
        Ok(())
    }

    fn fill_lookahead(&mut self) -> Result<(), FeedError> {
        // ---
        self.lookahead = None;
        loop {
            let line = self.reader.position().line() as usize;
            let more = self
                .reader
                .read_byte_record(&mut self.record)
                .map_err(|source| FeedError::Read { line, source })?;
            if !more {
                return Ok(());
            }

            let line = self
                .record
                .position()
                .map_or(line, |pos| pos.line() as usize);
            let row = RawRow::from_record(line, &self.record);
            if row.is_blank() {
                continue;
            }
            self.lookahead = Some(row);
            return Ok(());
        }
    }
}
