//! Bulk files: an index payload followed by action and document lines.
//!
//! A bulk file is newline-delimited JSON. The first line is the [`IndexPayload`] describing the
//! target index; every document then takes two lines, an action line and the document source:
//!
//! ```text
//! {"index":"bench_keyword","settings":{...},"mappings":{...}}
//! {"index":{"_index":"bench_keyword","_id":"doc-000001"}}
//! {"color":"red","id":"doc-000001","size":"m"}
//! ```
//!
//! The action and document lines can be sent to the search service's bulk API as they are.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::documents::{DocumentGenerator, IndexPayload};
use crate::error::{Error, Result};

/// The action line preceding every document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BulkAction {
    /// Metadata of an `index` operation.
    pub index: ActionMeta,
}

/// Target of a bulk `index` operation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActionMeta {
    /// The index to write to.
    #[serde(rename = "_index")]
    pub index: String,
    /// The document identifier.
    #[serde(rename = "_id")]
    pub id: String,
}

/// A document read back from a bulk file.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkEntry {
    /// The action line.
    pub action: BulkAction,
    /// The document source.
    pub source: Value,
}

/// Returns the number of lines a bulk file with `doc_count` documents must have.
pub fn expected_lines(doc_count: u64) -> u64 {
    1 + 2 * doc_count
}

/// Writes a complete bulk file with `doc_count` documents and returns the number of lines written.
pub fn write_bulk<W: Write>(
    mut writer: W,
    payload: &IndexPayload,
    generator: &mut DocumentGenerator<'_>,
    doc_count: u64,
) -> Result<u64> {
    write_line(&mut writer, payload)?;
    let mut lines = 1;

    for _ in 0..doc_count {
        let (id, source) = generator.next_document();
        let action = BulkAction {
            index: ActionMeta {
                index: payload.index.clone(),
                id,
            },
        };
        write_line(&mut writer, &action)?;
        write_line(&mut writer, &source)?;
        lines += 2;
    }

    writer.flush()?;
    Ok(lines)
}

fn write_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, value).map_err(std::io::Error::from)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Reads documents back from a bulk file.
#[derive(Debug)]
pub struct BulkReader<R> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl<R: BufRead> BulkReader<R> {
    /// Reads the header line and returns it together with a reader over the documents.
    pub fn open(reader: R) -> Result<(IndexPayload, Self)> {
        let mut reader = Self {
            lines: reader.lines(),
            line: 0,
        };

        let header = reader
            .next_line()?
            .ok_or_else(|| Error::MalformedBulk("missing index payload".into()))?;
        let payload = reader.parse(&header)?;

        Ok((payload, reader))
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        match self.lines.next() {
            Some(line) => {
                self.line += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn parse<T: for<'de> Deserialize<'de>>(&self, line: &str) -> Result<T> {
        serde_json::from_str(line).map_err(|source| Error::Json {
            line: self.line,
            source,
        })
    }

    fn next_entry(&mut self) -> Result<Option<BulkEntry>> {
        let Some(action) = self.next_line()? else {
            return Ok(None);
        };
        if action.trim().is_empty() {
            return Ok(None);
        }
        let action = self.parse(&action)?;

        let Some(source) = self.next_line()? else {
            return Err(Error::MalformedBulk(format!(
                "action on line {} has no document",
                self.line
            )));
        };
        let source = self.parse(&source)?;

        Ok(Some(BulkEntry { action, source }))
    }
}

impl<R: BufRead> Iterator for BulkReader<R> {
    type Item = Result<BulkEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
