// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

//! Parse ICS appliance vc0 log data
//!
//! Subrecords are returned in the order they appear in the file. Entries are never sorted by time,
//! out of order timestamps are kept as they are.

use crate::codemap::CodeMap;
use crate::error::ParserError;
use crate::message::{LogEntry, Status};
use crate::scanner::RecordScanner;
use crate::timestamp::TimestampDecoder;
use log::{info, warn};
use serde::Serialize;

/// Row counts for one vc0 file. A high anomaly count can itself point to tampering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub total: usize,
    pub ok: usize,
    pub malformed: usize,
    pub truncated: usize,
    pub invalid_timestamp: usize,
    pub unparseable_code: usize,
    pub unresolved_code: usize,
    /// Whitespace only spans between delimiters. Not rows, not anomalies
    pub skipped: usize,
}

impl ParseSummary {
    /// Count one row. A row with several flags is counted once per flag
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        if status.is_ok() {
            self.ok += 1;
        }
        if status.contains(Status::MALFORMED) {
            self.malformed += 1;
        }
        if status.contains(Status::TRUNCATED) {
            self.truncated += 1;
        }
        if status.contains(Status::INVALID_TIMESTAMP) {
            self.invalid_timestamp += 1;
        }
        if status.contains(Status::UNPARSEABLE_CODE) {
            self.unparseable_code += 1;
        }
        if status.contains(Status::UNRESOLVED_CODE) {
            self.unresolved_code += 1;
        }
    }

    /// Number of rows with at least one anomaly
    pub fn anomalies(&self) -> usize {
        self.total - self.ok
    }

    /// Log the summary for a source file. Anomalies are logged as warnings so they are not buried
    pub fn log(&self, source: &str) {
        if self.anomalies() == 0 {
            info!(
                "[vc0-logs] {}: {} entries, no anomalies, {} padding spans skipped",
                source, self.total, self.skipped
            );
            return;
        }
        warn!(
            "[vc0-logs] {}: {} entries, {} malformed, {} truncated, {} invalid timestamp, {} unparseable code, {} unresolved code",
            source,
            self.total,
            self.malformed,
            self.truncated,
            self.invalid_timestamp,
            self.unparseable_code,
            self.unresolved_code
        );
    }
}

/// Decoded entries of one vc0 file in file order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub entries: Vec<LogEntry>,
    pub summary: ParseSummary,
}

impl ParseResult {
    /// Parse the full contents of a vc0 file
    pub fn parse_vc0(
        data: &[u8],
        code_map: &CodeMap,
        decoder: &TimestampDecoder,
    ) -> Result<ParseResult, ParserError> {
        Ok(Self::collect(Vc0LogIterator::new(data, code_map, decoder)?))
    }

    /// Parse a carved piece of a vc0 log body that has no container header.
    /// Offsets are relative to the start of the fragment
    pub fn parse_fragment(
        data: &[u8],
        code_map: &CodeMap,
        decoder: &TimestampDecoder,
    ) -> ParseResult {
        Self::collect(Vc0LogIterator::from_fragment(data, code_map, decoder))
    }

    fn collect(mut log_iterator: Vc0LogIterator<'_>) -> ParseResult {
        let mut result = ParseResult::default();
        for entry in log_iterator.by_ref() {
            result.summary.record(entry.status);
            result.entries.push(entry);
        }
        result.summary.skipped = log_iterator.skipped();
        result
    }
}

/// Lazily decode the entries of a vc0 file, one subrecord at a time
#[derive(Debug, Clone)]
pub struct Vc0LogIterator<'a> {
    scanner: RecordScanner<'a>,
    code_map: &'a CodeMap,
    decoder: &'a TimestampDecoder,
}

impl<'a> Vc0LogIterator<'a> {
    pub fn new(
        data: &'a [u8],
        code_map: &'a CodeMap,
        decoder: &'a TimestampDecoder,
    ) -> Result<Self, ParserError> {
        Ok(Vc0LogIterator {
            scanner: RecordScanner::new(data)?,
            code_map,
            decoder,
        })
    }

    /// Decode a log body fragment without a container header
    pub fn from_fragment(
        data: &'a [u8],
        code_map: &'a CodeMap,
        decoder: &'a TimestampDecoder,
    ) -> Self {
        Vc0LogIterator {
            scanner: RecordScanner::without_header(data),
            code_map,
            decoder,
        }
    }

    /// Padding spans dropped so far
    pub fn skipped(&self) -> usize {
        self.scanner.skipped()
    }
}

impl Iterator for Vc0LogIterator<'_> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.scanner.next()?;
        Some(LogEntry::build(&record, self.code_map, self.decoder))
    }
}
