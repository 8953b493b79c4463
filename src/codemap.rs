// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use crate::error::MappingError;
use crate::fields::MessageCode;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;

pub const MESSAGE_CODE_COLUMN: &str = "MessageCode";
pub const MESSAGE_TYPE_COLUMN: &str = "MessageType";
pub const DESCRIPTION_COLUMN: &str = "Description";
/// Message type reported for codes missing from the mapping
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

const REQUIRED_COLUMNS: [&str; 3] = [MESSAGE_CODE_COLUMN, MESSAGE_TYPE_COLUMN, DESCRIPTION_COLUMN];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMapEntry {
    #[serde(rename = "MessageCode")]
    pub code: String,
    #[serde(rename = "MessageType")]
    pub message_type: String,
    #[serde(rename = "Description")]
    pub description: String,
}

/// Reference mapping from message code to type and description.
/// Loaded once per run and never modified afterwards
#[derive(Debug, Clone, Default)]
pub struct CodeMap {
    entries: HashMap<String, CodeMapEntry>,
}

/// Outcome of a code lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Known(&'a CodeMapEntry),
    Unknown,
}

impl Resolution<'_> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn message_type(&self) -> &str {
        match self {
            Self::Known(entry) => &entry.message_type,
            Self::Unknown => UNKNOWN_TYPE,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Known(entry) => &entry.description,
            Self::Unknown => "",
        }
    }
}

impl CodeMap {
    /// Load the mapping from CSV data with the header `MessageCode,MessageType,Description`.
    /// Fails on a wrong header, short or long rows, empty codes or duplicate codes
    pub fn from_reader<R: Read>(reader: R) -> Result<CodeMap, MappingError> {
        let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

        let headers = clean_headers(csv_reader.headers()?);
        let header_valid = headers.len() == REQUIRED_COLUMNS.len()
            && REQUIRED_COLUMNS
                .iter()
                .all(|column| headers.iter().filter(|header| header == column).count() == 1);
        if !header_valid {
            let found: Vec<String> = headers.iter().map(String::from).collect();
            error!("[vc0-logs] Invalid message map header: {:?}", found);
            return Err(MappingError::Header { found });
        }

        let mut code_map = CodeMap::default();
        let mut first_lines: HashMap<String, u64> = HashMap::new();
        for result in csv_reader.records() {
            let record = result?;
            let line = record.position().map_or(0, csv::Position::line);
            let entry: CodeMapEntry = record.deserialize(Some(&headers))?;
            code_map.insert(entry, line, &mut first_lines)?;
        }

        info!("[vc0-logs] Loaded {} message codes", code_map.len());
        Ok(code_map)
    }

    /// Build a mapping from entries. Line numbers in errors are the 1 based entry position
    pub fn from_entries<I>(entries: I) -> Result<CodeMap, MappingError>
    where
        I: IntoIterator<Item = CodeMapEntry>,
    {
        let mut code_map = CodeMap::default();
        let mut first_lines: HashMap<String, u64> = HashMap::new();
        for (line, entry) in (1..).zip(entries) {
            code_map.insert(entry, line, &mut first_lines)?;
        }
        Ok(code_map)
    }

    fn insert(
        &mut self,
        entry: CodeMapEntry,
        line: u64,
        first_lines: &mut HashMap<String, u64>,
    ) -> Result<(), MappingError> {
        if entry.code.is_empty() {
            error!("[vc0-logs] Empty message code on line {line}");
            return Err(MappingError::EmptyCode { line });
        }
        if let Some(first_line) = first_lines.get(&entry.code) {
            error!(
                "[vc0-logs] Duplicate message code {} on line {} (first seen on line {})",
                entry.code, line, first_line
            );
            return Err(MappingError::DuplicateCode {
                code: entry.code,
                first_line: *first_line,
                line,
            });
        }
        first_lines.insert(entry.code.clone(), line);
        self.entries.insert(entry.code.clone(), entry);
        Ok(())
    }

    /// Look up a message code. Unparseable codes are looked up verbatim
    pub fn resolve(&self, code: &MessageCode) -> Resolution<'_> {
        match self.entries.get(code.as_str()) {
            Some(entry) => Resolution::Known(entry),
            None => Resolution::Unknown,
        }
    }

    pub fn get(&self, code: &str) -> Option<&CodeMapEntry> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drop a UTF-8 BOM and surrounding whitespace from header names
fn clean_headers(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim())
        .collect()
}
