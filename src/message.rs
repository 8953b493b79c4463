// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use crate::codemap::CodeMap;
use crate::fields::{Extraction, MessageCode, SubrecordFields};
use crate::sanitizer::sanitize;
use crate::scanner::RawRecord;
use crate::timestamp::{Timestamp, TimestampDecoder};
use log::debug;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Anomalies found while decoding a subrecord. Several flags can be set at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Status(u8);

impl Status {
    pub const OK: Status = Status(0);
    pub const MALFORMED: Status = Status(0x1);
    pub const INVALID_TIMESTAMP: Status = Status(0x2);
    pub const UNPARSEABLE_CODE: Status = Status(0x4);
    pub const UNRESOLVED_CODE: Status = Status(0x8);
    /// File ended before the subrecord delimiter, the last fields may be cut short
    pub const TRUNCATED: Status = Status(0x10);

    /// Tags in output order
    const TAGS: [(Status, &'static str); 5] = [
        (Status::MALFORMED, "malformed"),
        (Status::TRUNCATED, "truncated"),
        (Status::INVALID_TIMESTAMP, "invalid-timestamp"),
        (Status::UNPARSEABLE_CODE, "unparseable-code"),
        (Status::UNRESOLVED_CODE, "unresolved-code"),
    ];

    pub fn is_ok(self) -> bool {
        self == Status::OK
    }

    pub fn contains(self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn tags(self) -> Vec<&'static str> {
        if self.is_ok() {
            return vec!["ok"];
        }
        Status::TAGS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, tag)| *tag)
            .collect()
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        Status(self.0 | rhs.0)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Status {
    /// `ok`, or the set tags joined by `;` (ex: `invalid-timestamp;unresolved-code`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tags().join(";"))
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One output row. Every subrecord found by the scanner produces exactly one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogEntry {
    /// Offset of the subrecord in the source file
    pub offset: usize,
    pub timestamp: Timestamp,
    pub line_id: String,
    pub hostname: String,
    pub source: String,
    /// None when the subrecord was too damaged to locate the code field
    pub message_code: Option<MessageCode>,
    pub message_type: String,
    pub description: String,
    pub raw_message: String,
    pub status: Status,
}

impl LogEntry {
    /// Column names used by tabular output, matching [`LogEntry::to_record`]
    pub const COLUMNS: [&'static str; 9] = [
        "Timestamp",
        "LineId",
        "Hostname",
        "Source",
        "MessageCode",
        "MessageType",
        "Description",
        "RawMessage",
        "Status",
    ];

    /// Decode, sanitize and resolve a subrecord into a log entry
    pub fn build(
        record: &RawRecord<'_>,
        code_map: &CodeMap,
        decoder: &TimestampDecoder,
    ) -> LogEntry {
        let fields = match SubrecordFields::extract(record.data) {
            Extraction::Fields(fields) => fields,
            Extraction::Malformed { data, reason } => {
                debug!(
                    "[vc0-logs] Malformed subrecord at offset {}: {}",
                    record.offset, reason
                );
                return LogEntry::malformed(record.offset, data);
            }
        };

        let mut status = Status::OK;
        if !record.terminated {
            status |= Status::TRUNCATED;
        }

        let timestamp = decoder.decode_field(&sanitize(fields.timestamp));
        if !timestamp.is_decoded() {
            status |= Status::INVALID_TIMESTAMP;
        }

        let code = MessageCode::parse(fields.code);
        if !code.is_parsed() {
            status |= Status::UNPARSEABLE_CODE;
        }

        let resolution = code_map.resolve(&code);
        if !resolution.is_resolved() {
            status |= Status::UNRESOLVED_CODE;
        }

        LogEntry {
            offset: record.offset,
            timestamp,
            line_id: sanitize(fields.line_id),
            hostname: sanitize(fields.hostname),
            source: sanitize(fields.source),
            message_type: resolution.message_type().to_string(),
            description: resolution.description().to_string(),
            message_code: Some(code),
            raw_message: fields.payload_text(),
            status,
        }
    }

    /// Entry for a subrecord that could not be split into fields. The whole subrecord is kept as the raw message
    fn malformed(offset: usize, data: &[u8]) -> LogEntry {
        LogEntry {
            offset,
            timestamp: Timestamp::Missing,
            line_id: String::new(),
            hostname: String::new(),
            source: String::new(),
            message_code: None,
            message_type: String::new(),
            description: String::new(),
            raw_message: sanitize(data),
            status: Status::MALFORMED,
        }
    }

    /// Row values in [`LogEntry::COLUMNS`] order
    pub fn to_record(&self) -> [String; 9] {
        [
            self.timestamp.to_string(),
            self.line_id.clone(),
            self.hostname.clone(),
            self.source.clone(),
            self.message_code
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            self.message_type.clone(),
            self.description.clone(),
            self.raw_message.clone(),
            self.status.to_string(),
        ]
    }
}
