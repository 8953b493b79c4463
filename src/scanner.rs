// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use crate::error::ParserError;
use crate::fields::MIN_HEADER_SIZE;
use log::{error, warn};
use nom::bytes::complete::{take_till, take_while};

/// Size of the container header at the start of every vc0 file. The header holds no log records
pub const FILE_HEADER_SIZE: usize = 8192;

/// Bytes that end a subrecord: line feed plus the control bytes the appliance writes between entries
pub const RECORD_DELIMITERS: [u8; 11] = [
    0x0a, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x12, 0x13, 0x15, 0x17,
];

pub fn is_record_delimiter(byte: u8) -> bool {
    RECORD_DELIMITERS.contains(&byte)
}

/// One candidate subrecord in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Absolute offset of the first byte in the source file
    pub offset: usize,
    pub data: &'a [u8],
    /// False when the file ended before a delimiter
    pub terminated: bool,
}

impl RawRecord<'_> {
    /// Trailing fragment too short to hold a header
    pub fn is_truncated(&self) -> bool {
        !self.terminated && self.data.len() < MIN_HEADER_SIZE
    }
}

/// Iterator over the subrecords of a vc0 file, in file order.
/// Cloning the scanner restarts from the same position
#[derive(Debug, Clone)]
pub struct RecordScanner<'a> {
    data: &'a [u8],
    position: usize,
    skipped: usize,
}

impl<'a> RecordScanner<'a> {
    /// Scan a complete vc0 file. Empty files produce no records, files too small for the container header are an error
    pub fn new(data: &'a [u8]) -> Result<Self, ParserError> {
        if data.is_empty() {
            return Ok(RecordScanner {
                data,
                position: 0,
                skipped: 0,
            });
        }
        if data.len() < FILE_HEADER_SIZE {
            error!(
                "[vc0-logs] File too small for container header. Expected at least {} bytes. Got: {}",
                FILE_HEADER_SIZE,
                data.len()
            );
            return Err(ParserError::Header);
        }
        Ok(RecordScanner {
            data,
            position: FILE_HEADER_SIZE,
            skipped: 0,
        })
    }

    /// Scan data that has no container header, such as a carved fragment of a log body.
    /// Offsets are relative to the start of `data`
    pub fn without_header(data: &'a [u8]) -> Self {
        RecordScanner {
            data,
            position: 0,
            skipped: 0,
        }
    }

    /// Number of whitespace only spans dropped as padding so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<'a> Iterator for RecordScanner<'a> {
    type Item = RawRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let input = self.data.get(self.position..)?;
            if input.is_empty() {
                return None;
            }

            let (remaining, (skipped, span)) = match next_span(input) {
                Ok(result) => result,
                Err(err) => {
                    error!("[vc0-logs] Failed to scan subrecord at offset {}: {:?}", self.position, err);
                    self.position = self.data.len();
                    return None;
                }
            };

            let start = self.position + skipped;
            self.position = self.data.len() - remaining.len();

            // Runs of delimiters and whitespace are padding between entries
            let trimmed = span.trim_ascii();
            if trimmed.is_empty() {
                if !span.is_empty() {
                    self.skipped += 1;
                }
                continue;
            }
            let leading = span.len() - span.trim_ascii_start().len();

            let record = RawRecord {
                offset: start + leading,
                data: trimmed,
                terminated: !remaining.is_empty(),
            };
            if record.is_truncated() {
                warn!(
                    "[vc0-logs] Last subrecord at offset {} is truncated ({} bytes)",
                    record.offset,
                    record.data.len()
                );
            } else if !record.terminated {
                warn!(
                    "[vc0-logs] Last subrecord at offset {} is not terminated",
                    record.offset
                );
            }
            return Some(record);
        }
    }
}

/// Skip any delimiters then take bytes up to the next delimiter. Returns the number of skipped bytes and the span
fn next_span(input: &[u8]) -> nom::IResult<&[u8], (usize, &[u8])> {
    let (input, delimiters) = take_while(is_record_delimiter)(input)?;
    let (input, span) = take_till(is_record_delimiter)(input)?;
    Ok((input, (delimiters.len(), span)))
}
