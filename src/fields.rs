// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use crate::sanitizer::sanitize;
use crate::timestamp::TIMESTAMP_HEX_WIDTH;
use log::debug;
use nom::bytes::complete::{take_till, take_while_m_n};
use serde::{Serialize, Serializer};
use std::fmt;

/// Separates the hex timestamp from the hex line id in the first field
pub const STAMP_SEPARATOR: u8 = b'.';
/// Smallest subrecord that can hold a stamp: timestamp, separator and one line id digit
pub const MIN_HEADER_SIZE: usize = TIMESTAMP_HEX_WIDTH + 2;
/// Payload fields are joined with this byte after extraction
pub const PAYLOAD_SEPARATOR: u8 = b',';

const MAX_CODE_PREFIX: usize = 8;
const MAX_CODE_DIGITS: usize = 10;

/// Fields inside a subrecord are separated by TAB or comma
pub fn is_field_separator(byte: u8) -> bool {
    byte == b'\t' || byte == b','
}

/// Message code of a subrecord. Codes are an optional uppercase mnemonic followed by digits (ex: `100`, `ADM23247`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageCode {
    Parsed {
        text: String,
        prefix: String,
        number: u64,
    },
    /// Sanitized code text that does not follow the code layout
    Unparseable(String),
}

impl MessageCode {
    /// Parse the code field. Surrounding whitespace is ignored
    pub fn parse(data: &[u8]) -> MessageCode {
        let data = data.trim_ascii();
        match code_parts(data) {
            Ok((remaining, (prefix, digits))) if remaining.is_empty() => {
                let text = sanitize(data);
                let number = sanitize(digits).parse::<u64>();
                match number {
                    Ok(number) => MessageCode::Parsed {
                        prefix: sanitize(prefix),
                        text,
                        number,
                    },
                    Err(_) => MessageCode::Unparseable(text),
                }
            }
            _ => {
                debug!(
                    "[vc0-logs] Unparseable message code: {:?}",
                    sanitize(data)
                );
                MessageCode::Unparseable(sanitize(data))
            }
        }
    }

    /// Code text used for lookups and output
    pub fn as_str(&self) -> &str {
        match self {
            Self::Parsed { text, .. } => text,
            Self::Unparseable(raw) => raw,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn code_parts(input: &[u8]) -> nom::IResult<&[u8], (&[u8], &[u8])> {
    let (input, prefix) =
        take_while_m_n(0, MAX_CODE_PREFIX, |b: u8| b.is_ascii_uppercase())(input)?;
    let (input, digits) = take_while_m_n(1, MAX_CODE_DIGITS, |b: u8| b.is_ascii_digit())(input)?;
    Ok((input, (prefix, digits)))
}

/// Why a subrecord could not be split into fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Shorter than [`MIN_HEADER_SIZE`]
    Short,
    /// First field has no `.` between timestamp and line id, or the line id is not hex
    Stamp,
    /// Subrecord ends before the message code field
    MissingCode,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "subrecord shorter than header"),
            Self::Stamp => write!(f, "missing stamp separator or line id"),
            Self::MissingCode => write!(f, "missing message code field"),
        }
    }
}

/// Raw field slices of one subrecord
/// Layout: `<hex timestamp>.<hex line id>` `<hostname>` `<source>` `<message code>` `<payload...>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubrecordFields<'a> {
    pub timestamp: &'a [u8],
    pub line_id: &'a [u8],
    pub hostname: &'a [u8],
    pub source: &'a [u8],
    pub code: &'a [u8],
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<'a> {
    Fields(SubrecordFields<'a>),
    Malformed {
        data: &'a [u8],
        reason: MalformedReason,
    },
}

impl<'a> SubrecordFields<'a> {
    /// Split a subrecord into its fields. Damaged subrecords are returned whole so the caller can keep them
    pub fn extract(data: &'a [u8]) -> Extraction<'a> {
        if data.len() < MIN_HEADER_SIZE {
            return Extraction::Malformed {
                data,
                reason: MalformedReason::Short,
            };
        }

        let stamp_result = stamp(data);
        let (input, (timestamp, line_id)) = match stamp_result {
            Ok((input, Some(stamp))) => (input, stamp),
            _ => {
                return Extraction::Malformed {
                    data,
                    reason: MalformedReason::Stamp,
                };
            }
        };

        match Self::parse_fields(input) {
            Ok((payload, (hostname, source, code))) => Extraction::Fields(SubrecordFields {
                timestamp,
                line_id,
                hostname,
                source,
                code,
                payload,
            }),
            Err(_) => Extraction::Malformed {
                data,
                reason: MalformedReason::MissingCode,
            },
        }
    }

    fn parse_fields(input: &'a [u8]) -> nom::IResult<&'a [u8], (&'a [u8], &'a [u8], &'a [u8])> {
        let (input, hostname) = next_field(input)?;
        let (input, source) = next_field(input)?;
        let (input, code) = next_field(input)?;
        // Payload starts after the separator that ends the code, if there is one
        let payload = input.get(1..).unwrap_or_default();
        Ok((payload, (hostname, source, code)))
    }

    /// Payload text with TAB separators normalised to commas, then sanitized
    pub fn payload_text(&self) -> String {
        let normalised: Vec<u8> = self
            .payload
            .iter()
            .map(|byte| {
                if is_field_separator(*byte) {
                    PAYLOAD_SEPARATOR
                } else {
                    *byte
                }
            })
            .collect();
        sanitize(&normalised)
    }
}

/// First field split into timestamp and line id.
/// None if the field has no stamp separator or the line id is not at least one hex digit
fn stamp(input: &[u8]) -> nom::IResult<&[u8], Option<(&[u8], &[u8])>> {
    let (input, field) = take_till(is_field_separator)(input)?;
    let split = field
        .iter()
        .position(|byte| *byte == STAMP_SEPARATOR)
        .map(|index| (&field[..index], &field[index + 1..]))
        .filter(|(_, line_id)| {
            !line_id.is_empty() && line_id.iter().all(u8::is_ascii_hexdigit)
        });
    Ok((input, split))
}

/// Consume one field separator then the field that follows it
fn next_field(input: &[u8]) -> nom::IResult<&[u8], &[u8]> {
    let (input, _) = take_while_m_n(1, 1, is_field_separator)(input)?;
    take_till(is_field_separator)(input)
}
