// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use chrono::{DateTime, FixedOffset, Local, LocalResult, Months, TimeZone, Utc};
use log::debug;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of hex characters in the stamp field. The text is the big endian rendering of a u32 (most significant digit first)
pub const TIMESTAMP_HEX_WIDTH: usize = 8;
/// Sortable output format for decoded timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// How far past the reference time a timestamp may be before it is considered invalid
pub const DEFAULT_HORIZON_YEARS: u32 = 50;

/// Timezone used to render decoded timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputZone {
    #[default]
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl FromStr for OutputZone {
    type Err = String;

    /// Accepts `utc`, `local` or an offset such as `+02:00` / `-0530`
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("utc") || value == "Z" {
            return Ok(Self::Utc);
        }
        if value.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }

        let invalid = || format!("Invalid timezone {value}. Expected utc, local or +HH:MM");
        let (sign, offset) = match value.split_at_checked(1) {
            Some(("+", rest)) => (1, rest),
            Some(("-", rest)) => (-1, rest),
            _ => return Err(invalid()),
        };
        let digits = offset.replace(':', "");
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::Fixed)
            .ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// Stamp is not exactly [`TIMESTAMP_HEX_WIDTH`] characters
    Width(usize),
    NotHex,
    /// Epoch seconds outside 1970 through the decoder horizon
    OutOfRange(u32),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width(width) => write!(
                f,
                "Expected {TIMESTAMP_HEX_WIDTH} hex characters. Got: {width}"
            ),
            Self::NotHex => write!(f, "Timestamp is not hexadecimal"),
            Self::OutOfRange(epoch) => write!(f, "Timestamp {epoch} is out of range"),
        }
    }
}

impl std::error::Error for TimestampError {}

/// Timestamp column of a log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Decoded { epoch: u32, text: String },
    /// Raw stamp text that could not be decoded
    Invalid(String),
    /// Subrecord was too damaged to locate a stamp
    Missing,
}

impl Timestamp {
    pub fn is_decoded(&self) -> bool {
        matches!(self, Self::Decoded { .. })
    }

    pub fn epoch(&self) -> Option<u32> {
        match self {
            Self::Decoded { epoch, .. } => Some(*epoch),
            _ => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decoded { text, .. } => f.write_str(text),
            Self::Invalid(raw) => f.write_str(raw),
            Self::Missing => Ok(()),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decodes hex epoch stamps. The plausible range is fixed when the decoder is built so
/// a run produces the same output for every file
#[derive(Debug, Clone)]
pub struct TimestampDecoder {
    zone: OutputZone,
    reference: DateTime<Utc>,
    latest: i64,
}

impl Default for TimestampDecoder {
    fn default() -> Self {
        TimestampDecoder::new(OutputZone::Utc, Utc::now())
    }
}

impl TimestampDecoder {
    pub fn new(zone: OutputZone, reference: DateTime<Utc>) -> Self {
        TimestampDecoder {
            zone,
            reference,
            latest: horizon(reference, DEFAULT_HORIZON_YEARS),
        }
    }

    pub fn with_horizon_years(mut self, years: u32) -> Self {
        self.latest = horizon(self.reference, years);
        self
    }

    /// Parse the stamp into epoch seconds and check it is within range
    pub fn epoch_seconds(&self, raw: &str) -> Result<u32, TimestampError> {
        if raw.len() != TIMESTAMP_HEX_WIDTH {
            return Err(TimestampError::Width(raw.len()));
        }
        // from_str_radix accepts a leading '+'
        if !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TimestampError::NotHex);
        }
        let epoch = u32::from_str_radix(raw, 16).map_err(|_| TimestampError::NotHex)?;
        if i64::from(epoch) > self.latest {
            return Err(TimestampError::OutOfRange(epoch));
        }
        Ok(epoch)
    }

    /// Decode the stamp to a UTC date time
    pub fn decode(&self, raw: &str) -> Result<DateTime<Utc>, TimestampError> {
        let epoch = self.epoch_seconds(raw)?;
        match Utc.timestamp_opt(i64::from(epoch), 0) {
            LocalResult::Single(date_time) => Ok(date_time),
            _ => Err(TimestampError::OutOfRange(epoch)),
        }
    }

    /// Render a UTC date time in the configured zone
    pub fn format(&self, date_time: &DateTime<Utc>) -> String {
        match self.zone {
            OutputZone::Utc => date_time.format(TIMESTAMP_FORMAT).to_string(),
            OutputZone::Local => date_time
                .with_timezone(&Local)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            OutputZone::Fixed(offset) => date_time
                .with_timezone(&offset)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
        }
    }

    /// Decode a stamp into the timestamp column. Never fails, undecodable stamps keep their raw text
    pub fn decode_field(&self, raw: &str) -> Timestamp {
        match self.decode(raw) {
            Ok(date_time) => Timestamp::Decoded {
                // decode only succeeds for u32 seconds
                epoch: u32::try_from(date_time.timestamp()).unwrap_or_default(),
                text: self.format(&date_time),
            },
            Err(err) => {
                debug!("[vc0-logs] Could not decode timestamp {raw}: {err}");
                Timestamp::Invalid(raw.to_string())
            }
        }
    }
}

fn horizon(reference: DateTime<Utc>, years: u32) -> i64 {
    reference
        .checked_add_months(Months::new(years.saturating_mul(12)))
        .map_or(i64::MAX, |date_time| date_time.timestamp())
}

/// Render a UTC date time as the 8 character uppercase hex stamp. Returns None if the time does not fit in a u32
pub fn encode_epoch(date_time: &DateTime<Utc>) -> Option<String> {
    let epoch = u32::try_from(date_time.timestamp()).ok()?;
    Some(format!("{epoch:08X}"))
}
