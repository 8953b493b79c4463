// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use std::fmt;

/// Errors that stop a single vc0 file (or the input directory) from being parsed.
/// Record level problems never surface here, they end up in the row status instead
#[derive(Debug)]
pub enum ParserError {
    Dir,
    Read,
    /// File is not empty but too small to hold the container header
    Header,
}

impl std::error::Error for ParserError {}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dir => write!(f, "Failed to open directory path"),
            Self::Read => write!(f, "Failed to read file"),
            Self::Header => write!(f, "File is smaller than the vc0 container header"),
        }
    }
}

/// Errors raised while loading the message code mapping. All of them are fatal for a run
#[derive(Debug)]
pub enum MappingError {
    Read(std::io::Error),
    Csv(csv::Error),
    Header {
        found: Vec<String>,
    },
    EmptyCode {
        line: u64,
    },
    DuplicateCode {
        code: String,
        first_line: u64,
        line: u64,
    },
}

impl std::error::Error for MappingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(err) => write!(f, "Failed to read message map: {err}"),
            Self::Csv(err) => write!(f, "Failed to parse message map: {err}"),
            Self::Header { found } => write!(
                f,
                "Message map header must be MessageCode, MessageType, Description. Got: {}",
                found.join(", ")
            ),
            Self::EmptyCode { line } => write!(f, "Empty message code on line {line}"),
            Self::DuplicateCode {
                code,
                first_line,
                line,
            } => write!(
                f,
                "Duplicate message code {code} on line {line} (first seen on line {first_line})"
            ),
        }
    }
}

impl From<std::io::Error> for MappingError {
    fn from(err: std::io::Error) -> Self {
        Self::Read(err)
    }
}

impl From<csv::Error> for MappingError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}
