// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use log::{error, info, warn};

use crate::codemap::CodeMap;
use crate::error::{MappingError, ParserError};
use crate::scanner::FILE_HEADER_SIZE;
use crate::timestamp::TimestampDecoder;
use crate::traits::{FileProvider, SourceFile};
use crate::vc0_log::ParseResult;
use std::fs::File;
use std::io::Read;

/// Load the message code mapping. Must succeed before any vc0 file is parsed
pub fn load_code_map(path: &str) -> Result<CodeMap, MappingError> {
    let handle = match File::open(path) {
        Ok(result) => result,
        Err(err) => {
            error!(
                "[vc0-logs] Failed to open the message map file {}: {:?}",
                path, err
            );
            return Err(MappingError::Read(err));
        }
    };
    CodeMap::from_reader(handle)
}

/// Parse a vc0 file and return the decoded log entries in file order
pub fn parse_log(
    mut reader: impl Read,
    code_map: &CodeMap,
    decoder: &TimestampDecoder,
) -> Result<ParseResult, ParserError> {
    let mut buffer = Vec::new();
    if let Err(err) = reader.read_to_end(&mut buffer) {
        error!("[vc0-logs] Failed to read the vc0 file: {:?}", err);
        return Err(ParserError::Read);
    }
    info!("[vc0-logs] Read {} bytes for vc0 file", buffer.len());

    ParseResult::parse_vc0(&buffer, code_map, decoder)
}

/// Result of parsing one file in a batch
#[derive(Debug)]
pub enum FileOutcome {
    Parsed(ParseResult),
    /// File is empty or holds only the container header
    Empty,
    Failed(ParserError),
}

#[derive(Debug)]
pub struct FileReport {
    pub source_path: String,
    pub outcome: FileOutcome,
}

/// Parse every vc0 file from the provider. A file that cannot be read or parsed is reported
/// and skipped, it never stops the remaining files from being parsed
pub fn iter_vc0_files<'a>(
    provider: &'a dyn FileProvider,
    code_map: &'a CodeMap,
    decoder: &'a TimestampDecoder,
) -> impl Iterator<Item = FileReport> + 'a {
    provider
        .vc0_files()
        .map(move |mut source| parse_source(source.as_mut(), code_map, decoder))
}

fn parse_source(
    source: &mut dyn SourceFile,
    code_map: &CodeMap,
    decoder: &TimestampDecoder,
) -> FileReport {
    let source_path = source.source_path().to_string();

    let mut buffer = Vec::new();
    let read_result = source
        .reader()
        .and_then(|reader| reader.read_to_end(&mut buffer));
    if let Err(err) = read_result {
        warn!(
            "[vc0-logs] Skipping {}: failed to read file: {:?}",
            source_path, err
        );
        return FileReport {
            source_path,
            outcome: FileOutcome::Failed(ParserError::Read),
        };
    }
    info!(
        "[vc0-logs] Read {} bytes for file {}",
        buffer.len(),
        source_path
    );

    if buffer.is_empty() || buffer.len() == FILE_HEADER_SIZE {
        info!(
            "[vc0-logs] Skipping {}: file holds no log records ({} bytes)",
            source_path,
            buffer.len()
        );
        return FileReport {
            source_path,
            outcome: FileOutcome::Empty,
        };
    }

    let outcome = match ParseResult::parse_vc0(&buffer, code_map, decoder) {
        Ok(result) => {
            result.summary.log(&source_path);
            FileOutcome::Parsed(result)
        }
        Err(err) => {
            warn!("[vc0-logs] Skipping {}: {}", source_path, err);
            FileOutcome::Failed(err)
        }
    };
    FileReport {
        source_path,
        outcome,
    }
}
