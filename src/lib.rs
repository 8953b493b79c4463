// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::doc_markdown,
    clippy::needless_continue,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::lossy_float_literal,
    clippy::fn_params_excessive_bools,
    clippy::inefficient_to_string,
    clippy::verbose_file_reads,
    clippy::unnested_or_patterns,
    rust_2018_idioms,
    future_incompatible
)]
#![deny(
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::cast_ptr_alignment,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::unnecessary_cast
)]

/// Functions to load the message code reference mapping
pub mod codemap;
pub mod error;
/// Field layout of a single subrecord
pub mod fields;
/// Providers to discover vc0 files in a directory
pub mod filesystem;
/// Assemble decoded fields into log entries
pub mod message;
/// Functions to parse vc0 files and batches of vc0 files
pub mod parser;
/// Split the container body into subrecords
pub mod scanner;
pub mod sanitizer;
/// Functions to decode hex epoch timestamps
pub mod timestamp;
pub mod traits;
/// Parse a complete vc0 file into ordered log entries
pub mod vc0_log;
