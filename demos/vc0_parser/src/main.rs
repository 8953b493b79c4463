// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use chrono::{Local, Utc};
use clap::{Parser, ValueEnum};
use csv::Writer;
use log::{LevelFilter, error, warn};
use simplelog::{Config, SimpleLogger};
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use vc0_logs::filesystem::Vc0DirectoryProvider;
use vc0_logs::message::LogEntry;
use vc0_logs::parser::{FileOutcome, iter_vc0_files, load_code_map};
use vc0_logs::timestamp::{OutputZone, TimestampDecoder};
use vc0_logs::vc0_log::ParseResult;

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Args {
    /// Directory containing .vc0 files
    #[clap(short, long)]
    input: PathBuf,

    /// Directory to save output files. Created if it does not exist
    #[clap(short, long)]
    output: PathBuf,

    /// CSV file mapping MessageCode, MessageType, Description
    #[clap(short, long)]
    mapfile: String,

    /// Timezone for decoded timestamps: utc, local or an offset such as +02:00
    #[clap(short, long, default_value = "utc")]
    timezone: OutputZone,

    /// Output format
    #[clap(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Also search subdirectories of the input directory
    #[clap(short, long, default_value = "false")]
    recursive: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Csv,
    Jsonl,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
        }
    }
}

fn main() {
    eprintln!("Starting vc0 log parser...");
    SimpleLogger::init(LevelFilter::Warn, Config::default())
        .expect("Failed to initialize simple logger");

    let args = Args::parse();

    // Setup problems stop the run before any file is parsed
    let code_map = match load_code_map(&args.mapfile) {
        Ok(results) => results,
        Err(err) => {
            error!("Failed to load message map {}: {}", args.mapfile, err);
            process::exit(1);
        }
    };
    let provider = match Vc0DirectoryProvider::new(&args.input) {
        Ok(results) => results.recursive(args.recursive),
        Err(err) => {
            error!("Input directory {}: {}", args.input.display(), err);
            process::exit(1);
        }
    };
    if let Err(err) = fs::create_dir_all(&args.output) {
        error!(
            "Failed to create output directory {}: {:?}",
            args.output.display(),
            err
        );
        process::exit(1);
    }

    let decoder = TimestampDecoder::new(args.timezone, Utc::now());
    let run_stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let mut written = 0;
    let mut skipped = 0;
    let mut entry_count = 0;
    let mut anomaly_count = 0;
    for report in iter_vc0_files(&provider, &code_map, &decoder) {
        let result = match report.outcome {
            FileOutcome::Parsed(result) => result,
            FileOutcome::Empty => {
                eprintln!("Skipping {}: no log records", report.source_path);
                skipped += 1;
                continue;
            }
            FileOutcome::Failed(err) => {
                eprintln!("Skipping {}: {}", report.source_path, err);
                skipped += 1;
                continue;
            }
        };

        let output_path = output_file(&args.output, &run_stamp, &report.source_path, args.format);
        if let Err(err) = write_result(&output_path, &result, args.format) {
            warn!(
                "Failed to write output for {} to {}: {:?}",
                report.source_path,
                output_path.display(),
                err
            );
            skipped += 1;
            continue;
        }

        let summary = result.summary;
        eprintln!(
            "Processed {}: {} entries ({} malformed, {} truncated, {} invalid timestamp, {} unparseable code, {} unresolved code) -> {}",
            report.source_path,
            summary.total,
            summary.malformed,
            summary.truncated,
            summary.invalid_timestamp,
            summary.unparseable_code,
            summary.unresolved_code,
            output_path.display()
        );
        written += 1;
        entry_count += summary.total;
        anomaly_count += summary.anomalies();
    }

    eprintln!(
        "\nFinished parsing vc0 logs. Wrote {} files, skipped {}. {} entries, {} with anomalies",
        written, skipped, entry_count, anomaly_count
    );
}

// Output name keeps the source file name so results can be traced back to the evidence
fn output_file(output_dir: &Path, run_stamp: &str, source_path: &str, format: OutputFormat) -> PathBuf {
    let file_name = Path::new(source_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("unknown.vc0"));
    output_dir.join(format!("{run_stamp}_{file_name}.{}", format.extension()))
}

fn write_result(
    output_path: &Path,
    result: &ParseResult,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Csv => output_csv(output_path, &result.entries),
        OutputFormat::Jsonl => output_jsonl(output_path, &result.entries),
    }
}

fn output_csv(output_path: &Path, entries: &[LogEntry]) -> Result<(), Box<dyn Error>> {
    let mut writer = Writer::from_path(output_path)?;
    writer.write_record(LogEntry::COLUMNS)?;
    for entry in entries {
        writer.write_record(entry.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

fn output_jsonl(output_path: &Path, entries: &[LogEntry]) -> Result<(), Box<dyn Error>> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    for entry in entries {
        serde_json::to_writer(&mut writer, entry)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
