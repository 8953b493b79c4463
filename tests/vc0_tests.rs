// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

use std::{fs::File, path::PathBuf};

use chrono::{TimeZone, Utc};
use simplelog::{Config, LevelFilter, SimpleLogger};
use vc0_logs::{
    codemap::{CodeMap, CodeMapEntry},
    error::MappingError,
    filesystem::Vc0DirectoryProvider,
    message::{LogEntry, Status},
    parser::{FileOutcome, iter_vc0_files, load_code_map, parse_log},
    scanner::FILE_HEADER_SIZE,
    timestamp::{OutputZone, Timestamp, TimestampDecoder},
    vc0_log::ParseResult,
};

fn test_data_path(name: &str) -> PathBuf {
    let mut test_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    test_path.push("tests/test_data");
    test_path.push(name);
    test_path
}

fn test_decoder() -> TimestampDecoder {
    let reference = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    TimestampDecoder::new(OutputZone::Utc, reference)
}

fn auth_map() -> CodeMap {
    let entries = [
        ("100", "Auth", "login"),
        ("200", "Auth", "logout"),
        ("300", "Sys", "reboot"),
    ]
    .map(|(code, message_type, description)| CodeMapEntry {
        code: code.to_string(),
        message_type: message_type.to_string(),
        description: description.to_string(),
    });
    CodeMap::from_entries(entries).unwrap()
}

fn container(body: &[u8]) -> Vec<u8> {
    let mut data = vec![0; FILE_HEADER_SIZE];
    data.extend_from_slice(body);
    data
}

#[test]
fn test_two_record_file() {
    let data = container(b"5F5E1000.1\thmi-01\tnet\t100\tOK\n5F5E10");
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder()).unwrap();

    assert_eq!(results.entries.len(), 2);

    let first = &results.entries[0];
    assert_eq!(first.status, Status::OK);
    assert_eq!(
        first.timestamp,
        Timestamp::Decoded {
            epoch: 1600000000,
            text: String::from("2020-09-13 12:26:40")
        }
    );
    assert_eq!(first.message_code.as_ref().unwrap().as_str(), "100");
    assert_eq!(first.message_type, "Auth");
    assert_eq!(first.description, "login");
    assert_eq!(first.raw_message, "OK");
    assert_eq!(first.offset, FILE_HEADER_SIZE);

    let second = &results.entries[1];
    assert_eq!(second.status, Status::MALFORMED);
    assert_eq!(second.raw_message, "5F5E10");
    assert_eq!(second.offset, FILE_HEADER_SIZE + 29);
}

#[test]
fn test_unterminated_tail_is_flagged() {
    // File cut inside the payload of the last subrecord
    let data = container(b"5F5E1000.1\thmi\tnet\t100\tuser=admin\n5F5E1010.2\thmi\tnet\t100\tuser=ad");
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder()).unwrap();

    assert_eq!(results.entries.len(), 2);
    assert_eq!(results.entries[0].status, Status::OK);
    assert_eq!(results.entries[0].raw_message, "user=admin");

    let last = &results.entries[1];
    assert_eq!(last.status, Status::TRUNCATED);
    assert_eq!(last.status.to_string(), "truncated");
    assert_eq!(last.raw_message, "user=ad");
    assert_eq!(last.description, "login");

    assert_eq!(results.summary.truncated, 1);
    assert_eq!(results.summary.anomalies(), 1);
}

#[test]
fn test_whitespace_padding_is_counted() {
    let data = container(b"5F5E1000.1\th\ts\t100\tA\n\t\t\t \n5F5E1000.2\th\ts\t200\tB\n");
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder()).unwrap();

    assert_eq!(results.entries.len(), 2);
    assert_eq!(results.summary.total, 2);
    assert_eq!(results.summary.skipped, 1);
    assert_eq!(results.summary.anomalies(), 0);
}

#[test]
fn test_empty_line_id_is_malformed() {
    let data = container(b"5F5E1000.\thmi\tnet\t100\tOK\n");
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder()).unwrap();

    assert_eq!(results.entries[0].status, Status::MALFORMED);
    assert_eq!(results.entries[0].raw_message, "5F5E1000.?hmi?net?100?OK");
}

#[test]
fn test_parse_carved_fragment() {
    // Body bytes recovered without the container header
    let fragment = b"er=admin\n5F5E1000.7\thmi\tnet\t300\treboot\n";
    let results = ParseResult::parse_fragment(fragment, &auth_map(), &test_decoder());

    let statuses: Vec<String> = results
        .entries
        .iter()
        .map(|entry| entry.status.to_string())
        .collect();
    assert_eq!(statuses, ["malformed", "ok"]);
    assert_eq!(results.entries[1].offset, 9);
    assert_eq!(results.entries[1].description, "reboot");
}

#[test]
fn test_unresolved_code_keeps_code() {
    let data = container(b"5F5E1000.1\thmi-01\tnet\t999\tunknown\n");
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder()).unwrap();

    let entry = &results.entries[0];
    assert_eq!(entry.status, Status::UNRESOLVED_CODE);
    assert_eq!(entry.status.to_string(), "unresolved-code");
    assert_eq!(entry.message_type, "UNKNOWN");
    assert_eq!(entry.description, "");
    assert_eq!(entry.message_code.as_ref().unwrap().as_str(), "999");
    assert_eq!(results.summary.unresolved_code, 1);
}

#[test]
fn test_empty_file() {
    let results = ParseResult::parse_vc0(&[], &auth_map(), &test_decoder()).unwrap();
    assert!(results.entries.is_empty());
}

#[test]
fn test_order_is_file_order() {
    // Timestamps go backwards and jump forward, output must not be sorted
    let data = container(
        b"65000000.1\th\ts\t300\tthird by time\n\
          5F5E1000.2\th\ts\t100\tfirst by time\n\
          61E38BDC.3\th\ts\t200\tsecond by time\n",
    );
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder()).unwrap();

    let epochs: Vec<u32> = results
        .entries
        .iter()
        .filter_map(|entry| entry.timestamp.epoch())
        .collect();
    assert_eq!(epochs, [0x65000000, 0x5F5E1000, 0x61E38BDC]);

    let line_ids: Vec<&str> = results
        .entries
        .iter()
        .map(|entry| entry.line_id.as_str())
        .collect();
    assert_eq!(line_ids, ["1", "2", "3"]);

    let offsets: Vec<usize> = results.entries.iter().map(|entry| entry.offset).collect();
    assert!(offsets.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_every_subrecord_produces_a_row() {
    let data = container(b"\x01garbage\x02\xff\xfe\xfd\x03ZZZZZZZZ.9\th\ts\tX-1\tpayload\x04short");
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder()).unwrap();

    let statuses: Vec<String> = results
        .entries
        .iter()
        .map(|entry| entry.status.to_string())
        .collect();
    assert_eq!(
        statuses,
        [
            "malformed",
            "malformed",
            "invalid-timestamp;unparseable-code;unresolved-code",
            "malformed"
        ]
    );
    assert_eq!(results.entries[1].raw_message, "???");
    assert_eq!(results.summary.total, 4);
    assert_eq!(results.summary.malformed, 3);
}

#[test]
fn test_parse_is_deterministic() {
    let data = std::fs::read(test_data_path("sample_logs/0001.vc0")).unwrap();
    let code_map = load_code_map(&test_data_path("message_map.csv").display().to_string()).unwrap();
    let decoder = test_decoder();

    let first = ParseResult::parse_vc0(&data, &code_map, &decoder).unwrap();
    let second = ParseResult::parse_vc0(&data, &code_map, &decoder).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_parse_sample_log() -> anyhow::Result<()> {
    let code_map = load_code_map(&test_data_path("message_map.csv").display().to_string())?;
    let handle = File::open(test_data_path("sample_logs/0001.vc0"))?;
    let results = parse_log(handle, &code_map, &test_decoder())?;

    let rows: Vec<[String; 9]> = results.entries.iter().map(LogEntry::to_record).collect();
    assert_eq!(rows.len(), 5);
    assert_eq!(
        rows[0],
        [
            "2020-09-13 12:26:40",
            "1",
            "plc-01",
            "sys",
            "100",
            "Auth",
            "login",
            "user=admin",
            "ok"
        ]
        .map(String::from)
    );
    assert_eq!(rows[1][4], "ADM23247");
    assert_eq!(rows[1][5], "AdminChange");
    assert_eq!(rows[1][7], "server=dc01?ack");
    assert_eq!(rows[1][8], "ok");
    assert_eq!(rows[2][8], "unresolved-code");
    assert_eq!(rows[2][5], "UNKNOWN");
    assert_eq!(rows[3][0], "ZZZZ1030");
    assert_eq!(rows[3][8], "invalid-timestamp");
    assert_eq!(rows[3][6], "logout");
    assert_eq!(rows[4][7], "5F5E10");
    assert_eq!(rows[4][8], "malformed");

    assert_eq!(results.summary.total, 5);
    assert_eq!(results.summary.ok, 2);
    assert_eq!(results.summary.anomalies(), 3);
    Ok(())
}

#[test]
fn test_parse_tampered_log() -> anyhow::Result<()> {
    let code_map = load_code_map(&test_data_path("message_map.csv").display().to_string())?;
    let handle = File::open(test_data_path("sample_logs/0004.vc0"))?;
    let results = parse_log(handle, &code_map, &test_decoder())?;

    let statuses: Vec<String> = results
        .entries
        .iter()
        .map(|entry| entry.status.to_string())
        .collect();
    assert_eq!(
        statuses,
        ["ok", "ok", "unparseable-code;unresolved-code", "malformed"]
    );
    assert_eq!(results.entries[0].timestamp.to_string(), "2023-09-12 06:06:56");
    assert_eq!(results.entries[1].timestamp.to_string(), "2020-09-13 12:26:40");
    assert_eq!(results.entries[2].message_code.as_ref().unwrap().as_str(), "ADM-X");
    assert_eq!(results.entries[2].raw_message, "config,changed");
    assert_eq!(results.entries[3].raw_message, "61E38BDD.13\thmi-02".replace('\t', "?"));
    Ok(())
}

#[test]
fn test_batch_isolates_failures() {
    // Surfaces the per-file skip warnings when run with --nocapture
    let _ = SimpleLogger::init(LevelFilter::Warn, Config::default());
    let code_map = load_code_map(&test_data_path("message_map.csv").display().to_string()).unwrap();
    let provider = Vc0DirectoryProvider::new(&test_data_path("sample_logs")).unwrap();
    let decoder = test_decoder();

    let mut parsed = 0;
    let mut empty = 0;
    let mut failed = 0;
    for report in iter_vc0_files(&provider, &code_map, &decoder) {
        assert!(!report.source_path.contains("lck."));
        match report.outcome {
            FileOutcome::Parsed(_) => parsed += 1,
            FileOutcome::Empty => empty += 1,
            FileOutcome::Failed(_) => failed += 1,
        }
    }
    assert_eq!((parsed, empty, failed), (2, 1, 1));
}

#[test]
fn test_mapping_setup_errors() {
    let duplicate = load_code_map(
        &test_data_path("message_map_duplicate.csv")
            .display()
            .to_string(),
    );
    assert!(matches!(
        duplicate,
        Err(MappingError::DuplicateCode { ref code, .. }) if code == "100"
    ));

    let columns = load_code_map(&test_data_path("message_map_columns.csv").display().to_string());
    assert!(matches!(columns, Err(MappingError::Header { .. })));
}

#[test]
fn test_output_zone_does_not_change_epoch() {
    let data = container(b"5F5E1000.1\th\ts\t100\tOK\n");
    let reference = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let decoder = TimestampDecoder::new("-05:00".parse().unwrap(), reference);
    let results = ParseResult::parse_vc0(&data, &auth_map(), &decoder).unwrap();

    assert_eq!(results.entries[0].timestamp.to_string(), "2020-09-13 07:26:40");
    assert_eq!(results.entries[0].timestamp.epoch(), Some(1600000000));
}

#[test]
fn test_serialize_entry() -> anyhow::Result<()> {
    let data = container(b"5F5E1000.1\thmi-01\tnet\t100\tOK\n");
    let results = ParseResult::parse_vc0(&data, &auth_map(), &test_decoder())?;
    let value = serde_json::to_value(&results.entries[0])?;

    assert_eq!(value["Timestamp"], "2020-09-13 12:26:40");
    assert_eq!(value["MessageCode"], "100");
    assert_eq!(value["Status"], "ok");
    assert_eq!(value["Offset"], 8192);
    Ok(())
}
