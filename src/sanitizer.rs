// Copyright 2022 Mandiant, Inc. All Rights Reserved
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and limitations under the License.

//! Turn raw subrecord bytes into printable text

/// Replacement for every byte outside the printable range
pub const PLACEHOLDER: char = '?';

const PRINTABLE_START: u8 = 0x20;
const PRINTABLE_END: u8 = 0x7e;

/// Check if byte is printable ASCII (space through tilde)
pub fn is_printable(byte: u8) -> bool {
    (PRINTABLE_START..=PRINTABLE_END).contains(&byte)
}

/// Replace every non printable byte with [`PLACEHOLDER`]. Each input byte produces exactly one output character,
/// so offsets into the sanitized text line up with offsets into the raw data
pub fn sanitize(data: &[u8]) -> String {
    data.iter()
        .map(|byte| {
            if is_printable(*byte) {
                char::from(*byte)
            } else {
                PLACEHOLDER
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        let test_data = b"Login OK\x07user\x00admin\xff";
        let results = sanitize(test_data);
        assert_eq!(results, "Login OK?user?admin?");
    }

    #[test]
    fn test_sanitize_all_bytes() {
        let test_data: Vec<u8> = (0..=255).collect();
        let results = sanitize(&test_data);

        assert_eq!(results.len(), 256);
        assert!(results.bytes().all(is_printable));
        assert_eq!(&results[0x20..0x7f], " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~");
    }

    #[test]
    fn test_sanitize_idempotent() {
        let test_data: Vec<u8> = (0..=255).rev().chain(0..=255).collect();
        let once = sanitize(&test_data);
        let twice = sanitize(once.as_bytes());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sanitize_multibyte_utf8() {
        let results = sanitize("Zähler".as_bytes());
        assert_eq!(results, "Z??hler");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize(&[]), "");
    }
}
