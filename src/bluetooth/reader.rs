// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Line framing for the serial byte stream.

use tracing::{debug, warn};

use crate::error::LinkError;

/// Default bound for an unterminated line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 4096;

/// Splits raw stream chunks into complete, trimmed text lines.
///
/// Both `\n` and `\r` terminate a line. Empty lines are dropped. Bytes
/// after the last delimiter stay buffered until the next chunk arrives.
pub struct FrameReader {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no delimiter.
    scanned: usize,
    max_line_bytes: usize,
    /// Set after an overflow, until the next delimiter.
    discarding: bool,
}

impl FrameReader {
    /// Create a new frame reader with the default line bound.
    pub fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    /// Create a new frame reader with a custom line bound.
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
            scanned: 0,
            max_line_bytes: max_line_bytes.max(1),
            discarding: false,
        }
    }

    /// Append a chunk and iterate over the lines it completes.
    ///
    /// Lines not consumed from the returned iterator stay buffered and are
    /// yielded by the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.buffer.extend_from_slice(chunk);
        Lines { reader: self }
    }

    /// Extract the next complete line, if any.
    fn next_line(&mut self) -> Option<Result<String, LinkError>> {
        loop {
            let delimiter = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r');

            let Some(offset) = delimiter else {
                self.scanned = self.buffer.len();
                return self.check_overflow();
            };

            let end = self.scanned + offset;
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            self.scanned = 0;

            if std::mem::take(&mut self.discarding) {
                debug!("Dropped {} bytes of overflowed line", raw.len());
                continue;
            }

            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line = text.trim();
            if line.is_empty() {
                continue;
            }
            return Some(Ok(line.to_string()));
        }
    }

    fn check_overflow(&mut self) -> Option<Result<String, LinkError>> {
        if self.buffer.len() <= self.max_line_bytes {
            return None;
        }

        let dropped = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;

        // Report once per runaway line; later bytes of it are dropped silently.
        if self.discarding {
            return None;
        }
        self.discarding = true;
        warn!(
            "Unterminated line exceeded {} bytes, discarding {} bytes",
            self.max_line_bytes, dropped
        );
        Some(Err(LinkError::FrameOverflow { dropped }))
    }

    /// Drop any buffered partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.discarding = false;
    }

    /// Get current buffer size.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Lines completed by a [`FrameReader::push`] call.
pub struct Lines<'a> {
    reader: &'a mut FrameReader,
}

impl Iterator for Lines<'_> {
    type Item = Result<String, LinkError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collect(reader: &mut FrameReader, chunk: &[u8]) -> Vec<String> {
        reader.push(chunk).filter_map(Result::ok).collect()
    }

    #[test]
    fn test_single_line() {
        let mut reader = FrameReader::new();
        assert_eq!(collect(&mut reader, b"ACK:STARTED\n"), vec!["ACK:STARTED"]);
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut reader = FrameReader::new();
        let lines = collect(&mut reader, b"RS2,SPD=1.0\r\nBAT=3.9\rGET_TIME\n");
        assert_eq!(lines, vec!["RS2,SPD=1.0", "BAT=3.9", "GET_TIME"]);
    }

    #[test]
    fn test_line_spanning_chunks() {
        let mut reader = FrameReader::new();
        assert!(collect(&mut reader, b"RS2,ODO=12").is_empty());
        assert_eq!(reader.buffered(), 10);
        assert!(collect(&mut reader, b"0.5,SPD=").is_empty());
        assert_eq!(
            collect(&mut reader, b"33.2\nACK:"),
            vec!["RS2,ODO=120.5,SPD=33.2"]
        );
        assert_eq!(reader.buffered(), 4);
    }

    #[test]
    fn test_blank_lines_dropped() {
        let mut reader = FrameReader::new();
        let lines = collect(&mut reader, b"\n\r\n   \nSTATUS:OK  \n\n");
        assert_eq!(lines, vec!["STATUS:OK"]);
    }

    #[test]
    fn test_unconsumed_lines_survive() {
        let mut reader = FrameReader::new();
        let first = reader.push(b"A=1\nB=2\n").next();
        assert_eq!(first, Some(Ok("A=1".to_string())));
        assert_eq!(collect(&mut reader, b""), vec!["B=2"]);
    }

    #[test]
    fn test_overflow_resumes_after_delimiter() {
        let mut reader = FrameReader::with_max_line_bytes(8);

        let results: Vec<_> = reader.push(b"0123456789").collect();
        assert_eq!(results, vec![Err(LinkError::FrameOverflow { dropped: 10 })]);
        assert_eq!(reader.buffered(), 0);

        // Tail of the runaway line is dropped, parsing resumes afterwards.
        assert!(collect(&mut reader, b"abcdef").is_empty());
        assert_eq!(collect(&mut reader, b"gh\nSPD=1\n"), vec!["SPD=1"]);
    }

    #[test]
    fn test_overflow_reported_once_per_line() {
        let mut reader = FrameReader::with_max_line_bytes(4);
        let overflows = reader.push(b"aaaaaa").filter(Result::is_err).count();
        assert_eq!(overflows, 1);
        let overflows = reader.push(b"bbbbbb").filter(Result::is_err).count();
        assert_eq!(overflows, 0);
    }

    #[test]
    fn test_reset_clears_partial_line() {
        let mut reader = FrameReader::new();
        assert!(collect(&mut reader, b"RS2,SPD=").is_empty());
        reader.reset();
        assert_eq!(collect(&mut reader, b"BAT=4.0\n"), vec!["BAT=4.0"]);
    }

    proptest! {
        #[test]
        fn chunk_boundaries_do_not_change_lines(
            lines in prop::collection::vec("[A-Z0-9=,.:]{1,24}", 1..12),
            delimiters in prop::collection::vec(prop::sample::select(vec!["\n", "\r", "\r\n", "\n\n"]), 12),
            cuts in prop::collection::vec(0usize..400, 0..10),
        ) {
            let mut stream = String::new();
            for (line, delimiter) in lines.iter().zip(delimiters.iter()) {
                stream.push_str(line);
                stream.push_str(delimiter);
            }
            let bytes = stream.as_bytes();

            let mut cut_points: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            cut_points.sort_unstable();
            cut_points.dedup();

            let mut reader = FrameReader::new();
            let mut produced = Vec::new();
            let mut start = 0;
            for cut in cut_points.into_iter().chain(std::iter::once(bytes.len())) {
                produced.extend(reader.push(&bytes[start..cut]).filter_map(Result::ok));
                start = cut;
            }

            prop_assert_eq!(produced, lines);
            prop_assert_eq!(reader.buffered(), 0);
        }
    }
}
