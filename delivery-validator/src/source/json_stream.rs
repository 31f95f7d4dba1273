//! Incremental decoder for concatenated JSON records.
//!
//! Firehose writes objects as back-to-back JSON objects with no separator or
//! enclosing array. Bytes are pushed in as they arrive from the object body and
//! records come out one at a time. Framing is done by bracket balance, so a
//! record that fails to deserialize is skipped and the next one still lines up.
//! A raw newline inside a string ends the frame: JSON strings can't contain
//! one, and it lets a truncated record resynchronise on the following line.
//! A frame that fails to parse and spans lines is cut back to its first line,
//! so unbalanced brackets only cost the record they belong to.

use serde::Deserialize;

use crate::error::MalformedRecord;

#[derive(Deserialize)]
struct LogRecord {
    #[serde(rename = "Log", alias = "log")]
    log: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    /// `{...}` or `[...]`
    Container,
    /// A top level string
    Text,
    /// Anything else, up to the end of the line or the next opening bracket
    Bare,
}

#[derive(Debug, Default)]
struct Scan {
    kind: Option<FrameKind>,
    pos: usize,
    depth: u32,
    in_string: bool,
    escaped: bool,
    // first newline outside a string, container frames only
    first_newline: Option<usize>,
}

#[derive(Debug, Default)]
pub struct JsonRecordDecoder {
    buf: Vec<u8>,
    // first byte of the frame being scanned
    start: usize,
    scan: Scan,
    eof: bool,
}

impl JsonRecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.scan.pos -= self.start;
            if let Some(newline) = self.scan.first_newline.as_mut() {
                *newline -= self.start;
            }
            self.start = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// No more bytes will be pushed, whatever is buffered is the last record
    pub fn finish(&mut self) {
        self.eof = true;
    }

    /// Bytes received but not yet returned as a record
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.start
    }

    /// The next complete record's `Log` field. `None` means more input is
    /// needed, or, after `finish`, that the stream is exhausted.
    pub fn next_record(&mut self) -> Option<Result<String, MalformedRecord>> {
        let mut end = self.next_frame_end()?;
        let mut result = decode_frame(&self.buf[self.start..end]);
        let resync = match (&result, self.scan.first_newline) {
            (Err(MalformedRecord::Json(_)), Some(newline)) => Some(newline),
            _ => None,
        };
        if let Some(newline) = resync {
            end = newline;
            result = decode_frame(&self.buf[self.start..end]);
        }
        self.start = end;
        self.scan = Scan {
            pos: end,
            ..Scan::default()
        };
        Some(result)
    }

    fn next_frame_end(&mut self) -> Option<usize> {
        if self.scan.kind.is_none() {
            while self.start < self.buf.len() && self.buf[self.start].is_ascii_whitespace() {
                self.start += 1;
            }
            if self.start == self.buf.len() {
                self.scan.pos = self.start;
                return None;
            }
            let kind = match self.buf[self.start] {
                b'{' | b'[' => FrameKind::Container,
                b'"' => FrameKind::Text,
                _ => FrameKind::Bare,
            };
            self.scan = Scan {
                kind: Some(kind),
                pos: self.start,
                ..Scan::default()
            };
            if kind == FrameKind::Text {
                self.scan.in_string = true;
                self.scan.pos += 1;
            }
        }

        let kind = self.scan.kind?;
        let scan = &mut self.scan;
        while scan.pos < self.buf.len() {
            let b = self.buf[scan.pos];
            if scan.in_string {
                if b == b'\n' {
                    return Some(scan.pos);
                }
                if scan.escaped {
                    scan.escaped = false;
                } else if b == b'\\' {
                    scan.escaped = true;
                } else if b == b'"' {
                    scan.in_string = false;
                    if kind == FrameKind::Text {
                        return Some(scan.pos + 1);
                    }
                }
            } else if kind == FrameKind::Bare {
                if matches!(b, b'\n' | b'{' | b'[') {
                    return Some(scan.pos);
                }
            } else {
                match b {
                    b'"' => scan.in_string = true,
                    b'\n' if scan.first_newline.is_none() => {
                        scan.first_newline = Some(scan.pos);
                    }
                    b'{' | b'[' => scan.depth += 1,
                    b'}' | b']' => {
                        scan.depth = scan.depth.saturating_sub(1);
                        if scan.depth == 0 {
                            return Some(scan.pos + 1);
                        }
                    }
                    _ => {}
                }
            }
            scan.pos += 1;
        }

        // an unterminated record at the very end is still handed out, and fails to decode
        self.eof.then_some(self.buf.len())
    }
}

fn decode_frame(frame: &[u8]) -> Result<String, MalformedRecord> {
    let record: LogRecord =
        serde_json::from_slice(frame).map_err(|e| MalformedRecord::Json(e.to_string()))?;
    record.log.ok_or(MalformedRecord::MissingLog)
}
