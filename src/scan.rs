use crate::model::SelectionPolicy;
use std::io::Read;

/// Lower bound of plausible photo dates (initial substring compare).
pub const DATE_LOWER: &str = "1980-01-02";
/// Upper bound of plausible photo dates (initial substring compare).
pub const DATE_UPPER: &str = "2099-12-30";

/// Separator layout of the emitted candidate. Digit positions are
/// overwritten during the match; the four separator positions are never
/// touched by digit capture and always keep the ISO characters.
const ISO_TEMPLATE: [u8; 19] = *b"0000-00-00 00:00:00";

/// One embedded date and time, normalized to `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate(String);

impl Candidate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_naive(&self) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDateTime::parse_from_str(&self.0, "%Y-%m-%d %H:%M:%S").ok()
    }

    /// Candidates pass the window when they sort between the two bound
    /// strings. The ISO form sorts identically to chronological order, so
    /// a plain string compare is enough.
    pub fn within_window(&self) -> bool {
        self.0.as_str() >= DATE_LOWER && self.0.as_str() <= DATE_UPPER
    }
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State machine that picks `YYYY:MM:DD HH:MM:SS\0` strings out of a raw
/// byte stream. The state number doubles as the count of characters
/// matched so far; a full match plus the terminating null byte emits one
/// candidate and the machine keeps scanning for further matches.
#[derive(Debug)]
pub struct DateTimeScanner {
    state: usize,
    buf: [u8; 19],
}

impl Default for DateTimeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DateTimeScanner {
    pub fn new() -> Self {
        Self {
            state: 0,
            buf: ISO_TEMPLATE,
        }
    }

    fn reset(&mut self) {
        self.state = 0;
        self.buf = ISO_TEMPLATE;
    }

    /// A digit arrived where a separator was expected. The two most
    /// recently matched digits and the incoming one are reinterpreted as
    /// the first three digits of a new year, so a match starting in the
    /// middle of a longer digit run is not lost.
    fn restart_year(&mut self, byte: u8) {
        let (first, second) = (self.buf[self.state - 2], self.buf[self.state - 1]);
        self.buf = ISO_TEMPLATE;
        self.buf[0] = first;
        self.buf[1] = second;
        self.buf[2] = byte;
        self.state = 3;
    }

    /// Feed one byte. Returns a candidate when a null byte completes a
    /// full 19-character match.
    pub fn push(&mut self, byte: u8) -> Option<Candidate> {
        match self.state {
            // digit positions
            0..=3 | 5 | 6 | 8 | 9 | 11 | 12 | 14 | 15 | 17 | 18 => {
                if byte.is_ascii_digit() {
                    self.buf[self.state] = byte;
                    self.state += 1;
                } else {
                    self.reset();
                }
                None
            }
            // year complete, expecting the first colon
            4 => {
                if byte == b':' {
                    self.state += 1;
                } else if byte.is_ascii_digit() {
                    // extra leading digits: keep a rolling 4-digit window
                    self.buf[0] = self.buf[1];
                    self.buf[1] = self.buf[2];
                    self.buf[2] = self.buf[3];
                    self.buf[3] = byte;
                } else {
                    self.reset();
                }
                None
            }
            // colon positions inside the match
            7 | 13 | 16 => {
                if byte == b':' {
                    self.state += 1;
                } else if byte.is_ascii_digit() {
                    self.restart_year(byte);
                } else {
                    self.reset();
                }
                None
            }
            // the blank between date and time
            10 => {
                if byte == b' ' {
                    self.state += 1;
                } else if byte.is_ascii_digit() {
                    self.restart_year(byte);
                } else {
                    self.reset();
                }
                None
            }
            // full match, expecting the terminating null byte
            19 => {
                if byte == 0x00 {
                    let text = String::from_utf8_lossy(&self.buf).into_owned();
                    self.reset();
                    Some(Candidate(text))
                } else if byte.is_ascii_digit() {
                    self.restart_year(byte);
                    None
                } else {
                    self.reset();
                    None
                }
            }
            _ => {
                // unreachable by construction
                self.reset();
                None
            }
        }
    }
}

/// Scan at most `read_limit` bytes of `input` and collect every embedded
/// date and time. A match still in progress when the limit is reached is
/// dropped.
pub fn scan_stream<R: Read>(mut input: R, read_limit: u64) -> std::io::Result<Vec<Candidate>> {
    let mut scanner = DateTimeScanner::new();
    let mut found = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut remaining = read_limit;

    while remaining > 0 {
        let want = chunk.len().min(remaining as usize);
        let count = input.read(&mut chunk[..want])?;
        if count == 0 {
            break;
        }
        remaining -= count as u64;
        for &byte in &chunk[..count] {
            if let Some(candidate) = scanner.push(byte) {
                tracing::debug!(candidate = candidate.as_str(), "日時文字列を検出");
                found.push(candidate);
            }
        }
    }

    Ok(found)
}

/// Pick the best candidate under the given policy, ignoring anything
/// outside the validity window. No candidate is not an error.
pub fn select_best(candidates: &[Candidate], policy: SelectionPolicy) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for candidate in candidates {
        if !candidate.within_window() {
            tracing::debug!(
                candidate = candidate.as_str(),
                "範囲外の日時を破棄 ({} 〜 {})",
                DATE_LOWER,
                DATE_UPPER
            );
            continue;
        }
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let replace = match policy {
                    SelectionPolicy::Oldest => candidate < current,
                    SelectionPolicy::Newest => candidate > current,
                };
                if replace {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}
