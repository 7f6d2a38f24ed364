// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limit sentinel detection over the child's PTY output.
//!
//! The output buffer is a bounded rolling window, not a growing string: it
//! is capped at [`MAX_BUFFER_BYTES`] and trimmed to the last
//! [`TRIM_TO_BYTES`] on overflow, which preserves every possible
//! cross-chunk match of the sentinel regex (far shorter than the trim
//! size) without unbounded memory growth.

use std::sync::LazyLock;

const MAX_BUFFER_BYTES: usize = 4000;
const TRIM_TO_BYTES: usize = 2000;

#[allow(clippy::expect_used)]
static CSI_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("CSI regex is a static literal"));

#[allow(clippy::expect_used)]
static OSC_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\x1b\][^\x07]*(\x07|\x1b\\)").expect("OSC regex is a static literal"));

// The trailing `(?:\s*$|\n)` anchor requires either end-of-string or a
// newline to close the capture. On a partial chunk boundary this can fail
// to capture until the next chunk arrives; detection latency then depends
// on the child's newline behavior. This is intentional — preserve it.
#[allow(clippy::expect_used)]
static SENTINEL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::RegexBuilder::new(r"(?:Limit reached|You've hit your limit)\s*[·•]\s*resets\s+(.+?)(?:\s*$|\n)")
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .expect("sentinel regex is a static literal")
});

/// Strip ANSI CSI and OSC escape sequences from `s`.
pub fn strip_ansi(s: &str) -> String {
    let no_osc = OSC_RE.replace_all(s, "");
    CSI_RE.replace_all(&no_osc, "").into_owned()
}

/// A rolling output buffer that scans for the rate-limit sentinel after
/// every appended chunk.
#[derive(Debug, Default)]
pub struct SentinelBuffer {
    raw: Vec<u8>,
}

/// Result of a sentinel match: the reset hint text captured by the regex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelMatch {
    pub reset_hint: String,
}

impl SentinelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of child output and check for the sentinel. Returns
    /// `Some` on first match; callers stop scanning after that (first
    /// match wins).
    pub fn push(&mut self, chunk: &[u8]) -> Option<SentinelMatch> {
        self.raw.extend_from_slice(chunk);
        if self.raw.len() > MAX_BUFFER_BYTES {
            let drop = self.raw.len() - TRIM_TO_BYTES;
            self.raw.drain(..drop);
        }

        let text = String::from_utf8_lossy(&self.raw);
        let stripped = strip_ansi(&text);
        SENTINEL_RE.captures(&stripped).map(|caps| SentinelMatch {
            reset_hint: caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
#[path = "sentinel_tests.rs"]
mod tests;
