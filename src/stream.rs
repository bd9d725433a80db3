use serde::Deserialize;

/// One parsed line of the backend's newline-delimited JSON output.
///
/// Ollama emits one of these per generated fragment; fields other than
/// `response` and `done` are backend-specific and ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GenerateFragment {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// Reassembles complete lines from arbitrarily chunked bytes.
///
/// The backend streams NDJSON, but the transport hands us chunks cut at
/// arbitrary byte offsets. Chunks accumulate in a byte buffer; on every push
/// the buffer is split at the last newline, so a line (and any multi-byte
/// UTF-8 sequence inside it) is only ever decoded once it is complete.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk; returns every complete non-blank line now
    /// available, in order. The trailing partial line stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let Some(last_newline) = self.buf.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buf.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buf, rest);

        String::from_utf8_lossy(&complete)
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.to_string())
            .collect()
    }

    /// Consume the assembler after the transport signals end-of-stream,
    /// yielding the final unterminated line if one is buffered.
    pub fn finish(self) -> Option<String> {
        let tail = String::from_utf8_lossy(&self.buf);
        let tail = tail.trim();
        if tail.is_empty() {
            None
        } else {
            Some(tail.to_string())
        }
    }
}

/// Parse one line as a generation fragment. Malformed lines yield `None`;
/// the caller skips them and keeps reconstructing.
pub fn parse_fragment(line: &str) -> Option<GenerateFragment> {
    match serde_json::from_str(line) {
        Ok(fragment) => Some(fragment),
        Err(err) => {
            tracing::debug!(%err, line, "skipping malformed fragment");
            None
        }
    }
}

/// Fold a finished stream of lines into the complete response text:
/// the concatenation of every parseable fragment's `response`, trimmed.
pub fn reconstruct<I>(lines: I, tail: Option<String>) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut full = String::new();
    for line in lines.into_iter().chain(tail) {
        if let Some(fragment) = parse_fragment(&line) {
            full.push_str(&fragment.response);
        }
    }
    full.trim().to_string()
}
