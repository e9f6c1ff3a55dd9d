use bytes::BytesMut;
use serde_json::Value;

/// Longest unterminated line kept while waiting for its `\n`.
pub const MAX_PENDING_LINE_BYTES: usize = 1024 * 1024;

/// Splits an SSE byte stream into lines. Chunks may end anywhere, including in
/// the middle of a multibyte character; only complete lines are yielded.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: BytesMut,
    // bytes of `buffer` already known to contain no newline
    scanned: usize,
    // inside an oversized line whose head was dropped
    discarding: bool,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and drains every line terminated by `\n`. A line longer
    /// than [`MAX_PENDING_LINE_BYTES`] is dropped whole.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + offset;
            let line_raw = self.buffer.split_to(pos + 1);
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            lines.push(decode_line(&line_raw[..pos]));
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_PENDING_LINE_BYTES {
            tracing::warn!(
                "Dropping SSE line over {} bytes without a terminator",
                MAX_PENDING_LINE_BYTES
            );
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        lines
    }

    /// Flushes an unterminated trailing line once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || self.buffer.is_empty() {
            self.buffer.clear();
            return None;
        }
        let rest = self.buffer.split();
        Some(decode_line(&rest))
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Delta(String),
    Done,
    Ignore,
}

/// Interprets one SSE line of a chat-completion stream. Only
/// `choices[0].delta.content` counts; reasoning deltas are ignored.
pub fn parse_data_line(line: &str) -> SseData {
    let Some(payload) = line.strip_prefix("data:") else {
        return SseData::Ignore;
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return SseData::Done;
    }
    let Ok(chunk) = serde_json::from_str::<Value>(payload) else {
        return SseData::Ignore;
    };
    match chunk
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => SseData::Delta(content.to_string()),
        _ => SseData::Ignore,
    }
}

/// Minimal frame re-emitted downstream for each content delta.
pub fn content_frame(content: &str) -> String {
    let clean = serde_json::json!({ "choices": [{ "delta": { "content": content } }] });
    format!("data: {}\n\n", clean)
}

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Concatenates the content of every delta frame in an SSE body.
pub fn collect_content(body: &str) -> String {
    body.lines()
        .filter_map(|line| match parse_data_line(line) {
            SseData::Delta(content) => Some(content),
            _ => None,
        })
        .collect()
}
