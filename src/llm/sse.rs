//! Server-sent event decoding for streaming completions
//!
//! The completion endpoint answers with `data: {json}` records separated by a
//! blank line and terminated by `data: [DONE]`. [`SseDecoder`] cuts the raw
//! byte stream into records; [`StreamRecord::parse`] interprets one record.

use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental splitter for event records.
///
/// Bytes are buffered until a blank line is seen, so records and multi-byte
/// characters split across network chunks are reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every record it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some((end, separator_len)) = find_record_boundary(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + separator_len).take(end).collect();
            let text = String::from_utf8_lossy(&record).replace("\r\n", "\n");
            if !text.trim().is_empty() {
                records.push(text);
            }
        }
        records
    }

    /// Flush whatever is left once the body is exhausted
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest).replace("\r\n", "\n");
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Position of the first blank line and the length of the separator
fn find_record_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Meaning of one event record
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// Not a data record (comments, `event:` lines, keep-alives)
    Ignored,
    /// The `[DONE]` sentinel
    Done,
    /// A parsed chunk; either part may be absent
    Chunk {
        delta: Option<String>,
        finish_reason: Option<String>,
    },
    /// A data record whose payload is not valid chunk JSON
    Malformed { payload: String, error: String },
}

impl StreamRecord {
    pub fn parse(record: &str) -> Self {
        let data: Vec<&str> = record
            .lines()
            .filter_map(|line| line.strip_prefix(DATA_PREFIX))
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
            .collect();

        if data.is_empty() {
            return StreamRecord::Ignored;
        }

        let payload = data.join("\n");
        let payload = payload.trim();
        if payload == DONE_SENTINEL {
            return StreamRecord::Done;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => {
                let first = chunk.choices.into_iter().next();
                let (delta, finish_reason) = match first {
                    Some(choice) => (
                        choice.delta.and_then(|d| d.content).filter(|c| !c.is_empty()),
                        choice.finish_reason,
                    ),
                    None => (None, None),
                };
                StreamRecord::Chunk {
                    delta,
                    finish_reason,
                }
            }
            Err(e) => StreamRecord::Malformed {
                payload: payload.to_string(),
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"choices\":[{\"delta\":").is_empty());
        let records = decoder.push(b"{\"content\":\"Hel\"}}]}\n\ndata: [DONE]\n\n");
        assert_eq!(records.len(), 2);
        assert_eq!(
            StreamRecord::parse(&records[0]),
            StreamRecord::Chunk {
                delta: Some("Hel".to_string()),
                finish_reason: None
            }
        );
        assert_eq!(StreamRecord::parse(&records[1]), StreamRecord::Done);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let record = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"}}]}\n\n".as_bytes();
        let split = record.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&record[..split]).is_empty());
        let records = decoder.push(&record[split..]);

        assert_eq!(
            StreamRecord::parse(&records[0]),
            StreamRecord::Chunk {
                delta: Some("héllo".to_string()),
                finish_reason: None
            }
        );
    }

    #[test]
    fn test_crlf_separators_and_trailing_record() {
        let mut decoder = SseDecoder::new();
        let records = decoder.push(b": keep-alive\r\n\r\ndata: {\"choices\":[]}\r\n\r\ndata: [DONE]");
        assert_eq!(records.len(), 2);
        assert_eq!(StreamRecord::parse(&records[0]), StreamRecord::Ignored);
        assert_eq!(
            StreamRecord::parse(&records[1]),
            StreamRecord::Chunk {
                delta: None,
                finish_reason: None
            }
        );
        assert_eq!(StreamRecord::parse(&decoder.finish().unwrap()), StreamRecord::Done);
    }

    #[test]
    fn test_finish_reason_and_malformed_payload() {
        assert_eq!(
            StreamRecord::parse(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            StreamRecord::Chunk {
                delta: None,
                finish_reason: Some("stop".to_string())
            }
        );
        assert!(matches!(
            StreamRecord::parse("data: {not json"),
            StreamRecord::Malformed { .. }
        ));
        assert_eq!(StreamRecord::parse("event: ping"), StreamRecord::Ignored);
    }
}
