/// Incremental decoder for `text/event-stream` bodies.
///
/// Both provider APIs stream completions as SSE. Only `data:` lines carry
/// payloads we care about; `event:` lines, comments, and blank separators
/// are skipped. Chunks may split lines (and multi-byte characters) at
/// arbitrary byte offsets, so raw bytes are buffered until a full line is
/// available.
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed a chunk of bytes, returning the `data:` payloads of any lines
    /// completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_data_lines() {
        let mut dec = SseDecoder::new();
        let payloads = dec.push(b"data: {\"x\":1}\n\ndata: [DONE]\n");
        assert_eq!(payloads, vec!["{\"x\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn handles_lines_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.push(b"data: hel").is_empty());
        let payloads = dec.push(b"lo\n");
        assert_eq!(payloads, vec!["hello".to_string()]);
    }

    #[test]
    fn skips_event_lines_and_comments() {
        let mut dec = SseDecoder::new();
        let payloads = dec.push(b"event: message_start\r\n: keepalive\r\ndata: x\r\n");
        assert_eq!(payloads, vec!["x".to_string()]);
    }

    #[test]
    fn tolerates_multibyte_chars_split_across_chunks() {
        let text = "data: caf\u{e9}\n".as_bytes();
        let mut dec = SseDecoder::new();
        // Split inside the two-byte 'é'.
        let split = text.len() - 2;
        assert!(dec.push(&text[..split]).is_empty());
        let payloads = dec.push(&text[split..]);
        assert_eq!(payloads, vec!["caf\u{e9}".to_string()]);
    }
}
