//! Chunk → line → message stages.
//!
//! The backend frames every event as one `data: <json>` line and ends the
//! stream with `data: [DONE]`. Chunk boundaries from the transport are
//! arbitrary, so lines are reassembled from a carry-over buffer before any
//! filtering happens.

use std::collections::VecDeque;

use futures::{Stream, StreamExt, stream};

/// Line that ends decoding. Anything after it is discarded.
pub const DONE_SENTINEL: &str = "data: [DONE]";

/// Prefix of lines carrying an event payload.
pub const EVENT_PREFIX: &str = "data: ";

/// Incremental line splitter with sentinel detection.
///
/// Buffers raw bytes, so a multibyte character split across chunks is
/// decoded only once its line is complete.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the event lines it completed, in order.
    ///
    /// Lines are trimmed of trailing whitespace. Lines without the event
    /// prefix are dropped. Returns nothing once the sentinel has been seen.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let line = String::from_utf8_lossy(&self.buffer[start..end])
                .trim_end()
                .to_string();
            start = end + 1;

            if line == DONE_SENTINEL {
                self.close();
                return lines;
            }
            if line.starts_with(EVENT_PREFIX) {
                lines.push(line);
            }
        }

        self.buffer.drain(..start);
        lines
    }

    /// Stop decoding and drop any partial line.
    pub fn close(&mut self) {
        self.done = true;
        self.buffer.clear();
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes of the incomplete line still waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Remove the `data: ` field prefix from an event line.
pub fn strip_field_prefix(line: &str) -> &str {
    line.get(EVENT_PREFIX.len()..).unwrap_or("")
}

/// Turn a stream of raw chunks into a stream of event lines.
///
/// Pull-driven: a chunk is only read once every line from the previous one
/// has been consumed. A transport error is yielded once and ends the stream.
/// A final line without a trailing newline is never emitted.
pub fn decode_lines<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    stream::unfold(
        (Box::pin(chunks), LineDecoder::new(), VecDeque::new()),
        |(mut chunks, mut decoder, mut pending)| async move {
            loop {
                if let Some(line) = pending.pop_front() {
                    return Some((Ok(line), (chunks, decoder, pending)));
                }
                if decoder.is_done() {
                    return None;
                }

                match chunks.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.push(chunk.as_ref())),
                    Some(Err(e)) => {
                        decoder.close();
                        return Some((Err(e), (chunks, decoder, pending)));
                    }
                    None => return None,
                }
            }
        },
    )
}

/// Turn a stream of raw chunks into a stream of event payloads.
pub fn decode_messages<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    decode_lines(chunks).map(|line| line.map(|l| strip_field_prefix(&l).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn collect(chunks: &[&str]) -> Vec<String> {
        let owned: Vec<Result<String, Infallible>> =
            chunks.iter().map(|c| Ok(c.to_string())).collect();
        tokio_test::block_on(
            decode_messages(stream::iter(owned))
                .map(|m| m.unwrap())
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_single_message_then_done() {
        let messages = collect(&["data: {\"a\":1}\n", "data: [DONE]\n"]);
        assert_eq!(messages, vec![r#"{"a":1}"#.to_string()]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let messages = collect(&["da", "ta: {\"a\"", ":1}\n\ndata: {\"b\":2}", "\n"]);
        assert_eq!(messages, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn test_non_event_lines_dropped() {
        let messages = collect(&["event: delta\n: comment\n\ndata: x\nid: 4\n"]);
        assert_eq!(messages, vec!["x"]);
    }

    #[test]
    fn test_trailing_whitespace_trimmed() {
        let messages = collect(&["data: {\"a\":1}  \r\n"]);
        assert_eq!(messages, vec![r#"{"a":1}"#]);
    }

    #[test]
    fn test_done_discards_rest_of_chunk_and_stream() {
        let messages = collect(&["data: 1\ndata: [DONE]\ndata: 2\n", "data: 3\n"]);
        assert_eq!(messages, vec!["1"]);
    }

    #[test]
    fn test_done_with_trailing_carriage_return() {
        let messages = collect(&["data: 1\r\ndata: [DONE]\r\ndata: 2\r\n"]);
        assert_eq!(messages, vec!["1"]);
    }

    #[test]
    fn test_partial_final_line_is_dropped() {
        let messages = collect(&["data: 1\ndata: 2"]);
        assert_eq!(messages, vec!["1"]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "data: héllo\n".as_bytes();
        // Split inside the two-byte 'é'.
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let chunks: Vec<Result<Vec<u8>, Infallible>> =
            vec![Ok(bytes[..split].to_vec()), Ok(bytes[split..].to_vec())];

        let messages: Vec<String> = tokio_test::block_on(
            decode_messages(stream::iter(chunks))
                .map(|m| m.unwrap())
                .collect(),
        );
        assert_eq!(messages, vec!["héllo"]);
    }

    #[test]
    fn test_transport_error_ends_stream() {
        let chunks: Vec<Result<&str, &str>> = vec![Ok("data: 1\n"), Err("reset"), Ok("data: 2\n")];
        let items: Vec<Result<String, &str>> =
            tokio_test::block_on(decode_messages(stream::iter(chunks)).collect());
        assert_eq!(items, vec![Ok("1".to_string()), Err("reset")]);
    }

    #[test]
    fn test_line_decoder_keeps_only_partial_line() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"data: a\ndata: b\ndata: par");
        assert_eq!(lines, vec!["data: a", "data: b"]);
        assert_eq!(decoder.pending_len(), "data: par".len());
    }

    #[test]
    fn test_line_decoder_ignores_input_after_done() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: [DONE]\n").is_empty());
        assert!(decoder.is_done());
        assert!(decoder.push(b"data: late\n").is_empty());
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_strip_field_prefix() {
        assert_eq!(strip_field_prefix("data: {}"), "{}");
        assert_eq!(strip_field_prefix("data:"), "");
    }
}
