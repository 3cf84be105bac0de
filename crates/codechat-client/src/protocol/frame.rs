use std::collections::VecDeque;

use futures::StreamExt as _;
use futures::stream;
use tracing::warn;

use crate::errors::StreamFailure;
use crate::transport::ByteStream;

/// Incremental newline-delimited frame decoder.
///
/// Chunks may split a frame or a multi-byte character anywhere; the decoder
/// keeps undecoded bytes and the unterminated tail between calls.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    undecoded: Vec<u8>,
    pending: String,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk` and returns every frame it completed, in order.
    ///
    /// Blank frames are skipped and a trailing `\r` is stripped.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        // `pending` holds no newline between calls, so only new text is searched.
        let searched_from = self.pending.len();
        self.decode_into_pending(chunk);

        let Some(last_newline) = self.pending[searched_from..]
            .rfind('\n')
            .map(|idx| searched_from + idx)
        else {
            return Vec::new();
        };
        let tail = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, tail);
        complete
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.trim().is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Ends the stream. A non-blank unterminated tail is discarded and
    /// returned so the caller can tell a truncated body from a clean one.
    pub fn finish(&mut self) -> Option<String> {
        self.finished = true;
        if !self.undecoded.is_empty() {
            self.undecoded.clear();
            self.pending.push(char::REPLACEMENT_CHARACTER);
        }
        let tail = std::mem::take(&mut self.pending);
        if tail.trim().is_empty() { None } else { Some(tail) }
    }

    /// Bytes and characters held back waiting for more input.
    pub fn buffered_len(&self) -> usize {
        self.undecoded.len() + self.pending.len()
    }

    fn decode_into_pending(&mut self, chunk: &[u8]) {
        self.undecoded.extend_from_slice(chunk);
        let mut offset = 0;
        loop {
            let rest = &self.undecoded[offset..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.pending.push_str(text);
                    offset += rest.len();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&rest[..valid]) {
                        self.pending.push_str(text);
                    }
                    match err.error_len() {
                        Some(invalid) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            offset += valid + invalid;
                        }
                        // Incomplete sequence at the end: wait for the next chunk.
                        None => {
                            offset += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.undecoded.drain(..offset);
    }
}

/// Pull side of the decoder over a byte stream.
pub(crate) struct FrameReader {
    bytes: ByteStream,
    decoder: FrameDecoder,
    ready: VecDeque<String>,
    exhausted: bool,
    dropped_partial: bool,
}

impl FrameReader {
    pub(crate) fn new(bytes: ByteStream) -> Self {
        Self {
            bytes,
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
            exhausted: false,
            dropped_partial: false,
        }
    }

    /// Returns the next complete frame, `Ok(None)` at end of stream.
    pub(crate) async fn next_frame(&mut self) -> Result<Option<String>, StreamFailure> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(Some(frame));
            }
            if self.exhausted {
                return Ok(None);
            }
            match self.bytes.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push_chunk(&chunk)),
                Some(Err(failure)) => return Err(failure),
                None => {
                    self.exhausted = true;
                    if let Some(tail) = self.decoder.finish() {
                        warn!(bytes = tail.len(), "stream ended inside a frame; dropping partial frame");
                        self.dropped_partial = true;
                    }
                }
            }
        }
    }

    /// Whether end of stream discarded an unterminated frame.
    pub(crate) fn dropped_partial(&self) -> bool {
        self.dropped_partial
    }
}

/// Lazy sequence of complete frames read from `bytes`.
///
/// A trailing unterminated frame is dropped with a warning.
pub fn frame_stream(
    bytes: ByteStream,
) -> impl futures::Stream<Item = Result<String, StreamFailure>> + Send {
    stream::try_unfold(FrameReader::new(bytes), |mut reader| async move {
        Ok(reader.next_frame().await?.map(|frame| (frame, reader)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt as _;

    fn decode_all(chunks: &[&[u8]]) -> (Vec<String>, Option<String>) {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(decoder.push_chunk(chunk));
        }
        (frames, decoder.finish())
    }

    #[test]
    fn frame_split_across_chunks_is_reassembled() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push_chunk(b"{\"type\":\"con").is_empty());
        assert_eq!(decoder.buffered_len(), 12);
        let frames = decoder.push_chunk(b"tent\",\"data\":\"hi\"}\n{\"type\"");
        assert_eq!(frames, vec![r#"{"type":"content","data":"hi"}"#]);
        let frames = decoder.push_chunk(b":\"done\"}\n");
        assert_eq!(frames, vec![r#"{"type":"done"}"#]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "caf\u{e9} \u{1f980}\n";
        let bytes = text.as_bytes();
        let single: Vec<&[u8]> = bytes.chunks(1).collect();
        let (frames, tail) = decode_all(&single);
        assert_eq!(frames, vec!["caf\u{e9} \u{1f980}"]);
        assert_eq!(tail, None);
    }

    #[test]
    fn long_frame_in_small_chunks_is_emitted_once() {
        let payload = "x".repeat(4096);
        let mut decoder = FrameDecoder::new();
        for chunk in payload.as_bytes().chunks(3) {
            assert!(decoder.push_chunk(chunk).is_empty());
        }
        assert_eq!(decoder.buffered_len(), payload.len());

        let frames = decoder.push_chunk(b"\nnext");
        assert_eq!(frames, vec![payload]);
        assert_eq!(decoder.push_chunk(b"\n"), vec!["next"]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn trailing_partial_frame_is_dropped() {
        let (frames, tail) = decode_all(&[b"one\ntwo\nthr", b"ee"]);
        assert_eq!(frames, vec!["one", "two"]);
        assert_eq!(tail.as_deref(), Some("three"));
    }

    #[test]
    fn blank_frames_and_carriage_returns() {
        let (frames, tail) = decode_all(&[b"a\r\n\r\n   \n", b"\nb\r", b"\n"]);
        assert_eq!(frames, vec!["a", "b"]);
        assert_eq!(tail, None);
    }

    #[test]
    fn invalid_utf8_decodes_to_replacement_character() {
        let (frames, _) = decode_all(&[b"ok\xff\n"]);
        assert_eq!(frames, vec!["ok\u{fffd}"]);
    }

    #[test]
    fn nothing_is_decoded_after_finish() {
        let mut decoder = FrameDecoder::new();
        decoder.finish();
        assert!(decoder.push_chunk(b"late\n").is_empty());
    }

    #[tokio::test]
    async fn frame_stream_yields_frames_lazily_and_drops_tail() {
        let chunks = vec![
            Ok(bytes::Bytes::from_static(b"first\nsec")),
            Ok(bytes::Bytes::from_static(b"ond\npartial")),
        ];
        let frames: Vec<String> = frame_stream(Box::pin(stream::iter(chunks)))
            .try_collect()
            .await
            .expect("frames");
        assert_eq!(frames, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn reader_flags_the_dropped_tail() {
        let chunks = vec![Ok(bytes::Bytes::from_static(b"whole\nhalf"))];
        let mut reader = FrameReader::new(Box::pin(stream::iter(chunks)));
        assert_eq!(reader.next_frame().await, Ok(Some("whole".to_string())));
        assert!(!reader.dropped_partial());
        assert_eq!(reader.next_frame().await, Ok(None));
        assert!(reader.dropped_partial());
    }

    #[tokio::test]
    async fn frame_stream_surfaces_transport_errors() {
        let chunks = vec![
            Ok(bytes::Bytes::from_static(b"first\n")),
            Err(StreamFailure::transport("connection reset")),
        ];
        let mut frames = Box::pin(frame_stream(Box::pin(stream::iter(chunks))));
        assert_eq!(frames.next().await, Some(Ok("first".to_string())));
        assert_eq!(
            frames.next().await,
            Some(Err(StreamFailure::transport("connection reset")))
        );
        assert_eq!(frames.next().await, None);
    }
}
