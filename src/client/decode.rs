//! Incremental UTF-8 decoding of a chunked response body.
//!
//! The endpoint streams raw text octets with no framing, so a chunk can end
//! in the middle of a multi-byte character. [`Utf8StreamDecoder`] keeps the
//! incomplete tail between calls and [`decode_stream`] applies it to a whole
//! byte stream.

use futures::{Stream, StreamExt};

const BOM: char = '\u{FEFF}';

/// Stateful UTF-8 decoder for a sequence of byte chunks.
///
/// Invalid input decodes to U+FFFD, one replacement per maximal invalid
/// subpart. A byte-order mark at the very start of the stream is dropped.
/// The output for a given byte sequence does not depend on where the chunk
/// boundaries fall.
#[derive(Debug, Default, Clone)]
pub struct Utf8StreamDecoder {
    /// Bytes of a sequence that is still waiting for its continuation bytes.
    pending: Vec<u8>,
    /// Set once the first decoded character has been checked for a BOM.
    started: bool,
}

impl Utf8StreamDecoder {
    /// Create a decoder at the start of a stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, returning all text that is complete so far.
    ///
    /// The result may be empty when the chunk only extends a pending
    /// multi-byte sequence.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let joined;
        let input: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(chunk);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        self.strip_bom(out)
    }

    /// End the stream, flushing an incomplete trailing sequence as U+FFFD.
    ///
    /// The decoder is reset and can be reused for a new stream.
    pub fn finish(&mut self) -> String {
        let out = if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        };
        let out = self.strip_bom(out);
        self.started = false;
        out
    }

    /// Whether bytes of an unfinished character are buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn strip_bom(&mut self, mut out: String) -> String {
        if !self.started && !out.is_empty() {
            self.started = true;
            if out.starts_with(BOM) {
                out.drain(..BOM.len_utf8());
            }
        }
        out
    }
}

/// Turn a stream of byte chunks into a lazy stream of decoded text fragments.
///
/// One fragment is produced per chunk, even when it is empty, followed by a
/// final fragment if the body ended inside a character. The first error ends
/// the stream.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::stream! {
        let mut decoder = Utf8StreamDecoder::new();
        let mut failed = false;

        futures::pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(chunk) => yield Ok(decoder.decode(chunk.as_ref())),
                Err(err) => {
                    failed = true;
                    yield Err(err);
                    break;
                }
            }
        }

        if !failed {
            let tail = decoder.finish();
            if !tail.is_empty() {
                yield Ok(tail);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_split(bytes: &[u8], boundaries: &[usize]) -> String {
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        let mut start = 0;
        for &end in boundaries {
            out.push_str(&decoder.decode(&bytes[start..end]));
            start = end;
        }
        out.push_str(&decoder.decode(&bytes[start..]));
        out.push_str(&decoder.finish());
        out
    }

    #[test]
    fn test_split_inside_multibyte_char() {
        let text = "שלום 👋 world";
        let bytes = text.as_bytes();

        let mut decoder = Utf8StreamDecoder::new();
        // First byte of the two-byte "ש" only.
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&bytes[1..2]), "ש");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_every_two_way_split_matches_whole() {
        let text = "Hi 👋 שלום, naïve café ⋯ 中文";
        let bytes = text.as_bytes();
        for cut in 0..=bytes.len() {
            assert_eq!(decode_split(bytes, &[cut]), text, "cut at {cut}");
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_whole() {
        let text = "🙂🙃 mixed ascii и кириллица";
        let bytes = text.as_bytes();
        let boundaries: Vec<usize> = (1..bytes.len()).collect();
        assert_eq!(decode_split(bytes, &boundaries), text);
    }

    #[test]
    fn test_invalid_bytes_are_replaced_consistently() {
        // Lone continuation byte, truncated 3-byte sequence followed by ASCII.
        let bytes = b"a\x80b\xE2\x82c";
        let whole = decode_split(bytes, &[]);
        assert_eq!(whole, "a\u{FFFD}b\u{FFFD}c");
        for cut in 0..=bytes.len() {
            assert_eq!(decode_split(bytes, &[cut]), whole, "cut at {cut}");
        }
    }

    #[test]
    fn test_truncated_tail_flushes_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"ok\xF0\x9F"), "ok");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_leading_bom_dropped_once() {
        let bytes = "\u{FEFF}x\u{FEFF}y".as_bytes();
        for cut in 0..=bytes.len() {
            assert_eq!(decode_split(bytes, &[cut]), "x\u{FEFF}y", "cut at {cut}");
        }
    }

    #[tokio::test]
    async fn test_decode_stream_yields_fragment_per_chunk() {
        let euro = "€".as_bytes();
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"price: ".to_vec()),
            Ok(euro[..1].to_vec()),
            Ok(Vec::new()),
            Ok(euro[1..].to_vec()),
            Ok(b"5".to_vec()),
        ];

        let fragments: Vec<String> = decode_stream(futures::stream::iter(chunks))
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(fragments, vec!["price: ", "", "", "€", "5"]);
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_first_error() {
        let chunks: Vec<Result<&[u8], std::io::Error>> = vec![
            Ok(&b"partial"[..]),
            Err(std::io::Error::other("reset")),
            Ok(&b"never seen"[..]),
        ];

        let items: Vec<_> = decode_stream(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(items[1].is_err());
    }
}
