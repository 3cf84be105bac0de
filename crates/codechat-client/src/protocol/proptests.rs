//! Property tests for chunk-boundary invariance of the frame decoder.

use proptest::prelude::*;

use super::frame::FrameDecoder;

fn decode_chunked(bytes: &[u8], cuts: &[usize]) -> (Vec<String>, Option<String>) {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        frames.extend(decoder.push_chunk(&bytes[start..cut]));
        start = cut;
    }
    frames.extend(decoder.push_chunk(&bytes[start..]));
    (frames, decoder.finish())
}

fn arb_line() -> impl Strategy<Value = String> {
    "[a-z0-9 \"{}:,\u{e9}\u{df}\u{4e2d}\u{1f980}\r]{0,16}"
}

fn arb_body() -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    (prop::collection::vec(arb_line(), 0..8), any::<bool>())
        .prop_flat_map(|(lines, terminated)| {
            let mut body = lines.join("\n");
            if terminated {
                body.push('\n');
            }
            let bytes = body.into_bytes();
            let len = bytes.len();
            (Just(bytes), prop::collection::vec(0..=len, 0..10))
        })
        .prop_map(|(bytes, mut cuts)| {
            cuts.sort_unstable();
            (bytes, cuts)
        })
}

proptest! {
    #[test]
    fn any_chunking_yields_the_single_chunk_frames((bytes, cuts) in arb_body()) {
        let whole = decode_chunked(&bytes, &[]);
        let chunked = decode_chunked(&bytes, &cuts);
        prop_assert_eq!(chunked, whole);
    }

    #[test]
    fn one_byte_chunks_match_single_chunk((bytes, _) in arb_body()) {
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        prop_assert_eq!(decode_chunked(&bytes, &cuts), decode_chunked(&bytes, &[]));
    }

    #[test]
    fn frames_never_contain_newlines_or_blank_lines((bytes, cuts) in arb_body()) {
        let (frames, _) = decode_chunked(&bytes, &cuts);
        for frame in frames {
            prop_assert!(!frame.contains('\n'));
            prop_assert!(!frame.trim().is_empty());
        }
    }
}
