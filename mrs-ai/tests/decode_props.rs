//! Property tests for the unicode escape decoder
//!
//! Tests cover:
//! - Text without backslashes is never changed
//! - Repaired JSON still parses to the original string
//! - Latin-1 escape forms decode to the intended character
//! - Chunked decoding matches one-shot decoding

use mrs_ai::decode::{decode_unicode_escapes, repair_json_escapes, StreamingDecoder};
use proptest::prelude::*;

proptest! {
    #[test]
    fn plain_text_is_unchanged(s in "[^\\\\]*") {
        prop_assert_eq!(decode_unicode_escapes(&s), s.clone());
        prop_assert_eq!(repair_json_escapes(&s), s);
    }

    #[test]
    fn repaired_json_round_trips(s in "\\PC*") {
        let encoded = serde_json::to_string(&s).unwrap();
        let repaired = repair_json_escapes(&encoded);
        let decoded: String = serde_json::from_str(&repaired).unwrap();
        prop_assert_eq!(decoded, s);
    }

    #[test]
    fn latin1_forms_decode(code in 0xa0u32..=0xff) {
        let expected = char::from_u32(code).unwrap().to_string();
        prop_assert_eq!(decode_unicode_escapes(&format!("\\u0000{code:02x}")), expected.clone());
        prop_assert_eq!(decode_unicode_escapes(&format!("\\x00{code:02x}")), expected.clone());
        prop_assert_eq!(decode_unicode_escapes(&format!("\\u00{code:02x}")), expected);
    }

    #[test]
    fn streaming_matches_one_shot(
        pieces in prop::collection::vec(
            prop::sample::select(vec![
                "\\u00e9", "\\x00f3", "\\xf1", "\\u00191", "\\x19", "abc", " ",
                "\\\\u0041", "\\ud83d\\ude00", "ñ", "\\n",
            ]),
            0..12,
        ),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let input: String = pieces.concat();

        let mut boundaries: Vec<usize> = cuts
            .iter()
            .map(|ix| ix.index(input.len() + 1))
            .filter(|&b| input.is_char_boundary(b))
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut decoder = StreamingDecoder::new();
        let mut streamed = String::new();
        let mut start = 0;
        for b in boundaries {
            streamed.push_str(&decoder.push(&input[start..b]));
            start = b;
        }
        streamed.push_str(&decoder.push(&input[start..]));
        streamed.push_str(&decoder.finish());

        prop_assert_eq!(streamed, decode_unicode_escapes(&input));
    }
}
