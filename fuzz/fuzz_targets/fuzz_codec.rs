//! Fuzz target for the postcard codec over hive wire types.
//!
//! Arbitrary bytes fed to `decode` for ops, summaries, and deltas must never
//! panic, and any value that decodes must roundtrip through `encode` back to
//! itself.

#![no_main]

use libfuzzer_sys::fuzz_target;

use hive_types::{InlineLeaf, Op, Summary, TreeDelta, decode, encode};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let selector = data[0] % 4;
    let payload = &data[1..];

    match selector {
        0 => try_roundtrip::<Op>(payload),
        1 => try_roundtrip::<Summary>(payload),
        2 => try_roundtrip::<TreeDelta>(payload),
        _ => try_roundtrip::<InlineLeaf>(payload),
    }
});

/// Attempt to decode arbitrary bytes as type T. If successful, re-encode
/// and verify the roundtrip produces the same value.
fn try_roundtrip<T>(data: &[u8])
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    if let Ok(value) = decode::<T>(data) {
        let re_encoded = encode(&value).expect("encode failed after successful decode");
        let re_decoded = decode::<T>(&re_encoded).expect("re-decode failed after encode");
        assert_eq!(value, re_decoded, "roundtrip mismatch");
    }
    // Decode failure is expected for arbitrary bytes; no panic is the
    // invariant.
}
