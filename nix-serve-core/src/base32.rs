// SPDX-License-Identifier: MIT

//! Nix base32 encoding/decoding.

use data_encoding::{BitOrder, DecodeError, Encoding, Specification};
use std::sync::LazyLock;

/// The 32-character alphabet used by Nix's base32 encoding.
///
/// `e`, `o`, `u` and `t` are omitted.
pub const ALPHABET: &str = "0123456789abcdfghijklmnpqrsvwxyz";

/// Nix base32 encoding (lowercase, without padding, LSB first, reversed)
static NIX_BASE32: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(ALPHABET);
    spec.bit_order = BitOrder::LeastSignificantFirst;
    spec.encoding().unwrap()
});

/// Number of base32 characters needed for `len` bytes.
pub const fn encode_len(len: usize) -> usize {
    (8 * len).div_ceil(5)
}

pub fn encode_string(input: &[u8]) -> String {
    // Nix base32 is reversed
    NIX_BASE32.encode(input).chars().rev().collect()
}

pub fn decode(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let reversed: Vec<u8> = input.iter().rev().copied().collect();
    NIX_BASE32.decode(&reversed).map_err(|err| DecodeError {
        position: input.len().saturating_sub(err.position + 1),
        kind: err.kind,
    })
}

/// Returns true if every byte of `input` is part of the nix-base32 alphabet.
pub fn is_valid(input: &[u8]) -> bool {
    input.iter().all(|b| ALPHABET.as_bytes().contains(b))
}

#[cfg(test)]
mod unittests {
    use hex_literal::hex;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty("", &[])]
    #[case::one_0("00", &hex!("00"))]
    #[case::one_1("01", &hex!("01"))]
    #[case::one_1f("0z", &hex!("1F"))]
    #[case::one_20("10", &hex!("20"))]
    #[case::one_ff("7z", &hex!("FF"))]
    #[case::sha256(
        "1sfdxziarxw8j3p80lvswgpq9i7smdyxmmsj5sjhhgjdjfwjfkdr",
        &hex!("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
    )]
    #[case::sha256_db(
        "0rm6dlsg5hwgyasb1rl4rwhpl0gi7wn7b5hgd13qnfih6hk9405b",
        &hex!("ab00922634303a8b47680f96752c3ff1017a21cf84e6b0b4f28fc3f2346da666")
    )]
    fn encode_decode(#[case] encoded: &str, #[case] raw: &[u8]) {
        assert_eq!(encode_string(raw), encoded);
        assert_eq!(decode(encoded.as_bytes()).unwrap(), raw);
        assert_eq!(encode_len(raw.len()), encoded.len());
    }

    #[test]
    fn rejects_characters_outside_alphabet() {
        // 'e' is not part of the alphabet
        assert!(decode(b"0e").is_err());
        assert!(!is_valid(b"0e"));
        assert!(is_valid(ALPHABET.as_bytes()));
    }
}
