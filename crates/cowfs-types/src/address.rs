use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Size of a block address in bytes (one CRC-64 digest).
pub const ADDRESS_LEN: usize = 8;

/// Length of the textual form of an address.
pub const ADDRESS_HEX_LEN: usize = ADDRESS_LEN * 2;

/// Encode bytes as lowercase hex, high nibble first, in input order.
///
/// The output is always `2 * bytes.len()` characters with no separators.
pub fn bin2hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Content address of a block.
///
/// The address holds the big-endian bytes of the block's CRC-64 digest, so
/// its hex form reads like the digest printed as a number. That hex form is
/// the block's filename in the data directory. Identical content always
/// produces the same address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockAddress([u8; ADDRESS_LEN]);

impl BlockAddress {
    /// Build an address from a finalized digest value.
    pub const fn from_digest(digest: u64) -> Self {
        Self(digest.to_be_bytes())
    }

    /// Build an address from its raw bytes.
    pub const fn from_raw(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// The digest value this address was derived from.
    pub fn digest(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// The raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Hex-encoded string representation (16 lowercase characters).
    pub fn to_hex(&self) -> String {
        bin2hex(&self.0)
    }

    /// Parse from a hex string. Only exact-length lowercase or uppercase hex is accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.len() != ADDRESS_HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: ADDRESS_HEX_LEN,
                actual: s.len(),
            });
        }
        let mut arr = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(s, &mut arr).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Ok(Self(arr))
    }

    /// Filename of the attribute sidecar for this address.
    pub fn attribute_file_name(&self) -> String {
        format!("{}.attr", self.to_hex())
    }
}

impl fmt::Debug for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockAddress({})", self.to_hex())
    }
}

impl fmt::Display for BlockAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for BlockAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<u64> for BlockAddress {
    fn from(digest: u64) -> Self {
        Self::from_digest(digest)
    }
}

impl Serialize for BlockAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bin2hex_is_lowercase_high_nibble_first() {
        assert_eq!(bin2hex(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
        assert_eq!(bin2hex(&[]), "");
    }

    #[test]
    fn hex_is_sixteen_chars() {
        let addr = BlockAddress::from_digest(0x0123_4567_89ab_cdef);
        assert_eq!(addr.to_hex().len(), ADDRESS_HEX_LEN);
        // Most significant byte first, same as the numeric display.
        assert_eq!(addr.to_hex(), "0123456789abcdef");
        assert_eq!(addr.to_hex(), format!("{:016x}", addr.digest()));
    }

    #[test]
    fn digest_roundtrip() {
        let addr = BlockAddress::from_digest(0xdead_beef);
        assert_eq!(addr.digest(), 0xdead_beef);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = BlockAddress::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 16,
                actual: 4
            }
        );
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        let err = BlockAddress::from_hex("zzzzzzzzzzzzzzzz").unwrap_err();
        assert!(matches!(err, TypeError::InvalidHex(_)));
    }

    #[test]
    fn attribute_file_name_has_suffix() {
        let addr = BlockAddress::from_digest(1);
        assert_eq!(addr.attribute_file_name(), "0100000000000000.attr");
    }

    #[test]
    fn serde_as_hex_string() {
        let addr = BlockAddress::from_digest(42);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"2a00000000000000\"");
        let parsed: BlockAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn debug_format() {
        let addr = BlockAddress::from_digest(0);
        assert_eq!(format!("{addr:?}"), "BlockAddress(0000000000000000)");
    }

    proptest! {
        #[test]
        fn bin2hex_length_and_alphabet(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let hex = bin2hex(&bytes);
            prop_assert_eq!(hex.len(), bytes.len() * 2);
            prop_assert!(hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }

        #[test]
        fn display_then_parse(digest in any::<u64>()) {
            let addr = BlockAddress::from_digest(digest);
            let parsed: BlockAddress = addr.to_string().parse().unwrap();
            prop_assert_eq!(parsed, addr);
        }
    }
}
