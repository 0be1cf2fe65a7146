//! Digest type and the hash functions trees can be built with

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, ops::Deref, str::FromStr};

pub use blake2::Blake2s256;
pub use sha2::Sha256;
pub use sha3::Sha3_256;

/// Length in bytes of every digest
pub const HASH_LEN: usize = 32;

/// A 32 byte digest, written as 64 lowercase hex characters
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MerkleHash(pub [u8; HASH_LEN]);

impl MerkleHash {
    /// Lowercase hex form, the text that gets hashed when combining nodes
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Deref for MerkleHash {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<[u8; HASH_LEN]> for MerkleHash {
    fn eq(&self, other: &[u8; HASH_LEN]) -> bool {
        &self.0 == other
    }
}

impl fmt::Display for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for MerkleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MerkleHash({})", self.to_hex())
    }
}

/// Parses only the canonical lowercase form, since digests are compared and
/// combined as text.
impl FromStr for MerkleHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((index, c)) = s.char_indices().find(|(_, c)| c.is_ascii_uppercase()) {
            return Err(hex::FromHexError::InvalidHexCharacter { c, index });
        }
        let mut result = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut result)?;
        Ok(MerkleHash(result))
    }
}

impl Serialize for MerkleHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for MerkleHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse()
            .map_err(|err| de::Error::custom(format!("hash {hex:?}: {err}")))
    }
}

/// A hash function usable for leaves and internal nodes.
///
/// Leaves are hashed from the UTF-8 bytes of their value. Internal nodes are
/// hashed from the hex text of the left child followed by the hex text of the
/// right child, so `hash_pair(l, r) != hash_pair(r, l)`.
pub trait DigestProvider {
    /// Hash raw bytes
    fn hash_bytes(data: &[u8]) -> MerkleHash;

    /// Hash a leaf value
    fn hash_leaf(value: &str) -> MerkleHash {
        Self::hash_bytes(value.as_bytes())
    }

    /// Hash two sibling nodes, left first
    fn hash_pair(left: &MerkleHash, right: &MerkleHash) -> MerkleHash {
        let mut text = [0u8; 4 * HASH_LEN];
        let (left_text, right_text) = text.split_at_mut(2 * HASH_LEN);
        // Cannot fail: each half is exactly twice the digest length
        hex::encode_to_slice(left.0, left_text).ok();
        hex::encode_to_slice(right.0, right_text).ok();
        Self::hash_bytes(&text)
    }
}

macro_rules! impl_digest_provider {
    ($($hasher:ty),* $(,)?) => {
        $(
            impl DigestProvider for $hasher {
                fn hash_bytes(data: &[u8]) -> MerkleHash {
                    use sha2::Digest;

                    let mut result = [0u8; HASH_LEN];
                    result.copy_from_slice(<$hasher>::digest(data).as_slice());
                    MerkleHash(result)
                }
            }
        )*
    };
}

impl_digest_provider!(Sha256, Sha3_256, Blake2s256);
