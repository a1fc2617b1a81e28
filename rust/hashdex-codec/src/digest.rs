//! Content digests over canonical bytes.

use std::fmt;

use sha2::Digest as _;

/// A fixed-width hash of canonical bytes, used as a content address.
///
/// The width is determined by the [`HashFunction`] that produced it; digests of
/// different widths never compare equal.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest(Box<[u8]>);

impl Digest {
    pub fn from_bytes(bytes: &[u8]) -> Digest {
        Digest(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0.into_vec()
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

/// A cryptographic hash function producing fixed-width digests.
///
/// Indexes rely on collision resistance: two distinct canonical forms are
/// assumed never to share a digest.
pub trait HashFunction: Send + Sync + 'static {
    /// Stable name of the function, e.g. `"sha256"`.
    fn name(&self) -> &str;

    /// Output size in bits.
    fn bits(&self) -> usize;

    /// Output size in bytes.
    fn hash_size(&self) -> usize {
        self.bits() / 8
    }

    fn hash(&self, data: &[u8]) -> Digest;
}

/// The SHA-2 family functions available out of the box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashFunction for HashAlgorithm {
    fn name(&self) -> &str {
        match self {
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    fn bits(&self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 224,
            HashAlgorithm::Sha256 => 256,
            HashAlgorithm::Sha384 => 384,
            HashAlgorithm::Sha512 => 512,
        }
    }

    fn hash(&self, data: &[u8]) -> Digest {
        match self {
            HashAlgorithm::Sha224 => Digest::from_bytes(&sha2::Sha224::digest(data)),
            HashAlgorithm::Sha256 => Digest::from_bytes(&sha2::Sha256::digest(data)),
            HashAlgorithm::Sha384 => Digest::from_bytes(&sha2::Sha384::digest(data)),
            HashAlgorithm::Sha512 => Digest::from_bytes(&sha2::Sha512::digest(data)),
        }
    }
}
