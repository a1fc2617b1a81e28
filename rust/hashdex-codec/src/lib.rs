//! Canonical value serialization and content digests.
//!
//! `hashdex-codec` turns typed values into *canonical bytes* (a deterministic byte
//! form used as hash input and as stored payload) and back, and hashes canonical
//! bytes into fixed-width [`Digest`]s.
//!
//! # Core Concepts
//!
//! ## Two-Phase Serialization
//!
//! Every [`Codec`] reports the exact canonical size of a value before writing it:
//!
//! 1. **Size computation**: [`Codec::size()`] returns the exact number of bytes
//! 2. **Writing**: [`Codec::serialize()`] appends exactly that many bytes
//!
//! Callers allocate once and verify the written length against the reported size.
//!
//! ## Codec Resolution
//!
//! Codecs are looked up by Rust type in an explicit [`CodecRegistry`], created by
//! the caller and shared by the indexes built from it. The registry comes with
//! built-in codecs for primitive types (see [`builtin`]); other types are served by
//! a structural codec:
//!
//! - [`layout::Layout`]: a field descriptor (field name, accessor, per-field codec)
//!   assembled once, with fields encoded in name order;
//! - [`structural::BincodeCodec`]: the fallback for types that derive
//!   `bincode::Encode` / `bincode::Decode`.
//!
//! Resolution happens once, when an index is constructed. A type that cannot be
//! resolved fails construction with `ErrorKind::UnsupportedType`.

use hashdex_common::{Result, verify_data};

pub mod builtin;
pub mod digest;
pub mod layout;
pub mod registry;
pub mod structural;

pub use digest::{Digest, HashAlgorithm, HashFunction};
pub use layout::{Layout, LayoutBuilder, LayoutValues};
pub use registry::CodecRegistry;
pub use structural::BincodeCodec;

/// Serializer and deserializer for values of type `T`.
///
/// # Implementation Requirements
///
/// - [`size()`](Codec::size) must return exactly the number of bytes that
///   [`serialize()`](Codec::serialize) appends for the same value
/// - Serialization must be deterministic: equal values produce equal bytes
/// - Encodings must be self-delimiting, so that codecs can be concatenated
///   (as [`layout::Layout`] does) and [`deserialize()`](Codec::deserialize)
///   consumes exactly the bytes of one value
pub trait Codec<T>: Send + Sync + 'static {
    /// Returns the exact canonical size of `value`, in bytes.
    fn size(&self, value: &T) -> Result<usize>;

    /// Appends the canonical bytes of `value` to `buf`.
    fn serialize(&self, value: &T, buf: &mut Vec<u8>) -> Result<()>;

    /// Reads one value from the front of `input`, advancing it past the consumed bytes.
    fn deserialize(&self, input: &mut &[u8]) -> Result<T>;

    /// Returns the canonical bytes of `value` in an exactly sized buffer.
    fn to_bytes(&self, value: &T) -> Result<Vec<u8>> {
        let size = self.size(value)?;
        let mut buf = Vec::with_capacity(size);
        self.serialize(value, &mut buf)?;
        verify_data!(canonical_size, buf.len() == size);
        Ok(buf)
    }

    /// Decodes a value that must occupy all of `bytes`.
    fn from_bytes(&self, bytes: &[u8]) -> Result<T> {
        let mut input = bytes;
        let value = self.deserialize(&mut input)?;
        verify_data!(trailing_bytes, input.is_empty());
        Ok(value)
    }
}

/// Splits `len` bytes off the front of `input`.
pub fn take_bytes<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    let data: &'a [u8] = *input;
    verify_data!(input, data.len() >= len);
    let (head, tail) = data.split_at(len);
    *input = tail;
    Ok(head)
}

/// Splits a fixed-size array off the front of `input`.
pub fn take_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(take_bytes(input, N)?);
    Ok(out)
}
