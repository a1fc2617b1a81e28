//! Structural fallback codec for types that derive `bincode::Encode` / `bincode::Decode`.
//!
//! The derived implementations walk the type's declared fields in declaration
//! order, which makes them the structural descriptor for this codec. Unlike
//! [`Layout`](crate::Layout), reordering fields in the type declaration changes
//! the canonical bytes (and therefore every digest), so persisted indexes must be
//! rebuilt after such a change.

use std::marker::PhantomData;

use hashdex_common::{Result, error::Error};

use crate::Codec;

/// A [`Codec`] backed by `bincode` with fixed-width big-endian integers.
pub struct BincodeCodec<T>(PhantomData<fn() -> T>);

impl<T> BincodeCodec<T> {
    pub fn new() -> BincodeCodec<T> {
        BincodeCodec(PhantomData)
    }

    fn binc_config() -> impl bincode::config::Config {
        bincode::config::standard()
            .with_big_endian()
            .with_fixed_int_encoding()
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for BincodeCodec<T>
where
    T: bincode::Encode + bincode::Decode<()> + 'static,
{
    fn size(&self, value: &T) -> Result<usize> {
        let mut tracker = Tracker::default();
        bincode::encode_into_std_write(value, &mut tracker, Self::binc_config())
            .map_err(|e| Error::codec(std::any::type_name::<T>(), e))?;
        Ok(tracker.size())
    }

    fn serialize(&self, value: &T, buf: &mut Vec<u8>) -> Result<()> {
        bincode::encode_into_std_write(value, buf, Self::binc_config())
            .map_err(|e| Error::codec(std::any::type_name::<T>(), e))?;
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<T> {
        let data = *input;
        let (value, consumed) = bincode::decode_from_slice(data, Self::binc_config())
            .map_err(|e| Error::codec(std::any::type_name::<T>(), e))?;
        *input = &data[consumed..];
        Ok(value)
    }
}

/// Minimal `Write` implementation that counts bytes without storing them,
/// used to compute exact encoded sizes by a dry-run encoding.
#[derive(Default)]
struct Tracker(usize);

impl Tracker {
    fn size(&self) -> usize {
        self.0
    }
}

impl std::io::Write for Tracker {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
