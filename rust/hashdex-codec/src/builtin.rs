//! Built-in codecs for primitive and standard types.
//!
//! All fixed-width numbers are written big-endian. Variable-size values
//! (`String`, `Vec<u8>`) carry a `u32` big-endian length prefix.
//!
//! Floating-point values are canonicalized before writing: `-0.0` is written as
//! `0.0` and every NaN as the canonical quiet NaN, so values that compare (or are
//! treated as) equal share one canonical form.

use std::{marker::PhantomData, sync::Arc};

use hashdex_common::{Result, error::Error, verify_data};

use crate::{Codec, take_array, take_bytes};

/// Codec for fixed-width integers and `bool`.
pub struct FixedCodec<T>(PhantomData<fn() -> T>);

impl<T> Default for FixedCodec<T> {
    fn default() -> Self {
        FixedCodec(PhantomData)
    }
}

macro_rules! impl_int_codec {
    ($($t:ty),*) => {
        $(
            impl Codec<$t> for FixedCodec<$t> {
                fn size(&self, _value: &$t) -> Result<usize> {
                    Ok(std::mem::size_of::<$t>())
                }

                fn serialize(&self, value: &$t, buf: &mut Vec<u8>) -> Result<()> {
                    buf.extend_from_slice(&value.to_be_bytes());
                    Ok(())
                }

                fn deserialize(&self, input: &mut &[u8]) -> Result<$t> {
                    Ok(<$t>::from_be_bytes(take_array(input)?))
                }
            }
        )*
    };
}

impl_int_codec!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl Codec<bool> for FixedCodec<bool> {
    fn size(&self, _value: &bool) -> Result<usize> {
        Ok(1)
    }

    fn serialize(&self, value: &bool, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(u8::from(*value));
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<bool> {
        match take_array::<1>(input)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::invalid_format(format!("bool byte {b}"))),
        }
    }
}

impl Codec<f32> for FixedCodec<f32> {
    fn size(&self, _value: &f32) -> Result<usize> {
        Ok(4)
    }

    fn serialize(&self, value: &f32, buf: &mut Vec<u8>) -> Result<()> {
        let canonical = if value.is_nan() {
            f32::NAN
        } else if *value == 0.0 {
            0.0
        } else {
            *value
        };
        buf.extend_from_slice(&canonical.to_bits().to_be_bytes());
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<f32> {
        Ok(f32::from_bits(u32::from_be_bytes(take_array(input)?)))
    }
}

impl Codec<f64> for FixedCodec<f64> {
    fn size(&self, _value: &f64) -> Result<usize> {
        Ok(8)
    }

    fn serialize(&self, value: &f64, buf: &mut Vec<u8>) -> Result<()> {
        let canonical = if value.is_nan() {
            f64::NAN
        } else if *value == 0.0 {
            0.0
        } else {
            *value
        };
        buf.extend_from_slice(&canonical.to_bits().to_be_bytes());
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(take_array(input)?)))
    }
}

/// Codec for `uuid::Uuid`: the 16 raw bytes.
#[derive(Default)]
pub struct UuidCodec;

impl Codec<uuid::Uuid> for UuidCodec {
    fn size(&self, _value: &uuid::Uuid) -> Result<usize> {
        Ok(16)
    }

    fn serialize(&self, value: &uuid::Uuid, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<uuid::Uuid> {
        Ok(uuid::Uuid::from_bytes(take_array(input)?))
    }
}

/// Codec for length-prefixed byte sequences: `String` and `Vec<u8>`.
#[derive(Default)]
pub struct BytesCodec;

impl BytesCodec {
    fn write_len(len: usize, buf: &mut Vec<u8>) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| Error::invalid_arg("value", format!("length {len} exceeds u32")))?;
        buf.extend_from_slice(&len.to_be_bytes());
        Ok(())
    }

    fn read<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
        let len = u32::from_be_bytes(take_array(input)?) as usize;
        take_bytes(input, len)
    }
}

impl Codec<Vec<u8>> for BytesCodec {
    fn size(&self, value: &Vec<u8>) -> Result<usize> {
        Ok(4 + value.len())
    }

    fn serialize(&self, value: &Vec<u8>, buf: &mut Vec<u8>) -> Result<()> {
        Self::write_len(value.len(), buf)?;
        buf.extend_from_slice(value);
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<Vec<u8>> {
        Ok(Self::read(input)?.to_vec())
    }
}

impl Codec<String> for BytesCodec {
    fn size(&self, value: &String) -> Result<usize> {
        Ok(4 + value.len())
    }

    fn serialize(&self, value: &String, buf: &mut Vec<u8>) -> Result<()> {
        Self::write_len(value.len(), buf)?;
        buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<String> {
        let bytes = Self::read(input)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::codec("utf-8 string", e))
    }
}

/// Codec for `Option<T>`: a presence byte (`0` or `1`) followed by the inner value.
pub struct OptionCodec<T> {
    inner: Arc<dyn Codec<T>>,
}

impl<T> OptionCodec<T> {
    pub fn new(inner: Arc<dyn Codec<T>>) -> OptionCodec<T> {
        OptionCodec { inner }
    }
}

impl<T: 'static> Codec<Option<T>> for OptionCodec<T> {
    fn size(&self, value: &Option<T>) -> Result<usize> {
        match value {
            Some(v) => Ok(1 + self.inner.size(v)?),
            None => Ok(1),
        }
    }

    fn serialize(&self, value: &Option<T>, buf: &mut Vec<u8>) -> Result<()> {
        match value {
            Some(v) => {
                buf.push(1);
                self.inner.serialize(v, buf)
            }
            None => {
                buf.push(0);
                Ok(())
            }
        }
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<Option<T>> {
        let tag = take_array::<1>(input)?[0];
        verify_data!(option_tag, tag <= 1);
        if tag == 1 {
            Ok(Some(self.inner.deserialize(input)?))
        } else {
            Ok(None)
        }
    }
}
