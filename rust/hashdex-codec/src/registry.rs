//! Registry of codecs, keyed by Rust type.
//!
//! A [`CodecRegistry`] is an explicit object: callers create one, register the
//! codecs their types need, and pass it (usually as an `Arc`) to every index they
//! build. There is no process-wide registry.
//!
//! # Thread Safety
//!
//! The registry uses a `RwLock` so that lookups may proceed concurrently while
//! registration takes exclusive access.

use std::{
    any::{Any, TypeId},
    sync::{Arc, RwLock},
};

use hashdex_common::{Result, error::Error};

use crate::{
    BincodeCodec, Codec,
    builtin::{BytesCodec, FixedCodec, OptionCodec, UuidCodec},
};

/// A type-erased `Arc<dyn Codec<T>>` together with the name of `T`.
struct RegisteredCodec {
    type_name: &'static str,
    codec: Arc<dyn Any + Send + Sync>,
}

type CodecMap = ahash::HashMap<TypeId, RegisteredCodec>;

pub struct CodecRegistry {
    codecs: RwLock<CodecMap>,
}

impl CodecRegistry {
    /// Creates a registry with no codecs at all.
    pub fn empty() -> CodecRegistry {
        CodecRegistry {
            codecs: RwLock::new(ahash::HashMap::default()),
        }
    }

    /// Creates a registry pre-populated with the built-in codecs: `bool`, all
    /// fixed-width integers, `f32`, `f64`, `String`, `Vec<u8>`, `uuid::Uuid`, and
    /// `Option<_>` of each of those.
    pub fn new() -> CodecRegistry {
        let mut codecs = CodecMap::default();
        Self::insert_builtins(&mut codecs);
        CodecRegistry {
            codecs: RwLock::new(codecs),
        }
    }

    /// Registers `codec` as the codec for `T`, replacing any previous registration.
    pub fn register<T: 'static>(&self, codec: Arc<dyn Codec<T>>) -> Result<()> {
        let mut codecs = self
            .codecs
            .write()
            .map_err(|_| Error::invalid_operation("codec registry: lock poisoned"))?;
        if Self::insert(&mut codecs, codec) {
            log::debug!("codec for {} replaced", std::any::type_name::<T>());
        }
        Ok(())
    }

    /// Inserts `codec` for `T` into `codecs`. Returns `true` if it replaced an entry.
    fn insert<T: 'static>(codecs: &mut CodecMap, codec: Arc<dyn Codec<T>>) -> bool {
        codecs
            .insert(
                TypeId::of::<T>(),
                RegisteredCodec {
                    type_name: std::any::type_name::<T>(),
                    codec: Arc::new(codec),
                },
            )
            .is_some()
    }

    /// Registers the `bincode` structural codec for `T`.
    pub fn register_structural<T>(&self) -> Result<()>
    where
        T: bincode::Encode + bincode::Decode<()> + 'static,
    {
        self.register::<T>(Arc::new(BincodeCodec::<T>::new()))
    }

    /// Returns `true` when a codec for `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.codecs
            .read()
            .map(|codecs| codecs.contains_key(&TypeId::of::<T>()))
            .unwrap_or(false)
    }

    /// Looks up the codec for `T`.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::UnsupportedType` if no codec for `T` is registered.
    pub fn resolve<T: 'static>(&self) -> Result<Arc<dyn Codec<T>>> {
        let codecs = self
            .codecs
            .read()
            .map_err(|_| Error::invalid_operation("codec registry: lock poisoned"))?;
        let registered = codecs
            .get(&TypeId::of::<T>())
            .ok_or_else(|| Error::unsupported_type(std::any::type_name::<T>()))?;
        registered
            .codec
            .downcast_ref::<Arc<dyn Codec<T>>>()
            .cloned()
            .ok_or_else(|| {
                Error::invalid_operation(format!(
                    "codec registry: entry for {} has an unexpected type",
                    registered.type_name
                ))
            })
    }

    /// Looks up the codec for `T`, falling back to the `bincode` structural codec
    /// when none is registered. The fallback is registered, so it is derived once.
    pub fn resolve_or_structural<T>(&self) -> Result<Arc<dyn Codec<T>>>
    where
        T: bincode::Encode + bincode::Decode<()> + 'static,
    {
        if !self.contains::<T>() {
            log::debug!(
                "no codec for {}, using structural fallback",
                std::any::type_name::<T>()
            );
            self.register_structural::<T>()?;
        }
        self.resolve::<T>()
    }

    /// Names of all registered types, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names = self
            .codecs
            .read()
            .map(|codecs| codecs.values().map(|c| c.type_name).collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    fn insert_builtins(codecs: &mut CodecMap) {
        fn with_option<T: 'static>(codecs: &mut CodecMap, codec: Arc<dyn Codec<T>>) {
            let option: Arc<dyn Codec<Option<T>>> = Arc::new(OptionCodec::new(codec.clone()));
            CodecRegistry::insert::<T>(codecs, codec);
            CodecRegistry::insert::<Option<T>>(codecs, option);
        }

        macro_rules! fixed {
            ($codecs:expr; $($t:ty),*) => {
                $( with_option::<$t>($codecs, Arc::new(FixedCodec::<$t>::default())); )*
            };
        }

        fixed!(
            codecs; bool, u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64
        );
        with_option::<String>(codecs, Arc::new(BytesCodec));
        with_option::<Vec<u8>>(codecs, Arc::new(BytesCodec));
        with_option::<uuid::Uuid>(codecs, Arc::new(UuidCodec));
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
