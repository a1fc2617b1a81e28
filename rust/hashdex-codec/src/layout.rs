//! Field-descriptor codec for user-defined types.
//!
//! A [`Layout<T>`] is built once per type from a list of named fields, each with an
//! accessor and a codec. Fields are encoded in field-name order, so the canonical
//! bytes do not depend on the order in which fields were declared or registered.
//! The encoding is the plain concatenation of the field encodings; every field
//! codec is self-delimiting.
//!
//! ```ignore
//! let layout = Layout::builder("Car", &registry)
//!     .field("id", |car: &Car| &car.id)
//!     .field("model", |car: &Car| &car.model)
//!     .build(|values| {
//!         Ok(Car {
//!             id: values.take("id")?,
//!             model: values.take("model")?,
//!         })
//!     })?;
//! registry.register::<Car>(Arc::new(layout))?;
//! ```

use std::{any::Any, sync::Arc};

use hashdex_common::{Result, error::Error};

use crate::{Codec, CodecRegistry};

type SizeFn<T> = Box<dyn Fn(&T) -> Result<usize> + Send + Sync>;
type WriteFn<T> = Box<dyn Fn(&T, &mut Vec<u8>) -> Result<()> + Send + Sync>;
type ReadFn = Box<dyn Fn(&mut &[u8]) -> Result<Box<dyn Any + Send>> + Send + Sync>;
type ConstructFn<T> = Box<dyn Fn(&mut LayoutValues) -> Result<T> + Send + Sync>;

struct LayoutField<T> {
    name: String,
    size: SizeFn<T>,
    write: WriteFn<T>,
    read: ReadFn,
}

/// Structural codec over the named fields of `T`.
pub struct Layout<T> {
    type_name: String,
    fields: Vec<LayoutField<T>>,
    construct: ConstructFn<T>,
}

impl<T: 'static> Layout<T> {
    /// Starts a layout for `type_name`; field codecs are resolved from `registry`.
    pub fn builder<'r>(type_name: &str, registry: &'r CodecRegistry) -> LayoutBuilder<'r, T> {
        LayoutBuilder {
            type_name: type_name.to_string(),
            registry,
            fields: Vec::new(),
            error: None,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Field names in encoding order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

impl<T: 'static> Codec<T> for Layout<T> {
    fn size(&self, value: &T) -> Result<usize> {
        self.fields
            .iter()
            .try_fold(0usize, |acc, field| Ok(acc + (field.size)(value)?))
    }

    fn serialize(&self, value: &T, buf: &mut Vec<u8>) -> Result<()> {
        for field in &self.fields {
            (field.write)(value, buf)?;
        }
        Ok(())
    }

    fn deserialize(&self, input: &mut &[u8]) -> Result<T> {
        let mut values = LayoutValues {
            values: Vec::with_capacity(self.fields.len()),
        };
        for field in &self.fields {
            let value = (field.read)(input)?;
            values.values.push((field.name.clone(), Some(value)));
        }
        (self.construct)(&mut values)
    }
}

/// Accumulates the fields of a [`Layout`]. Resolution errors are deferred to
/// [`build()`](LayoutBuilder::build).
pub struct LayoutBuilder<'r, T> {
    type_name: String,
    registry: &'r CodecRegistry,
    fields: Vec<LayoutField<T>>,
    error: Option<Error>,
}

impl<T: 'static> LayoutBuilder<'_, T> {
    /// Adds a field whose codec is resolved from the registry by type.
    pub fn field<F: Send + 'static>(
        mut self,
        name: &str,
        getter: impl Fn(&T) -> &F + Send + Sync + 'static,
    ) -> Self {
        match self.registry.resolve::<F>() {
            Ok(codec) => self.field_with(name, getter, codec),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    /// Adds a field with an explicit codec.
    pub fn field_with<F: Send + 'static>(
        mut self,
        name: &str,
        getter: impl Fn(&T) -> &F + Send + Sync + 'static,
        codec: Arc<dyn Codec<F>>,
    ) -> Self {
        let getter = Arc::new(getter);
        let size: SizeFn<T> = {
            let (getter, codec) = (getter.clone(), codec.clone());
            Box::new(move |obj: &T| codec.size(getter(obj)))
        };
        let write: WriteFn<T> = {
            let codec = codec.clone();
            Box::new(move |obj: &T, buf: &mut Vec<u8>| codec.serialize(getter(obj), buf))
        };
        let read: ReadFn = Box::new(move |input: &mut &[u8]| -> Result<Box<dyn Any + Send>> {
            let value = codec.deserialize(input)?;
            Ok(Box::new(value))
        });
        self.fields.push(LayoutField {
            name: name.to_string(),
            size,
            write,
            read,
        });
        self
    }

    /// Finishes the layout. `construct` rebuilds a value from its decoded fields.
    ///
    /// # Errors
    ///
    /// Fails if a field codec could not be resolved, or if a field name repeats.
    pub fn build(
        self,
        construct: impl Fn(&mut LayoutValues) -> Result<T> + Send + Sync + 'static,
    ) -> Result<Layout<T>> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut fields = self.fields;
        fields.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(dup) = fields.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(Error::invalid_arg(
                "fields",
                format!("duplicate field '{}' in layout of {}", dup[0].name, self.type_name),
            ));
        }
        Ok(Layout {
            type_name: self.type_name,
            fields,
            construct: Box::new(construct),
        })
    }
}

/// Decoded field values handed to a layout's constructor.
pub struct LayoutValues {
    values: Vec<(String, Option<Box<dyn Any + Send>>)>,
}

impl LayoutValues {
    /// Moves the value of field `name` out, as type `F`.
    pub fn take<F: 'static>(&mut self, name: &str) -> Result<F> {
        let slot = self
            .values
            .iter_mut()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.take())
            .ok_or_else(|| Error::invalid_arg("name", format!("no value for field '{name}'")))?;
        slot.downcast::<F>().map(|v| *v).map_err(|_| {
            Error::invalid_arg(
                "name",
                format!(
                    "field '{name}' is not a {}",
                    std::any::type_name::<F>()
                ),
            )
        })
    }
}
