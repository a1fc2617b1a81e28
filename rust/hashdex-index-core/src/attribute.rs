//! Attribute extraction.

use std::marker::PhantomData;

/// A named extraction function mapping an object to zero or more attribute values.
///
/// A `None` in the returned list is a null value. Nulls are never indexed and
/// never match a query.
pub trait Attribute<O>: Send + Sync + 'static {
    type Value: Send + Sync + 'static;

    /// The attribute name, used to name the index's persisted maps.
    fn name(&self) -> &str;

    fn values(&self, object: &O) -> Vec<Option<Self::Value>>;
}

/// An [`Attribute`] backed by a closure.
///
/// ```ignore
/// let tags = FnAttribute::new("tags", |car: &Car| {
///     car.tags.iter().cloned().map(Some).collect()
/// });
/// ```
pub struct FnAttribute<O, V, F> {
    name: String,
    extract: F,
    _p: PhantomData<fn(&O) -> V>,
}

impl<O, V, F> FnAttribute<O, V, F>
where
    F: Fn(&O) -> Vec<Option<V>>,
{
    pub fn new(name: impl Into<String>, extract: F) -> FnAttribute<O, V, F> {
        FnAttribute {
            name: name.into(),
            extract,
            _p: PhantomData,
        }
    }
}

impl<O, V, F> Attribute<O> for FnAttribute<O, V, F>
where
    O: 'static,
    V: Send + Sync + 'static,
    F: Fn(&O) -> Vec<Option<V>> + Send + Sync + 'static,
{
    type Value = V;

    fn name(&self) -> &str {
        &self.name
    }

    fn values(&self, object: &O) -> Vec<Option<V>> {
        (self.extract)(object)
    }
}

/// A single-valued attribute whose value may be null.
pub fn single<O, V>(
    name: impl Into<String>,
    extract: impl Fn(&O) -> Option<V> + Send + Sync + 'static,
) -> impl Attribute<O, Value = V>
where
    O: 'static,
    V: Send + Sync + 'static,
{
    FnAttribute::new(name, move |object: &O| vec![extract(object)])
}

/// A multi-valued attribute without nulls.
pub fn multi<O, V>(
    name: impl Into<String>,
    extract: impl Fn(&O) -> Vec<V> + Send + Sync + 'static,
) -> impl Attribute<O, Value = V>
where
    O: 'static,
    V: Send + Sync + 'static,
{
    FnAttribute::new(name, move |object: &O| {
        extract(object).into_iter().map(Some).collect()
    })
}
