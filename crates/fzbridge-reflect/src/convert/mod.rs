//! Bidirectional converters between sheet values and native values, and the
//! registries that select them.
//!
//! Converters are published by *providers* under a `::`-separated path (the
//! built-ins live under [`BUILTIN_LOCATION`]). A [`ScanningRegistry`] picks up
//! every provider below a configured location when it is built; a
//! [`CachingRegistry`] memoizes its answers.

mod builtin;
mod caching;
mod scanning;

use std::sync::Arc;

use dashmap::DashMap;
use fzbridge_common::{ObjectHandle, SheetValue, ValueKind};
use once_cell::sync::Lazy;

use crate::error::ConversionError;
use crate::heap::Heap;
use crate::native::NativeValue;
use crate::types::{NativeType, TypeMapping};

pub use builtin::{
    ArrayConverter, BigDataConverter, BoolConverter, DateTimeConverter, DoubleConverter,
    HandleConverter, IntConverter, LongConverter, NullConverter, ScalarObjectConverter,
    TextConverter, ValueConverter,
};
pub use caching::CachingRegistry;
pub use scanning::ScanningRegistry;

pub const DEFAULT_PRIORITY: i32 = 0;

/// Priority of the catch-all `* -> object` converters, so that any
/// dedicated converter wins over them.
pub const FALLBACK_PRIORITY: i32 = -10;

pub const BUILTIN_LOCATION: &str = "fzbridge::convert";

/// External kinds from most to least primitive; the order in which a return
/// value looks for a representation.
pub const SIMPLEST_ORDER: [ValueKind; 6] = [
    ValueKind::Number,
    ValueKind::Boolean,
    ValueKind::String,
    ValueKind::Array,
    ValueKind::BigData,
    ValueKind::ObjectHandle,
];

/// Fetches payloads the host handed over as (handle, length) only.
pub trait BigDataSource: Send + Sync {
    fn fetch(&self, handle: u64, len: usize) -> Result<Vec<u8>, String>;
}

/// Everything a conversion may need, passed explicitly on every call.
#[derive(Clone, Copy)]
pub struct ConvertCtx<'a> {
    pub registry: &'a dyn TypeConverterRegistry,
    pub heap: &'a Heap,
    pub big_data: Option<&'a dyn BigDataSource>,
}

impl<'a> ConvertCtx<'a> {
    pub fn new(registry: &'a dyn TypeConverterRegistry, heap: &'a Heap) -> Self {
        Self {
            registry,
            heap,
            big_data: None,
        }
    }

    pub fn with_big_data(mut self, source: &'a dyn BigDataSource) -> Self {
        self.big_data = Some(source);
        self
    }

    pub fn require(&self, mapping: &TypeMapping) -> Result<Arc<dyn Converter>, ConversionError> {
        self.registry
            .find_converter(mapping)
            .ok_or_else(|| ConversionError::NoConverter(mapping.clone()))
    }

    /// Converts `value` into a native value of type `target`.
    pub fn to_native(&self, value: &SheetValue, target: &NativeType) -> Result<NativeValue, ConversionError> {
        let mapping = TypeMapping::new(value.kind(), target.clone());
        self.require(&mapping)?.to_native(value, target, self)
    }

    /// The most primitive representation of `value` any converter offers.
    pub fn externalize(&self, value: &NativeValue) -> Option<SheetValue> {
        if value.is_null() {
            return Some(SheetValue::Nil);
        }
        let native = value.native_type();
        for kind in SIMPLEST_ORDER {
            let mapping = TypeMapping::new(kind, native.clone());
            if let Some(converter) = self.registry.find_converter(&mapping) {
                match converter.to_external(value, self) {
                    Ok(external) => return Some(external),
                    Err(err) => {
                        tracing::trace!(%mapping, converter = converter.name(), %err, "converter declined value")
                    }
                }
            }
        }
        None
    }

    /// Boxes `value` into the heap; `Nil` for null.
    pub fn box_value(&self, value: NativeValue) -> SheetValue {
        self.heap
            .box_value(value)
            .map_or(SheetValue::Nil, SheetValue::ObjectHandle)
    }

    pub(crate) fn box_object(&self, value: NativeValue) -> Option<ObjectHandle> {
        self.heap.box_value(value)
    }
}

/// A bidirectional conversion bound to one [`TypeMapping`].
///
/// Implementations are instantiated once per registry and shared across
/// threads, so they must not keep per-call state.
pub trait Converter: Send + Sync {
    fn mapping(&self) -> &TypeMapping;

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn name(&self) -> &str;

    /// Produces a native value assignable to `target`, which the mapping of
    /// this converter covers.
    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError>;

    fn to_external(&self, value: &NativeValue, ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError>;
}

impl std::fmt::Debug for dyn Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} @{}", self.name(), self.mapping(), self.priority())
    }
}

pub trait TypeConverterRegistry: Send + Sync {
    /// Best converter whose mapping covers `mapping`, if any.
    fn find_converter(&self, mapping: &TypeMapping) -> Option<Arc<dyn Converter>>;
}

impl<R: TypeConverterRegistry + ?Sized> TypeConverterRegistry for Arc<R> {
    fn find_converter(&self, mapping: &TypeMapping) -> Option<Arc<dyn Converter>> {
        (**self).find_converter(mapping)
    }
}

/// Source of converter instances published under a path.
pub trait ConverterProvider: Send + Sync {
    fn converters(&self) -> Vec<Arc<dyn Converter>>;
}

impl<F> ConverterProvider for F
where
    F: Fn() -> Vec<Arc<dyn Converter>> + Send + Sync,
{
    fn converters(&self) -> Vec<Arc<dyn Converter>> {
        (self)()
    }
}

static PROVIDERS: Lazy<DashMap<String, Arc<dyn ConverterProvider>>> = Lazy::new(|| {
    let providers: DashMap<String, Arc<dyn ConverterProvider>> = DashMap::new();
    providers.insert(
        format!("{BUILTIN_LOCATION}::builtin"),
        Arc::new(builtin::builtin_converters),
    );
    providers
});

/// Publishes `provider` under `path`. Registries built afterwards whose
/// location is a prefix of `path` will pick it up.
pub fn register_provider(path: &str, provider: Arc<dyn ConverterProvider>) {
    PROVIDERS.insert(path.to_string(), provider);
}

pub fn unregister_provider(path: &str) -> bool {
    PROVIDERS.remove(path).is_some()
}

fn path_is_under(path: &str, location: &str) -> bool {
    location.is_empty()
        || path == location
        || path
            .strip_prefix(location)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Providers published at or below `location`, sorted by path.
pub(crate) fn providers_under(location: &str) -> Vec<(String, Arc<dyn ConverterProvider>)> {
    let mut found: Vec<(String, Arc<dyn ConverterProvider>)> = PROVIDERS
        .iter()
        .filter(|entry| path_is_under(entry.key(), location))
        .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    found
}
