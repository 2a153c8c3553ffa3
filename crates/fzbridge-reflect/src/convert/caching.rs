use std::sync::Arc;

use dashmap::DashMap;

use super::{Converter, TypeConverterRegistry};
use crate::types::TypeMapping;

/// Memoizes another registry by exact requested mapping, misses included.
///
/// Lookups compute outside any lock; two threads racing on the same mapping
/// both compute and the second insert overwrites an identical answer.
pub struct CachingRegistry<R> {
    inner: R,
    cache: DashMap<TypeMapping, Option<Arc<dyn Converter>>>,
}

impl<R: TypeConverterRegistry> CachingRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<R: TypeConverterRegistry> TypeConverterRegistry for CachingRegistry<R> {
    fn find_converter(&self, mapping: &TypeMapping) -> Option<Arc<dyn Converter>> {
        if let Some(hit) = self.cache.get(mapping) {
            return hit.value().clone();
        }
        let found = self.inner.find_converter(mapping);
        tracing::trace!(
            %mapping,
            converter = found.as_ref().map(|c| c.name()).unwrap_or("<none>"),
            "converter cache fill"
        );
        self.cache.insert(mapping.clone(), found.clone());
        found
    }
}
