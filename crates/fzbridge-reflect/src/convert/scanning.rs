use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Converter, ConverterProvider, TypeConverterRegistry, providers_under};
use crate::types::TypeMapping;

/// Registry built once from every provider published under a set of
/// locations. Immutable afterwards.
pub struct ScanningRegistry {
    converters: Vec<Arc<dyn Converter>>,
}

impl ScanningRegistry {
    /// Instantiates the converters of every provider at or below any of
    /// `locations`. Providers reachable from several locations are taken
    /// once; scan order is provider path, then provider order.
    pub fn scan<S: AsRef<str>>(locations: &[S]) -> Self {
        let mut providers: BTreeMap<String, Arc<dyn ConverterProvider>> = BTreeMap::new();
        for location in locations {
            providers.extend(providers_under(location.as_ref()));
        }
        let converters: Vec<Arc<dyn Converter>> = providers
            .values()
            .flat_map(|provider| provider.converters())
            .collect();
        tracing::debug!(
            providers = providers.len(),
            converters = converters.len(),
            "scanned converter providers"
        );
        Self { converters }
    }

    /// Registry over exactly `converters`, in the given order.
    pub fn from_converters(converters: Vec<Arc<dyn Converter>>) -> Self {
        Self { converters }
    }

    pub fn converters(&self) -> &[Arc<dyn Converter>] {
        &self.converters
    }

    /// Converters whose mapping covers `mapping`, in scan order.
    pub fn candidates<'a>(&'a self, mapping: &'a TypeMapping) -> impl Iterator<Item = &'a Arc<dyn Converter>> + 'a {
        self.converters
            .iter()
            .filter(move |c| c.mapping().is_assignable_from(mapping))
    }
}

/// `a` covers strictly less than `b`.
fn narrower(a: &TypeMapping, b: &TypeMapping) -> bool {
    b.is_assignable_from(a) && !a.is_assignable_from(b)
}

impl TypeConverterRegistry for ScanningRegistry {
    /// Highest priority first. Within that priority any converter with a
    /// strictly narrower peer drops out, and the earliest survivor in scan
    /// order wins.
    fn find_converter(&self, mapping: &TypeMapping) -> Option<Arc<dyn Converter>> {
        let covering: Vec<&Arc<dyn Converter>> = self.candidates(mapping).collect();
        let top = covering.iter().map(|c| c.priority()).max()?;
        let tier: Vec<&Arc<dyn Converter>> = covering.into_iter().filter(|c| c.priority() == top).collect();
        tier.iter()
            .find(|c| !tier.iter().any(|peer| narrower(peer.mapping(), c.mapping())))
            .map(|c| Arc::clone(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertCtx, DEFAULT_PRIORITY, builtin::builtin_converters, register_provider};
    use crate::error::ConversionError;
    use crate::native::NativeValue;
    use crate::types::{ClassRef, NativeType};
    use fzbridge_common::{SheetValue, ValueKind};

    struct Fixed {
        mapping: TypeMapping,
        priority: i32,
        name: &'static str,
    }

    impl Converter for Fixed {
        fn mapping(&self) -> &TypeMapping {
            &self.mapping
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn name(&self) -> &str {
            self.name
        }

        fn to_native(&self, _: &SheetValue, _: &NativeType, _: &ConvertCtx<'_>) -> Result<NativeValue, ConversionError> {
            Ok(NativeValue::Text(self.name.to_string()))
        }

        fn to_external(&self, _: &NativeValue, _: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
            Ok(SheetValue::String(self.name.to_string()))
        }
    }

    fn fixed(kind: ValueKind, native: NativeType, priority: i32, name: &'static str) -> Arc<dyn Converter> {
        Arc::new(Fixed {
            mapping: TypeMapping::new(kind, native),
            priority,
            name,
        })
    }

    fn pick(registry: &ScanningRegistry, kind: ValueKind, native: NativeType) -> Option<String> {
        registry
            .find_converter(&TypeMapping::new(kind, native))
            .map(|c| c.name().to_string())
    }

    #[test]
    fn priority_then_narrowness_then_scan_order() {
        let registry = ScanningRegistry::from_converters(vec![
            fixed(ValueKind::Any, NativeType::Object, DEFAULT_PRIORITY, "wide"),
            fixed(ValueKind::Number, NativeType::Object, DEFAULT_PRIORITY, "number"),
            fixed(ValueKind::Any, NativeType::Int, DEFAULT_PRIORITY, "int-first"),
            fixed(ValueKind::Any, NativeType::Int, DEFAULT_PRIORITY, "int-second"),
            fixed(ValueKind::String, NativeType::Text, -5, "low"),
        ]);

        assert_eq!(pick(&registry, ValueKind::Boolean, NativeType::Bool).as_deref(), Some("wide"));
        assert_eq!(pick(&registry, ValueKind::Number, NativeType::Double).as_deref(), Some("number"));
        // (number, object) and (any, int) are incomparable: first seen wins
        assert_eq!(pick(&registry, ValueKind::Number, NativeType::Int).as_deref(), Some("number"));
        assert_eq!(pick(&registry, ValueKind::String, NativeType::Int).as_deref(), Some("int-first"));
        assert_eq!(pick(&registry, ValueKind::String, NativeType::Text).as_deref(), Some("wide"));
    }

    #[test]
    fn incomparable_survivors_fall_back_to_scan_order() {
        let shape = ClassRef::new("demo.Shape");
        let mid = ClassRef::with_supertypes("demo.Mid", vec![shape.clone()]);
        let circle = ClassRef::with_supertypes("demo.Circle", vec![mid.clone()]);
        let a = fixed(ValueKind::Number, NativeType::Class(shape), DEFAULT_PRIORITY, "a");
        let b = fixed(ValueKind::Any, NativeType::Class(circle.clone()), DEFAULT_PRIORITY, "b");
        let c = fixed(ValueKind::Number, NativeType::Class(mid), DEFAULT_PRIORITY, "c");

        // a is beaten by c; b and c are incomparable, so the earlier one wins
        for (order, expected) in [
            (vec![a.clone(), b.clone(), c.clone()], "b"),
            (vec![b.clone(), a.clone(), c.clone()], "b"),
            (vec![a.clone(), c.clone(), b.clone()], "c"),
            (vec![c, a, b], "c"),
        ] {
            let registry = ScanningRegistry::from_converters(order);
            assert_eq!(
                pick(&registry, ValueKind::Number, NativeType::Class(circle.clone())).as_deref(),
                Some(expected)
            );
        }
    }

    #[test]
    fn nothing_covers_the_request() {
        let registry = ScanningRegistry::from_converters(vec![fixed(
            ValueKind::Number,
            NativeType::Int,
            DEFAULT_PRIORITY,
            "int",
        )]);
        assert_eq!(pick(&registry, ValueKind::Number, NativeType::Object), None);
        assert_eq!(pick(&registry, ValueKind::Any, NativeType::Int), None);
    }

    #[test]
    fn scan_picks_up_published_providers_once() {
        register_provider(
            "scanning_tests::extra",
            Arc::new(|| vec![fixed(ValueKind::Number, NativeType::Int, 10, "boosted")]),
        );
        let both = ScanningRegistry::scan(&["fzbridge::convert", "scanning_tests", "scanning_tests::extra"]);
        assert_eq!(both.converters().len(), builtin_converters().len() + 1);
        assert_eq!(pick(&both, ValueKind::Number, NativeType::Int).as_deref(), Some("boosted"));

        let builtins_only = ScanningRegistry::scan(&["fzbridge::convert"]);
        assert_eq!(pick(&builtins_only, ValueKind::Number, NativeType::Int).as_deref(), Some("number<->int"));
    }
}
