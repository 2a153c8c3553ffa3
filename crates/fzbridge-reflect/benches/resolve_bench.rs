use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fzbridge_common::{SheetValue, ValueKind};
use fzbridge_reflect::{
    Bridge, BridgeConfig, ClassBuilder, ClassCatalog, ClassRef, InvokerFactory, MemberScope, NativeType,
    ResultMode, TargetError, TypeResolver, arg,
};

fn catalog() -> Arc<ClassCatalog> {
    let catalog = ClassCatalog::new();
    catalog.register(
        ClassBuilder::new(ClassRef::new("bench.Math"))
            .static_method("sum", [NativeType::Int], |args| arg::<i32>(args, 0))
            .static_method("sum", [NativeType::Double, NativeType::Double], |args| {
                Ok::<_, TargetError>(arg::<f64>(args, 0)? + arg::<f64>(args, 1)?)
            })
            .static_method("sum", [NativeType::Object], |_| Ok::<_, TargetError>(0))
            .static_method_varargs("sum", [], NativeType::Double, |args| {
                Ok::<_, TargetError>(arg::<Vec<f64>>(args, 0)?.iter().sum::<f64>())
            })
            .build(),
    );
    Arc::new(catalog)
}

fn bridge(cache: bool) -> Bridge {
    let config = BridgeConfig {
        cache_converters: cache,
        ..BridgeConfig::default()
    };
    Bridge::with_config(catalog(), config)
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resolve");
    let catalog = catalog();
    let math = catalog.resolve("bench.Math").unwrap();

    for cache in [false, true] {
        let bridge = bridge(cache);
        let label = if cache { "cached" } else { "scanning" };
        for arity in [1usize, 2, 8] {
            let kinds = vec![ValueKind::Number; arity];
            group.bench_with_input(BenchmarkId::new(label, arity), &kinds, |b, kinds| {
                let factory = InvokerFactory::new(bridge.registry());
                b.iter(|| factory.resolve_methods(&math, "sum", black_box(kinds), MemberScope::Static))
            });
        }
    }

    group.finish();
}

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("Invoke");
    let target = SheetValue::from("bench.Math");

    for cache in [false, true] {
        let bridge = bridge(cache);
        let label = if cache { "cached" } else { "scanning" };
        for arity in [1usize, 2, 8] {
            let args: Vec<SheetValue> = (0..arity).map(|i| SheetValue::Number(i as f64)).collect();
            group.bench_with_input(BenchmarkId::new(label, arity), &args, |b, args| {
                b.iter(|| bridge.invoke(&target, "sum", black_box(args), ResultMode::Simplest))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_resolution, bench_invoke);
criterion_main!(benches);
