use std::sync::Arc;

use fzbridge_common::{SheetValue, ValueKind, XlErrorKind};
use fzbridge_reflect::{
    BindError, Bridge, BridgeConfig, ClassBuilder, ClassCatalog, ClassRef, ConvertCtx, ConversionError,
    Converter, InvokerFactory, MemberScope, NativeType, NativeValue, ResultMode, TargetError,
    TypeMapping, TypeResolver, arg, register_provider,
};

fn tagged(tag: &'static str) -> impl Fn(&[NativeValue]) -> Result<String, TargetError> + Send + Sync + 'static {
    move |_| Ok(tag.to_string())
}

fn catalog() -> Arc<ClassCatalog> {
    let catalog = ClassCatalog::new();
    catalog.register(
        ClassBuilder::new(ClassRef::new("demo.Foo"))
            .static_method("foo", [NativeType::Int], tagged("one"))
            .static_method("foo", [NativeType::Int, NativeType::Int], tagged("two"))
            .static_method_varargs("foo", [], NativeType::Int, tagged("many"))
            .static_method("echo", [NativeType::Int], |args| arg::<i32>(args, 0))
            .static_method("parse", [NativeType::Text], |args| {
                let text: String = arg(args, 0)?;
                text.trim()
                    .parse::<i32>()
                    .map_err(|_| TargetError::raised(format!("'{text}' is not a whole number")))
            })
            .build(),
    );
    catalog.register(
        ClassBuilder::new(ClassRef::new("demo.Ranked"))
            .static_method_varargs("r", [], NativeType::Object, tagged("object..."))
            .static_method("r", [NativeType::Object], tagged("object"))
            .static_method("r", [NativeType::Int], tagged("int"))
            .static_method("r", [NativeType::Double], tagged("double"))
            .build(),
    );
    Arc::new(catalog)
}

fn numbers(n: usize) -> Vec<SheetValue> {
    (1..=n).map(|i| SheetValue::Number(i as f64)).collect()
}

#[test]
fn arity_selects_fixed_before_varargs() {
    let bridge = Bridge::new(catalog());
    let foo = SheetValue::from("demo.Foo");
    let call = |n: usize| bridge.invoke(&foo, "foo", &numbers(n), ResultMode::Simplest);

    assert_eq!(call(1), SheetValue::from("one"));
    assert_eq!(call(2), SheetValue::from("two"));
    assert_eq!(call(0), SheetValue::from("many"));
    assert_eq!(call(3), SheetValue::from("many"));
    assert_eq!(call(7), SheetValue::from("many"));
}

#[test]
fn fixed_matches_precede_the_vararg_match() {
    let catalog = catalog();
    let bridge = Bridge::new(catalog.clone());
    let ranked = catalog.resolve("demo.Ranked").unwrap();
    let factory = InvokerFactory::new(bridge.registry());

    let order: Vec<String> = factory
        .resolve_methods(&ranked, "r", &[ValueKind::Number], MemberScope::Static)
        .unwrap()
        .iter()
        .map(|i| i.signature())
        .collect();
    assert_eq!(
        order,
        vec!["demo.Ranked.r(int)", "demo.Ranked.r(double)", "demo.Ranked.r(object)", "demo.Ranked.r(object...)"]
    );

    // the most specific candidate is the one that runs
    let out = bridge.invoke(&"demo.Ranked".into(), "r", &[SheetValue::Number(2.0)], ResultMode::Simplest);
    assert_eq!(out, SheetValue::from("int"));
    // text only reaches the object overloads
    let out = bridge.invoke(&"demo.Ranked".into(), "r", &["x".into()], ResultMode::Simplest);
    assert_eq!(out, SheetValue::from("object"));
}

#[test]
fn failed_candidates_fall_through_to_the_next() {
    let bridge = Bridge::new(catalog());
    // 1e12 has an int converter but overflows it; the double overload takes over
    let out = bridge.invoke(&"demo.Ranked".into(), "r", &[SheetValue::Number(1e12)], ResultMode::Simplest);
    assert_eq!(out, SheetValue::from("double"));
}

struct Answer {
    mapping: TypeMapping,
}

impl Converter for Answer {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn priority(&self) -> i32 {
        10
    }

    fn name(&self) -> &str {
        "answer"
    }

    fn to_native(&self, _: &SheetValue, _: &NativeType, _: &ConvertCtx<'_>) -> Result<NativeValue, ConversionError> {
        Ok(NativeValue::Int(42))
    }

    fn to_external(&self, value: &NativeValue, _: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Int(i) => Ok(SheetValue::Number(f64::from(*i) * 10.0)),
            _ => Err(ConversionError::NotExternalizable(ValueKind::Number)),
        }
    }
}

#[test]
fn higher_priority_converter_wins() {
    register_provider(
        "dispatch_tests::answer",
        Arc::new(|| -> Vec<Arc<dyn Converter>> {
            vec![Arc::new(Answer {
                mapping: TypeMapping::new(ValueKind::Number, NativeType::Int),
            })]
        }),
    );
    let plain = Bridge::new(catalog());
    let boosted = Bridge::with_config(catalog(), BridgeConfig::default().with_converter_location("dispatch_tests"));
    let foo = SheetValue::from("demo.Foo");

    assert_eq!(plain.invoke(&foo, "echo", &[SheetValue::Number(5.0)], ResultMode::Simplest), SheetValue::Number(5.0));
    // 5 goes in as 42 and comes back out through the same converter
    assert_eq!(
        boosted.invoke(&foo, "echo", &[SheetValue::Number(5.0)], ResultMode::Simplest),
        SheetValue::Number(420.0)
    );
}

#[test]
fn static_bindings_report_errors_with_their_cause() {
    let bridge = Bridge::new(catalog());

    let parse = bridge
        .bind_static("demo.Foo", "parse", &[ValueKind::String], ResultMode::Simplest)
        .unwrap();
    assert_eq!(parse.call(&bridge, &[" 12 ".into()]).unwrap(), SheetValue::Number(12.0));

    let err = parse.call(&bridge, &["twelve".into()]).unwrap_err();
    match &err {
        BindError::TargetInvocation { member, source } => {
            assert_eq!(member, "demo.Foo.parse(text)");
            assert_eq!(source, &TargetError::Raised("'twelve' is not a whole number".into()));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(std::error::Error::source(&err).is_some());

    assert!(matches!(
        parse.call(&bridge, &[]),
        Err(BindError::NoMatchingOverload { arity: 0, .. })
    ));
    assert!(matches!(parse.call(&bridge, &[SheetValue::Number(1.0)]), Err(BindError::Conversion(_))));

    assert!(matches!(
        bridge.bind_static("demo.Foo", "parse", &[ValueKind::Error], ResultMode::Simplest),
        Err(BindError::NoMatchingOverload { .. })
    ));
    assert!(matches!(
        bridge.bind_static("demo.Nope", "parse", &[], ResultMode::Simplest),
        Err(BindError::NotFound { what: "type", .. })
    ));
}

#[test]
fn name_based_calls_fold_errors_into_cells() {
    let bridge = Bridge::new(catalog());
    let kind_of = |value: SheetValue| match value {
        SheetValue::Error(e) => e.kind,
        other => panic!("expected an error cell, got {other:?}"),
    };

    assert_eq!(kind_of(bridge.invoke(&"demo.Nope".into(), "foo", &[], ResultMode::Simplest)), XlErrorKind::Name);
    assert_eq!(kind_of(bridge.invoke(&"demo.Foo".into(), "bar", &[], ResultMode::Simplest)), XlErrorKind::Name);
    assert_eq!(
        kind_of(bridge.invoke(&"demo.Foo".into(), "echo", &[SheetValue::Nil], ResultMode::Simplest)),
        XlErrorKind::Value
    );
    assert_eq!(
        kind_of(bridge.invoke(&SheetValue::Number(1.0), "foo", &[], ResultMode::Simplest)),
        XlErrorKind::Value
    );
}

struct Figure {
    width: f64,
    height: f64,
}

#[test]
fn subclass_handles_reach_inherited_members() {
    let shape = ClassRef::new("demo.Shape");
    let circle = ClassRef::with_supertypes("demo.Circle", vec![shape.clone()]);
    let catalog = ClassCatalog::new();
    catalog.register(
        ClassBuilder::new(shape)
            .method("area", [], |f: &Figure, _| Ok::<_, TargetError>(f.width * f.height))
            .method("describe", [], |_: &Figure, _| Ok::<_, TargetError>("shape".to_string()))
            .field("width", |f: &Figure| f.width)
            .build(),
    );
    catalog.register(
        ClassBuilder::new(circle)
            .constructor([NativeType::Double], |args| {
                let d: f64 = arg(args, 0)?;
                Ok(Figure { width: d, height: d })
            })
            .method("describe", [], |_: &Figure, _| Ok::<_, TargetError>("circle".to_string()))
            .build(),
    );
    let bridge = Bridge::new(Arc::new(catalog));

    let made = bridge.new_instance("demo.Circle", &[SheetValue::Number(3.0)], ResultMode::Object);
    assert!(made.as_handle().is_some(), "expected a handle, got {made:?}");
    assert_eq!(bridge.invoke(&made, "area", &[], ResultMode::Simplest), SheetValue::Number(9.0));
    assert_eq!(bridge.get(&made, "width", ResultMode::Simplest), SheetValue::Number(3.0));
    // the subclass declaration hides the inherited one
    assert_eq!(bridge.invoke(&made, "describe", &[], ResultMode::Simplest), SheetValue::from("circle"));
}

#[test]
fn static_bindings_prefer_the_target_failure() {
    let catalog = ClassCatalog::new();
    catalog.register(
        ClassBuilder::new(ClassRef::new("demo.Picky"))
            .static_method("pick", [NativeType::Double], |args| {
                let n: f64 = arg(args, 0)?;
                Err::<f64, _>(TargetError::raised(format!("{n} rejected")))
            })
            .static_method("pick", [NativeType::Int], |args| arg::<i32>(args, 0))
            .build(),
    );
    let bridge = Bridge::new(Arc::new(catalog));
    let pick = bridge
        .bind_static("demo.Picky", "pick", &[ValueKind::Number], ResultMode::Simplest)
        .unwrap();
    let order: Vec<String> = pick.invokers().iter().map(|i| i.signature()).collect();
    assert_eq!(order, vec!["demo.Picky.pick(double)", "demo.Picky.pick(int)"]);

    // double raises, then int overflows on conversion
    match pick.call(&bridge, &[SheetValue::Number(1e12)]) {
        Err(BindError::TargetInvocation { member, source }) => {
            assert_eq!(member, "demo.Picky.pick(double)");
            assert_eq!(source, TargetError::Raised("1000000000000 rejected".into()));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(pick.call(&bridge, &[SheetValue::Number(2.0)]).unwrap(), SheetValue::Number(2.0));
}
