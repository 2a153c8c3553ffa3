//! Session entry points: call, construct and read by name.
//!
//! The name-based operations never fail; every [`BindError`] comes back as
//! an error cell. The `try_` variants and [`StaticBinding`] return the error
//! itself.

use std::collections::HashSet;
use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::Duration;

use fzbridge_common::{Handle, SheetValue, ValueKind};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::catalog::TypeResolver;
use crate::config::BridgeConfig;
use crate::convert::{BigDataSource, CachingRegistry, ConvertCtx, ScanningRegistry, TypeConverterRegistry};
use crate::error::{BindError, ConversionError};
use crate::factory::{InvokerFactory, MemberScope};
use crate::gc::GcSchedule;
use crate::heap::Heap;
use crate::invoker::Invoker;
use crate::member::ClassDescriptor;
use crate::native::ObjectRef;
use crate::result::ResultMode;

type Kinds = SmallVec<[ValueKind; 8]>;

fn kinds_of(args: &[SheetValue]) -> Kinds {
    args.iter().map(SheetValue::kind).collect()
}

/// Tries `candidates` in order; the first that converts and returns wins.
/// On failure every candidate's error comes back, in trial order.
fn first_success(
    candidates: &[Invoker],
    this: Option<&ObjectRef>,
    args: &[SheetValue],
    mode: ResultMode,
    ctx: &ConvertCtx<'_>,
) -> Result<SheetValue, Vec<BindError>> {
    let mut failures = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match candidate.invoke(this, args, mode, ctx) {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(candidate = %candidate.signature(), error = %err, "candidate failed");
                failures.push(err);
            }
        }
    }
    Err(failures)
}

struct Target {
    class: Arc<ClassDescriptor>,
    this: Option<ObjectRef>,
    scope: MemberScope,
}

pub struct Bridge {
    config: BridgeConfig,
    resolver: Arc<dyn TypeResolver>,
    registry: Arc<dyn TypeConverterRegistry>,
    heap: Heap,
    big_data: Option<Arc<dyn BigDataSource>>,
    schedule: Mutex<GcSchedule>,
}

impl Bridge {
    pub fn new(resolver: Arc<dyn TypeResolver>) -> Self {
        Self::with_config(resolver, BridgeConfig::default())
    }

    pub fn with_config(resolver: Arc<dyn TypeResolver>, config: BridgeConfig) -> Self {
        let scanned = ScanningRegistry::scan(config.converter_locations.as_slice());
        let registry: Arc<dyn TypeConverterRegistry> = if config.cache_converters {
            Arc::new(CachingRegistry::new(scanned))
        } else {
            Arc::new(scanned)
        };
        Self {
            schedule: Mutex::new(GcSchedule::new(config.gc.clone())),
            config,
            resolver,
            registry,
            heap: Heap::new(),
            big_data: None,
        }
    }

    /// Replaces the scanned registry.
    pub fn with_registry(mut self, registry: Arc<dyn TypeConverterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_big_data(mut self, source: Arc<dyn BigDataSource>) -> Self {
        self.big_data = Some(source);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn registry(&self) -> &dyn TypeConverterRegistry {
        self.registry.as_ref()
    }

    pub fn convert_ctx(&self) -> ConvertCtx<'_> {
        ConvertCtx {
            registry: self.registry.as_ref(),
            heap: &self.heap,
            big_data: self.big_data.as_deref(),
        }
    }

    fn factory(&self) -> InvokerFactory<'_> {
        InvokerFactory::new(self.registry.as_ref()).with_resolver(self.resolver.as_ref())
    }

    fn class(&self, name: &str) -> Result<Arc<ClassDescriptor>, BindError> {
        self.resolver
            .resolve(name)
            .ok_or_else(|| BindError::not_found("type", name.trim()))
    }

    fn target(&self, target: &SheetValue) -> Result<Target, BindError> {
        match target {
            SheetValue::String(name) => Ok(Target {
                class: self.class(name)?,
                this: None,
                scope: MemberScope::Static,
            }),
            SheetValue::ObjectHandle(handle) => {
                let object = self
                    .heap
                    .get_object(handle.handle)
                    .ok_or(ConversionError::StaleHandle(handle.handle))?;
                Ok(Target {
                    class: self.class(object.class().name())?,
                    this: Some(object),
                    scope: MemberScope::Instance,
                })
            }
            other => Err(ConversionError::Invalid(format!(
                "call target must be a type name or an object handle, found {}",
                other.kind()
            ))
            .into()),
        }
    }

    fn run(
        &self,
        candidates: &[Invoker],
        this: Option<&ObjectRef>,
        args: &[SheetValue],
        mode: ResultMode,
        class: &str,
        member: &str,
    ) -> Result<SheetValue, BindError> {
        first_success(candidates, this, args, mode, &self.convert_ctx()).map_err(|mut failures| {
            BindError::NoMatchingOverload {
                class: class.to_string(),
                member: member.to_string(),
                arity: args.len(),
                last_failure: failures.pop().map(Box::new),
            }
        })
    }

    pub fn try_invoke(
        &self,
        target: &SheetValue,
        member: &str,
        args: &[SheetValue],
        mode: ResultMode,
    ) -> Result<SheetValue, BindError> {
        let _span = tracing::info_span!("invoke", member, arity = args.len()).entered();
        let Target { class, this, scope } = self.target(target)?;
        let candidates = self
            .factory()
            .resolve_methods(&class, member, &kinds_of(args), scope)?;
        self.run(&candidates, this.as_ref(), args, mode, class.name(), member)
    }

    /// Calls `member` on a type name (static members) or an object handle
    /// (instance and static members).
    pub fn invoke(&self, target: &SheetValue, member: &str, args: &[SheetValue], mode: ResultMode) -> SheetValue {
        self.try_invoke(target, member, args, mode)
            .unwrap_or_else(|err| err.to_sheet_value())
    }

    pub fn try_new_instance(
        &self,
        type_name: &str,
        args: &[SheetValue],
        mode: ResultMode,
    ) -> Result<SheetValue, BindError> {
        let _span = tracing::info_span!("new_instance", type_name, arity = args.len()).entered();
        let class = self.class(type_name)?;
        let candidates = self.factory().resolve_constructors(&class, &kinds_of(args))?;
        self.run(&candidates, None, args, mode, class.name(), "new")
    }

    pub fn new_instance(&self, type_name: &str, args: &[SheetValue], mode: ResultMode) -> SheetValue {
        self.try_new_instance(type_name, args, mode)
            .unwrap_or_else(|err| err.to_sheet_value())
    }

    pub fn try_get(&self, target: &SheetValue, field: &str, mode: ResultMode) -> Result<SheetValue, BindError> {
        let _span = tracing::info_span!("get", field).entered();
        let Target { class, this, scope } = self.target(target)?;
        let invoker = self.factory().resolve_field(&class, field, scope)?;
        invoker.get(this.as_ref(), mode, &self.convert_ctx())
    }

    pub fn get(&self, target: &SheetValue, field: &str, mode: ResultMode) -> SheetValue {
        self.try_get(target, field, mode)
            .unwrap_or_else(|err| err.to_sheet_value())
    }

    /// Drops every heap handle absent from `active` and adapts the
    /// collection interval to the result.
    pub fn cycle_gc<S: BuildHasher>(&self, active: &HashSet<Handle, S>) -> usize {
        let collected = self.heap.cycle_gc(active);
        let next = self.schedule.lock().record(collected);
        tracing::info!(collected, live = self.heap.len(), next_ms = next.as_millis() as u64, "gc cycle");
        collected
    }

    /// How long to wait before the next [`Bridge::cycle_gc`].
    pub fn next_gc_interval(&self) -> Duration {
        self.schedule.lock().interval()
    }

    /// Resolves a static method once for a fixed argument shape.
    pub fn bind_static(
        &self,
        type_name: &str,
        member: &str,
        kinds: &[ValueKind],
        mode: ResultMode,
    ) -> Result<StaticBinding, BindError> {
        let class = self.class(type_name)?;
        let invokers = self
            .factory()
            .resolve_methods(&class, member, kinds, MemberScope::Static)?;
        Ok(StaticBinding {
            class: class.name().to_string(),
            member: member.to_string(),
            kinds: kinds.iter().copied().collect(),
            mode,
            invokers,
        })
    }

    pub fn bind_constructor(
        &self,
        type_name: &str,
        kinds: &[ValueKind],
        mode: ResultMode,
    ) -> Result<StaticBinding, BindError> {
        let class = self.class(type_name)?;
        let invokers = self.factory().resolve_constructors(&class, kinds)?;
        Ok(StaticBinding {
            class: class.name().to_string(),
            member: "new".to_string(),
            kinds: kinds.iter().copied().collect(),
            mode,
            invokers,
        })
    }
}

/// A member resolved ahead of time for one argument shape.
#[derive(Debug, Clone)]
pub struct StaticBinding {
    class: String,
    member: String,
    kinds: Kinds,
    mode: ResultMode,
    invokers: Vec<Invoker>,
}

impl StaticBinding {
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn kinds(&self) -> &[ValueKind] {
        &self.kinds
    }

    pub fn invokers(&self) -> &[Invoker] {
        &self.invokers
    }

    /// Runs the binding. When every candidate fails, the first failure
    /// raised by target code is returned unwrapped with its cause; without
    /// one, the failure of the last candidate tried.
    pub fn call(&self, bridge: &Bridge, args: &[SheetValue]) -> Result<SheetValue, BindError> {
        if args.len() != self.kinds.len() {
            return Err(BindError::NoMatchingOverload {
                class: self.class.clone(),
                member: self.member.clone(),
                arity: args.len(),
                last_failure: None,
            });
        }
        first_success(&self.invokers, None, args, self.mode, &bridge.convert_ctx()).map_err(|mut failures| {
            let raised = failures
                .iter()
                .position(|err| matches!(err, BindError::TargetInvocation { .. }));
            let chosen = match raised {
                Some(at) => Some(failures.swap_remove(at)),
                None => failures.pop(),
            };
            chosen.unwrap_or_else(|| BindError::NoMatchingOverload {
                class: self.class.clone(),
                member: self.member.clone(),
                arity: args.len(),
                last_failure: None,
            })
        })
    }
}
