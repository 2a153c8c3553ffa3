//! Overload resolution: from a class, a member name and the kinds of the
//! supplied values to an ordered list of bound invokers.
//!
//! Fixed-arity candidates always precede variable-arity ones. Among fixed
//! candidates a more specific signature goes first, otherwise declaration
//! order holds; among variable-arity candidates more fixed parameters go
//! first.

use std::collections::VecDeque;
use std::sync::Arc;

use fzbridge_common::ValueKind;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::catalog::TypeResolver;
use crate::convert::{Converter, FALLBACK_PRIORITY, SIMPLEST_ORDER, TypeConverterRegistry};
use crate::error::BindError;
use crate::invoker::{ArgBinding, FieldInvoker, Invoker};
use crate::member::{CallableMember, ClassDescriptor, FieldMember};
use crate::types::{ClassRef, NativeType, TypeMapping};

/// Which members a target can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberScope {
    /// Named by type: static members only.
    Static,
    /// Reached through an instance: instance and static members.
    Instance,
}

impl MemberScope {
    fn admits(self, is_static: bool) -> bool {
        match self {
            MemberScope::Static => is_static,
            MemberScope::Instance => true,
        }
    }
}

pub struct InvokerFactory<'r> {
    registry: &'r dyn TypeConverterRegistry,
    resolver: Option<&'r dyn TypeResolver>,
}

/// `a` is strictly more specific than `b`: every parameter of `b` accepts
/// the corresponding parameter of `a`, and not the other way round.
fn more_specific(a: &[NativeType], b: &[NativeType]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(pa, pb)| pb.is_assignable_from(pa))
        && !a.iter().zip(b).all(|(pa, pb)| pa.is_assignable_from(pb))
}

impl<'r> InvokerFactory<'r> {
    pub fn new(registry: &'r dyn TypeConverterRegistry) -> Self {
        Self {
            registry,
            resolver: None,
        }
    }

    /// Lets method and field lookup reach members declared on supertypes.
    pub fn with_resolver(mut self, resolver: &'r dyn TypeResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Registered supertypes of `class`, nearest first, each once.
    fn ancestors(&self, class: &ClassDescriptor) -> Vec<Arc<ClassDescriptor>> {
        let Some(resolver) = self.resolver else {
            return Vec::new();
        };
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<ClassRef> = class.class().supertypes().iter().cloned().collect();
        let mut found = Vec::new();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.name().to_string()) {
                continue;
            }
            queue.extend(next.supertypes().iter().cloned());
            match resolver.resolve(next.name()) {
                Some(descriptor) => found.push(descriptor),
                None => tracing::debug!(class = %class.name(), supertype = %next.name(), "supertype not registered"),
            }
        }
        found
    }

    /// Methods named `name` on `class` and its supertypes. A declaration
    /// hides any inherited one with the same parameter list.
    fn methods_named(&self, class: &ClassDescriptor, name: &str) -> Vec<Arc<CallableMember>> {
        let mut found: Vec<Arc<CallableMember>> = class.methods_named(name).cloned().collect();
        for ancestor in self.ancestors(class) {
            for inherited in ancestor.methods_named(name) {
                let hidden = found
                    .iter()
                    .any(|m| m.varargs == inherited.varargs && m.params == inherited.params);
                if !hidden {
                    found.push(Arc::clone(inherited));
                }
            }
        }
        found
    }

    fn field_named(&self, class: &ClassDescriptor, name: &str) -> Option<Arc<FieldMember>> {
        if let Some(field) = class.field(name) {
            return Some(Arc::clone(field));
        }
        self.ancestors(class)
            .iter()
            .find_map(|ancestor| ancestor.field(name).cloned())
    }

    fn converter(&self, kind: ValueKind, native: &NativeType) -> Option<Arc<dyn Converter>> {
        self.registry
            .find_converter(&TypeMapping::new(kind, native.clone()))
    }

    fn bind_param(&self, kind: ValueKind, ty: &NativeType) -> Option<ArgBinding> {
        if *ty == NativeType::Value && matches!(kind, ValueKind::Array | ValueKind::ObjectHandle) {
            return Some(ArgBinding::Verbatim);
        }
        self.converter(kind, ty).map(ArgBinding::Convert)
    }

    /// Converter for a declared result type: the first simplest kind with a
    /// dedicated one. Fallbacks only cover `object` generically, and an
    /// `object` result is marshalled by its runtime type instead.
    fn result_converter(&self, returns: &NativeType) -> Option<Arc<dyn Converter>> {
        if *returns == NativeType::Object {
            return None;
        }
        SIMPLEST_ORDER.iter().find_map(|kind| {
            self.converter(*kind, returns)
                .filter(|c| c.priority() > FALLBACK_PRIORITY)
        })
    }

    fn bind_prefix(&self, params: &[NativeType], kinds: &[ValueKind]) -> Option<SmallVec<[ArgBinding; 4]>> {
        params
            .iter()
            .zip(kinds)
            .map(|(ty, kind)| self.bind_param(*kind, ty))
            .collect()
    }

    fn bind_fixed(&self, member: &Arc<CallableMember>, kinds: &[ValueKind]) -> Option<Invoker> {
        let fixed = self.bind_prefix(&member.params, kinds)?;
        Some(Invoker::new(
            Arc::clone(member),
            fixed,
            None,
            self.result_converter(&member.returns),
        ))
    }

    fn bind_varargs(&self, member: &Arc<CallableMember>, kinds: &[ValueKind]) -> Option<Invoker> {
        let prefix = member.fixed_params();
        let component = member.vararg_component()?;
        let fixed = self.bind_prefix(prefix, kinds)?;
        for kind in &kinds[prefix.len()..] {
            if *kind == ValueKind::Array || self.converter(*kind, component).is_none() {
                return None;
            }
        }
        let tail = self.converter(ValueKind::Array, member.params.last()?)?;
        Some(Invoker::new(
            Arc::clone(member),
            fixed,
            Some(tail),
            self.result_converter(&member.returns),
        ))
    }

    /// Viable invokers among `members` for `kinds`, in trial order.
    pub fn resolve<'m>(
        &self,
        members: impl IntoIterator<Item = &'m Arc<CallableMember>>,
        kinds: &[ValueKind],
    ) -> Vec<Invoker> {
        let arity = kinds.len();
        let mut fixed: Vec<Invoker> = Vec::new();
        let mut varargs: Vec<Invoker> = Vec::new();

        for member in members {
            let bound = if member.varargs {
                if member.fixed_params().len() > arity {
                    continue;
                }
                self.bind_varargs(member, kinds)
            } else {
                if member.params.len() != arity {
                    continue;
                }
                self.bind_fixed(member, kinds)
            };
            let Some(invoker) = bound else {
                tracing::debug!(member = %member.signature(), ?kinds, "candidate not viable");
                continue;
            };
            if member.varargs {
                varargs.push(invoker);
            } else {
                let at = fixed
                    .iter()
                    .position(|other| more_specific(&member.params, &other.member().params))
                    .unwrap_or(fixed.len());
                fixed.insert(at, invoker);
            }
        }

        varargs.sort_by(|a, b| {
            b.member()
                .fixed_params()
                .len()
                .cmp(&a.member().fixed_params().len())
        });
        fixed.extend(varargs);
        fixed
    }

    /// Method candidates named `name` on `class` reachable from `scope`.
    pub fn resolve_methods(
        &self,
        class: &ClassDescriptor,
        name: &str,
        kinds: &[ValueKind],
        scope: MemberScope,
    ) -> Result<Vec<Invoker>, BindError> {
        let qualified = format!("{}.{name}", class.name());
        let named = self.methods_named(class, name);
        if named.is_empty() {
            return Err(BindError::not_found("member", qualified));
        }
        let in_scope: Vec<Arc<CallableMember>> =
            named.into_iter().filter(|m| scope.admits(m.is_static)).collect();
        if in_scope.is_empty() {
            return Err(BindError::not_found("static member", qualified));
        }
        if in_scope.iter().all(|m| !m.visible) {
            return Err(BindError::Access { member: qualified });
        }

        let candidates = self.resolve(in_scope.iter().filter(|m| m.visible), kinds);
        if candidates.is_empty() {
            return Err(BindError::NoMatchingOverload {
                class: class.name().to_string(),
                member: name.to_string(),
                arity: kinds.len(),
                last_failure: None,
            });
        }
        tracing::debug!(
            member = %qualified,
            candidates = candidates.len(),
            first = %candidates[0].signature(),
            "resolved method overloads"
        );
        Ok(candidates)
    }

    pub fn resolve_constructors(
        &self,
        class: &ClassDescriptor,
        kinds: &[ValueKind],
    ) -> Result<Vec<Invoker>, BindError> {
        if class.constructors().is_empty() {
            return Err(BindError::not_found("constructor", class.name()));
        }
        let candidates = self.resolve(class.constructors().iter().filter(|c| c.visible), kinds);
        if candidates.is_empty() {
            return Err(BindError::NoMatchingOverload {
                class: class.name().to_string(),
                member: "new".to_string(),
                arity: kinds.len(),
                last_failure: None,
            });
        }
        Ok(candidates)
    }

    pub fn resolve_field(
        &self,
        class: &ClassDescriptor,
        name: &str,
        scope: MemberScope,
    ) -> Result<FieldInvoker, BindError> {
        let qualified = format!("{}.{name}", class.name());
        let field = self
            .field_named(class, name)
            .ok_or_else(|| BindError::not_found("field", qualified.clone()))?;
        if !scope.admits(field.is_static) {
            return Err(BindError::not_found("static field", qualified));
        }
        if !field.visible {
            return Err(BindError::Access { member: qualified });
        }
        let result = self.result_converter(&field.ty);
        Ok(FieldInvoker::new(field, result))
    }
}
