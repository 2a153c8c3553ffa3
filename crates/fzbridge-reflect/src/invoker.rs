//! Bound invokers: a member plus the converters chosen for one call shape.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use fzbridge_common::{ArrayValue, SheetValue};
use smallvec::SmallVec;

use crate::convert::{ConvertCtx, Converter};
use crate::error::{BindError, ConversionError, TargetError};
use crate::member::{CallableMember, FieldMember};
use crate::native::{NativeValue, ObjectRef};
use crate::result::{ResultMode, marshal};

/// How one supplied argument reaches its parameter.
#[derive(Clone, Debug)]
pub enum ArgBinding {
    Convert(Arc<dyn Converter>),
    /// Handed over as the sheet value itself.
    Verbatim,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs a thunk, folding both its error and a panic into
/// [`BindError::TargetInvocation`].
fn guarded<F>(member: impl FnOnce() -> String, call: F) -> Result<NativeValue, BindError>
where
    F: FnOnce() -> Result<NativeValue, TargetError>,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(call));
    let source = match outcome {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => err,
        Err(payload) => TargetError::Panicked(panic_message(payload.as_ref())),
    };
    Err(BindError::TargetInvocation {
        member: member(),
        source,
    })
}

/// A constructor or method bound to the argument kinds it was resolved for.
/// Reusable for any call with the same kinds.
#[derive(Clone, Debug)]
pub struct Invoker {
    member: Arc<CallableMember>,
    fixed: SmallVec<[ArgBinding; 4]>,
    tail: Option<Arc<dyn Converter>>,
    result: Option<Arc<dyn Converter>>,
}

impl Invoker {
    pub(crate) fn new(
        member: Arc<CallableMember>,
        fixed: SmallVec<[ArgBinding; 4]>,
        tail: Option<Arc<dyn Converter>>,
        result: Option<Arc<dyn Converter>>,
    ) -> Self {
        Self {
            member,
            fixed,
            tail,
            result,
        }
    }

    pub fn member(&self) -> &Arc<CallableMember> {
        &self.member
    }

    pub fn bindings(&self) -> &[ArgBinding] {
        &self.fixed
    }

    pub fn is_varargs(&self) -> bool {
        self.member.varargs
    }

    /// Converter bound to the declared return type, if any.
    pub fn result(&self) -> Option<&Arc<dyn Converter>> {
        self.result.as_ref()
    }

    pub fn signature(&self) -> String {
        self.member.signature()
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        match self.tail {
            Some(_) => arity >= self.fixed.len(),
            None => arity == self.fixed.len(),
        }
    }

    fn convert_args(&self, args: &[SheetValue], ctx: &ConvertCtx<'_>) -> Result<Vec<NativeValue>, BindError> {
        if !self.accepts_arity(args.len()) {
            return Err(BindError::NoMatchingOverload {
                class: self.member.declaring.name().to_string(),
                member: self.member.name.clone().unwrap_or_else(|| "new".to_string()),
                arity: args.len(),
                last_failure: None,
            });
        }
        let params = &self.member.params;
        let fixed = self.fixed.len();
        let mut native = Vec::with_capacity(fixed + usize::from(self.tail.is_some()));

        for ((binding, value), target) in self.fixed.iter().zip(args).zip(params.iter()) {
            native.push(match binding {
                ArgBinding::Verbatim => NativeValue::Value(value.clone()),
                ArgBinding::Convert(converter) => converter.to_native(value, target, ctx)?,
            });
        }

        if let (Some(converter), Some(array_type)) = (&self.tail, params.last()) {
            let rest = args.get(fixed..).unwrap_or_default().to_vec();
            let packed = ArrayValue::row(rest)
                .map_err(|err| ConversionError::Invalid(err.to_string()))?;
            native.push(converter.to_native(&SheetValue::Array(packed), array_type, ctx)?);
        }
        Ok(native)
    }

    /// Converts `args`, calls the member and returns its raw result.
    pub fn invoke_native(
        &self,
        this: Option<&ObjectRef>,
        args: &[SheetValue],
        ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, BindError> {
        let native = self.convert_args(args, ctx)?;
        guarded(|| self.signature(), || self.member.call(this, &native))
    }

    pub fn invoke(
        &self,
        this: Option<&ObjectRef>,
        args: &[SheetValue],
        mode: ResultMode,
        ctx: &ConvertCtx<'_>,
    ) -> Result<SheetValue, BindError> {
        let value = self.invoke_native(this, args, ctx)?;
        Ok(marshal(value, mode, self.result.as_deref(), ctx))
    }
}

/// Reads one field.
#[derive(Clone, Debug)]
pub struct FieldInvoker {
    field: Arc<FieldMember>,
    result: Option<Arc<dyn Converter>>,
}

impl FieldInvoker {
    pub(crate) fn new(field: Arc<FieldMember>, result: Option<Arc<dyn Converter>>) -> Self {
        Self { field, result }
    }

    pub fn field(&self) -> &Arc<FieldMember> {
        &self.field
    }

    pub fn get(&self, this: Option<&ObjectRef>, mode: ResultMode, ctx: &ConvertCtx<'_>) -> Result<SheetValue, BindError> {
        let value = guarded(|| self.field.qualified_name(), || self.field.read(this))?;
        Ok(marshal(value, mode, self.result.as_deref(), ctx))
    }
}
