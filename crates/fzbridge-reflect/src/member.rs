//! Member descriptors and the builder used to register a class.
//!
//! This is the registration table that stands in for runtime reflection:
//! every constructor, method and field a sheet may reach is declared here
//! once, with its parameter types and a thunk that performs the call.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::TargetError;
use crate::native::{IntoNative, NativeValue, ObjectRef};
use crate::types::{ClassRef, NativeType};

/// Call target: optional receiver plus converted arguments. For variable
/// arity members the tail arrives as one trailing `NativeValue::Array`.
pub type Thunk =
    Arc<dyn Fn(Option<&ObjectRef>, &[NativeValue]) -> Result<NativeValue, TargetError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Constructor,
    Method,
}

pub struct CallableMember {
    pub kind: MemberKind,
    pub declaring: ClassRef,
    /// `None` for constructors.
    pub name: Option<String>,
    /// Declared parameter types; for variable arity members the last entry
    /// is the array type of the tail.
    pub params: SmallVec<[NativeType; 4]>,
    pub varargs: bool,
    pub is_static: bool,
    pub visible: bool,
    pub returns: NativeType,
    thunk: Thunk,
}

impl CallableMember {
    pub fn fixed_params(&self) -> &[NativeType] {
        if self.varargs {
            &self.params[..self.params.len() - 1]
        } else {
            &self.params
        }
    }

    pub fn vararg_component(&self) -> Option<&NativeType> {
        if self.varargs {
            self.params.last().and_then(NativeType::component)
        } else {
            None
        }
    }

    /// `demo.Counter.get(int)`, `demo.Counter(int...)`.
    pub fn signature(&self) -> String {
        let mut out = String::from(self.declaring.name());
        if let Some(name) = &self.name {
            out.push('.');
            out.push_str(name);
        }
        out.push('(');
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match (self.varargs && i + 1 == self.params.len(), p.component()) {
                (true, Some(component)) => out.push_str(&format!("{component}...")),
                _ => out.push_str(&p.to_string()),
            }
        }
        out.push(')');
        out
    }

    pub(crate) fn call(
        &self,
        this: Option<&ObjectRef>,
        args: &[NativeValue],
    ) -> Result<NativeValue, TargetError> {
        (self.thunk)(this, args)
    }
}

impl fmt::Debug for CallableMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableMember")
            .field("signature", &self.signature())
            .field("static", &self.is_static)
            .field("visible", &self.visible)
            .finish()
    }
}

pub struct FieldMember {
    pub declaring: ClassRef,
    pub name: String,
    pub ty: NativeType,
    pub is_static: bool,
    pub visible: bool,
    getter: Thunk,
}

impl FieldMember {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring.name(), self.name)
    }

    pub(crate) fn read(&self, this: Option<&ObjectRef>) -> Result<NativeValue, TargetError> {
        (self.getter)(this, &[])
    }
}

impl fmt::Debug for FieldMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMember")
            .field("name", &self.qualified_name())
            .field("ty", &self.ty)
            .finish()
    }
}

#[derive(Debug)]
pub struct ClassDescriptor {
    class: ClassRef,
    constructors: Vec<Arc<CallableMember>>,
    methods: Vec<Arc<CallableMember>>,
    fields: Vec<Arc<FieldMember>>,
}

impl ClassDescriptor {
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn name(&self) -> &str {
        self.class.name()
    }

    pub fn constructors(&self) -> &[Arc<CallableMember>] {
        &self.constructors
    }

    pub fn methods(&self) -> &[Arc<CallableMember>] {
        &self.methods
    }

    pub fn methods_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<CallableMember>> + 'a {
        self.methods
            .iter()
            .filter(move |m| m.name.as_deref() == Some(name))
    }

    pub fn fields(&self) -> &[Arc<FieldMember>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Arc<FieldMember>> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn receiver<'a, T: Any>(this: Option<&'a ObjectRef>) -> Result<&'a T, TargetError> {
    this.ok_or(TargetError::MissingReceiver)?
        .downcast_ref::<T>()
        .ok_or(TargetError::Receiver {
            expected: std::any::type_name::<T>(),
        })
}

/// Declares a class and its members.
///
/// ```
/// use fzbridge_reflect::{ClassBuilder, ClassRef, NativeType, TargetError, arg};
///
/// struct Counter(i32);
///
/// let class = ClassBuilder::new(ClassRef::new("demo.Counter"))
///     .constructor([NativeType::Int], |args| Ok(Counter(arg::<i32>(args, 0)?)))
///     .method("get", [], |c: &Counter, _args| Ok::<_, TargetError>(c.0))
///     .build();
/// assert_eq!(class.methods().len(), 1);
/// ```
pub struct ClassBuilder {
    class: ClassRef,
    constructors: Vec<CallableMember>,
    methods: Vec<CallableMember>,
    fields: Vec<FieldMember>,
}

impl ClassBuilder {
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    fn push_constructor<T, F>(mut self, params: SmallVec<[NativeType; 4]>, varargs: bool, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[NativeValue]) -> Result<T, TargetError> + Send + Sync + 'static,
    {
        let class = self.class.clone();
        let made_for = class.clone();
        self.constructors.push(CallableMember {
            kind: MemberKind::Constructor,
            declaring: class.clone(),
            name: None,
            params,
            varargs,
            is_static: true,
            visible: true,
            returns: NativeType::Class(class),
            thunk: Arc::new(
                move |_: Option<&ObjectRef>, args: &[NativeValue]| -> Result<NativeValue, TargetError> {
                    f(args).map(|v| NativeValue::Object(ObjectRef::new(made_for.clone(), v)))
                },
            ),
        });
        self
    }

    pub fn constructor<T, F>(self, params: impl IntoIterator<Item = NativeType>, f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[NativeValue]) -> Result<T, TargetError> + Send + Sync + 'static,
    {
        self.push_constructor(params.into_iter().collect(), false, f)
    }

    /// Constructor whose trailing arguments are gathered into an array of
    /// `component`.
    pub fn constructor_varargs<T, F>(
        self,
        fixed: impl IntoIterator<Item = NativeType>,
        component: NativeType,
        f: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[NativeValue]) -> Result<T, TargetError> + Send + Sync + 'static,
    {
        let mut params: SmallVec<[NativeType; 4]> = fixed.into_iter().collect();
        params.push(NativeType::array_of(component));
        self.push_constructor(params, true, f)
    }

    fn push_method(
        mut self,
        name: &str,
        params: SmallVec<[NativeType; 4]>,
        varargs: bool,
        is_static: bool,
        returns: NativeType,
        thunk: Thunk,
    ) -> Self {
        self.methods.push(CallableMember {
            kind: MemberKind::Method,
            declaring: self.class.clone(),
            name: Some(name.to_string()),
            params,
            varargs,
            is_static,
            visible: true,
            returns,
            thunk,
        });
        self
    }

    fn instance_thunk<T, R, F>(f: F) -> Thunk
    where
        T: Any,
        R: IntoNative + 'static,
        F: Fn(&T, &[NativeValue]) -> Result<R, TargetError> + Send + Sync + 'static,
    {
        Arc::new(
            move |this: Option<&ObjectRef>, args: &[NativeValue]| -> Result<NativeValue, TargetError> {
                f(receiver::<T>(this)?, args).map(R::into_native)
            },
        )
    }

    fn static_thunk<R, F>(f: F) -> Thunk
    where
        R: IntoNative + 'static,
        F: Fn(&[NativeValue]) -> Result<R, TargetError> + Send + Sync + 'static,
    {
        Arc::new(
            move |_: Option<&ObjectRef>, args: &[NativeValue]| -> Result<NativeValue, TargetError> {
                f(args).map(R::into_native)
            },
        )
    }

    /// Instance method on receivers of Rust type `T`.
    pub fn method<T, R, F>(self, name: &str, params: impl IntoIterator<Item = NativeType>, f: F) -> Self
    where
        T: Any,
        R: IntoNative + 'static,
        F: Fn(&T, &[NativeValue]) -> Result<R, TargetError> + Send + Sync + 'static,
    {
        let thunk = Self::instance_thunk(f);
        self.push_method(name, params.into_iter().collect(), false, false, R::native_type(), thunk)
    }

    pub fn method_varargs<T, R, F>(
        self,
        name: &str,
        fixed: impl IntoIterator<Item = NativeType>,
        component: NativeType,
        f: F,
    ) -> Self
    where
        T: Any,
        R: IntoNative + 'static,
        F: Fn(&T, &[NativeValue]) -> Result<R, TargetError> + Send + Sync + 'static,
    {
        let mut params: SmallVec<[NativeType; 4]> = fixed.into_iter().collect();
        params.push(NativeType::array_of(component));
        let thunk = Self::instance_thunk(f);
        self.push_method(name, params, true, false, R::native_type(), thunk)
    }

    pub fn static_method<R, F>(self, name: &str, params: impl IntoIterator<Item = NativeType>, f: F) -> Self
    where
        R: IntoNative + 'static,
        F: Fn(&[NativeValue]) -> Result<R, TargetError> + Send + Sync + 'static,
    {
        let thunk = Self::static_thunk(f);
        self.push_method(name, params.into_iter().collect(), false, true, R::native_type(), thunk)
    }

    pub fn static_method_varargs<R, F>(
        self,
        name: &str,
        fixed: impl IntoIterator<Item = NativeType>,
        component: NativeType,
        f: F,
    ) -> Self
    where
        R: IntoNative + 'static,
        F: Fn(&[NativeValue]) -> Result<R, TargetError> + Send + Sync + 'static,
    {
        let mut params: SmallVec<[NativeType; 4]> = fixed.into_iter().collect();
        params.push(NativeType::array_of(component));
        let thunk = Self::static_thunk(f);
        self.push_method(name, params, true, true, R::native_type(), thunk)
    }

    pub fn field<T, R, F>(mut self, name: &str, f: F) -> Self
    where
        T: Any,
        R: IntoNative + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.fields.push(FieldMember {
            declaring: self.class.clone(),
            name: name.to_string(),
            ty: R::native_type(),
            is_static: false,
            visible: true,
            getter: Arc::new(
                move |this: Option<&ObjectRef>, _: &[NativeValue]| -> Result<NativeValue, TargetError> {
                    Ok(f(receiver::<T>(this)?).into_native())
                },
            ),
        });
        self
    }

    pub fn static_field<R>(mut self, name: &str, value: R) -> Self
    where
        R: IntoNative + Clone + Send + Sync + 'static,
    {
        self.fields.push(FieldMember {
            declaring: self.class.clone(),
            name: name.to_string(),
            ty: R::native_type(),
            is_static: true,
            visible: true,
            getter: Arc::new(
                move |_: Option<&ObjectRef>, _: &[NativeValue]| -> Result<NativeValue, TargetError> {
                    Ok(value.clone().into_native())
                },
            ),
        });
        self
    }

    /// Marks every member called `name` as not accessible from the sheet.
    pub fn hide(mut self, name: &str) -> Self {
        for m in self.methods.iter_mut().filter(|m| m.name.as_deref() == Some(name)) {
            m.visible = false;
        }
        for f in self.fields.iter_mut().filter(|f| f.name == name) {
            f.visible = false;
        }
        self
    }

    pub fn build(self) -> ClassDescriptor {
        ClassDescriptor {
            class: self.class,
            constructors: self.constructors.into_iter().map(Arc::new).collect(),
            methods: self.methods.into_iter().map(Arc::new).collect(),
            fields: self.fields.into_iter().map(Arc::new).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::arg;

    struct Counter(i32);

    fn counter_class() -> ClassDescriptor {
        ClassBuilder::new(ClassRef::new("demo.Counter"))
            .constructor([NativeType::Int], |args| Ok(Counter(arg::<i32>(args, 0)?)))
            .method("get", [], |c: &Counter, _| Ok::<_, TargetError>(c.0))
            .method_varargs("add", [], NativeType::Int, |c: &Counter, args| {
                let extra: Vec<i32> = arg(args, 0)?;
                Ok::<_, TargetError>(c.0 + extra.iter().sum::<i32>())
            })
            .field("value", |c: &Counter| c.0)
            .static_field("ORIGIN", 0)
            .method("reset", [], |_c: &Counter, _| Ok::<_, TargetError>(()))
            .hide("reset")
            .build()
    }

    #[test]
    fn signatures_render_varargs() {
        let class = counter_class();
        assert_eq!(class.constructors()[0].signature(), "demo.Counter(int)");
        let add = class.methods_named("add").next().unwrap();
        assert_eq!(add.signature(), "demo.Counter.add(int...)");
        assert!(add.fixed_params().is_empty());
        assert_eq!(add.vararg_component(), Some(&NativeType::Int));
        assert_eq!(add.returns, NativeType::Int);
    }

    #[test]
    fn thunks_downcast_receivers() {
        let class = counter_class();
        let made = class.constructors()[0].call(None, &[NativeValue::Int(6)]).unwrap();
        let NativeValue::Object(obj) = made else {
            panic!("constructor must produce an object");
        };
        assert_eq!(obj.class().name(), "demo.Counter");
        let get = class.methods_named("get").next().unwrap();
        assert_eq!(get.call(Some(&obj), &[]).unwrap(), NativeValue::Int(6));
        assert_eq!(get.call(None, &[]).unwrap_err(), TargetError::MissingReceiver);

        let stranger = ObjectRef::new(ClassRef::new("demo.Other"), "nope");
        assert!(matches!(
            get.call(Some(&stranger), &[]),
            Err(TargetError::Receiver { .. })
        ));
        assert_eq!(class.field("value").unwrap().read(Some(&obj)).unwrap(), NativeValue::Int(6));
        assert_eq!(class.field("ORIGIN").unwrap().read(None).unwrap(), NativeValue::Int(0));
    }

    #[test]
    fn hidden_members_stay_registered() {
        let class = counter_class();
        let reset = class.methods_named("reset").next().unwrap();
        assert!(!reset.visible);
        assert!(class.methods_named("get").all(|m| m.visible));
    }
}
