//! Values on the native side of the boundary.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use fzbridge_common::SheetValue;

use crate::error::TargetError;
use crate::types::{ClassRef, NativeType};

/// An instance of a registered class. Cloning shares the instance;
/// identity is the payload allocation, never structural equality.
#[derive(Clone)]
pub struct ObjectRef {
    class: ClassRef,
    payload: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    pub fn new<T: Any + Send + Sync>(class: ClassRef, value: T) -> Self {
        Self {
            class,
            payload: Arc::new(value),
        }
    }

    pub fn from_arc(class: ClassRef, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self { class, payload }
    }

    /// Wraps a non-object value so it can live in the heap. Every call makes
    /// a new instance.
    pub fn boxed(value: NativeValue) -> Self {
        let class = ClassRef::new(value.native_type().to_string());
        Self::new(class, value)
    }

    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// The value wrapped by [`ObjectRef::boxed`], if this is such a box.
    pub fn unboxed(&self) -> Option<&NativeValue> {
        self.downcast_ref::<NativeValue>()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.payload) as *const () as usize
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:#x})", self.class.name(), self.identity())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NativeArray {
    pub component: NativeType,
    pub items: Vec<NativeValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Bytes(Vec<u8>),
    Value(SheetValue),
    Array(NativeArray),
    Object(ObjectRef),
}

impl NativeValue {
    /// Runtime type of this value; `Null` reports the root type.
    pub fn native_type(&self) -> NativeType {
        match self {
            NativeValue::Null => NativeType::Object,
            NativeValue::Bool(_) => NativeType::Bool,
            NativeValue::Int(_) => NativeType::Int,
            NativeValue::Long(_) => NativeType::Long,
            NativeValue::Double(_) => NativeType::Double,
            NativeValue::Text(_) => NativeType::Text,
            NativeValue::DateTime(_) => NativeType::DateTime,
            NativeValue::Bytes(_) => NativeType::Bytes,
            NativeValue::Value(_) => NativeType::Value,
            NativeValue::Array(a) => NativeType::array_of(a.component.clone()),
            NativeValue::Object(o) => NativeType::Class(o.class().clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    pub fn describe(&self) -> String {
        match self {
            NativeValue::Null => "null".to_string(),
            other => other.native_type().to_string(),
        }
    }
}

/// Extraction of typed Rust values from member arguments.
pub trait FromNative: Sized {
    const EXPECTED: &'static str;

    fn from_native(value: &NativeValue) -> Option<Self>;
}

/// Conversion of a member's Rust result into a native value.
pub trait IntoNative {
    fn native_type() -> NativeType;

    fn into_native(self) -> NativeValue;
}

/// Typed access to argument `index`.
pub fn arg<T: FromNative>(args: &[NativeValue], index: usize) -> Result<T, TargetError> {
    let Some(value) = args.get(index) else {
        return Err(TargetError::Argument {
            index,
            expected: T::EXPECTED,
            found: "nothing".to_string(),
        });
    };
    T::from_native(value).ok_or_else(|| TargetError::Argument {
        index,
        expected: T::EXPECTED,
        found: value.describe(),
    })
}

impl FromNative for NativeValue {
    const EXPECTED: &'static str = "any value";

    fn from_native(value: &NativeValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromNative for bool {
    const EXPECTED: &'static str = "bool";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromNative for i32 {
    const EXPECTED: &'static str = "int";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Int(i) => Some(*i),
            NativeValue::Long(l) => i32::try_from(*l).ok(),
            _ => None,
        }
    }
}

impl FromNative for i64 {
    const EXPECTED: &'static str = "long";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Int(i) => Some(i64::from(*i)),
            NativeValue::Long(l) => Some(*l),
            _ => None,
        }
    }
}

impl FromNative for f64 {
    const EXPECTED: &'static str = "double";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Double(d) => Some(*d),
            NativeValue::Int(i) => Some(f64::from(*i)),
            NativeValue::Long(l) => Some(*l as f64),
            _ => None,
        }
    }
}

impl FromNative for String {
    const EXPECTED: &'static str = "text";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromNative for NaiveDateTime {
    const EXPECTED: &'static str = "datetime";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl FromNative for SheetValue {
    const EXPECTED: &'static str = "sheet value";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Value(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromNative for ObjectRef {
    const EXPECTED: &'static str = "object";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Object(o) => Some(o.clone()),
            _ => None,
        }
    }
}

impl<T: FromNative> FromNative for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Null => Some(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<T: FromNative> FromNative for Vec<T> {
    const EXPECTED: &'static str = "array";

    fn from_native(value: &NativeValue) -> Option<Self> {
        match value {
            NativeValue::Array(a) => a.items.iter().map(T::from_native).collect(),
            _ => None,
        }
    }
}

impl IntoNative for NativeValue {
    fn native_type() -> NativeType {
        NativeType::Object
    }

    fn into_native(self) -> NativeValue {
        self
    }
}

impl IntoNative for () {
    fn native_type() -> NativeType {
        NativeType::Object
    }

    fn into_native(self) -> NativeValue {
        NativeValue::Null
    }
}

macro_rules! scalar_into_native {
    ($($ty:ty => $variant:ident, $native:ident;)*) => {
        $(
            impl IntoNative for $ty {
                fn native_type() -> NativeType {
                    NativeType::$native
                }

                fn into_native(self) -> NativeValue {
                    NativeValue::$variant(self)
                }
            }
        )*
    };
}

scalar_into_native! {
    bool => Bool, Bool;
    i32 => Int, Int;
    i64 => Long, Long;
    f64 => Double, Double;
    String => Text, Text;
    NaiveDateTime => DateTime, DateTime;
    SheetValue => Value, Value;
}

impl IntoNative for ObjectRef {
    fn native_type() -> NativeType {
        NativeType::Object
    }

    fn into_native(self) -> NativeValue {
        NativeValue::Object(self)
    }
}

impl<T: IntoNative> IntoNative for Option<T> {
    fn native_type() -> NativeType {
        T::native_type()
    }

    fn into_native(self) -> NativeValue {
        self.map_or(NativeValue::Null, T::into_native)
    }
}

impl<T: IntoNative> IntoNative for Vec<T> {
    fn native_type() -> NativeType {
        NativeType::array_of(T::native_type())
    }

    fn into_native(self) -> NativeValue {
        NativeValue::Array(NativeArray {
            component: T::native_type(),
            items: self.into_iter().map(T::into_native).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_identity_is_allocation() {
        let class = ClassRef::new("demo.Point");
        let a = ObjectRef::new(class.clone(), (1, 2));
        let b = ObjectRef::new(class, (1, 2));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<(i32, i32)>(), Some(&(1, 2)));
    }

    #[test]
    fn boxed_values_unwrap() {
        let boxed = ObjectRef::boxed(NativeValue::Int(6));
        assert_eq!(boxed.class().name(), "int");
        assert_eq!(boxed.unboxed(), Some(&NativeValue::Int(6)));
    }

    #[test]
    fn typed_arguments() {
        let args = vec![
            NativeValue::Int(3),
            NativeValue::Text("x".into()),
            NativeValue::Null,
            vec![1.5, 2.5].into_native(),
        ];
        assert_eq!(arg::<i64>(&args, 0).unwrap(), 3);
        assert_eq!(arg::<f64>(&args, 0).unwrap(), 3.0);
        assert_eq!(arg::<String>(&args, 1).unwrap(), "x");
        assert_eq!(arg::<Option<String>>(&args, 2).unwrap(), None);
        assert_eq!(arg::<Vec<f64>>(&args, 3).unwrap(), vec![1.5, 2.5]);
        let err = arg::<i32>(&args, 1).unwrap_err();
        assert_eq!(
            err,
            TargetError::Argument {
                index: 1,
                expected: "int",
                found: "text".into()
            }
        );
    }
}
