//! Native type model and the (external kind, native type) mapping lattice.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fzbridge_common::ValueKind;

struct ClassInfo {
    name: String,
    supertypes: Vec<ClassRef>,
}

/// Shared reference to a registered class. Equality and hashing go by the
/// fully-qualified name.
#[derive(Clone)]
pub struct ClassRef(Arc<ClassInfo>);

impl ClassRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_supertypes(name, Vec::new())
    }

    pub fn with_supertypes(name: impl Into<String>, supertypes: Vec<ClassRef>) -> Self {
        ClassRef(Arc::new(ClassInfo {
            name: name.into(),
            supertypes,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn supertypes(&self) -> &[ClassRef] {
        &self.0.supertypes
    }

    /// `true` when `other` is this class or one of its descendants.
    pub fn is_assignable_from(&self, other: &ClassRef) -> bool {
        self == other
            || other
                .supertypes()
                .iter()
                .any(|parent| self.is_assignable_from(parent))
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassRef({})", self.0.name)
    }
}

/// Types a member can declare for parameters, fields and return values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// Root of the hierarchy; every type is assignable to it.
    Object,
    Bool,
    Int,
    Long,
    Double,
    Text,
    DateTime,
    Bytes,
    /// A sheet value carried through unchanged.
    Value,
    Array(Box<NativeType>),
    Class(ClassRef),
}

impl NativeType {
    pub fn array_of(component: NativeType) -> Self {
        NativeType::Array(Box::new(component))
    }

    pub fn component(&self) -> Option<&NativeType> {
        match self {
            NativeType::Array(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_assignable_from(&self, other: &NativeType) -> bool {
        match (self, other) {
            (NativeType::Object, _) => true,
            (NativeType::Array(a), NativeType::Array(b)) => a.is_assignable_from(b),
            (NativeType::Class(a), NativeType::Class(b)) => a.is_assignable_from(b),
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Object => f.write_str("object"),
            NativeType::Bool => f.write_str("bool"),
            NativeType::Int => f.write_str("int"),
            NativeType::Long => f.write_str("long"),
            NativeType::Double => f.write_str("double"),
            NativeType::Text => f.write_str("text"),
            NativeType::DateTime => f.write_str("datetime"),
            NativeType::Bytes => f.write_str("bytes"),
            NativeType::Value => f.write_str("value"),
            NativeType::Array(c) => write!(f, "{c}[]"),
            NativeType::Class(c) => f.write_str(c.name()),
        }
    }
}

/// An (external kind, native type) pair. Converters are bound to one, and
/// lookups are phrased as one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeMapping {
    pub kind: ValueKind,
    pub native: NativeType,
}

impl TypeMapping {
    pub fn new(kind: ValueKind, native: NativeType) -> Self {
        Self { kind, native }
    }

    /// Assignability holds independently in both dimensions.
    pub fn is_assignable_from(&self, other: &TypeMapping) -> bool {
        self.kind.is_assignable_from(other.kind) && self.native.is_assignable_from(&other.native)
    }
}

impl fmt::Display for TypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} <-> {})", self.kind, self.native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_assignability_follows_supertypes() {
        let shape = ClassRef::new("demo.Shape");
        let named = ClassRef::new("demo.Named");
        let circle = ClassRef::with_supertypes("demo.Circle", vec![shape.clone(), named.clone()]);
        let unit = ClassRef::with_supertypes("demo.UnitCircle", vec![circle.clone()]);

        assert!(shape.is_assignable_from(&unit));
        assert!(named.is_assignable_from(&circle));
        assert!(!circle.is_assignable_from(&shape));
        assert_eq!(ClassRef::new("demo.Shape"), shape);
    }

    #[test]
    fn native_assignability() {
        let circle = NativeType::Class(ClassRef::new("demo.Circle"));
        assert!(NativeType::Object.is_assignable_from(&NativeType::Int));
        assert!(NativeType::Object.is_assignable_from(&circle));
        assert!(!NativeType::Int.is_assignable_from(&NativeType::Long));
        assert!(
            NativeType::array_of(NativeType::Object)
                .is_assignable_from(&NativeType::array_of(NativeType::Int))
        );
        assert!(!NativeType::array_of(NativeType::Int).is_assignable_from(&NativeType::Int));
        assert_eq!(NativeType::array_of(NativeType::Int).to_string(), "int[]");
    }

    #[test]
    fn mapping_assignability_is_per_dimension() {
        let wide = TypeMapping::new(ValueKind::Any, NativeType::Object);
        let narrow = TypeMapping::new(ValueKind::Number, NativeType::Int);
        let cross = TypeMapping::new(ValueKind::Number, NativeType::Object);

        assert!(wide.is_assignable_from(&narrow));
        assert!(cross.is_assignable_from(&narrow));
        assert!(!narrow.is_assignable_from(&cross));
        assert!(!TypeMapping::new(ValueKind::String, NativeType::Object).is_assignable_from(&narrow));
    }
}
