//! Meta crate over the fzbridge layers. The value types live in `common`,
//! the binding machinery in `reflect`; the types most hosts need are
//! re-exported at the top level.

#[cfg(feature = "common")]
pub use fzbridge_common as common;

#[cfg(feature = "reflect")]
pub use fzbridge_reflect as reflect;

#[cfg(feature = "common")]
pub use fzbridge_common::{
    ArrayValue, BigData, Handle, ObjectHandle, SheetValue, ValueKind, XlError, XlErrorKind,
};

#[cfg(feature = "reflect")]
pub use fzbridge_reflect::{
    BindError, Bridge, BridgeConfig, ClassBuilder, ClassCatalog, ClassRef, Converter, NativeType,
    NativeValue, ResultMode, StaticBinding, TargetError, TypeResolver, arg, register_provider,
};
