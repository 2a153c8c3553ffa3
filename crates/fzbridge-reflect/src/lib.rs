//! Name-based call binding between a spreadsheet host and native objects.
//!
//! Classes are registered once in a [`ClassCatalog`]; a [`Bridge`] then
//! resolves calls by type and member name against it, converting sheet
//! values to native arguments with the converters of a
//! [`TypeConverterRegistry`] and boxing native results into a handle
//! [`Heap`] when the sheet cannot hold them directly.

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod factory;
pub mod gc;
pub mod heap;
pub mod invoker;
pub mod member;
pub mod native;
pub mod result;
pub mod types;

pub use bridge::{Bridge, StaticBinding};
pub use catalog::{ClassCatalog, TypeResolver};
pub use config::{BridgeConfig, GcConfig};
pub use convert::{
    BigDataSource, CachingRegistry, ConvertCtx, Converter, ConverterProvider, DEFAULT_PRIORITY,
    ScanningRegistry, TypeConverterRegistry, register_provider,
};
pub use error::{BindError, ConversionError, TargetError};
pub use factory::{InvokerFactory, MemberScope};
pub use gc::GcSchedule;
pub use heap::Heap;
pub use invoker::{ArgBinding, FieldInvoker, Invoker};
pub use member::{CallableMember, ClassBuilder, ClassDescriptor, FieldMember, MemberKind};
pub use native::{FromNative, IntoNative, NativeArray, NativeValue, ObjectRef, arg};
pub use result::ResultMode;
pub use types::{ClassRef, NativeType, TypeMapping};
