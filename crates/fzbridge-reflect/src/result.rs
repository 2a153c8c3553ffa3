use fzbridge_common::SheetValue;

use crate::convert::{ConvertCtx, Converter};
use crate::native::NativeValue;

/// How a call site wants native results handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultMode {
    /// Always box into the heap; null comes back as `Nil`.
    Object,
    /// The most primitive kind any converter can produce, boxing only when
    /// nothing else fits.
    #[default]
    Simplest,
    /// The member returns a sheet value that goes back as-is.
    Passthrough,
}

/// Turns a call result into what the sheet sees. `bound` is the converter
/// chosen for the declared return type, tried before the dynamic search.
pub(crate) fn marshal(
    value: NativeValue,
    mode: ResultMode,
    bound: Option<&dyn Converter>,
    ctx: &ConvertCtx<'_>,
) -> SheetValue {
    match mode {
        ResultMode::Object => ctx.box_value(value),
        ResultMode::Simplest => {
            if value.is_null() {
                return SheetValue::Nil;
            }
            if let Some(Ok(external)) = bound.map(|c| c.to_external(&value, ctx)) {
                return external;
            }
            match ctx.externalize(&value) {
                Some(external) => external,
                None => ctx.box_value(value),
            }
        }
        ResultMode::Passthrough => match value {
            NativeValue::Value(v) => v,
            NativeValue::Null => SheetValue::Nil,
            other => {
                tracing::warn!(
                    found = %other.describe(),
                    "passthrough result is not a sheet value; boxing it"
                );
                ctx.box_value(other)
            }
        },
    }
}
