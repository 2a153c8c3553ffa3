//! Converters shipped with the crate.

use std::sync::Arc;

use fzbridge_common::date::{datetime_to_serial, serial_to_datetime};
use fzbridge_common::{ArrayValue, BigData, SheetValue, ValueKind};

use super::{ConvertCtx, Converter, FALLBACK_PRIORITY};
use crate::error::ConversionError;
use crate::native::{NativeArray, NativeValue};
use crate::types::{NativeType, TypeMapping};

/// Every built-in converter, in scan order.
pub(crate) fn builtin_converters() -> Vec<Arc<dyn Converter>> {
    vec![
        Arc::new(ValueConverter::new()),
        Arc::new(DoubleConverter::new()),
        Arc::new(IntConverter::new()),
        Arc::new(LongConverter::new()),
        Arc::new(DateTimeConverter::new()),
        Arc::new(BoolConverter::new()),
        Arc::new(TextConverter::new()),
        Arc::new(BigDataConverter::new()),
        Arc::new(ArrayConverter::new()),
        Arc::new(HandleConverter::new()),
        Arc::new(NullConverter::new(ValueKind::Nil)),
        Arc::new(NullConverter::new(ValueKind::Missing)),
        Arc::new(ScalarObjectConverter::new(ValueKind::Number)),
        Arc::new(ScalarObjectConverter::new(ValueKind::String)),
        Arc::new(ScalarObjectConverter::new(ValueKind::Boolean)),
    ]
}

fn mismatch(value: &SheetValue, target: &NativeType) -> ConversionError {
    ConversionError::unsupported(value.kind(), target)
}

fn not_externalizable(kind: ValueKind) -> ConversionError {
    ConversionError::NotExternalizable(kind)
}

/// Number <-> double.
pub struct DoubleConverter {
    mapping: TypeMapping,
}

impl DoubleConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::Number, NativeType::Double),
        }
    }
}

impl Default for DoubleConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for DoubleConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "number<->double"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        match value {
            SheetValue::Number(n) => Ok(NativeValue::Double(*n)),
            other => Err(mismatch(other, target)),
        }
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Double(d) => Ok(SheetValue::Number(*d)),
            _ => Err(not_externalizable(ValueKind::Number)),
        }
    }
}

/// Number <-> int. Fractions truncate toward zero; values outside the
/// 32-bit range are rejected rather than wrapped.
pub struct IntConverter {
    mapping: TypeMapping,
}

impl IntConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::Number, NativeType::Int),
        }
    }
}

impl Default for IntConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for IntConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "number<->int"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        let SheetValue::Number(n) = value else {
            return Err(mismatch(value, target));
        };
        let t = n.trunc();
        if !t.is_finite() || t < f64::from(i32::MIN) || t > f64::from(i32::MAX) {
            return Err(ConversionError::Invalid(format!("{n} is out of range for int")));
        }
        Ok(NativeValue::Int(t as i32))
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Int(i) => Ok(SheetValue::Number(f64::from(*i))),
            _ => Err(not_externalizable(ValueKind::Number)),
        }
    }
}

/// Number <-> long.
pub struct LongConverter {
    mapping: TypeMapping,
}

impl LongConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::Number, NativeType::Long),
        }
    }
}

impl Default for LongConverter {
    fn default() -> Self {
        Self::new()
    }
}

// 2^63; the largest f64 below it is the last one that fits.
const LONG_LIMIT: f64 = 9_223_372_036_854_775_808.0;

impl Converter for LongConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "number<->long"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        let SheetValue::Number(n) = value else {
            return Err(mismatch(value, target));
        };
        let t = n.trunc();
        if !t.is_finite() || t < -LONG_LIMIT || t >= LONG_LIMIT {
            return Err(ConversionError::Invalid(format!("{n} is out of range for long")));
        }
        Ok(NativeValue::Long(t as i64))
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Long(l) => Ok(SheetValue::Number(*l as f64)),
            _ => Err(not_externalizable(ValueKind::Number)),
        }
    }
}

/// Number <-> datetime through the 1900 serial date system.
pub struct DateTimeConverter {
    mapping: TypeMapping,
}

impl DateTimeConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::Number, NativeType::DateTime),
        }
    }
}

impl Default for DateTimeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for DateTimeConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "number<->datetime"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        let SheetValue::Number(n) = value else {
            return Err(mismatch(value, target));
        };
        serial_to_datetime(*n)
            .map(NativeValue::DateTime)
            .ok_or_else(|| ConversionError::Invalid(format!("{n} is not a valid date serial")))
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::DateTime(dt) => Ok(SheetValue::Number(datetime_to_serial(dt))),
            _ => Err(not_externalizable(ValueKind::Number)),
        }
    }
}

pub struct BoolConverter {
    mapping: TypeMapping,
}

impl BoolConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::Boolean, NativeType::Bool),
        }
    }
}

impl Default for BoolConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for BoolConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "boolean<->bool"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        match value {
            SheetValue::Boolean(b) => Ok(NativeValue::Bool(*b)),
            other => Err(mismatch(other, target)),
        }
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Bool(b) => Ok(SheetValue::Boolean(*b)),
            _ => Err(not_externalizable(ValueKind::Boolean)),
        }
    }
}

pub struct TextConverter {
    mapping: TypeMapping,
}

impl TextConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::String, NativeType::Text),
        }
    }
}

impl Default for TextConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for TextConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "string<->text"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        match value {
            SheetValue::String(s) => Ok(NativeValue::Text(s.clone())),
            other => Err(mismatch(other, target)),
        }
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Text(s) => Ok(SheetValue::String(s.clone())),
            _ => Err(not_externalizable(ValueKind::String)),
        }
    }
}

/// BigData <-> bytes. Deferred payloads are fetched through the context's
/// [`BigDataSource`](super::BigDataSource); results always go out inline.
pub struct BigDataConverter {
    mapping: TypeMapping,
}

impl BigDataConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::BigData, NativeType::Bytes),
        }
    }
}

impl Default for BigDataConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for BigDataConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "bigdata<->bytes"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        match value {
            SheetValue::BigData(BigData::Inline(bytes)) => Ok(NativeValue::Bytes(bytes.clone())),
            SheetValue::BigData(BigData::Deferred { handle, len }) => {
                let source = ctx.big_data.ok_or_else(|| {
                    ConversionError::Invalid(format!(
                        "deferred payload {handle} needs a big data source"
                    ))
                })?;
                let bytes = source
                    .fetch(*handle, *len)
                    .map_err(ConversionError::Invalid)?;
                if bytes.len() != *len {
                    return Err(ConversionError::Invalid(format!(
                        "deferred payload {handle}: expected {len} byte(s), got {}",
                        bytes.len()
                    )));
                }
                Ok(NativeValue::Bytes(bytes))
            }
            other => Err(mismatch(other, target)),
        }
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Bytes(bytes) => Ok(SheetValue::BigData(BigData::Inline(bytes.clone()))),
            _ => Err(not_externalizable(ValueKind::BigData)),
        }
    }
}

/// Array <-> any native array, element by element.
///
/// A target of `T[][]` is filled row by row; any other component flattens
/// the grid in row-major order. Going out, an array of arrays becomes an
/// area and anything else a single row.
pub struct ArrayConverter {
    mapping: TypeMapping,
}

impl ArrayConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::Array, NativeType::array_of(NativeType::Object)),
        }
    }
}

impl Default for ArrayConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_cells(
    cells: &[SheetValue],
    component: &NativeType,
    ctx: &ConvertCtx<'_>,
) -> Result<NativeValue, ConversionError> {
    let items = cells
        .iter()
        .map(|cell| ctx.to_native(cell, component))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NativeValue::Array(NativeArray {
        component: component.clone(),
        items,
    }))
}

fn externalize_items(items: &[NativeValue], ctx: &ConvertCtx<'_>) -> Result<Vec<SheetValue>, ConversionError> {
    items
        .iter()
        .map(|item| {
            ctx.externalize(item)
                .ok_or_else(|| ConversionError::Invalid(format!("no sheet representation for {}", item.describe())))
        })
        .collect()
}

impl Converter for ArrayConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "array<->array"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        let SheetValue::Array(array) = value else {
            return Err(mismatch(value, target));
        };
        let Some(component) = target.component() else {
            return Err(mismatch(value, target));
        };
        match component.component() {
            Some(inner) => {
                let rows = array
                    .to_rows()
                    .iter()
                    .map(|row| convert_cells(row, inner, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(NativeValue::Array(NativeArray {
                    component: component.clone(),
                    items: rows,
                }))
            }
            None => convert_cells(array.cells(), component, ctx),
        }
    }

    fn to_external(&self, value: &NativeValue, ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        let NativeValue::Array(array) = value else {
            return Err(not_externalizable(ValueKind::Array));
        };
        let grid = if array.component.component().is_some() {
            let rows = array
                .items
                .iter()
                .map(|row| match row {
                    NativeValue::Array(inner) => externalize_items(&inner.items, ctx),
                    other => Err(ConversionError::Invalid(format!(
                        "row of a 2-D array is {}",
                        other.describe()
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            ArrayValue::from_rows(rows)
        } else {
            ArrayValue::row(externalize_items(&array.items, ctx)?)
        };
        grid.map(SheetValue::Array)
            .map_err(|err| ConversionError::Invalid(err.to_string()))
    }
}

/// ObjectHandle <-> object through the heap. Boxed primitives come back out
/// as the value they wrap.
pub struct HandleConverter {
    mapping: TypeMapping,
}

impl HandleConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::ObjectHandle, NativeType::Object),
        }
    }
}

impl Default for HandleConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for HandleConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "handle<->object"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        let SheetValue::ObjectHandle(handle) = value else {
            return Err(mismatch(value, target));
        };
        let object = ctx
            .heap
            .get_object(handle.handle)
            .ok_or(ConversionError::StaleHandle(handle.handle))?;
        if let Some(inner) = object.unboxed() {
            if target.is_assignable_from(&inner.native_type()) {
                return Ok(inner.clone());
            }
            return Err(ConversionError::unsupported(inner.describe(), target));
        }
        if target.is_assignable_from(&NativeType::Class(object.class().clone())) {
            Ok(NativeValue::Object(object))
        } else {
            Err(ConversionError::unsupported(object.class().name(), target))
        }
    }

    fn to_external(&self, value: &NativeValue, ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        Ok(ctx
            .box_object(value.clone())
            .map_or(SheetValue::Nil, SheetValue::ObjectHandle))
    }
}

/// Any sheet value <-> a natively held sheet value, unchanged.
pub struct ValueConverter {
    mapping: TypeMapping,
}

impl ValueConverter {
    pub fn new() -> Self {
        Self {
            mapping: TypeMapping::new(ValueKind::Any, NativeType::Value),
        }
    }
}

impl Default for ValueConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for ValueConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        "any<->value"
    }

    fn to_native(
        &self,
        value: &SheetValue,
        _target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        Ok(NativeValue::Value(value.clone()))
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match value {
            NativeValue::Value(v) => Ok(v.clone()),
            _ => Err(not_externalizable(ValueKind::Any)),
        }
    }
}

/// Nil or Missing -> null, for reference-typed targets only.
pub struct NullConverter {
    mapping: TypeMapping,
}

impl NullConverter {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            mapping: TypeMapping::new(kind, NativeType::Object),
        }
    }
}

impl Converter for NullConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn name(&self) -> &str {
        match self.mapping.kind {
            ValueKind::Missing => "missing->null",
            _ => "nil->null",
        }
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        if value.kind() != self.mapping.kind {
            return Err(mismatch(value, target));
        }
        match target {
            NativeType::Bool | NativeType::Int | NativeType::Long | NativeType::Double => {
                Err(mismatch(value, target))
            }
            _ => Ok(NativeValue::Null),
        }
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match (value, self.mapping.kind) {
            (NativeValue::Null, ValueKind::Missing) => Ok(SheetValue::Missing),
            (NativeValue::Null, _) => Ok(SheetValue::Nil),
            _ => Err(not_externalizable(self.mapping.kind)),
        }
    }
}

/// Catch-all for `object` targets: numbers become doubles, strings text,
/// booleans bools. Lowest priority so any dedicated converter wins.
pub struct ScalarObjectConverter {
    mapping: TypeMapping,
}

impl ScalarObjectConverter {
    /// `kind` must be Number, String or Boolean; anything else yields a
    /// converter that never succeeds.
    pub fn new(kind: ValueKind) -> Self {
        Self {
            mapping: TypeMapping::new(kind, NativeType::Object),
        }
    }

    fn produce(value: &SheetValue) -> Option<NativeValue> {
        match value {
            SheetValue::Number(n) => Some(NativeValue::Double(*n)),
            SheetValue::String(s) => Some(NativeValue::Text(s.clone())),
            SheetValue::Boolean(b) => Some(NativeValue::Bool(*b)),
            _ => None,
        }
    }
}

impl Converter for ScalarObjectConverter {
    fn mapping(&self) -> &TypeMapping {
        &self.mapping
    }

    fn priority(&self) -> i32 {
        FALLBACK_PRIORITY
    }

    fn name(&self) -> &str {
        match self.mapping.kind {
            ValueKind::Number => "number->object",
            ValueKind::String => "string->object",
            ValueKind::Boolean => "boolean->object",
            _ => "scalar->object",
        }
    }

    fn to_native(
        &self,
        value: &SheetValue,
        target: &NativeType,
        _ctx: &ConvertCtx<'_>,
    ) -> Result<NativeValue, ConversionError> {
        if value.kind() != self.mapping.kind {
            return Err(mismatch(value, target));
        }
        match Self::produce(value) {
            Some(native) if target.is_assignable_from(&native.native_type()) => Ok(native),
            _ => Err(mismatch(value, target)),
        }
    }

    fn to_external(&self, value: &NativeValue, _ctx: &ConvertCtx<'_>) -> Result<SheetValue, ConversionError> {
        match (self.mapping.kind, value) {
            (ValueKind::Number, NativeValue::Double(d)) => Ok(SheetValue::Number(*d)),
            (ValueKind::String, NativeValue::Text(s)) => Ok(SheetValue::String(s.clone())),
            (ValueKind::Boolean, NativeValue::Bool(b)) => Ok(SheetValue::Boolean(*b)),
            (kind, _) => Err(not_externalizable(kind)),
        }
    }
}
