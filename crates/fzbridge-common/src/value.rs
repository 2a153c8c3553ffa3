use std::fmt::{self, Display};

use thiserror::Error;

use crate::{Reference, XlError, XlErrorKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque identifier of a heap-resident native object.
///
/// Handles are allocated by the object heap and are unique for the lifetime
/// of the process; the numeric value carries no meaning on its own.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

impl Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A boxed native object as the sheet sees it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub handle: Handle,
    pub type_name: String,
}

impl ObjectHandle {
    pub fn new(handle: Handle, type_name: impl Into<String>) -> Self {
        Self {
            handle,
            type_name: type_name.into(),
        }
    }
}

impl Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.type_name, self.handle)
    }
}

/// Large binary payload. Hosts may hand over only a handle and a length and
/// let the callee fetch the bytes on demand.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BigData {
    Inline(Vec<u8>),
    Deferred { handle: u64, len: usize },
}

impl BigData {
    pub fn len(&self) -> usize {
        match self {
            BigData::Inline(bytes) => bytes.len(),
            BigData::Deferred { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, BigData::Deferred { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("array of {rows}x{cols} cannot hold {cells} cell(s)")]
    ShapeMismatch { rows: usize, cols: usize, cells: usize },
    #[error("array cell ({row}, {col}) is itself an array")]
    NestedArray { row: usize, col: usize },
    #[error("rows have differing lengths")]
    RaggedRows,
}

/// Classification of a 2-D array by its extent.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ArrayShape {
    /// A single row (also used for 1x1 and empty arrays).
    Row,
    Column,
    Area,
}

/// Row-major 2-D grid of scalar cells.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    rows: usize,
    cols: usize,
    cells: Vec<SheetValue>,
}

impl ArrayValue {
    pub fn new(rows: usize, cols: usize, cells: Vec<SheetValue>) -> Result<Self, ValueError> {
        if rows * cols != cells.len() {
            return Err(ValueError::ShapeMismatch {
                rows,
                cols,
                cells: cells.len(),
            });
        }
        if let Some(idx) = cells.iter().position(|c| matches!(c, SheetValue::Array(_))) {
            return Err(ValueError::NestedArray {
                row: idx / cols.max(1),
                col: idx % cols.max(1),
            });
        }
        Ok(Self { rows, cols, cells })
    }

    /// A one-row array holding `cells` left to right.
    pub fn row(cells: Vec<SheetValue>) -> Result<Self, ValueError> {
        let cols = cells.len();
        Self::new(if cols == 0 { 0 } else { 1 }, cols, cells)
    }

    pub fn column(cells: Vec<SheetValue>) -> Result<Self, ValueError> {
        let rows = cells.len();
        Self::new(rows, if rows == 0 { 0 } else { 1 }, cells)
    }

    pub fn from_rows(rows: Vec<Vec<SheetValue>>) -> Result<Self, ValueError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(ValueError::RaggedRows);
        }
        Self::new(height, width, rows.into_iter().flatten().collect())
    }

    pub fn empty() -> Self {
        Self {
            rows: 0,
            cols: 0,
            cells: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn shape(&self) -> ArrayShape {
        if self.rows <= 1 {
            ArrayShape::Row
        } else if self.cols == 1 {
            ArrayShape::Column
        } else {
            ArrayShape::Area
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&SheetValue> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> &[SheetValue] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<SheetValue> {
        self.cells
    }

    pub fn to_rows(&self) -> Vec<Vec<SheetValue>> {
        if self.cols == 0 {
            return Vec::new();
        }
        self.cells.chunks(self.cols).map(<[_]>::to_vec).collect()
    }
}

/// The external value kinds, as a two-level lattice: every concrete kind is
/// a subtype of [`ValueKind::Any`] and unrelated to its siblings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Any,
    Number,
    String,
    Boolean,
    Error,
    Missing,
    Nil,
    Array,
    Reference,
    BigData,
    ObjectHandle,
}

impl ValueKind {
    pub fn is_assignable_from(self, other: ValueKind) -> bool {
        self == ValueKind::Any || self == other
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Any => "any",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Error => "error",
            ValueKind::Missing => "missing",
            ValueKind::Nil => "nil",
            ValueKind::Array => "array",
            ValueKind::Reference => "reference",
            ValueKind::BigData => "bigdata",
            ValueKind::ObjectHandle => "handle",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value crossing the call boundary.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum SheetValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(XlError),
    /// An omitted argument.
    Missing,
    /// An empty cell.
    Nil,
    Array(ArrayValue),
    Reference(Reference),
    BigData(BigData),
    ObjectHandle(ObjectHandle),
}

impl SheetValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SheetValue::Number(_) => ValueKind::Number,
            SheetValue::String(_) => ValueKind::String,
            SheetValue::Boolean(_) => ValueKind::Boolean,
            SheetValue::Error(_) => ValueKind::Error,
            SheetValue::Missing => ValueKind::Missing,
            SheetValue::Nil => ValueKind::Nil,
            SheetValue::Array(_) => ValueKind::Array,
            SheetValue::Reference(_) => ValueKind::Reference,
            SheetValue::BigData(_) => ValueKind::BigData,
            SheetValue::ObjectHandle(_) => ValueKind::ObjectHandle,
        }
    }

    pub fn error(kind: XlErrorKind) -> Self {
        SheetValue::Error(XlError::new(kind))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SheetValue::Error(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SheetValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SheetValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&ObjectHandle> {
        match self {
            SheetValue::ObjectHandle(h) => Some(h),
            _ => None,
        }
    }
}

impl Display for SheetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetValue::Number(n) => write!(f, "{n}"),
            SheetValue::String(s) => write!(f, "{s}"),
            SheetValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            SheetValue::Error(e) => write!(f, "{e}"),
            SheetValue::Missing | SheetValue::Nil => Ok(()),
            SheetValue::Array(a) => write!(f, "{{{}x{}}}", a.rows(), a.cols()),
            SheetValue::Reference(r) => write!(f, "{r}"),
            SheetValue::BigData(b) => write!(f, "<{} bytes>", b.len()),
            SheetValue::ObjectHandle(h) => write!(f, "{h}"),
        }
    }
}

impl From<f64> for SheetValue {
    fn from(n: f64) -> Self {
        SheetValue::Number(n)
    }
}

impl From<i32> for SheetValue {
    fn from(n: i32) -> Self {
        SheetValue::Number(f64::from(n))
    }
}

impl From<bool> for SheetValue {
    fn from(b: bool) -> Self {
        SheetValue::Boolean(b)
    }
}

impl From<&str> for SheetValue {
    fn from(s: &str) -> Self {
        SheetValue::String(s.to_string())
    }
}

impl From<String> for SheetValue {
    fn from(s: String) -> Self {
        SheetValue::String(s)
    }
}

impl From<XlError> for SheetValue {
    fn from(error: XlError) -> Self {
        SheetValue::Error(error)
    }
}

impl From<ArrayValue> for SheetValue {
    fn from(array: ArrayValue) -> Self {
        SheetValue::Array(array)
    }
}

impl From<ObjectHandle> for SheetValue {
    fn from(handle: ObjectHandle) -> Self {
        SheetValue::ObjectHandle(handle)
    }
}
