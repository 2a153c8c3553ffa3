//! Cell-level error markers exchanged with the host.
//!
//! - **`XlErrorKind`** : the host's closed set of error codes, with their
//!   native numeric values (`xlerrNull` = 0 … `xlerrGettingData` = 43)
//! - **`XlError`**     : a kind plus an optional human explanation
//!
//! The message never crosses the boundary as part of the code; hosts that
//! can only carry the numeric code simply drop it.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All error codes a cell can hold.
///
/// **Note:** names are CamelCase (idiomatic Rust) while `Display`
/// renders them exactly as the sheet shows them (`#DIV/0!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum XlErrorKind {
    Null,
    Div0,
    Value,
    Ref,
    Name,
    Num,
    Na,
    GettingData,
}

impl fmt::Display for XlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "#NULL!",
            Self::Div0 => "#DIV/0!",
            Self::Value => "#VALUE!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Num => "#NUM!",
            Self::Na => "#N/A",
            Self::GettingData => "#GETTING_DATA",
        })
    }
}

impl XlErrorKind {
    pub const ALL: [XlErrorKind; 8] = [
        Self::Null,
        Self::Div0,
        Self::Value,
        Self::Ref,
        Self::Name,
        Self::Num,
        Self::Na,
        Self::GettingData,
    ];

    /// Native numeric code as stored in an error cell.
    pub const fn code(self) -> u16 {
        match self {
            Self::Null => 0,
            Self::Div0 => 7,
            Self::Value => 15,
            Self::Ref => 23,
            Self::Name => 29,
            Self::Num => 36,
            Self::Na => 42,
            Self::GettingData => 43,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "#null!" => Some(Self::Null),
            "#div/0!" => Some(Self::Div0),
            "#value!" => Some(Self::Value),
            "#ref!" => Some(Self::Ref),
            "#name?" => Some(Self::Name),
            "#num!" => Some(Self::Num),
            "#n/a" => Some(Self::Na),
            "#getting_data" => Some(Self::GettingData),
            _ => None,
        }
    }
}

/// An error cell: the mandatory code and an optional explanation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XlError {
    pub kind: XlErrorKind,
    pub message: Option<String>,
}

impl From<XlErrorKind> for XlError {
    fn from(kind: XlErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

impl XlError {
    pub fn new(kind: XlErrorKind) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

impl fmt::Display for XlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for XlError {}

impl PartialEq<str> for XlErrorKind {
    fn eq(&self, other: &str) -> bool {
        format!("{self}") == other
    }
}

impl PartialEq<&str> for XlError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.to_string() == *other
    }
}
