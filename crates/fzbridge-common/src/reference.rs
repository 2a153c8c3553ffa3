use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One rectangular block of cells, 0-based and inclusive on both ends.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Area {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl Area {
    pub fn new(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> Result<Self, &'static str> {
        if first_row > last_row || first_col > last_col {
            return Err("Area must be ordered: first <= last");
        }
        Ok(Self {
            first_row,
            last_row,
            first_col,
            last_col,
        })
    }

    pub fn cell(row: u32, col: u32) -> Self {
        Self {
            first_row: row,
            last_row: row,
            first_col: col,
            last_col: col,
        }
    }

    /// Column count; 0 for an unordered area.
    pub fn width(&self) -> u64 {
        span(self.first_col, self.last_col)
    }

    /// Row count; 0 for an unordered area.
    pub fn height(&self) -> u64 {
        span(self.first_row, self.last_row)
    }
}

fn span(first: u32, last: u32) -> u64 {
    last.checked_sub(first).map_or(0, |d| u64::from(d) + 1)
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}C{}", u64::from(self.first_row) + 1, u64::from(self.first_col) + 1)?;
        if self.width() > 1 || self.height() > 1 {
            write!(f, ":R{}C{}", u64::from(self.last_row) + 1, u64::from(self.last_col) + 1)?;
        }
        Ok(())
    }
}

/// A reference to cells on a sheet. A reference without a sheet id points at
/// the calling sheet; one with more than one area is a multi-area reference.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    pub sheet_id: Option<u64>,
    pub areas: Vec<Area>,
}

impl Reference {
    pub fn single(area: Area) -> Self {
        Self {
            sheet_id: None,
            areas: vec![area],
        }
    }

    pub fn multi(sheet_id: u64, areas: Vec<Area>) -> Self {
        Self {
            sheet_id: Some(sheet_id),
            areas,
        }
    }

    pub fn is_multi_area(&self) -> bool {
        self.areas.len() > 1
    }

    pub fn cell_count(&self) -> u64 {
        self.areas
            .iter()
            .map(|a| a.width() * a.height())
            .sum()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.sheet_id {
            write!(f, "[{id}]")?;
        }
        for (i, area) in self.areas.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{area}")?;
        }
        Ok(())
    }
}
