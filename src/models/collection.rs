//! The two independently synced record collections.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A named tabular dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Employee roster, keyed by registration number.
    Roster,
    /// Attendance log, auto-keyed.
    Attendance,
}

impl Collection {
    /// Sync order used by a full refresh.
    pub const ALL: [Collection; 2] = [Collection::Roster, Collection::Attendance];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Roster => "roster",
            Collection::Attendance => "attendance",
        }
    }

    /// Backing table in the record store.
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Roster => "roster_records",
            Collection::Attendance => "attendance_records",
        }
    }

    /// Column whose value keys a record, if the collection is keyed.
    pub fn key_column(&self) -> Option<&'static str> {
        match self {
            Collection::Roster => Some("Reg. NO"),
            Collection::Attendance => None,
        }
    }

    /// Expected display columns, in order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Collection::Roster => &["No", "Reg. NO", "CATEGORY", "RP NO", "Name"],
            Collection::Attendance => &[
                "Dept", "User ID", "Name", "Enroll ID", "Date", "1", "2", "3", "4",
            ],
        }
    }

    /// Column whose distinct values drive the view's dropdown filter.
    pub fn facet_column(&self) -> &'static str {
        match self {
            Collection::Roster => "CATEGORY",
            Collection::Attendance => "Dept",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Collection::Roster => 0,
            Collection::Attendance => 1,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roster" => Ok(Collection::Roster),
            "attendance" => Ok(Collection::Attendance),
            other => Err(AppError::NotFound(format!("Collection {} not found", other))),
        }
    }
}
