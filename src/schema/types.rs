// src/schema/types.rs

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// How a VARCHAR2 width is measured in the target table.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
pub enum LengthUnit {
    Byte,
    Char,
}

impl LengthUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            LengthUnit::Byte => "BYTE",
            LengthUnit::Char => "CHAR",
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field as declared by the format file.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct ColumnSpec {
    name: String,
    length: usize,
    unit: LengthUnit,
}

impl ColumnSpec {
    /// `name` is uppercased; `length` must already be known to be positive.
    pub(crate) fn new(name: &str, length: usize, unit: LengthUnit) -> Self {
        Self {
            name: name.to_uppercase(),
            length,
            unit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn unit(&self) -> LengthUnit {
        self.unit
    }
}

/// 1-based, inclusive slice of a fixed-width record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct OffsetRange {
    pub column_name: String,
    pub first: usize,
    pub last: usize,
}

/// Column names of the target table, fetched once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoritativeColumnSet {
    pub full: BTreeSet<String>,
    /// Always a subset of `full`.
    pub char_semantics: BTreeSet<String>,
}

impl AuthoritativeColumnSet {
    /// Drops CHAR-semantics names that the exclusion filter removed from `full`.
    pub fn new(full: BTreeSet<String>, char_semantics: BTreeSet<String>) -> Self {
        let char_semantics = char_semantics
            .into_iter()
            .filter(|name| full.contains(name))
            .collect();
        Self {
            full,
            char_semantics,
        }
    }
}
