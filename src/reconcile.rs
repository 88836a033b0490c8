// src/reconcile.rs

use std::{collections::BTreeSet, fmt};
use tracing::{debug, warn};

use crate::descriptor::DescriptorLayout;
use crate::error::{CompileError, CompileResult};
use crate::schema::{AuthoritativeColumnSet, ColumnSpec, OffsetRange};

/// Symmetric difference between the format file and the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscrepancySet {
    /// In the table but absent from the format file.
    pub missing_from_descriptor: BTreeSet<String>,
    /// In the format file but unknown to the table.
    pub unknown_to_schema: BTreeSet<String>,
}

impl DiscrepancySet {
    pub fn between(descriptor: &BTreeSet<String>, schema: &BTreeSet<String>) -> Self {
        Self {
            missing_from_descriptor: schema.difference(descriptor).cloned().collect(),
            unknown_to_schema: descriptor.difference(schema).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing_from_descriptor.is_empty() && self.unknown_to_schema.is_empty()
    }

    /// Every differing name, sorted.
    pub fn names(&self) -> BTreeSet<&str> {
        self.missing_from_descriptor
            .iter()
            .chain(&self.unknown_to_schema)
            .map(String::as_str)
            .collect()
    }
}

impl fmt::Display for DiscrepancySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().into_iter().collect();
        write!(f, "Column discrepancies found for {}", names.join(", "))
    }
}

/// A format-file layout whose columns exactly match the table's.
///
/// Only [`reconcile`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledLayout {
    columns: Vec<ColumnSpec>,
    ranges: Vec<OffsetRange>,
}

impl ReconciledLayout {
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn ranges(&self) -> &[OffsetRange] {
        &self.ranges
    }
}

pub fn reconcile(
    layout: DescriptorLayout,
    authoritative: &AuthoritativeColumnSet,
) -> CompileResult<ReconciledLayout> {
    let discrepancies = DiscrepancySet::between(&layout.names(), &authoritative.full);
    if !discrepancies.is_empty() {
        warn!(
            missing = ?discrepancies.missing_from_descriptor,
            unknown = ?discrepancies.unknown_to_schema,
            "descriptor and table disagree"
        );
        return Err(CompileError::Reconciliation(discrepancies));
    }
    debug!(columns = layout.columns().len(), "descriptor matches table");
    let (columns, ranges) = layout.into_parts();
    Ok(ReconciledLayout { columns, ranges })
}
