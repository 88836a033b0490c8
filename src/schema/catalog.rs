// src/schema/catalog.rs

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, trace};

use super::types::AuthoritativeColumnSet;
use crate::error::{CompileError, CompileResult};

/// Columns of `NEW_MEMBER` named like this are never part of the format file.
pub const DEFAULT_EXCLUDE_PATTERN: &str = "%_VOTING_KEY";
pub const DEFAULT_OWNER: &str = "COPE";
pub const DEFAULT_TABLE: &str = "NEW_MEMBER";

/// A SQL `LIKE` pattern (`%` any run, `_` any single character), matched
/// case-sensitively against the whole column name.
#[derive(Debug, Clone)]
pub struct ExcludePattern {
    like: String,
    re: Regex,
}

impl ExcludePattern {
    pub fn new(like: &str) -> Result<Self> {
        let mut expr = String::with_capacity(like.len() * 2 + 2);
        expr.push('^');
        for ch in like.chars() {
            match ch {
                '%' => expr.push_str(".*"),
                '_' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');
        let re = Regex::new(&expr)
            .with_context(|| format!("translating LIKE pattern `{}`", like))?;
        Ok(Self {
            like: like.to_string(),
            re,
        })
    }

    pub fn as_like(&self) -> &str {
        &self.like
    }

    pub fn matches(&self, column_name: &str) -> bool {
        self.re.is_match(column_name)
    }
}

/// Read side of the authoritative schema, scoped to one logical table.
pub trait SchemaCatalog {
    /// Every column of the table except those matching `exclude`.
    fn list_columns(&self, exclude: &ExcludePattern) -> Result<BTreeSet<String>>;

    /// VARCHAR2 columns whose length is declared in characters.
    fn list_char_semantics_columns(&self) -> Result<BTreeSet<String>>;
}

/// Pull both column sets, once, for a single compilation.
#[instrument(level = "debug", skip_all, fields(exclude = %exclude.as_like()))]
pub fn fetch_authoritative(
    catalog: &dyn SchemaCatalog,
    exclude: &ExcludePattern,
) -> CompileResult<AuthoritativeColumnSet> {
    let char_semantics = catalog
        .list_char_semantics_columns()
        .map_err(|e| CompileError::collaborator("list_char_semantics_columns", e))?;
    let full = catalog
        .list_columns(exclude)
        .map_err(|e| CompileError::collaborator("list_columns", e))?;
    debug!(
        columns = full.len(),
        char_columns = char_semantics.len(),
        "fetched authoritative columns"
    );
    Ok(AuthoritativeColumnSet::new(full, char_semantics))
}

/// One row of an `ALL_TAB_COLUMNS` export.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TabColumnRow {
    #[serde(alias = "OWNER")]
    pub owner: String,
    #[serde(alias = "TABLE_NAME")]
    pub table_name: String,
    #[serde(alias = "COLUMN_NAME")]
    pub column_name: String,
    #[serde(alias = "DATA_TYPE")]
    pub data_type: String,
    /// `B`, `C`, or absent for non-character types.
    #[serde(alias = "CHAR_USED", default)]
    pub char_used: Option<String>,
}

/// Catalog answered from an exported snapshot of the dictionary view.
pub struct SnapshotCatalog {
    owner: String,
    table: String,
    rows: Vec<TabColumnRow>,
}

impl SnapshotCatalog {
    pub fn new(owner: &str, table: &str, rows: Vec<TabColumnRow>) -> Self {
        Self {
            owner: owner.to_string(),
            table: table.to_string(),
            rows,
        }
    }

    /// Load a `.json` or YAML snapshot (a list of rows).
    pub fn load<P: AsRef<Path>>(path: P, owner: &str, table: &str) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading schema snapshot {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let rows: Vec<TabColumnRow> = if is_json {
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing JSON snapshot {}", path.display()))?
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("parsing YAML snapshot {}", path.display()))?
        };
        debug!(path = %path.display(), rows = rows.len(), "loaded schema snapshot");
        Ok(Self::new(owner, table, rows))
    }

    fn table_rows(&self) -> impl Iterator<Item = &TabColumnRow> {
        self.rows
            .iter()
            .filter(move |r| r.owner == self.owner && r.table_name == self.table)
    }
}

impl SchemaCatalog for SnapshotCatalog {
    fn list_columns(&self, exclude: &ExcludePattern) -> Result<BTreeSet<String>> {
        Ok(self
            .table_rows()
            .filter(|r| {
                let skip = exclude.matches(&r.column_name);
                if skip {
                    trace!(column = %r.column_name, "excluded by pattern");
                }
                !skip
            })
            .map(|r| r.column_name.clone())
            .collect())
    }

    fn list_char_semantics_columns(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .table_rows()
            .filter(|r| r.data_type == "VARCHAR2" && r.char_used.as_deref() == Some("C"))
            .map(|r| r.column_name.clone())
            .collect())
    }
}
