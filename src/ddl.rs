// src/ddl.rs

//! Rendering of the `ORGANIZATION EXTERNAL` statement.
//!
//! The statement layout is fixed: one VARCHAR2 per column, read by
//! ORACLE_LOADER from a newline-delimited fixed-width file, with unlimited
//! rejects going to `<table>.bad`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompileError, CompileResult};
use crate::reconcile::ReconciledLayout;

/// The only column type external tables are declared with.
pub const COLUMN_TYPE: &str = "VARCHAR2";

static AFFILIATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static regex"));

/// Names derived from the affiliate acronym.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTableNames {
    /// `NEW_MEMBER_<AFFILIATE>_EXT`, unquoted and without schema prefix.
    pub table_name: String,
    /// `<affiliate>_good.txt`
    pub file_name: String,
}

impl ExternalTableNames {
    pub fn for_affiliate(acronym: &str) -> CompileResult<Self> {
        let acronym = acronym.trim();
        if !AFFILIATE_RE.is_match(acronym) {
            return Err(CompileError::configuration(format!(
                "affiliate acronym `{}` is not a plain identifier",
                acronym
            )));
        }
        Ok(Self {
            table_name: format!("NEW_MEMBER_{}_EXT", acronym.to_uppercase()),
            file_name: format!("{}_good.txt", acronym.to_lowercase()),
        })
    }

    pub fn bad_file(&self) -> String {
        format!("{}.bad", self.table_name.to_lowercase())
    }

    pub fn log_file(&self) -> String {
        format!("{}.log", self.table_name.to_lowercase())
    }
}

/// Everything the template needs; all fields are mandatory.
#[derive(Debug, Clone, Copy)]
pub struct ExternalTableDdl<'a> {
    pub names: &'a ExternalTableNames,
    /// Oracle directory object holding the data, bad and log files.
    pub directory_name: &'a str,
    pub layout: &'a ReconciledLayout,
}

impl ExternalTableDdl<'_> {
    /// `NAME VARCHAR2(len UNIT)` per column.
    pub fn column_definitions(&self) -> Vec<String> {
        self.layout
            .columns()
            .iter()
            .map(|c| format!("{} {}({} {})", c.name(), COLUMN_TYPE, c.length(), c.unit()))
            .collect()
    }

    /// `"NAME"<TAB>POSITION(first:last)` per column.
    pub fn field_positions(&self) -> Vec<String> {
        self.layout
            .ranges()
            .iter()
            .map(|r| format!("\"{}\"\tPOSITION({}:{})", r.column_name, r.first, r.last))
            .collect()
    }

    pub fn render(&self) -> String {
        let columns_with_lengths = self.column_definitions().join(",\n    ");
        let columns_with_offsets = self.field_positions().join(",\n       ");
        format!(
            "CREATE TABLE {table_name}
  ({columns_with_lengths}
  )
  ORGANIZATION EXTERNAL
   (TYPE ORACLE_LOADER
    DEFAULT DIRECTORY {directory_name}
    ACCESS PARAMETERS
    ( records delimited by newline
      badfile {directory_name}:'{bad_file}'
      logfile {directory_name}:'{log_file}'
      fields
      ({columns_with_offsets})
    )
    LOCATION
    ( '{file_name}'
    )
  )
  REJECT LIMIT UNLIMITED
",
            table_name = self.names.table_name,
            columns_with_lengths = columns_with_lengths,
            directory_name = self.directory_name,
            bad_file = self.names.bad_file(),
            log_file = self.names.log_file(),
            columns_with_offsets = columns_with_offsets,
            file_name = self.names.file_name,
        )
    }
}
