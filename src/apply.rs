// src/apply.rs

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::error::{CompileError, CompileResult};

/// Server-side procedure that (re)creates an external table from DDL text.
pub const CREATE_OR_REPLACE_PROCEDURE: &str =
    "code.ddl_utilities.create_or_replace_external_table";

/// Installs generated DDL. Implementations must have create-or-replace
/// semantics; `table_name` is unqualified and unquoted.
pub trait DdlApplier {
    fn apply_external_table_ddl(&self, table_name: &str, ddl: &str) -> Result<()>;
}

/// Hand `ddl` to `applier`, mapping failures into the run's error type.
pub fn apply(applier: &dyn DdlApplier, table_name: &str, ddl: &str) -> CompileResult<()> {
    applier
        .apply_external_table_ddl(table_name, ddl)
        .map_err(|e| CompileError::collaborator("apply_external_table_ddl", e))
}

/// Who the generated script logs in as; the password is left to SQL*Plus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub username: String,
    pub dbname: String,
}

/// Writes a SQL*Plus script `<table>.sql` that calls
/// [`CREATE_OR_REPLACE_PROCEDURE`]. Rewriting the script replaces any
/// previous one for the same table.
pub struct ScriptApplier {
    out_dir: PathBuf,
    target: ConnectTarget,
}

impl ScriptApplier {
    pub fn new<P: AsRef<Path>>(out_dir: P, target: ConnectTarget) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            target,
        }
    }

    pub fn script_path(&self, table_name: &str) -> PathBuf {
        self.out_dir
            .join(format!("{}.sql", table_name.to_lowercase()))
    }

    pub fn script(&self, table_name: &str, ddl: &str) -> String {
        format!(
            "-- {table_name}: generated {stamp}\n\
             CONNECT {user}@{db}\n\
             WHENEVER SQLERROR EXIT SQL.SQLCODE\n\
             BEGIN\n  {proc}(\n    '{table_name}',\n    {literal}\n  );\nEND;\n/\nEXIT\n",
            table_name = table_name,
            stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            user = self.target.username,
            db = self.target.dbname,
            proc = CREATE_OR_REPLACE_PROCEDURE,
            literal = plsql_literal(ddl),
        )
    }
}

impl DdlApplier for ScriptApplier {
    fn apply_external_table_ddl(&self, table_name: &str, ddl: &str) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating {}", self.out_dir.display()))?;
        let path = self.script_path(table_name);
        let tmp_path = self
            .out_dir
            .join(format!(".{}.sql.tmp", table_name.to_lowercase()));

        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        tmp.write_all(self.script(table_name, ddl).as_bytes())
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        drop(tmp);

        fs::rename(&tmp_path, &path).with_context(|| {
            format!("renaming {} -> {}", tmp_path.display(), path.display())
        })?;
        debug!(bytes = ddl.len(), "wrote apply script");
        info!(table = %table_name, script = %path.display(), "apply script ready");
        Ok(())
    }
}

/// Quote `text` as a PL/SQL literal, preferring `q'<d>...<d>'` so the DDL's
/// own quotes survive untouched.
fn plsql_literal(text: &str) -> String {
    const DELIMS: [(char, char); 5] = [('[', ']'), ('{', '}'), ('<', '>'), ('(', ')'), ('!', '!')];
    for (open, close) in DELIMS {
        if !text.contains(&format!("{}'", close)) {
            return format!("q'{}{}{}'", open, text, close);
        }
    }
    format!("'{}'", text.replace('\'', "''"))
}
