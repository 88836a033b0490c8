// src/compiler.rs

use std::{collections::BTreeSet, fmt, path::Path};
use tracing::{debug, error, info, instrument};

use crate::ddl::{ExternalTableDdl, ExternalTableNames};
use crate::descriptor::{parse_descriptor, read_descriptor, DescriptorLayout};
use crate::error::{CompileError, CompileResult};
use crate::reconcile::reconcile;
use crate::schema::{fetch_authoritative, AuthoritativeColumnSet, ExcludePattern, SchemaCatalog};

/// Steps of one compilation, run once each and in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    FetchSchema,
    Parse,
    Reconcile,
    Render,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Stage::FetchSchema => "fetch_schema",
            Stage::Parse => "parse",
            Stage::Reconcile => "reconcile",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDdl {
    pub table_name: String,
    pub text: String,
}

pub struct Compiler<'a> {
    catalog: &'a dyn SchemaCatalog,
    exclude: &'a ExcludePattern,
    directory_name: &'a str,
}

impl<'a> Compiler<'a> {
    pub fn new(
        catalog: &'a dyn SchemaCatalog,
        exclude: &'a ExcludePattern,
        directory_name: &'a str,
    ) -> Self {
        Self {
            catalog,
            exclude,
            directory_name,
        }
    }

    /// Compile the format file at `descriptor`.
    #[instrument(
        level = "info",
        skip_all,
        fields(descriptor = %descriptor.display(), table = %names.table_name)
    )]
    pub fn compile(
        &self,
        descriptor: &Path,
        names: &ExternalTableNames,
    ) -> CompileResult<CompiledDdl> {
        if !descriptor.is_file() {
            return Err(CompileError::configuration(format!(
                "no such descriptor file: {}",
                descriptor.display()
            )));
        }
        self.run(names, |chars| read_descriptor(descriptor, chars))
    }

    /// Compile a descriptor already held in memory.
    pub fn compile_str(
        &self,
        descriptor: &str,
        names: &ExternalTableNames,
    ) -> CompileResult<CompiledDdl> {
        self.run(names, |chars| parse_descriptor(descriptor.lines().map(Ok), chars))
    }

    fn run<F>(&self, names: &ExternalTableNames, parse: F) -> CompileResult<CompiledDdl>
    where
        F: FnOnce(&BTreeSet<String>) -> CompileResult<DescriptorLayout>,
    {
        let authoritative: AuthoritativeColumnSet =
            at_stage(Stage::FetchSchema, || fetch_authoritative(self.catalog, self.exclude))?;
        info!(
            columns = authoritative.full.len(),
            char_columns = authoritative.char_semantics.len(),
            "schema fetched"
        );

        let layout = at_stage(Stage::Parse, || parse(&authoritative.char_semantics))?;
        info!(
            columns = layout.columns().len(),
            width = layout.record_width(),
            "descriptor parsed"
        );

        let reconciled = at_stage(Stage::Reconcile, || reconcile(layout, &authoritative))?;

        let text = at_stage(Stage::Render, || {
            Ok(ExternalTableDdl {
                names,
                directory_name: self.directory_name,
                layout: &reconciled,
            }
            .render())
        })?;
        info!(bytes = text.len(), "DDL rendered");

        Ok(CompiledDdl {
            table_name: names.table_name.clone(),
            text,
        })
    }
}

fn at_stage<T>(stage: Stage, step: impl FnOnce() -> CompileResult<T>) -> CompileResult<T> {
    debug!(stage = %stage, "entering stage");
    step().map_err(|e| {
        error!(stage = %stage, error = %e, "compilation aborted");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SnapshotCatalog, TabColumnRow, DEFAULT_EXCLUDE_PATTERN};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn catalog(cols: &[(&str, &str)]) -> SnapshotCatalog {
        let rows = cols
            .iter()
            .map(|(name, used)| TabColumnRow {
                owner: "COPE".into(),
                table_name: "NEW_MEMBER".into(),
                column_name: name.to_string(),
                data_type: "VARCHAR2".into(),
                char_used: Some(used.to_string()),
            })
            .collect();
        SnapshotCatalog::new("COPE", "NEW_MEMBER", rows)
    }

    fn exclude() -> ExcludePattern {
        ExcludePattern::new(DEFAULT_EXCLUDE_PATTERN).unwrap()
    }

    #[test]
    fn compiles_matching_descriptor() {
        let cat = catalog(&[("NAME", "B"), ("CITY", "C"), ("WARD_VOTING_KEY", "B")]);
        let ex = exclude();
        let names = ExternalTableNames::for_affiliate("afl").unwrap();
        let out = Compiler::new(&cat, &ex, "MEMBER_DIR")
            .compile_str("name,10\ncity,15\nEOR,0\n", &names)
            .unwrap();
        assert_eq!(out.table_name, "NEW_MEMBER_AFL_EXT");
        assert!(out.text.contains("NAME VARCHAR2(10 BYTE)"));
        assert!(out.text.contains("CITY VARCHAR2(15 CHAR)"));
        assert!(out.text.contains("\"CITY\"\tPOSITION(11:25)"));
        assert!(!out.text.contains("VOTING_KEY"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let cat = catalog(&[("NAME", "B"), ("ADDR", "C")]);
        let ex = exclude();
        let names = ExternalTableNames::for_affiliate("afl").unwrap();
        let compiler = Compiler::new(&cat, &ex, "D");
        let a = compiler.compile_str("NAME,10\nADDR,20\nEOR,0", &names).unwrap();
        let b = compiler.compile_str("NAME,10\nADDR,20\nEOR,0", &names).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mismatch_aborts_before_render() {
        let cat = catalog(&[("NAME", "B"), ("ADDR", "B"), ("PHONE", "B")]);
        let ex = exclude();
        let names = ExternalTableNames::for_affiliate("afl").unwrap();
        let err = Compiler::new(&cat, &ex, "D")
            .compile_str("NAME,10\nADDR,20\nEOR,0", &names)
            .unwrap_err();
        match err {
            CompileError::Reconciliation(d) => {
                let expected: BTreeSet<String> = ["PHONE".to_string()].into();
                assert_eq!(d.missing_from_descriptor, expected);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct Unreachable;

    impl SchemaCatalog for Unreachable {
        fn list_columns(&self, _: &ExcludePattern) -> anyhow::Result<BTreeSet<String>> {
            anyhow::bail!("ORA-12541: TNS:no listener")
        }
        fn list_char_semantics_columns(&self) -> anyhow::Result<BTreeSet<String>> {
            anyhow::bail!("ORA-12541: TNS:no listener")
        }
    }

    #[test]
    fn schema_failure_is_collaborator_error() {
        let ex = exclude();
        let names = ExternalTableNames::for_affiliate("afl").unwrap();
        let err = Compiler::new(&Unreachable, &ex, "D")
            .compile_str("NAME,10\nEOR,0", &names)
            .unwrap_err();
        assert!(matches!(err, CompileError::Collaborator { .. }));
    }

    #[test]
    fn compiles_from_file() -> anyhow::Result<()> {
        let cat = catalog(&[("NAME", "B"), ("ADDR", "B")]);
        let ex = exclude();
        let names = ExternalTableNames::for_affiliate("seiu")?;
        let mut f = NamedTempFile::new()?;
        write!(f, "NAME,10\nADDR,20\nEOR,0\ntrailer that is never read\n")?;
        let out = Compiler::new(&cat, &ex, "D").compile(f.path(), &names)?;
        assert!(out.text.contains("( 'seiu_good.txt'"));
        Ok(())
    }

    #[test]
    fn missing_descriptor_fails_before_schema_access() {
        let ex = exclude();
        let names = ExternalTableNames::for_affiliate("afl").unwrap();
        let err = Compiler::new(&Unreachable, &ex, "D")
            .compile(Path::new("/nonexistent/afl.fmt"), &names)
            .unwrap_err();
        assert!(matches!(err, CompileError::Configuration(_)));
    }

    #[test]
    fn parse_failure_is_reported() {
        let cat = catalog(&[("NAME", "B")]);
        let ex = exclude();
        let names = ExternalTableNames::for_affiliate("afl").unwrap();
        let err = Compiler::new(&cat, &ex, "D")
            .compile_str("NAME,abc\nEOR,0", &names)
            .unwrap_err();
        assert!(matches!(err, CompileError::Parse { line: 1, .. }));
    }
}
