// src/main.rs

use anyhow::Result;
use clap::Parser;
use extddl::{
    apply::{self, ScriptApplier},
    config::Settings,
    ddl::ExternalTableNames,
    schema::SnapshotCatalog,
    CompileError, Compiler,
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Generate DDL for an external table from a FirstLogic format file.
#[derive(Parser, Debug)]
#[command(name = "extddl")]
struct Args {
    /// YAML file with the `database` (and `schema`) sections
    dbconfig_path: PathBuf,

    /// Format file: `NAME,LENGTH` lines ending with `EOR`
    fmt_path: PathBuf,

    /// Affiliate acronym, e.g. `afl`
    affiliate_acronym: String,

    /// Display the DDL without applying it
    #[arg(long)]
    show_only: bool,

    /// Where the apply script is written
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!(descriptor = %args.fmt_path.display(), affiliate = %args.affiliate_acronym, "startup");

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
    info!("all done");
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    // ─── 2) configuration ────────────────────────────────────────────
    let settings = Settings::load(&args.dbconfig_path)?;
    let names = ExternalTableNames::for_affiliate(&args.affiliate_acronym)?;

    // ─── 3) authoritative schema ─────────────────────────────────────
    let catalog = SnapshotCatalog::load(&settings.snapshot, &settings.owner, &settings.table)
        .map_err(|e| CompileError::collaborator("load_schema_snapshot", e))?;

    // ─── 4) compile ──────────────────────────────────────────────────
    let compiled = Compiler::new(&catalog, &settings.exclude, &settings.directory_name)
        .compile(&args.fmt_path, &names)?;

    // ─── 5) show or apply ────────────────────────────────────────────
    if args.show_only {
        println!("{}", compiled.text);
        return Ok(());
    }
    let applier = ScriptApplier::new(&args.out_dir, settings.connect.clone());
    apply::apply(&applier, &compiled.table_name, &compiled.text)?;
    Ok(())
}
