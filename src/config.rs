// src/config.rs

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::apply::ConnectTarget;
use crate::error::{CompileError, CompileResult};
use crate::schema::{ExcludePattern, DEFAULT_EXCLUDE_PATTERN, DEFAULT_OWNER, DEFAULT_TABLE};

/// Contents of the connection-configuration file.
///
/// ```yaml
/// database:
///   username: cope_loader
///   dbname: MEMBERS
///   directory_name: MEMBER_UPDATE_DIR
/// schema:
///   snapshot: new_member_columns.yaml
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    database: Option<RawDatabase>,
    #[serde(default)]
    schema: SchemaSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawDatabase {
    username: Option<String>,
    dbname: Option<String>,
    directory_name: Option<String>,
}

/// Where the authoritative column list comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaSection {
    pub owner: String,
    pub table: String,
    /// `ALL_TAB_COLUMNS` export; relative paths resolve against the config file.
    pub snapshot: Option<PathBuf>,
    /// SQL `LIKE` pattern of table columns the format file never carries.
    pub exclude_pattern: String,
}

impl Default for SchemaSection {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            table: DEFAULT_TABLE.to_string(),
            snapshot: None,
            exclude_pattern: DEFAULT_EXCLUDE_PATTERN.to_string(),
        }
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connect: ConnectTarget,
    /// Oracle directory object for the data, bad and log files.
    pub directory_name: String,
    pub owner: String,
    pub table: String,
    pub snapshot: PathBuf,
    pub exclude: ExcludePattern,
}

impl Settings {
    pub fn load(path: &Path) -> CompileResult<Self> {
        if !path.is_file() {
            return Err(CompileError::configuration(format!(
                "No such file: {}",
                path.display()
            )));
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            CompileError::configuration(format!("reading {}: {}", path.display(), e))
        })?;
        let cfg: DbConfig = serde_yaml::from_str(&raw).map_err(|e| {
            CompileError::configuration(format!("parsing {}: {}", path.display(), e))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let settings = Self::from_config(cfg, base)?;
        debug!(
            path = %path.display(),
            directory = %settings.directory_name,
            snapshot = %settings.snapshot.display(),
            "loaded configuration"
        );
        Ok(settings)
    }

    pub fn from_config(cfg: DbConfig, base: &Path) -> CompileResult<Self> {
        let db = cfg
            .database
            .ok_or_else(|| CompileError::configuration("No database found"))?;
        let username = required(db.username, "username")?;
        let dbname = required(db.dbname, "dbname")?;
        let directory_name = required(db.directory_name, "directory_name")?;

        let schema = cfg.schema;
        let snapshot = schema
            .snapshot
            .ok_or_else(|| CompileError::configuration("Missing parameter schema.snapshot"))?;
        let snapshot = if snapshot.is_relative() {
            base.join(snapshot)
        } else {
            snapshot
        };
        let exclude = ExcludePattern::new(&schema.exclude_pattern).map_err(|e| {
            CompileError::configuration(format!("exclude_pattern: {:#}", e))
        })?;

        Ok(Self {
            connect: ConnectTarget { username, dbname },
            directory_name,
            owner: schema.owner,
            table: schema.table,
            snapshot,
            exclude,
        })
    }
}

fn required(value: Option<String>, key: &str) -> CompileResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CompileError::configuration(format!(
            "Missing parameter {}",
            key
        ))),
    }
}
