// src/error.rs

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::reconcile::DiscrepancySet;

pub type CompileResult<T> = Result<T, CompileError>;

/// Every variant is terminal for the run: nothing is retried and no partial
/// DDL is produced or applied.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Connection/storage parameters absent, descriptor missing, bad acronym.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("reading descriptor {}: {source}", .path.display())]
    DescriptorIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("descriptor line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("{0}")]
    Reconciliation(DiscrepancySet),

    /// Schema lookup or DDL application failed.
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl CompileError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        CompileError::Configuration(msg.into())
    }

    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        CompileError::Parse {
            line,
            reason: reason.into(),
        }
    }

    pub fn collaborator(operation: &'static str, source: anyhow::Error) -> Self {
        CompileError::Collaborator {
            operation,
            source: source.into(),
        }
    }
}
