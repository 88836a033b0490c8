// src/lib.rs

//! Compile a FirstLogic fixed-width format file into the DDL of an Oracle
//! external table mirroring `COPE.NEW_MEMBER`.
//!
//! The pipeline is `FetchSchema → Parse → Reconcile → Render`, driven by
//! [`compiler::Compiler`].

pub mod apply;
pub mod compiler;
pub mod config;
pub mod ddl;
pub mod descriptor;
pub mod error;
pub mod reconcile;
pub mod schema;

pub use compiler::{CompiledDdl, Compiler, Stage};
pub use error::{CompileError, CompileResult};
