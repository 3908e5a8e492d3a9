//! # objcgen
//!
//! Core of the Objective-C wrapper generator for a C++ computer-vision
//! library. Given machine-readable declarations produced by an external
//! header parser, it emits per module a set of `.h`/`.mm` sources: one
//! Objective-C class per wrapped C++ class, with selector-named methods that
//! marshal arguments to and from the underlying C++ API.
//!
//! The pipeline:
//!
//! 1. [`parser::HeaderParser`] supplies positional declaration tuples and the
//!    known namespace set for each header.
//! 2. [`Generator`] ingests the tuples into the declaration model
//!    ([`model`]), maintaining the wrapped-class registry and the
//!    [`types::TypeRegistry`] that drives marshalling.
//! 3. The emission engine expands every function into its default-argument
//!    variants, plans the Objective-C parameter list, the C++ call-site
//!    arguments and the bridging prologue/epilogue for each variant, and
//!    renders header/body files through `$name` templates.
//! 4. Files are written with write-if-changed semantics ([`output`]) and a
//!    per-module coverage report is produced ([`report`]).
//!
//! Configuration is layered: built-in defaults, then each module's
//! `gen_dict.json` merged on top (list keys append, scalar and map keys are
//! last-writer-wins). See [`config`].

use std::path::PathBuf;

use thiserror::Error;

pub mod config;
pub mod decl;
pub mod emit;
pub mod generator;
pub mod model;
pub mod output;
pub mod parser;
pub mod report;
pub mod templates;
pub mod types;

pub use config::{GenConfig, ModuleConfig, TopConfig};
pub use generator::Generator;
pub use output::FileWriter;
pub use parser::{CommandParser, HeaderParser, StaticParser};
pub use types::{TypeEntry, TypeRegistry};

/// Errors that abort a generator run.
///
/// Recoverable conditions (unknown types, duplicate declarations, functions
/// whose class is not wrapped) never surface here: they are logged, recorded
/// in the per-module report and reduce coverage only.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON from {}: {source}", path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed declaration tuple: {0}")]
    MalformedDecl(String),

    #[error("failed to run header parser {}: {source}", command.display())]
    ParserSpawn {
        command: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("header parser {} exited with {status}", command.display())]
    ParserFailed {
        command: PathBuf,
        status: std::process::ExitStatus,
    },

    #[error("header parser produced invalid output: {0}")]
    ParserOutput(#[source] serde_json::Error),

    #[error("invalid ignore-list pattern: {0}")]
    BadPattern(#[from] regex::Error),

    #[error("remapped source {} resolves to a template input", path.display())]
    RemapToTemplate { path: PathBuf },

    #[error(transparent)]
    Template(#[from] templates::TemplateError),
}

pub type Result<T> = std::result::Result<T, Error>;
