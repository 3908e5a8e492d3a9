//! Header parser contract.
//!
//! C++ parsing itself lives outside this crate: the generator only consumes
//! positional declaration tuples plus the set of namespaces the parser has
//! seen so far. [`CommandParser`] adapts an external parser executable to
//! that contract; [`StaticParser`] feeds a fixed declaration list and backs
//! the test suite.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::decl::RawDecl;
use crate::{Error, Result};

/// Source of declaration tuples for the generator.
pub trait HeaderParser {
    /// Parse one header into declaration tuples. Namespace knowledge
    /// accumulates across calls and is re-read after every parse.
    fn parse(&mut self, header: &Path) -> Result<Vec<RawDecl>>;

    /// Namespaces known after the most recent parse.
    fn namespaces(&self) -> &BTreeSet<String>;
}

#[derive(Debug, Deserialize)]
struct ParserOutput {
    #[serde(default)]
    namespaces: Vec<String>,
    #[serde(default)]
    decls: Vec<serde_json::Value>,
}

/// Runs an external parser executable once per header.
///
/// The executable is invoked with the header path as its single argument and
/// must print one JSON object `{ "namespaces": [...], "decls": [...] }` to
/// stdout. A non-zero exit status or malformed output aborts the run.
pub struct CommandParser {
    command: PathBuf,
    namespaces: BTreeSet<String>,
}

impl CommandParser {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            namespaces: ["cv".to_string()].into_iter().collect(),
        }
    }
}

impl HeaderParser for CommandParser {
    fn parse(&mut self, header: &Path) -> Result<Vec<RawDecl>> {
        let output = Command::new(&self.command)
            .arg(header)
            .output()
            .map_err(|source| Error::ParserSpawn {
                command: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(Error::ParserFailed {
                command: self.command.clone(),
                status: output.status,
            });
        }
        let parsed: ParserOutput =
            serde_json::from_slice(&output.stdout).map_err(Error::ParserOutput)?;
        self.namespaces.extend(parsed.namespaces);
        parsed
            .decls
            .iter()
            .map(RawDecl::from_value)
            .collect::<Result<Vec<_>>>()
    }

    fn namespaces(&self) -> &BTreeSet<String> {
        &self.namespaces
    }
}

/// In-memory parser over a fixed declaration list, one batch per `parse`
/// call. Intended for tests and embedding.
#[derive(Debug, Default)]
pub struct StaticParser {
    decls: Vec<Vec<RawDecl>>,
    namespaces: BTreeSet<String>,
    next: usize,
}

impl StaticParser {
    pub fn new(namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            decls: Vec::new(),
            namespaces: namespaces.into_iter().collect(),
            next: 0,
        }
    }

    /// Queue one header's worth of declarations.
    pub fn push_header(&mut self, decls: Vec<RawDecl>) {
        self.decls.push(decls);
    }

    /// Queue declarations given as JSON tuples.
    pub fn push_header_json(&mut self, decls: &[serde_json::Value]) -> Result<()> {
        let decoded = decls
            .iter()
            .map(RawDecl::from_value)
            .collect::<Result<Vec<_>>>()?;
        self.decls.push(decoded);
        Ok(())
    }
}

impl HeaderParser for StaticParser {
    fn parse(&mut self, _header: &Path) -> Result<Vec<RawDecl>> {
        let batch = self.decls.get(self.next).cloned().unwrap_or_default();
        self.next += 1;
        Ok(batch)
    }

    fn namespaces(&self) -> &BTreeSet<String> {
        &self.namespaces
    }
}
