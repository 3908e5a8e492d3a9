//! Declaration tuples from the header parser and dotted-name resolution.
//!
//! The header parser hands over positional tuples
//! `[name, ret_or_base, modifiers, children, reserved, docstring?]`. The
//! `children` entries stay schemaless here: a class's children are
//! properties, a function's are arguments, an enum's are nested constant
//! tuples, and the ingestor interprets them per declaration kind.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::{Error, Result};

/// One declaration tuple as produced by the header parser.
#[derive(Debug, Clone, Default)]
pub struct RawDecl {
    /// Head token plus fully-qualified dotted name, e.g. `"class Size"` or
    /// `"cv.add"`.
    pub name: String,
    /// Return type for functions, `": Base"` for classes, value for consts.
    pub ret: String,
    /// Modifier tokens (`/S`, `=ObjcName`, ...).
    pub modifiers: Vec<String>,
    /// Properties, arguments or nested constants, depending on the kind.
    pub children: Vec<Value>,
    /// Doxygen comment attached to the declaration, possibly empty.
    pub docstring: String,
}

impl RawDecl {
    /// Decode a positional JSON tuple.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::MalformedDecl(format!("expected array, got {value}")))?;
        let name = items
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedDecl("missing declaration name".into()))?
            .to_string();
        let ret = match items.get(1) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => scalar_to_string(other),
        };
        let modifiers = items
            .get(2)
            .and_then(Value::as_array)
            .map(|mods| flatten_modifiers(mods))
            .unwrap_or_default();
        let children = items
            .get(3)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let docstring = items
            .get(5)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            name,
            ret,
            modifiers,
            children,
            docstring,
        })
    }
}

/// Modifier lists occasionally arrive nested one level deep; flatten them to
/// plain tokens.
fn flatten_modifiers(mods: &[Value]) -> Vec<String> {
    let mut out = Vec::new();
    for m in mods {
        match m {
            Value::String(s) => out.push(s.clone()),
            Value::Array(inner) => {
                out.extend(inner.iter().filter_map(Value::as_str).map(str::to_string))
            }
            _ => {}
        }
    }
    out
}

/// Render a JSON scalar the way it appears in generated source.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A fully-qualified dotted name resolved against the known namespace set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub namespace: String,
    pub classpath: String,
    pub classname: String,
    pub name: String,
}

impl NameParts {
    /// Resolve `"ns1.ns2.Class.Sub.name"` into its parts. A `class`/`struct`/
    /// `const`/`enum` token preceding the name is stripped first; the longest
    /// matching namespace wins.
    pub fn parse(raw: &str, namespaces: &BTreeSet<String>) -> Self {
        let name = match raw.find(' ') {
            Some(pos) => raw[pos + 1..].trim(),
            None => raw.trim(),
        };

        let mut space_name = String::new();
        let mut local_name = name.to_string();
        let mut sorted: Vec<&String> = namespaces.iter().collect();
        sorted.sort_by_key(|ns| std::cmp::Reverse(ns.len()));
        for ns in sorted {
            let prefix = format!("{ns}.");
            if name.starts_with(&prefix) {
                space_name = ns.clone();
                local_name = name.replacen(&prefix, "", 1);
                break;
            }
        }

        let pieces: Vec<&str> = local_name.split('.').collect();
        match pieces.len() {
            0 => Self::default(),
            1 => Self {
                namespace: space_name,
                classpath: String::new(),
                classname: String::new(),
                name: pieces[0].to_string(),
            },
            2 => Self {
                namespace: space_name,
                classpath: pieces[0].to_string(),
                classname: pieces[0].to_string(),
                name: pieces[1].to_string(),
            },
            n => Self {
                namespace: space_name,
                classpath: pieces[..n - 1].join("."),
                classname: pieces[n - 2].to_string(),
                name: pieces[n - 1].to_string(),
            },
        }
    }

    /// Dotted enclosing scope: namespace plus classpath, empty pieces elided.
    pub fn full_class(&self) -> String {
        std::iter::once(self.namespace.as_str())
            .chain(self.classpath.split('.'))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Enclosing scope as a C++ qualified name.
    pub fn full_class_cpp(&self) -> String {
        cpp_name(&self.full_class())
    }

    /// Dotted fully-qualified name including the local name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.full_class(), self.name)
    }

    /// Fully-qualified C++ name.
    pub fn full_name_cpp(&self) -> String {
        cpp_name(&self.full_name())
    }
}

/// Turn a dotted name into a C++ qualified name.
pub fn cpp_name(name: &str) -> String {
    name.replace('.', "::")
}

/// Registry key for an enum's C++ name: the leading `cv.` namespace is
/// dropped and remaining dots become underscores.
pub fn normalize_class_name(name: &str) -> String {
    name.strip_prefix("cv.").unwrap_or(name).replace('.', "_")
}

/// Capitalize the first character and lowercase the rest, as used for module
/// umbrella class names and constructor selector stems.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Normalize a doxygen comment into a `/** .. */` block, or an empty string
/// when the comment carries no content.
pub fn sanitize_docstring(doc: &str) -> String {
    let lines: Vec<String> = doc
        .lines()
        .map(|x| {
            if x.trim_start().starts_with('*') {
                match x.find('*') {
                    Some(pos) => x[pos..].trim().to_string(),
                    None => x.to_string(),
                }
            } else {
                x.to_string()
            }
        })
        .map(|x| {
            if x.starts_with('*') && x != "*" {
                format!("* {}", x[1..].trim())
            } else {
                x
            }
        })
        .map(|x| {
            if x.starts_with('*') {
                x
            } else if !x.is_empty() && x != "*" {
                format!("* {x}")
            } else {
                "*".to_string()
            }
        })
        .collect();

    if lines.iter().any(|l| l != "*") {
        format!("/**\n {}\n */", lines.join("\n "))
    } else {
        String::new()
    }
}
