//! `$name` template substitution for the emission engine.
//!
//! Templates are opaque text fragments with `$name` (or `${name}`)
//! placeholders. Substitution is a single pass: no recursive evaluation, and
//! a placeholder with no binding is an error rather than silently passed
//! through. `$$` renders a literal `$`.

use std::collections::HashMap;

use thiserror::Error;

/// Objective-C class header template (non-umbrella classes).
pub const CLASS_HEADER: &str = include_str!("../templates/objc_class_header.template");
/// Objective-C class body template (non-umbrella classes).
pub const CLASS_BODY: &str = include_str!("../templates/objc_class_body.template");
/// Header template for the per-module umbrella class.
pub const MODULE_HEADER: &str = include_str!("../templates/objc_module_header.template");
/// Body template for the per-module umbrella class.
pub const MODULE_BODY: &str = include_str!("../templates/objc_module_body.template");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '${0}' in template")]
    UnknownPlaceholder(String),

    #[error("dangling '$' in template")]
    DanglingDollar,

    #[error("unterminated '${{' in template")]
    UnterminatedBrace,
}

/// Bindings for one substitution pass.
pub type Vars<'a> = HashMap<&'a str, String>;

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Substitute every `$name` / `${name}` placeholder in `template`.
///
/// Unused bindings are fine; an unbound placeholder is not.
pub fn substitute(template: &str, vars: &Vars<'_>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            Some((_, '{')) => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) if is_ident_continue(c) => name.push(c),
                        Some(_) | None => return Err(TemplateError::UnterminatedBrace),
                    }
                }
                out.push_str(lookup(vars, &name)?);
            }
            Some((_, c)) if is_ident_start(c) => {
                let mut name = String::new();
                name.push(c);
                chars.next();
                while let Some((_, c)) = chars.peek().copied() {
                    if is_ident_continue(c) {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(lookup(vars, &name)?);
            }
            _ => return Err(TemplateError::DanglingDollar),
        }
    }
    Ok(out)
}

fn lookup<'a>(vars: &'a Vars<'_>, name: &str) -> Result<&'a str, TemplateError> {
    vars.get(name)
        .map(String::as_str)
        .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))
}
