//! Type registry: C++ type tokens to their Objective-C surface and the
//! marshalling directives the planner needs.
//!
//! The registry is seeded with the built-in primitives, then extended by
//! per-module `type_dict` overrides and by class registration. All three
//! paths go through [`TypeRegistry::register`], which merge-updates field by
//! field so an override can add a directive without restating the rest of
//! the entry.

use std::collections::HashMap;

use serde::Deserialize;

/// Marshalling directives for one C++ type token.
///
/// `%(n)s` inside the expression-valued directives stands for the argument
/// (or `retVal`) name and is expanded by [`TypeEntry::expand`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TypeEntry {
    /// Objective-C surface type, e.g. `Mat*` or `int`.
    pub objc_type: Option<String>,
    /// Surface types that need no wrapper class import.
    pub is_primitive: Option<bool>,
    /// Cast applied when converting the C++ value to the surface type.
    pub cast_from: Option<String>,
    /// Cast applied when passing the surface value to C++.
    pub cast_to: Option<String>,
    /// Element type: the token denotes `vector<v_type>`.
    pub v_type: Option<String>,
    /// Element type: the token denotes `vector<vector<v_v_type>>`.
    pub v_v_type: Option<String>,
    /// Surface type used when the argument is an output parameter.
    pub out_type: Option<String>,
    /// Call-site expression for a pointer-shaped output argument.
    pub out_type_ptr: Option<String>,
    /// Call-site expression for a reference-shaped output argument.
    pub out_type_ref: Option<String>,
    /// Call-site expression converting the surface value to C++.
    pub to_cpp: Option<String>,
    /// Return expression converting a C++ value to the surface type.
    pub from_cpp: Option<String>,
    /// Return expression wrapping a C++ heap pointer.
    pub from_cpp_ptr: Option<String>,
    /// Underlying class name for `Ptr_*` entries.
    pub c_type: Option<String>,
    /// Call-site expression override.
    pub cv_name: Option<String>,
}

impl TypeEntry {
    /// Entry for a primitive surface type.
    fn primitive(objc_type: &str) -> Self {
        Self {
            objc_type: Some(objc_type.to_string()),
            is_primitive: Some(true),
            ..Self::default()
        }
    }

    pub fn objc_type(&self) -> &str {
        self.objc_type.as_deref().unwrap_or("")
    }

    pub fn is_primitive(&self) -> bool {
        self.is_primitive.unwrap_or(false)
    }

    pub fn is_vector(&self) -> bool {
        self.v_type.is_some() || self.v_v_type.is_some()
    }

    /// Overwrite the fields present in `other`, keeping the rest.
    pub fn merge(&mut self, other: &TypeEntry) {
        macro_rules! take {
            ($field:ident) => {
                if other.$field.is_some() {
                    self.$field = other.$field.clone();
                }
            };
        }
        take!(objc_type);
        take!(is_primitive);
        take!(cast_from);
        take!(cast_to);
        take!(v_type);
        take!(v_v_type);
        take!(out_type);
        take!(out_type_ptr);
        take!(out_type_ref);
        take!(to_cpp);
        take!(from_cpp);
        take!(from_cpp_ptr);
        take!(c_type);
        take!(cv_name);
    }
}

/// Expand `%(n)s` placeholders in a marshalling expression.
pub fn expand(expr: &str, name: &str) -> String {
    expr.replace("%(n)s", name)
}

/// Process-wide mapping from C++ type tokens to [`TypeEntry`] directives.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TypeRegistry {
    /// Registry seeded with the built-in primitive mappings. The empty key is
    /// the constructor return type.
    pub fn with_builtins() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            String::new(),
            TypeEntry {
                objc_type: Some(String::new()),
                ..TypeEntry::default()
            },
        );
        entries.insert("void".into(), TypeEntry::primitive("void"));
        entries.insert("bool".into(), TypeEntry::primitive("BOOL"));
        entries.insert("char".into(), TypeEntry::primitive("char"));
        entries.insert(
            "int".into(),
            TypeEntry {
                out_type: Some("IntOut*".into()),
                out_type_ptr: Some("%(n)s.ptr".into()),
                out_type_ref: Some("*(int*)(%(n)s.ptr)".into()),
                ..TypeEntry::primitive("int")
            },
        );
        entries.insert("long".into(), TypeEntry::primitive("long"));
        entries.insert(
            "float".into(),
            TypeEntry {
                out_type: Some("FloatOut*".into()),
                out_type_ptr: Some("%(n)s.ptr".into()),
                out_type_ref: Some("*(float*)(%(n)s.ptr)".into()),
                ..TypeEntry::primitive("float")
            },
        );
        entries.insert(
            "double".into(),
            TypeEntry {
                out_type: Some("DoubleOut*".into()),
                out_type_ptr: Some("%(n)s.ptr".into()),
                out_type_ref: Some("*(double*)(%(n)s.ptr)".into()),
                ..TypeEntry::primitive("double")
            },
        );
        entries.insert("size_t".into(), TypeEntry::primitive("int"));
        entries.insert("int64".into(), TypeEntry::primitive("long"));
        entries.insert("string".into(), TypeEntry::primitive("NSString*"));
        Self { entries }
    }

    /// Merge-update the entry for `key`, creating it when absent.
    pub fn register(&mut self, key: &str, entry: &TypeEntry) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .merge(entry);
    }

    /// Merge a `type_dict` configuration layer.
    pub fn register_all<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (&'a String, &'a TypeEntry)>,
    {
        for (key, entry) in entries {
            self.register(key, entry);
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&TypeEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// C++ spelling for a type at the call site: wrapped types gain the
    /// library namespace, primitives stay bare.
    pub fn full_type_name(&self, key: &str) -> String {
        match self.lookup(key) {
            Some(entry) if entry.is_primitive() => key.to_string(),
            _ => format!("cv::{key}"),
        }
    }
}
