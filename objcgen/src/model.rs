//! Declaration model: the value objects the ingestor builds from parser
//! tuples and the emission engine consumes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::config::{ArgFix, GenConfig};
use crate::decl::{
    capitalize, cpp_name, sanitize_docstring, scalar_to_string, NameParts, RawDecl,
};
use crate::{Error, Result};

/// Data-flow direction of a function argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgDirection {
    #[default]
    In,
    Out,
    InOut,
}

impl ArgDirection {
    pub fn from_attribs(attribs: &[String]) -> Self {
        if attribs.iter().any(|a| a == "/IO") {
            ArgDirection::InOut
        } else if attribs.iter().any(|a| a == "/O") {
            ArgDirection::Out
        } else {
            ArgDirection::In
        }
    }

    /// True for both pure outputs and in-outs.
    pub fn is_out(self) -> bool {
        matches!(self, ArgDirection::Out | ArgDirection::InOut)
    }

    /// Short tag used in skip messages.
    pub fn tag(self) -> &'static str {
        match self {
            ArgDirection::In => "I",
            ArgDirection::Out => "O",
            ArgDirection::InOut => "IO",
        }
    }
}

/// One function argument. The trailing `*` of the C++ type is folded into
/// `pointer`; an argument whose `ctype` is emptied later on is hidden: it
/// contributes neither an Objective-C parameter nor a C++ call-site
/// argument.
#[derive(Debug, Clone, Default)]
pub struct ArgInfo {
    pub ctype: String,
    pub pointer: bool,
    pub name: String,
    pub defval: String,
    pub dir: ArgDirection,
}

impl ArgInfo {
    /// Decode `[ctype, name, default, [attribs...]]`, applying any per-name
    /// fix-up first.
    pub fn from_value(value: &Value, fixes: Option<&BTreeMap<String, ArgFix>>) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::MalformedDecl(format!("expected argument tuple, got {value}")))?;
        let mut ctype = items
            .first()
            .map(scalar_to_string)
            .unwrap_or_default();
        let name = items.get(1).map(scalar_to_string).unwrap_or_default();
        let defval = items.get(2).map(scalar_to_string).unwrap_or_default();
        let mut attribs: Vec<String> = items
            .get(3)
            .and_then(Value::as_array)
            .map(|a| a.iter().map(scalar_to_string).collect())
            .unwrap_or_default();

        if let Some(fix) = fixes.and_then(|f| f.get(&name)) {
            if let Some(fixed) = &fix.ctype {
                ctype = fixed.clone();
            }
            if let Some(fixed) = &fix.attrib {
                attribs = fixed.clone();
            }
        }

        let pointer = ctype.ends_with('*');
        if pointer {
            ctype.truncate(ctype.len() - 1);
        }
        Ok(Self {
            ctype,
            pointer,
            name,
            defval,
            dir: ArgDirection::from_attribs(&attribs),
        })
    }

    pub fn is_hidden(&self) -> bool {
        self.ctype.is_empty()
    }
}

/// One wrapped constant, public or private within its class.
#[derive(Debug, Clone)]
pub struct ConstInfo {
    pub name: String,
    pub classname: String,
    pub value: String,
    pub enum_type: Option<String>,
    pub added_manually: bool,
}

impl ConstInfo {
    pub fn from_decl(
        decl: &RawDecl,
        namespaces: &BTreeSet<String>,
        config: &GenConfig,
        enum_type: Option<&str>,
    ) -> Self {
        let parts = NameParts::parse(&decl.name, namespaces);
        let mut name = parts.name.clone();
        if let Some(prefix) = config.namespaces_dict.get(&parts.namespace) {
            name = format!("{prefix}_{name}");
        }
        Self {
            name,
            classname: parts.classname,
            value: decl.ret.clone(),
            enum_type: enum_type.map(str::to_string),
            added_manually: false,
        }
    }

    /// Constant injected from the `missing_consts` configuration.
    pub fn manual(name: &str, value: &Value) -> Self {
        Self {
            name: name.to_string(),
            classname: String::new(),
            value: scalar_to_string(value),
            enum_type: None,
            added_manually: true,
        }
    }
}

/// One class field exposed as a property.
#[derive(Debug, Clone)]
pub struct ClassPropInfo {
    pub ctype: String,
    pub name: String,
    pub rw: bool,
}

impl ClassPropInfo {
    /// Decode `[ctype, name, _, [attribs...]]`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::MalformedDecl(format!("expected property tuple, got {value}")))?;
        let attribs: Vec<String> = items
            .get(3)
            .and_then(Value::as_array)
            .map(|a| a.iter().map(scalar_to_string).collect())
            .unwrap_or_default();
        Ok(Self {
            ctype: items.first().map(scalar_to_string).unwrap_or_default(),
            name: items.get(1).map(scalar_to_string).unwrap_or_default(),
            rw: attribs.iter().any(|a| a == "/RW"),
        })
    }
}

/// One function, method or constructor declaration.
#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub parts: NameParts,
    /// Fully qualified C++ name, e.g. `cv::add`.
    pub cname: String,
    /// Selector stem after namespace prefixing and renames.
    pub objc_name: String,
    /// Stem used inside `NS_SWIFT_NAME`.
    pub swift_name: String,
    pub is_constructor: bool,
    pub is_static: bool,
    /// C++ return type token.
    pub ctype: String,
    pub args: Vec<ArgInfo>,
    pub docstring: String,
}

impl FuncInfo {
    pub fn from_decl(
        decl: &RawDecl,
        namespaces: &BTreeSet<String>,
        config: &GenConfig,
    ) -> Result<Self> {
        let parts = NameParts::parse(&decl.name, namespaces);
        let cname = cpp_name(&decl.name);
        let mut objc_name = parts.name.clone();
        let swift_name = parts.name.clone();
        let is_constructor = parts.name == parts.classname;
        if parts.name.contains('[') {
            objc_name = "getelem".to_string();
        }
        if let Some(prefix) = config.namespaces_dict.get(&parts.namespace) {
            objc_name = format!("{prefix}_{objc_name}");
        }
        for m in &decl.modifiers {
            if let Some(renamed) = m.strip_prefix('=') {
                objc_name = renamed.to_string();
            }
        }
        let is_static = decl.modifiers.iter().any(|m| m == "/S");
        let ctype = normalize_return_type(&decl.ret);

        let arg_fixes = config.func_arg_fix.get(&objc_name);
        let args = decl
            .children
            .iter()
            .map(|a| ArgInfo::from_value(a, arg_fixes))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            parts,
            cname,
            objc_name,
            swift_name,
            is_constructor,
            is_static,
            ctype,
            args,
            docstring: sanitize_docstring(&decl.docstring),
        })
    }

    /// Second fix-up pass, keyed by the full Objective-C signature: the
    /// function may be renamed and argument types/names rewritten.
    pub fn apply_signature_fix(&mut self, fixes: &BTreeMap<String, ArgFix>) {
        if let Some(fix) = fixes.get(&self.parts.name) {
            if let Some(name) = &fix.name {
                self.objc_name = name.clone();
            }
        }
        for arg in &mut self.args {
            if let Some(fix) = fixes.get(&arg.name) {
                if let Some(ctype) = &fix.ctype {
                    arg.ctype = ctype.clone();
                }
                if let Some(name) = &fix.name {
                    arg.name = name.clone();
                }
            }
        }
    }

    /// Selector stem of one constructor variant: `init`, or `initWith<Arg>`
    /// when the variant still has arguments.
    pub fn constructor_stem(args: &[ArgInfo]) -> String {
        match args.first() {
            Some(first) => format!("initWith{}", capitalize(&first.name)),
            None => "init".to_string(),
        }
    }

    /// Synthesized accessor for a class property.
    pub fn property_accessor(
        owner_full_name: &str,
        accessor: &str,
        ctype: &str,
        args: Vec<ArgInfo>,
        namespaces: &BTreeSet<String>,
        config: &GenConfig,
    ) -> Result<Self> {
        let decl = RawDecl {
            name: format!("{owner_full_name}.{accessor}"),
            ret: ctype.to_string(),
            ..RawDecl::default()
        };
        let mut fi = Self::from_decl(&decl, namespaces, config)?;
        fi.args = args;
        Ok(fi)
    }
}

/// A leading legacy `CvTermCriteria` return type is exposed as the wrapped
/// `TermCriteria`.
fn normalize_return_type(ret: &str) -> String {
    match ret.strip_prefix("CvTermCriteria") {
        Some(rest) => format!("TermCriteria{rest}"),
        None => ret.to_string(),
    }
}

/// One wrapped C++ class and everything collected for it during ingestion.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub parts: NameParts,
    /// C++ spelling of the local class name.
    pub cname: String,
    /// Objective-C class name (after any `=Name` rename).
    pub objc_name: String,
    /// Base class name; empty when the class roots its own hierarchy.
    pub base: String,
    pub methods: Vec<FuncInfo>,
    pub consts: Vec<ConstInfo>,
    pub private_consts: Vec<ConstInfo>,
    pub props: Vec<ClassPropInfo>,
    pub docstring: String,
}

impl ClassInfo {
    pub fn from_decl(decl: &RawDecl, namespaces: &BTreeSet<String>) -> Self {
        let parts = NameParts::parse(&decl.name, namespaces);
        let cname = cpp_name(&parts.name);
        let mut objc_name = parts.name.clone();
        for m in &decl.modifiers {
            if let Some(renamed) = m.strip_prefix('=') {
                objc_name = renamed.to_string();
            }
        }
        let base = parse_base(&decl.ret, &objc_name);
        let mut docstring = format!("// C++: class {}\n", parts.name);
        docstring.push_str(&sanitize_docstring(&decl.docstring));
        Self {
            parts,
            cname,
            objc_name,
            base,
            methods: Vec::new(),
            consts: Vec::new(),
            private_consts: Vec::new(),
            props: Vec::new(),
            docstring,
        }
    }

    /// Bare named class used for pre-seeded entries (the umbrella class and
    /// the hand-written `Mat`).
    pub fn named(name: &str, namespaces: &BTreeSet<String>) -> Self {
        Self::from_decl(
            &RawDecl {
                name: format!("class {name}"),
                ..RawDecl::default()
            },
            namespaces,
        )
    }

    /// A base class roots its own hierarchy and owns the native pointer
    /// field; subclasses reach the pointer through the property instead.
    pub fn is_base_class(&self) -> bool {
        self.base.is_empty()
    }

    pub fn get_const(&self, name: &str) -> Option<&ConstInfo> {
        self.consts
            .iter()
            .chain(self.private_consts.iter())
            .find(|c| c.name == name)
    }

    /// Emission order: constructors first, then the rest, each group in
    /// insertion order.
    pub fn all_methods(&self) -> Vec<&FuncInfo> {
        self.methods
            .iter()
            .filter(|fi| fi.is_constructor)
            .chain(self.methods.iter().filter(|fi| !fi.is_constructor))
            .collect()
    }
}

/// Extract the first base class from a `": Base1, Base2"` clause, dropping
/// any self-reference.
fn parse_base(ret_or_base: &str, objc_name: &str) -> String {
    if ret_or_base.is_empty() {
        return String::new();
    }
    let first = ret_or_base.split(',').next().unwrap_or("");
    let after = match first.rfind(':') {
        Some(pos) => &first[pos + 1..],
        None => first,
    };
    after.trim().replace(objc_name, "")
}
