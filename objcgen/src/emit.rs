//! Overload expansion, marshalling planning and Objective-C emission.
//!
//! Every function expands into a family of arity variants by trimming
//! trailing defaulted arguments; each variant gets an Objective-C parameter
//! list, a C++ call-site argument list and the prologue/epilogue statements
//! bridging container and output types. Per-class text accumulates in
//! [`ClassBuffers`] and is substituted into the header/body templates at the
//! end of the class's emission phase.

use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::{info, warn};

use crate::generator::Generator;
use crate::model::{ArgInfo, ClassInfo, ConstInfo, FuncInfo};
use crate::templates::{self, Vars};
use crate::types::{expand, TypeRegistry};
use crate::Result;

/// Append-only text accumulators scoped to one class's emission phase.
pub(crate) struct ClassBuffers {
    enum_declarations: String,
    method_declarations: String,
    method_implementations: String,
    imports: BTreeSet<String>,
    header_template: &'static str,
    body_template: &'static str,
}

impl ClassBuffers {
    /// The umbrella class uses the module template pair and absorbs the
    /// configured module imports; everything else uses the class pair.
    fn new(ci: &ClassInfo, module_class: &str, module_imports: &[String]) -> Self {
        let umbrella = ci.base.is_empty() && ci.parts.name == module_class;
        let (header_template, body_template) = if umbrella {
            (templates::MODULE_HEADER, templates::MODULE_BODY)
        } else {
            (templates::CLASS_HEADER, templates::CLASS_BODY)
        };
        let mut imports = BTreeSet::new();
        if umbrella {
            imports.extend(module_imports.iter().cloned());
        }
        Self {
            enum_declarations: String::new(),
            method_declarations: String::new(),
            method_implementations: String::new(),
            imports,
            header_template,
            body_template,
        }
    }

    /// Record the wrapper import a referenced type needs. `NSNumber*` and
    /// `NSString*` come from Foundation and primitives need nothing.
    fn add_import(&mut self, reg: &TypeRegistry, ctype: &str, is_out: bool) {
        let Some(entry) = reg.lookup(ctype) else {
            return;
        };
        let objc_import = if let Some(inner) = &entry.v_type {
            reg.lookup(inner).map(|e| e.objc_type().to_string())
        } else if let Some(inner) = &entry.v_v_type {
            reg.lookup(inner).map(|e| e.objc_type().to_string())
        } else if !entry.is_primitive() || (is_out && entry.out_type.is_some()) {
            if is_out && entry.out_type.is_some() {
                entry.out_type.clone()
            } else {
                Some(entry.objc_type().to_string())
            }
        } else {
            None
        };
        if let Some(import) = objc_import {
            if !import.is_empty() && import != "NSNumber*" && import != "NSString*" {
                self.imports
                    .insert(import.strip_suffix('*').unwrap_or(&import).to_string());
            }
        }
    }
}

/// Whether every argument either has a known type or can be hidden behind
/// its C++ default.
pub(crate) fn type_complete(args: &[ArgInfo], reg: &TypeRegistry) -> bool {
    args.iter().all(|a| {
        reg.contains(&a.ctype) || !a.defval.is_empty() || a.ctype.ends_with('*')
    })
}

/// Objective-C surface type of one argument, including the container and
/// output-parameter rewrites.
fn objc_arg_type(a: &ArgInfo, reg: &TypeRegistry) -> String {
    let Some(entry) = reg.lookup(&a.ctype) else {
        return String::new();
    };
    let mut objc_type = entry.objc_type().to_string();
    if entry.v_type.is_some() {
        objc_type = if a.dir.is_out() {
            format!("NSMutableArray<{objc_type}>*")
        } else {
            format!("NSArray<{objc_type}>*")
        };
    } else if entry.v_v_type.is_some() {
        objc_type = if a.dir.is_out() {
            format!("NSMutableArray<NSMutableArray<{objc_type}>*>*")
        } else {
            format!("NSArray<NSArray<{objc_type}>*>*")
        };
    }
    if a.dir.is_out() && entry.out_type.is_some() {
        objc_type = entry.out_type.clone().unwrap_or(objc_type);
    }
    objc_type
}

/// Render the Objective-C parameter list. The first label is omitted;
/// hidden and unknown-but-defaulted arguments contribute nothing. An
/// incomplete argument list renders empty.
pub(crate) fn build_objc_args(args: &[ArgInfo], reg: &TypeRegistry) -> Vec<String> {
    let mut objc_args: Vec<String> = Vec::new();
    if !type_complete(args, reg) {
        return objc_args;
    }
    for a in args {
        if a.is_hidden() || !reg.contains(&a.ctype) {
            continue;
        }
        let objc_type = objc_arg_type(a, reg);
        let label = if objc_args.is_empty() { "" } else { a.name.as_str() };
        objc_args.push(format!("{label}:({objc_type}){}", a.name));
    }
    objc_args
}

/// `a:b:c:` form of the visible argument names, as used by `NS_SWIFT_NAME`.
pub(crate) fn build_swift_signature(args: &[ArgInfo], reg: &TypeRegistry) -> String {
    let mut signature = String::new();
    if type_complete(args, reg) {
        for a in args {
            if a.is_hidden() || !reg.contains(&a.ctype) {
                continue;
            }
            signature.push_str(&a.name);
            signature.push(':');
        }
    }
    signature
}

/// Canonical selector signature used for uniqueness checks and the
/// signature-keyed fix-up table.
pub(crate) fn signature(fi: &FuncInfo, args: &[ArgInfo], reg: &TypeRegistry) -> String {
    let ret = reg
        .lookup(&fi.ctype)
        .map(|e| e.objc_type().to_string())
        .unwrap_or_default();
    format!(
        "({ret}){}{}",
        fi.objc_name,
        build_objc_args(args, reg).join(" ")
    )
}

/// C++ declaration used in comments and the coverage report.
fn c_decl_of(fi: &FuncInfo, prop_name: Option<&str>) -> String {
    if let Some(prop) = prop_name {
        return format!("{} {}::{}", fi.ctype, fi.parts.classname, prop);
    }
    let decl_args = fi
        .args
        .iter()
        .map(|a| {
            let mut s = if a.ctype.is_empty() {
                " _hidden_ ".to_string()
            } else {
                a.ctype.clone()
            };
            if a.pointer {
                s.push('*');
            } else if a.dir.is_out() {
                s.push('&');
            }
            s.push(' ');
            s.push_str(&a.name);
            if !a.defval.is_empty() {
                s.push_str(" = ");
                s.push_str(&a.defval);
            }
            s
        })
        .join(", ");
    let static_kw = if fi.is_static { "static" } else { "" };
    format!("{static_kw} {} {}({decl_args})", fi.ctype, fi.cname)
}

/// Native-pointer declarations for a base class's header.
fn native_pointer_decls(native_type: &str) -> String {
    format!(
        "
#ifdef __cplusplus
@property(readonly){native_type}* nativePtr;
#endif

- (void)dealloc;

#ifdef __cplusplus
- (instancetype)initWithNativePtr:({native_type}*)nativePtr;
+ (instancetype)fromNative:({native_type}*)nativePtr;
#endif
"
    )
}

/// Native-pointer handling for a base class's body.
fn native_pointer_impls(native_type: &str, objc_name: &str) -> String {
    format!(
        "
- (void)dealloc {{
    if (_nativePtr != NULL) {{
        delete _nativePtr;
    }}
}}

- (instancetype)initWithNativePtr:({native_type}*)nativePtr {{
    self = [super init];
    if (self) {{
        _nativePtr = nativePtr;
    }}
    return self;
}}

+ (instancetype)fromNative:({native_type}*)nativePtr {{
    return [[{objc_name} alloc] initWithNativePtr:nativePtr];
}}
"
    )
}

impl Generator {
    /// Emit one class: returns the rendered header and body text.
    pub(crate) fn emit_class(&mut self, ci: &ClassInfo) -> Result<(String, String)> {
        let mut bufs = ClassBuffers::new(ci, &self.module_class, &self.config.module_imports);
        self.gen_class(ci, &mut bufs)?;
        let header = self.render_class_file(ci, &bufs, true)?;
        let body = self.render_class_file(ci, &bufs, false)?;
        Ok((header, body))
    }

    fn gen_class(&mut self, ci: &ClassInfo, bufs: &mut ClassBuffers) -> Result<()> {
        info!("class: {}", ci.parts.name);

        // constants, grouped by enum type in first-occurrence order
        if !ci.consts.is_empty() {
            let mut groups: Vec<(Option<String>, Vec<&ConstInfo>)> = Vec::new();
            for c in &ci.consts {
                match groups.iter_mut().find(|(t, _)| *t == c.enum_type) {
                    Some((_, members)) => members.push(c),
                    None => groups.push((c.enum_type.clone(), vec![c])),
                }
            }
            for (enum_type, members) in groups {
                match enum_type {
                    Some(type_name) => {
                        let short = type_name.rsplit('.').next().unwrap_or(&type_name);
                        let body = members
                            .iter()
                            .map(|c| format!("{} = {}", c.name, c.value))
                            .join(",\n    ");
                        bufs.enum_declarations.push_str(&format!(
                            "\n// C++: enum {short}\ntypedef NS_ENUM(int, {short}) {{\n    {body}\n}};\n\n"
                        ));
                    }
                    None => {
                        // loose members surface as read-only class-level ints
                        let decls = members
                            .iter()
                            .map(|c| {
                                format!(
                                    "@property (class, readonly) int {} NS_SWIFT_NAME({});",
                                    c.name, c.name
                                )
                            })
                            .join("\n");
                        bufs.method_declarations.push_str(&format!("\n{decls}\n\n"));
                        let impls = members
                            .iter()
                            .map(|c| format!("+ (int){} {{\n    return {};\n}}\n", c.name, c.value))
                            .join("\n");
                        bufs.method_implementations
                            .push_str(&format!("\n{impls}\n\n"));
                    }
                }
            }
        }

        for fi in ci.all_methods() {
            self.gen_func(ci, bufs, fi, None);
        }

        for pi in &ci.props {
            let getter = FuncInfo::property_accessor(
                &ci.parts.full_name(),
                &format!("get_{}", pi.name),
                &pi.ctype,
                Vec::new(),
                &self.namespaces,
                &self.config,
            )?;
            self.gen_func(ci, bufs, &getter, Some(&pi.name));
            if pi.rw {
                let arg = ArgInfo::from_value(
                    &serde_json::json!([pi.ctype, pi.name, "", []]),
                    None,
                )?;
                let setter = FuncInfo::property_accessor(
                    &ci.parts.full_name(),
                    &format!("set_{}", pi.name),
                    "void",
                    vec![arg],
                    &self.namespaces,
                    &self.config,
                )?;
                self.gen_func(ci, bufs, &setter, Some(&pi.name));
            }
        }

        if let Some(funcs) = self.config.manual_funcs.get(&ci.parts.name).cloned() {
            for mf in funcs.values() {
                bufs.method_declarations.push_str(&mf.declaration.join("\n"));
                bufs.method_implementations
                    .push_str(&mf.implementation.join("\n"));
            }
        }
        Ok(())
    }

    /// Expand one function into its variants and emit declaration plus
    /// implementation for each. Skips (and records) functions whose return
    /// or argument types have no registry entry.
    fn gen_func(
        &mut self,
        ci: &ClassInfo,
        bufs: &mut ClassBuffers,
        fi: &FuncInfo,
        prop_name: Option<&str>,
    ) {
        let c_decl = c_decl_of(fi, prop_name);
        bufs.method_declarations
            .push_str(&format!("\n//\n// {c_decl}\n//\n"));
        bufs.method_implementations
            .push_str(&format!("\n//\n// {c_decl}\n//\n"));

        let ret_known = self.types.contains(&fi.ctype);
        let ret_vector = self
            .types
            .lookup(&fi.ctype)
            .map(|e| e.is_vector())
            .unwrap_or(false);
        if !ret_known || ret_vector {
            let msg = format!(
                "// Return type '{}' is not supported, skipping the function\n\n",
                fi.ctype
            );
            self.skipped_funcs.push(format!("{c_decl}\n{msg}"));
            bufs.method_declarations.push_str(&format!("    {msg}"));
            warn!("SKIP: {} due to RET type {}", c_decl.trim(), fi.ctype);
            return;
        }

        // unknown argument types: hide behind the C++ default or skip
        let mut args = fi.args.clone();
        for a in &mut args {
            if !self.types.contains(&a.ctype) {
                if a.defval.is_empty() && a.ctype.ends_with('*') {
                    a.defval = "0".to_string();
                }
                if !a.defval.is_empty() {
                    a.ctype.clear();
                    continue;
                }
                let msg = format!(
                    "// Unknown type '{}' ({}), skipping the function\n\n",
                    a.ctype,
                    a.dir.tag()
                );
                self.skipped_funcs.push(format!("{c_decl}\n{msg}"));
                bufs.method_declarations.push_str(&msg);
                warn!(
                    "SKIP: {} due to ARG type {}/{}",
                    c_decl.trim(),
                    a.ctype,
                    a.dir.tag()
                );
                return;
            }
        }

        self.ported_funcs.push(c_decl);

        let is_static = if fi.parts.classname.is_empty() {
            true
        } else {
            fi.is_static
        };

        let mut seen_signatures: Vec<String> = Vec::new();
        loop {
            let mut cv_args: Vec<String> = Vec::new();
            let mut prologue: Vec<String> = Vec::new();
            let mut epilogue: Vec<String> = Vec::new();
            if !fi.ctype.is_empty() {
                bufs.add_import(&self.types, &fi.ctype, false);
            }

            for a in &args {
                let entry = self.types.lookup(&a.ctype).cloned().unwrap_or_default();
                if entry.v_type.is_none() && entry.v_v_type.is_none() {
                    if a.is_hidden() {
                        // the C++ default stands in for the dropped argument
                        continue;
                    }
                    let mut cv_name = entry.to_cpp.clone().unwrap_or_else(|| "%(n)s".into());
                    if a.pointer {
                        cv_name = format!("&({cv_name})");
                    }
                    if a.dir.is_out() && entry.out_type.is_some() {
                        cv_name = if a.pointer {
                            entry.out_type_ptr.clone()
                        } else {
                            entry.out_type_ref.clone()
                        }
                        .unwrap_or_else(|| "%(n)s".into());
                    }
                    let mut expr = expand(entry.cv_name.as_deref().unwrap_or(&cv_name), &a.name);
                    if !a.pointer && !a.dir.is_out() {
                        if let Some(cast) = &entry.cast_to {
                            expr = format!("({cast}){expr}");
                        }
                    }
                    cv_args.push(expr);
                    bufs.add_import(&self.types, &a.ctype, a.dir.is_out());
                }
                if let Some(element) = &entry.v_type {
                    let objc_type = entry.objc_type();
                    bufs.add_import(&self.types, &a.ctype, false);
                    let element_cpp = self.types.full_type_name(element);
                    let vector_name = format!("{}Vector", a.name);
                    cv_args.push(vector_name.clone());
                    let objc_class = objc_type.strip_suffix('*').unwrap_or(objc_type);
                    prologue.push(format!(
                        "OBJC2CV({element_cpp}, {objc_class}, {vector_name}, {});",
                        a.name
                    ));
                    if a.dir.is_out() {
                        epilogue.push(format!(
                            "CV2OBJC({element_cpp}, {objc_class}, {vector_name}, {});",
                            a.name
                        ));
                    }
                }
                if let Some(element) = &entry.v_v_type {
                    let objc_type = entry.objc_type();
                    bufs.add_import(&self.types, &a.ctype, false);
                    let element_cpp = self.types.full_type_name(element);
                    let vector_name = format!("{}Vector2", a.name);
                    cv_args.push(vector_name.clone());
                    let objc_class = objc_type.strip_suffix('*').unwrap_or(objc_type);
                    prologue.push(format!(
                        "OBJC2CV2({element_cpp}, {objc_class}, {vector_name}, {});",
                        a.name
                    ));
                    if a.dir.is_out() {
                        epilogue.push(format!(
                            "CV2OBJC2({element_cpp}, {objc_class}, {vector_name}, {});",
                            a.name
                        ));
                    }
                }
            }

            let objc_args = build_objc_args(&args, &self.types);
            let objc_signature = signature(fi, &args, &self.types);
            info!("Objective-C: {objc_signature}");

            if seen_signatures.contains(&objc_signature) {
                if !args.is_empty() {
                    args.pop();
                    continue;
                }
                break;
            }

            // keep only the @param lines for arguments this variant retains
            if !fi.docstring.is_empty() {
                for line in fi.docstring.lines() {
                    let keep = match line.find("@param") {
                        Some(p0) => {
                            let rest = line.get(p0 + 7..).unwrap_or("");
                            let param = rest.split(' ').next().unwrap_or("");
                            args.iter().any(|a| a.name == param)
                        }
                        None => true,
                    };
                    if keep {
                        bufs.method_declarations.push_str(line);
                        bufs.method_declarations.push('\n');
                    }
                }
            }

            let ret_type = fi.ctype.strip_suffix('*').unwrap_or(&fi.ctype);
            let ret_entry = self.types.lookup(ret_type).cloned().unwrap_or_default();
            let mut ret_val = format!("{} retVal = ", self.types.full_type_name(&fi.ctype));
            let mut ret = String::from("return retVal;");
            let mut tail = "";
            let mut constructor = false;
            if ret_type.starts_with("Ptr_") {
                let c_type = ret_entry.c_type.clone().unwrap_or_default();
                ret_val = format!("cv::{c_type}* retVal = ");
                let objc = ret_entry.objc_type();
                let objc_class = objc.strip_suffix('*').unwrap_or(objc);
                ret = format!("return [{objc_class} fromNative:retVal];");
            } else if ret_type == "void" {
                ret_val.clear();
                ret.clear();
            } else if ret_type.is_empty() {
                constructor = true;
                ret_val = "return [self initWithNativePtr:new ".to_string();
                tail = "]";
                ret.clear();
            } else if self.is_wrapped(ret_type) {
                ret_val = format!("cv::{ret_type}* retVal = new cv::{ret_type}(");
                tail = ")";
                let from_cpp_ptr = ret_entry.from_cpp_ptr.clone().unwrap_or_else(|| {
                    let objc = ret_entry.objc_type();
                    let objc_class = objc.strip_suffix('*').unwrap_or(objc);
                    format!("[{objc_class} fromNativePtr:%(n)s]")
                });
                ret = format!("return {};", expand(&from_cpp_ptr, "retVal"));
            } else if let Some(from_cpp) = &ret_entry.from_cpp {
                ret = format!("return {};", expand(from_cpp, "retVal"));
            } else if let Some(cast_from) = &ret_entry.cast_from {
                ret = format!("return ({cast_from})retVal;");
            }

            let ret_objc = self
                .types
                .lookup(&fi.ctype)
                .map(|e| e.objc_type().to_string())
                .unwrap_or_default();
            let ret_objc = if !ret_objc.is_empty() {
                ret_objc
            } else if constructor {
                "instancetype".to_string()
            } else {
                "void".to_string()
            };
            let stem = if constructor {
                FuncInfo::constructor_stem(&args)
            } else {
                fi.objc_name.clone()
            };
            let prototype = format!(
                "{} ({ret_objc}){stem}{}",
                if is_static { "+" } else { "-" },
                objc_args.join(" ")
            );

            let swift_clause = if constructor {
                String::new()
            } else {
                format!(
                    " NS_SWIFT_NAME({}({}))",
                    fi.swift_name,
                    build_swift_signature(&args, &self.types)
                )
            };
            bufs.method_declarations
                .push_str(&format!("{prototype}{swift_clause};\n\n"));

            let obj_deref = if !is_static && !constructor {
                if !ci.is_base_class() {
                    format!("(({}*)self.nativePtr)->", fi.parts.full_class_cpp())
                } else {
                    "_nativePtr->".to_string()
                }
            } else {
                String::new()
            };
            let call_name = if is_static {
                fi.cname.clone()
            } else if constructor {
                fi.parts.full_class_cpp()
            } else {
                fi.parts.name.clone()
            };
            let prologue_text = if prologue.is_empty() {
                String::new()
            } else {
                format!("\n    {}", prologue.join("\n    "))
            };
            let epilogue_text = if epilogue.is_empty() {
                String::new()
            } else {
                format!("\n    {}", epilogue.join("\n    "))
            };
            let ret_text = if ret.is_empty() {
                String::new()
            } else {
                format!("\n    {ret}")
            };
            bufs.method_implementations.push_str(&format!(
                "{prototype} {{{prologue_text}\n    {ret_val}{obj_deref}{call_name}({}){tail};{epilogue_text}{ret_text}\n}}\n\n",
                cv_args.join(", ")
            ));

            seen_signatures.push(objc_signature);

            match args.last() {
                Some(last) if !last.defval.is_empty() => {
                    args.pop();
                }
                _ => break,
            }
        }
    }

    /// Substitute the class streams into the selected template pair.
    fn render_class_file(
        &self,
        ci: &ClassInfo,
        bufs: &ClassBuffers,
        header: bool,
    ) -> Result<String> {
        let display_base = if ci.base.is_empty() {
            "NSObject".to_string()
        } else {
            ci.base.clone()
        };
        let smart = self.is_smart_class(ci);
        let native_type = if smart {
            format!("cv::Ptr<cv::{}>", ci.cname)
        } else {
            format!("cv::{}", ci.cname)
        };
        let native_pointer_handling = if !ci.is_base_class() {
            String::new()
        } else if header {
            native_pointer_decls(&native_type)
        } else {
            native_pointer_impls(&native_type, &ci.objc_name)
        };

        let mut vars: Vars<'_> = Vars::new();
        vars.insert("module", self.module_class.clone());
        vars.insert(
            "importBaseClass",
            if ci.is_base_class() {
                String::new()
            } else {
                format!("#import \"{}.h\"", ci.base)
            },
        );
        vars.insert(
            "forwardDeclarations",
            bufs.imports.iter().map(|c| format!("@class {c};")).join("\n"),
        );
        vars.insert("enumDeclarations", bufs.enum_declarations.clone());
        vars.insert("moduleHeaderCode", self.config.module_header_code.clone());
        vars.insert("moduleBodyCode", self.config.module_body_code.clone());
        vars.insert("nativePointerHandling", native_pointer_handling);
        vars.insert("methodDeclarations", bufs.method_declarations.clone());
        vars.insert(
            "methodImplementations",
            bufs.method_implementations.clone(),
        );
        vars.insert("name", ci.parts.name.clone());
        vars.insert("objcName", ci.objc_name.clone());
        vars.insert("cName", ci.cname.clone());
        vars.insert(
            "imports",
            bufs.imports
                .iter()
                .map(|c| format!("#import \"{c}.h\""))
                .join("\n"),
        );
        vars.insert("docs", ci.docstring.clone());
        vars.insert("base", display_base);

        let template = if header {
            bufs.header_template
        } else {
            bufs.body_template
        };
        Ok(templates::substitute(template, &vars)? + "\n\n")
    }
}
