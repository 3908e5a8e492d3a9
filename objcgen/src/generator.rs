//! Declaration ingestion and the per-module generation driver.
//!
//! The generator is long-lived: the type registry and the layered
//! configuration accumulate across modules, while the wrapped-class registry
//! and the coverage lists reset at every module boundary.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use regex::RegexSet;
use roxygen::roxygen;
use tracing::{info, warn};

use crate::config::{GenConfig, ModuleConfig};
use crate::decl::{capitalize, cpp_name, normalize_class_name, RawDecl};
use crate::emit;
use crate::model::{ClassInfo, ClassPropInfo, ConstInfo, FuncInfo};
use crate::output::{ensure_dir, FileWriter};
use crate::parser::HeaderParser;
use crate::report::make_report;
use crate::types::{TypeEntry, TypeRegistry};
use crate::Result;

/// Objective-C wrapper generator.
pub struct Generator {
    pub(crate) config: GenConfig,
    pub(crate) types: TypeRegistry,
    pub(crate) namespaces: BTreeSet<String>,
    class_order: Vec<String>,
    classes: HashMap<String, ClassInfo>,
    pub(crate) module: String,
    /// Name of the per-module umbrella class, e.g. `Imgproc`.
    pub(crate) module_class: String,
    const_ignore: RegexSet,
    const_private: RegexSet,
    pub(crate) ported_funcs: Vec<String>,
    pub(crate) skipped_funcs: Vec<String>,
    def_args_hist: BTreeMap<usize, usize>,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    pub fn new() -> Self {
        let mut generator = Self {
            config: GenConfig::default(),
            types: TypeRegistry::with_builtins(),
            namespaces: ["cv".to_string()].into_iter().collect(),
            class_order: Vec::new(),
            classes: HashMap::new(),
            module: String::new(),
            module_class: String::new(),
            const_ignore: RegexSet::empty(),
            const_private: RegexSet::empty(),
            ported_funcs: Vec::new(),
            skipped_funcs: Vec::new(),
            def_args_hist: BTreeMap::new(),
        };
        generator.clear_module();
        generator
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Functions skipped so far in the current module, with reasons.
    pub fn skipped_funcs(&self) -> &[String] {
        &self.skipped_funcs
    }

    /// Functions ported so far in the current module.
    pub fn ported_funcs(&self) -> &[String] {
        &self.ported_funcs
    }

    /// Reset the module-scoped configuration decorations. Call once per
    /// module before merging its dictionary.
    pub fn begin_module_config(&mut self) {
        self.config.begin_module();
    }

    /// Merge one module dictionary: ignore lists append, `type_dict` entries
    /// merge into the registry, map keys overwrite.
    pub fn apply_module_config(&mut self, mc: &ModuleConfig) -> Result<()> {
        self.config.merge(mc);
        self.types.register_all(mc.type_dict.iter());
        self.rebuild_ignore_sets()
    }

    /// Install the umbrella header/body code fragments for the current
    /// module, already read from their configured files.
    pub fn set_module_code(&mut self, header_code: String, body_code: String) {
        self.config.module_header_code = header_code;
        self.config.module_body_code = body_code;
    }

    fn rebuild_ignore_sets(&mut self) -> Result<()> {
        self.const_ignore = anchored_set(&self.config.const_ignore_list)?;
        self.const_private = anchored_set(&self.config.const_private_list)?;
        Ok(())
    }

    /// Reset per-module state. The hand-written `Mat` class is pre-seeded as
    /// a valid method target but is never emitted.
    fn clear_module(&mut self) {
        self.namespaces = ["cv".to_string()].into_iter().collect();
        self.classes.clear();
        self.class_order.clear();
        self.insert_class(ClassInfo::named("Mat", &self.namespaces));
        self.module.clear();
        self.module_class.clear();
        self.ported_funcs.clear();
        self.skipped_funcs.clear();
        self.def_args_hist.clear();
    }

    fn insert_class(&mut self, ci: ClassInfo) {
        let name = ci.parts.name.clone();
        if !self.classes.contains_key(&name) {
            self.class_order.push(name.clone());
        }
        self.classes.insert(name, ci);
    }

    /// An empty class name targets the module umbrella class.
    fn class_key(&self, classname: &str) -> String {
        if classname.is_empty() {
            self.module_class.clone()
        } else {
            classname.to_string()
        }
    }

    pub(crate) fn is_wrapped(&self, classname: &str) -> bool {
        self.classes.contains_key(&self.class_key(classname))
    }

    /// A smart class stores `Ptr<T>` in its native field instead of a raw
    /// `T*`: anything with a base, `Algorithm` itself, or a class exposing a
    /// `create` factory.
    pub(crate) fn is_smart_class(&self, ci: &ClassInfo) -> bool {
        !ci.base.is_empty()
            || ci.parts.name == "Algorithm"
            || ci.methods.iter().any(|fi| fi.parts.name == "create")
    }

    /// Dispatch one declaration tuple on its head token.
    pub fn ingest(&mut self, decl: &RawDecl) -> Result<()> {
        if decl.name.starts_with("struct") || decl.name.starts_with("class") {
            self.add_class(decl)
        } else if decl.name.starts_with("const") {
            self.add_const(decl, None, None)
        } else if decl.name.starts_with("enum") {
            self.add_enum(decl)
        } else {
            self.add_func(decl)
        }
    }

    fn add_class(&mut self, decl: &RawDecl) -> Result<()> {
        let ci = ClassInfo::from_decl(decl, &self.namespaces);
        let name = ci.parts.name.clone();
        if self.config.class_ignore_list.contains(&name) {
            info!("ignored: class {name}");
            return Ok(());
        }
        if self.is_wrapped(&name) && ci.base.is_empty() {
            warn!("duplicated: class {name}");
            return Ok(());
        }
        let base_empty = ci.base.is_empty();
        let objc_name = ci.objc_name.clone();
        let base = ci.base.clone();
        self.insert_class(ci);
        if self.types.contains(&name) && base_empty {
            warn!("duplicated: class {name}");
            return Ok(());
        }
        self.types.register(
            &name,
            &TypeEntry {
                objc_type: Some(format!("{objc_name}*")),
                ..TypeEntry::default()
            },
        );

        if let Some(missing) = self.config.missing_consts.get(&name).cloned() {
            let class = self.classes.get_mut(&name).expect("class just inserted");
            for (const_name, value) in &missing.public {
                class.consts.push(ConstInfo::manual(const_name, value));
            }
            for (const_name, value) in &missing.private {
                class
                    .private_consts
                    .push(ConstInfo::manual(const_name, value));
            }
        }

        let props = decl
            .children
            .iter()
            .map(ClassPropInfo::from_value)
            .collect::<Result<Vec<_>>>()?;
        self.classes.get_mut(&name).expect("class just inserted").props = props;

        self.types.register(
            &format!("Ptr_{name}"),
            &TypeEntry {
                objc_type: Some(format!("{objc_name}*")),
                c_type: Some(name.clone()),
                from_cpp_ptr: Some(format!("[{name} fromNativePtr:%(n)s]")),
                ..TypeEntry::default()
            },
        );
        info!("ok: class {name}, base: {base}");
        Ok(())
    }

    #[roxygen]
    fn add_const(
        &mut self,
        /// The `const` declaration tuple.
        decl: &RawDecl,
        /// Scope used to qualify a value that names another constant;
        /// set when ingesting enum members.
        scope: Option<&str>,
        /// Enclosing named enum, if any.
        enum_type: Option<&str>,
    ) -> Result<()> {
        let mut constinfo = ConstInfo::from_decl(decl, &self.namespaces, &self.config, enum_type);
        if self.const_ignore.is_match(&constinfo.name) {
            info!("ignored: const {}", constinfo.name);
            return Ok(());
        }
        if !self.is_wrapped(&constinfo.classname) {
            info!("class not found: const {}", constinfo.name);
            constinfo.name = format!("{}_{}", constinfo.classname, constinfo.name);
            constinfo.classname.clear();
        }
        let key = self.class_key(&constinfo.classname);
        let Some(class) = self.classes.get(&key) else {
            warn!("class not found: const {}", constinfo.name);
            return Ok(());
        };
        let duplicate = class.get_const(&constinfo.name).map(|c| c.added_manually);
        let back_ref = class.get_const(&constinfo.value).is_some();
        if back_ref && enum_type.is_none() {
            if let Some(scope) = scope {
                constinfo.value = format!("{scope}.{}", constinfo.value);
            }
        }
        match duplicate {
            Some(true) => info!("manual: const {}", constinfo.name),
            Some(false) => warn!("duplicated: const {}", constinfo.name),
            None => {
                info!("ok: const {}", constinfo.name);
                let private = self.const_private.is_match(&constinfo.name);
                let class = self.classes.get_mut(&key).expect("class looked up above");
                if private {
                    class.private_consts.push(constinfo);
                } else {
                    class.consts.push(constinfo);
                }
            }
        }
        Ok(())
    }

    /// A named enum registers an `int`-surfaced type entry with its casting
    /// rules and tags its members; an anonymous enum only contributes loose
    /// class constants.
    fn add_enum(&mut self, decl: &RawDecl) -> Result<()> {
        let enum_token = decl
            .name
            .rsplit(' ')
            .next()
            .unwrap_or_default()
            .to_string();
        let enum_type = if enum_token.ends_with("<unnamed>") {
            None
        } else {
            Some(enum_token)
        };
        if let Some(enum_name) = &enum_type {
            self.types.register(
                &normalize_class_name(enum_name),
                &TypeEntry {
                    cast_from: Some("int".to_string()),
                    cast_to: Some(cpp_name(enum_name)),
                    objc_type: Some("int".to_string()),
                    ..TypeEntry::default()
                },
            );
        }
        let scope = self.module_class.clone();
        for child in &decl.children {
            let const_decl = RawDecl::from_value(child)?;
            self.add_const(&const_decl, Some(&scope), enum_type.as_deref())?;
        }
        Ok(())
    }

    fn add_func(&mut self, decl: &RawDecl) -> Result<()> {
        let mut fi = FuncInfo::from_decl(decl, &self.namespaces, &self.config)?;
        let signature = emit::signature(&fi, &fi.args, &self.types);
        if let Some(fixes) = self.config.func_arg_fix.get(&signature).cloned() {
            fi.apply_signature_fix(&fixes);
        }

        let classname = self.class_key(&fi.parts.classname);
        if self.config.class_ignore_list.contains(&classname) {
            info!("ignored: func {}", fi.cname);
        } else if self
            .config
            .is_manual(&classname, &fi.objc_name, fi.is_constructor)
        {
            info!("manual: {}", fi.cname);
        } else if !self.classes.contains_key(&classname) {
            warn!("not found: class {classname} for function {}", fi.cname);
        } else {
            info!("ok: func {}", fi.cname);
            let def_args = fi.args.iter().filter(|a| !a.defval.is_empty()).count();
            *self.def_args_hist.entry(def_args).or_insert(0) += 1;
            self.classes
                .get_mut(&classname)
                .expect("class looked up above")
                .methods
                .push(fi);
        }
        Ok(())
    }

    /// Run one module: ingest all declarations, then emit one `.h`/`.mm`
    /// pair per wrapped class plus the module report.
    pub fn generate_module(
        &mut self,
        parser: &mut dyn HeaderParser,
        srcfiles: &[PathBuf],
        module: &str,
        output_path: &Path,
        output_objc_path: &Path,
        common_headers: &[PathBuf],
        writer: &mut FileWriter,
    ) -> Result<()> {
        self.clear_module();
        self.module = module.to_string();
        self.module_class = capitalize(module);

        self.ingest(&RawDecl {
            name: format!("class {}", self.module_class),
            ..RawDecl::default()
        })?;

        for hdr in common_headers {
            info!("common header: {}", hdr.display());
        }
        for hdr in srcfiles {
            let decls = parser.parse(hdr)?;
            self.namespaces = parser.namespaces().clone();
            info!("header {}: {} declarations", hdr.display(), decls.len());
            for decl in &decls {
                self.ingest(decl)?;
            }
        }

        info!("generating module {module}");
        let package_path = output_objc_path.join(module);
        ensure_dir(&package_path)?;
        for name in self.class_order.clone() {
            if name == "Mat" {
                continue;
            }
            let Some(ci) = self.classes.get(&name).cloned() else {
                continue;
            };
            let (header, body) = self.emit_class(&ci)?;
            writer.save(&package_path.join(format!("{}.h", ci.objc_name)), &header)?;
            writer.save(&package_path.join(format!("{}.mm", ci.objc_name)), &body)?;
        }

        ensure_dir(output_path)?;
        let report = make_report(&self.ported_funcs, &self.skipped_funcs, &self.def_args_hist);
        writer.save(&output_path.join(format!("{module}.txt")), &report)?;
        Ok(())
    }
}

/// Compile ignore-list patterns, anchored at the start of the name.
fn anchored_set(patterns: &[String]) -> Result<RegexSet> {
    Ok(RegexSet::new(
        patterns.iter().map(|p| format!("^(?:{p})")),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(value: serde_json::Value) -> RawDecl {
        RawDecl::from_value(&value).unwrap()
    }

    fn generator_with_module(module: &str) -> Generator {
        let mut generator = Generator::new();
        generator.module = module.to_string();
        generator.module_class = capitalize(module);
        generator
            .ingest(&decl(json!([format!("class {}", generator.module_class), "", [], []])))
            .unwrap();
        generator
    }

    #[test]
    fn class_registration_creates_type_entries() {
        let mut generator = generator_with_module("core");
        generator
            .ingest(&decl(json!(["class cv.Size", "", [], []])))
            .unwrap();

        assert!(generator.is_wrapped("Size"));
        assert_eq!(generator.types().lookup("Size").unwrap().objc_type(), "Size*");
        let ptr = generator.types().lookup("Ptr_Size").unwrap();
        assert_eq!(ptr.c_type.as_deref(), Some("Size"));
        assert_eq!(
            ptr.from_cpp_ptr.as_deref(),
            Some("[Size fromNativePtr:%(n)s]")
        );
    }

    #[test]
    fn ignored_class_is_dropped() {
        let mut generator = generator_with_module("core");
        generator
            .apply_module_config(&ModuleConfig {
                class_ignore_list: vec!["FileNode".into()],
                ..ModuleConfig::default()
            })
            .unwrap();
        generator
            .ingest(&decl(json!(["class cv.FileNode", "", [], []])))
            .unwrap();
        assert!(!generator.is_wrapped("FileNode"));
    }

    #[test]
    fn duplicate_class_without_base_keeps_first() {
        let mut generator = generator_with_module("core");
        generator
            .ingest(&decl(json!(["class cv.Size", "", [], [["int", "width", "", ["/RW"]]]])))
            .unwrap();
        generator
            .ingest(&decl(json!(["class cv.Size", "", [], []])))
            .unwrap();
        assert_eq!(generator.class("Size").unwrap().props.len(), 1);
    }

    #[test]
    fn unknown_class_constant_lands_on_module_class() {
        let mut generator = generator_with_module("core");
        generator
            .ingest(&decl(json!(["const cv.Param.INT", "0", [], []])))
            .unwrap();
        let core = generator.class("Core").unwrap();
        assert_eq!(core.consts.len(), 1);
        assert_eq!(core.consts[0].name, "Param_INT");
    }

    #[test]
    fn const_ignore_list_drops_by_regex() {
        let mut generator = generator_with_module("core");
        generator
            .apply_module_config(&ModuleConfig {
                const_ignore_list: vec!["CV_".into()],
                ..ModuleConfig::default()
            })
            .unwrap();
        generator
            .ingest(&decl(json!(["const cv.CV_8U", "0", [], []])))
            .unwrap();
        assert!(generator.class("Core").unwrap().consts.is_empty());
    }

    #[test]
    fn private_constants_are_separated() {
        let mut generator = generator_with_module("core");
        generator
            .apply_module_config(&ModuleConfig {
                const_private_list: vec!["CV_CN_.*".into()],
                ..ModuleConfig::default()
            })
            .unwrap();
        generator
            .ingest(&decl(json!(["const cv.CV_CN_SHIFT", "3", [], []])))
            .unwrap();
        let core = generator.class("Core").unwrap();
        assert!(core.consts.is_empty());
        assert_eq!(core.private_consts.len(), 1);
    }

    #[test]
    fn named_enum_registers_casting_entry() {
        let mut generator = generator_with_module("imgproc");
        generator
            .ingest(&decl(json!([
                "enum cv.ColorConversionCodes",
                "",
                [],
                [
                    ["const cv.COLOR_BGR2BGRA", "0", [], []],
                    ["const cv.COLOR_BGR2GRAY", "6", [], []]
                ]
            ])))
            .unwrap();
        let entry = generator.types().lookup("ColorConversionCodes").unwrap();
        assert_eq!(entry.cast_from.as_deref(), Some("int"));
        assert_eq!(entry.cast_to.as_deref(), Some("cv::ColorConversionCodes"));
        assert_eq!(entry.objc_type(), "int");

        let umbrella = generator.class("Imgproc").unwrap();
        assert_eq!(umbrella.consts.len(), 2);
        assert_eq!(
            umbrella.consts[0].enum_type.as_deref(),
            Some("cv.ColorConversionCodes")
        );
    }

    #[test]
    fn anonymous_enum_members_become_loose_constants() {
        let mut generator = generator_with_module("imgproc");
        generator
            .ingest(&decl(json!([
                "enum cv.<unnamed>",
                "",
                [],
                [["const cv.INTER_MAX", "7", [], []]]
            ])))
            .unwrap();
        assert!(!generator.types().contains("<unnamed>"));
        let umbrella = generator.class("Imgproc").unwrap();
        assert_eq!(umbrella.consts[0].enum_type, None);
    }

    #[test]
    fn backreferenced_value_is_scope_qualified_outside_named_enums() {
        let mut generator = generator_with_module("imgproc");
        generator
            .ingest(&decl(json!([
                "enum cv.<unnamed>",
                "",
                [],
                [
                    ["const cv.INTER_LINEAR", "1", [], []],
                    ["const cv.WARP_DEFAULT", "INTER_LINEAR", [], []]
                ]
            ])))
            .unwrap();
        let umbrella = generator.class("Imgproc").unwrap();
        assert_eq!(umbrella.consts[1].value, "Imgproc.INTER_LINEAR");
    }

    #[test]
    fn named_enum_backreferences_stay_unqualified() {
        let mut generator = generator_with_module("imgproc");
        generator
            .ingest(&decl(json!([
                "enum cv.MorphTypes",
                "",
                [],
                [
                    ["const cv.MORPH_ERODE", "0", [], []],
                    ["const cv.MORPH_FIRST", "MORPH_ERODE", [], []]
                ]
            ])))
            .unwrap();
        let umbrella = generator.class("Imgproc").unwrap();
        assert_eq!(umbrella.consts[1].value, "MORPH_ERODE");
    }

    #[test]
    fn duplicate_constant_keeps_first() {
        let mut generator = generator_with_module("core");
        generator
            .ingest(&decl(json!(["const cv.DECOMP_LU", "0", [], []])))
            .unwrap();
        generator
            .ingest(&decl(json!(["const cv.DECOMP_LU", "5", [], []])))
            .unwrap();
        let core = generator.class("Core").unwrap();
        assert_eq!(core.consts.len(), 1);
        assert_eq!(core.consts[0].value, "0");
    }

    #[test]
    fn function_with_unknown_class_is_dropped() {
        let mut generator = generator_with_module("core");
        generator
            .ingest(&decl(json!(["cv.Range.all", "Range", [], []])))
            .unwrap();
        assert!(generator.class("Range").is_none());
    }

    #[test]
    fn manual_function_is_skipped_at_ingestion() {
        let mut generator = generator_with_module("core");
        let mc: ModuleConfig = serde_json::from_str(
            r#"{"ManualFuncs": {"Core": {"norm": {"declaration": [], "implementation": []}}}}"#,
        )
        .unwrap();
        generator.apply_module_config(&mc).unwrap();
        generator
            .ingest(&decl(json!(["cv.norm", "double", [], [["Mat", "src", "", []]]])))
            .unwrap();
        assert!(generator.class("Core").unwrap().methods.is_empty());
    }

    #[test]
    fn methods_on_mat_are_accepted_but_mat_is_not_emitted() {
        let mut generator = generator_with_module("core");
        generator
            .ingest(&decl(json!(["cv.Mat.depth", "int", [], []])))
            .unwrap();
        assert_eq!(generator.class("Mat").unwrap().methods.len(), 1);
    }

    #[test]
    fn smartness_rules() {
        let mut generator = generator_with_module("features2d");
        generator
            .ingest(&decl(json!(["class cv.Algorithm", "", [], []])))
            .unwrap();
        generator
            .ingest(&decl(json!(["class cv.SIFT", ": cv::Algorithm", [], []])))
            .unwrap();
        generator
            .ingest(&decl(json!(["class cv.Size", "", [], []])))
            .unwrap();
        generator
            .ingest(&decl(json!(["class cv.BOWTrainer", "", [], []])))
            .unwrap();
        generator
            .ingest(&decl(json!([
                "cv.BOWTrainer.create",
                "Ptr_BOWTrainer",
                ["/S"],
                []
            ])))
            .unwrap();

        let algorithm = generator.class("Algorithm").unwrap().clone();
        let sift = generator.class("SIFT").unwrap().clone();
        let size = generator.class("Size").unwrap().clone();
        let bow = generator.class("BOWTrainer").unwrap().clone();
        assert!(generator.is_smart_class(&algorithm));
        assert!(generator.is_smart_class(&sift));
        assert!(!generator.is_smart_class(&size));
        assert!(generator.is_smart_class(&bow));
    }

    #[test]
    fn def_args_histogram_counts_defaulted_arguments() {
        let mut generator = generator_with_module("core");
        generator
            .ingest(&decl(json!([
                "cv.add",
                "void",
                ["/S"],
                [
                    ["Mat", "src1", "", []],
                    ["Mat", "src2", "", []],
                    ["Mat", "dst", "", []],
                    ["Mat", "mask", "Mat()", []],
                    ["int", "dtype", "-1", []]
                ]
            ])))
            .unwrap();
        assert_eq!(generator.def_args_hist.get(&2), Some(&1));
    }
}
