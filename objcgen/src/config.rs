//! Generator configuration.
//!
//! Two JSON surfaces feed the generator: the top-level modules config handed
//! to the CLI, and one optional `gen_dict.json` per module. Layering is
//! built-in defaults, then each module's dictionary merged on top: list keys
//! append, scalar keys and map entries are last-writer-wins. Module-scoped
//! decorations (imports and umbrella header/body code) reset at every module
//! boundary instead of accumulating.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::types::TypeEntry;
use crate::{Error, Result};

/// Top-level configuration: module list and source-file remapping.
#[derive(Debug, Clone, Deserialize)]
pub struct TopConfig {
    pub rootdir: PathBuf,
    #[serde(default)]
    pub files_remap: Vec<FileRemapEntry>,
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

impl TopConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ParseJson {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRemapEntry {
    pub src: String,
    pub target: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    pub location: String,
}

/// Resolves configured source files through the remap table.
#[derive(Debug, Default)]
pub struct FileRemap {
    map: BTreeMap<PathBuf, PathBuf>,
}

impl FileRemap {
    pub fn new(rootdir: &Path, entries: &[FileRemapEntry]) -> Self {
        let map = entries
            .iter()
            .map(|e| {
                let src = rootdir.join(&e.src);
                (src.canonicalize().unwrap_or(src), e.target.clone())
            })
            .collect();
        Self { map }
    }

    /// Map `path` to its configured replacement, or hand it back unchanged.
    /// A path still ending in `.in` after resolution is a template input that
    /// was never remapped, which is a configuration error.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(target) = self.map.get(&canonical) {
            return Ok(target.clone());
        }
        if canonical.extension().is_some_and(|ext| ext == "in") {
            return Err(Error::RemapToTemplate { path: canonical });
        }
        Ok(canonical)
    }
}

/// Out-of-band constants attached to a class at registration time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MissingConsts {
    pub public: Vec<(String, Value)>,
    pub private: Vec<(String, Value)>,
}

/// Hand-written method fragments emitted verbatim into a class.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManualFunc {
    pub declaration: Vec<String>,
    pub implementation: Vec<String>,
}

/// One argument or function fix-up from `func_arg_fix`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArgFix {
    pub ctype: Option<String>,
    pub attrib: Option<Vec<String>>,
    pub name: Option<String>,
}

/// One module's `gen_dict.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub class_ignore_list: Vec<String>,
    pub const_ignore_list: Vec<String>,
    pub const_private_list: Vec<String>,
    pub missing_consts: BTreeMap<String, MissingConsts>,
    pub type_dict: BTreeMap<String, TypeEntry>,
    #[serde(rename = "ManualFuncs")]
    pub manual_funcs: BTreeMap<String, BTreeMap<String, ManualFunc>>,
    pub func_arg_fix: BTreeMap<String, BTreeMap<String, ArgFix>>,
    pub namespaces_dict: BTreeMap<String, String>,
    pub module_imports: Vec<String>,
    /// File name (relative to the module's misc directory) with extra
    /// umbrella header code.
    pub module_objc_h_code: Option<String>,
    /// Likewise for the umbrella body.
    pub module_objc_mm_code: Option<String>,
}

impl ModuleConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ParseJson {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The layered runtime configuration the generator works against.
///
/// `type_dict` layers are applied to the [`crate::TypeRegistry`] directly and
/// do not appear here.
#[derive(Debug, Clone, Default)]
pub struct GenConfig {
    pub class_ignore_list: Vec<String>,
    pub const_ignore_list: Vec<String>,
    pub const_private_list: Vec<String>,
    pub missing_consts: BTreeMap<String, MissingConsts>,
    pub manual_funcs: BTreeMap<String, BTreeMap<String, ManualFunc>>,
    pub func_arg_fix: BTreeMap<String, BTreeMap<String, ArgFix>>,
    pub namespaces_dict: BTreeMap<String, String>,
    pub module_imports: Vec<String>,
    pub module_header_code: String,
    pub module_body_code: String,
}

impl GenConfig {
    /// Reset the module-scoped decorations at a module boundary. The ignore
    /// lists, fix-ups and type mappings keep accumulating across modules.
    pub fn begin_module(&mut self) {
        self.module_imports.clear();
        self.module_header_code.clear();
        self.module_body_code.clear();
    }

    /// Merge one module dictionary on top of the current state.
    pub fn merge(&mut self, mc: &ModuleConfig) {
        self.class_ignore_list
            .extend(mc.class_ignore_list.iter().cloned());
        self.const_ignore_list
            .extend(mc.const_ignore_list.iter().cloned());
        self.const_private_list
            .extend(mc.const_private_list.iter().cloned());
        for (k, v) in &mc.missing_consts {
            self.missing_consts.insert(k.clone(), v.clone());
        }
        for (k, v) in &mc.manual_funcs {
            self.manual_funcs.insert(k.clone(), v.clone());
        }
        for (k, v) in &mc.func_arg_fix {
            self.func_arg_fix.insert(k.clone(), v.clone());
        }
        for (k, v) in &mc.namespaces_dict {
            self.namespaces_dict.insert(k.clone(), v.clone());
        }
        self.module_imports.extend(mc.module_imports.iter().cloned());
    }

    /// Manual-function entries covering `objc_name` in `classname`. An entry
    /// whose key starts with `init` also covers the class's constructors.
    pub fn is_manual(&self, classname: &str, objc_name: &str, is_constructor: bool) -> bool {
        match self.manual_funcs.get(classname) {
            Some(funcs) => {
                funcs.contains_key(objc_name)
                    || (is_constructor && funcs.keys().any(|k| k.starts_with("init")))
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_keys_append_across_layers() {
        let mut cfg = GenConfig::default();
        cfg.merge(&ModuleConfig {
            const_ignore_list: vec!["CV_".into()],
            ..ModuleConfig::default()
        });
        cfg.merge(&ModuleConfig {
            const_ignore_list: vec!["IPL_".into()],
            class_ignore_list: vec!["FileNode".into()],
            ..ModuleConfig::default()
        });
        assert_eq!(cfg.const_ignore_list, vec!["CV_", "IPL_"]);
        assert_eq!(cfg.class_ignore_list, vec!["FileNode"]);
    }

    #[test]
    fn map_keys_are_last_writer_wins() {
        let mut cfg = GenConfig::default();
        let mut first = ModuleConfig::default();
        first
            .namespaces_dict
            .insert("cv.fisheye".into(), "fisheye".into());
        let mut second = ModuleConfig::default();
        second
            .namespaces_dict
            .insert("cv.fisheye".into(), "fish".into());
        cfg.merge(&first);
        cfg.merge(&second);
        assert_eq!(cfg.namespaces_dict["cv.fisheye"], "fish");
    }

    #[test]
    fn module_decorations_reset_per_module() {
        let mut cfg = GenConfig::default();
        cfg.merge(&ModuleConfig {
            module_imports: vec!["Mat".into()],
            ..ModuleConfig::default()
        });
        cfg.module_header_code = "// extra".into();
        cfg.begin_module();
        assert!(cfg.module_imports.is_empty());
        assert!(cfg.module_header_code.is_empty());
    }

    #[test]
    fn manual_init_entries_cover_constructors() {
        let mut cfg = GenConfig::default();
        let mut funcs = BTreeMap::new();
        funcs.insert("initWithRows".to_string(), ManualFunc::default());
        cfg.manual_funcs.insert("Mat".into(), funcs);

        assert!(cfg.is_manual("Mat", "Mat", true));
        assert!(!cfg.is_manual("Mat", "diag", false));
        assert!(cfg.is_manual("Mat", "initWithRows", false));
    }

    #[test]
    fn module_config_parses_known_keys() {
        let json = r#"{
            "class_ignore_list": ["FileNode"],
            "const_private_list": ["CV_CN_.*"],
            "missing_consts": {
                "Core": { "public": [["SVD_MODIFY_A", 1], ["SVD_NO_UV", "2"]] }
            },
            "type_dict": {
                "Scalar": {"objc_type": "Scalar*", "to_cpp": "%(n)s.nativeRef"}
            },
            "ManualFuncs": {
                "Core": {
                    "norm": { "declaration": ["+ (double)norm;"], "implementation": ["..."] }
                }
            },
            "namespaces_dict": {"cv.fisheye": "fisheye"},
            "module_imports": ["Mat"]
        }"#;
        let mc: ModuleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(mc.class_ignore_list, vec!["FileNode"]);
        assert_eq!(mc.missing_consts["Core"].public.len(), 2);
        assert_eq!(
            mc.type_dict["Scalar"].to_cpp.as_deref(),
            Some("%(n)s.nativeRef")
        );
        assert!(mc.manual_funcs["Core"].contains_key("norm"));
        assert_eq!(mc.namespaces_dict["cv.fisheye"], "fisheye");
    }
}
