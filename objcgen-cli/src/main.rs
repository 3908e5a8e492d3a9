//! Command-line driver for the Objective-C wrapper generator.
//!
//! Loads the top-level modules configuration, then runs the generator over
//! each module in order: discover its source headers, layer its
//! `gen_dict.json` onto the accumulated configuration and emit the wrapper
//! sources under `./gen/objc/<module>/` plus the `<module>.txt` report.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use regex::Regex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use objcgen::config::{FileRemap, ModuleConfig, TopConfig};
use objcgen::{CommandParser, FileWriter, Generator};

#[derive(Parser)]
#[command(name = "objcgen")]
#[command(about = "Objective-C wrapper generator for the OpenCV C++ API")]
struct Cli {
    /// Header parser executable; invoked once per header, prints
    /// declaration tuples as JSON
    #[arg(short = 'p', long = "parser")]
    parser: PathBuf,

    /// Modules configuration JSON
    #[arg(short = 'c', long = "config")]
    config: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if !cli.parser.exists() {
        bail!("header parser not found: {}", cli.parser.display());
    }
    let config = TopConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if !config.rootdir.exists() {
        bail!("root directory not found: {}", config.rootdir.display());
    }
    let remap = FileRemap::new(&config.rootdir, &config.files_remap);

    let dstdir = PathBuf::from("./gen");
    let objc_base_path = dstdir.join("objc");
    fs::create_dir_all(&objc_base_path)
        .with_context(|| format!("creating {}", objc_base_path.display()))?;

    let mut generator = Generator::new();
    let mut parser = CommandParser::new(&cli.parser);
    let mut writer = FileWriter::new();

    println!(
        "Objective-C: Processing modules: {}",
        config.modules.len()
    );
    for module in &config.modules {
        let module_location = config.rootdir.join(&module.location);
        info!(
            "=== MODULE: {} ({}) ===",
            module.name,
            module_location.display()
        );
        let misc_location = module_location.join("misc/objc");

        let srcfiles = collect_source_headers(&module_location, &misc_location)?;
        let common_headers =
            read_filelist(&misc_location.join("filelist_common"), &module_location)?;

        generator.begin_module_config();
        let gen_dict = misc_location.join("gen_dict.json");
        if gen_dict.exists() {
            let mc = ModuleConfig::load(&gen_dict)?;
            let header_code = read_extra_code(mc.module_objc_h_code.as_deref(), &misc_location, &remap)?;
            let body_code = read_extra_code(mc.module_objc_mm_code.as_deref(), &misc_location, &remap)?;
            generator.apply_module_config(&mc)?;
            generator.set_module_code(header_code, body_code);
        }

        if srcfiles.is_empty() {
            info!("no generated code for module: {}", module.name);
            continue;
        }
        generator
            .generate_module(
                &mut parser,
                &srcfiles,
                &module.name,
                &dstdir,
                &objc_base_path,
                &common_headers,
                &mut writer,
            )
            .with_context(|| format!("generating module {}", module.name))?;
    }

    println!(
        "Generated files: {} (updated {})",
        writer.total_files(),
        writer.updated_files()
    );
    Ok(())
}

/// Read a newline-separated file list relative to the module location.
/// A missing file yields an empty list.
fn read_filelist(path: &Path, module_location: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| module_location.join(line))
        .collect())
}

/// Headers to parse for one module: the curated `misc/objc/filelist` when
/// present, otherwise everything under `include/` minus the private and
/// platform-specific patterns, `.h` files before `.hpp`.
fn collect_source_headers(module_location: &Path, misc_location: &Path) -> Result<Vec<PathBuf>> {
    let filelist = misc_location.join("filelist");
    if filelist.exists() {
        return read_filelist(&filelist, module_location);
    }

    let exclude =
        Regex::new(r"(private|.inl.hpp$|_inl.hpp$|.details.hpp$|_winrt.hpp$|/cuda/|/legacy/)")?;
    let mut h_files = Vec::new();
    let mut hpp_files = Vec::new();
    walk(&module_location.join("include"), &mut |path| {
        match path.extension().and_then(|e| e.to_str()) {
            Some("h") => h_files.push(path.to_path_buf()),
            Some("hpp") => hpp_files.push(path.to_path_buf()),
            _ => {}
        }
    })?;
    h_files.sort();
    hpp_files.sort();

    Ok(h_files
        .into_iter()
        .chain(hpp_files)
        .filter(|p| !exclude.is_match(&p.to_string_lossy().replace('\\', "/")))
        .collect())
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

/// Read the configured umbrella header/body code fragment, resolving the
/// file through the remap table. No configured file means no extra code.
fn read_extra_code(
    file_name: Option<&str>,
    misc_location: &Path,
    remap: &FileRemap,
) -> Result<String> {
    let Some(file_name) = file_name else {
        return Ok(String::new());
    };
    let path = remap.resolve(&misc_location.join(file_name))?;
    fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
}
