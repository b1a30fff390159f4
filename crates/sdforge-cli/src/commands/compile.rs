//! Compile command
//!
//! Usage: sdforge compile --tank <FILE> [--defs <DIR>] [--config <FILE>]

use clap::Args;
use std::fmt;
use std::path::{Path, PathBuf};

use sdforge_core::logging_facility::{init, Profile};
use sdforge_core::{compile, CompileError, ExporterConfig, FhirDefinitions, Package, Partition, Tank};

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// JSON file holding the tank of declarations
    #[arg(short, long)]
    pub tank: PathBuf,

    /// Directory of JSON definitions (core types, dependency packages)
    #[arg(short, long)]
    pub defs: Vec<PathBuf>,

    /// TOML compile configuration (default: built-in defaults)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Logging profile: dev or prod
    #[arg(long, default_value = "dev")]
    pub log_profile: Profile,
}

/// Compile finished but reported errors
#[derive(Debug)]
struct CompileFailed {
    errors: usize,
}

impl fmt::Display for CompileFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile reported {} error(s)", self.errors)
    }
}

impl std::error::Error for CompileFailed {}

/// Execute compile command
pub fn execute(args: CompileArgs) -> Result<(), Box<dyn std::error::Error>> {
    init(args.log_profile);

    let config = load_config(args.config.as_deref())?;
    let tank = load_tank(&args.tank)?;
    let mut library = FhirDefinitions::new();
    for dir in &args.defs {
        let loaded = library.load_dir(dir)?;
        tracing::debug!(dir = %dir.display(), loaded, "definitions loaded");
    }

    let output = compile(&tank, &library, &config);

    for diagnostic in output.diagnostics.all() {
        println!("{}", diagnostic);
    }
    print_summary(&output.package);

    let errors = output.diagnostics.errors().len();
    if errors > 0 {
        return Err(Box::new(CompileFailed { errors }));
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ExporterConfig, CompileError> {
    match path {
        Some(path) => {
            let source = read(path)?;
            ExporterConfig::from_toml_str(&source)
        }
        None => Ok(ExporterConfig::default()),
    }
}

fn load_tank(path: &Path) -> Result<Tank, CompileError> {
    let source = read(path)?;
    let mut tank: Tank =
        serde_json::from_str(&source).map_err(|e| CompileError::Serialization {
            message: format!("{}: {}", path.display(), e),
        })?;
    tank.normalize();
    Ok(tank)
}

fn read(path: &Path) -> Result<String, CompileError> {
    std::fs::read_to_string(path).map_err(|e| CompileError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn print_summary(package: &Package) {
    println!("✓ Compiled {} definition(s)", package.len());
    for partition in Partition::ALL {
        let artifacts = package.list(partition);
        if artifacts.is_empty() {
            continue;
        }
        println!("  {}: {}", partition.as_str(), artifacts.len());
        for sd in artifacts {
            println!("    {} ({})", sd.id, sd.url);
        }
    }
}
