//! packfs - embed static assets into Rust binaries.
//!
//! Scans the current crate for asset references, packages the referenced
//! files into a deterministic archive and generates the source file that
//! serves them from memory at runtime.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use packfs::archive;
use packfs::config::ARTIFACT_NAME;
use packfs::resolver::{self, Declaration, Resolution};
use packfs::{DiskBackend, Identity, Info};

#[derive(Parser)]
#[command(name = "packfs")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Embed static assets into Rust binaries",
    long_about = "Scans the current crate for asset references, packages the referenced files into a deterministic archive and generates the Rust source that serves them from memory at runtime."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all references and write the generated artifact
    Pack {
        /// Output directory for the artifact, relative to the module root
        #[arg(long)]
        out: Option<PathBuf>,

        /// Embed a path even without a scanned reference (repeatable)
        #[arg(long = "include")]
        include: Vec<String>,
    },

    /// Print every identity a pack run would embed
    List {
        /// Embed a path even without a scanned reference (repeatable)
        #[arg(long = "include")]
        include: Vec<String>,
    },

    /// Print scanned declarations grouped by source file, as JSON
    Parse,

    /// Canonicalize a path against the current module
    Path {
        /// Path or module:path reference
        path: String,
    },

    /// Stat a path on the active filesystem
    Stat {
        /// Path or module:path reference
        path: String,
    },

    /// Print the resolved build context as JSON
    Info,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Pack { out, include } => cmd_pack(out, &include),

        Commands::List { include } => cmd_list(&include),

        Commands::Parse => cmd_parse(),

        Commands::Path { path } => cmd_path(&path),

        Commands::Stat { path } => cmd_stat(&path),

        Commands::Info => cmd_info(),
    }
}

fn cmd_pack(out: Option<PathBuf>, includes: &[String]) -> anyhow::Result<()> {
    let info = Info::current()?;
    let dest_dir = match out {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => info.root.join(dir),
        None => info.root.clone(),
    };
    let dest = dest_dir.join(ARTIFACT_NAME);

    // An outdated artifact must not survive a failed run, so it goes first.
    if dest.exists() {
        fs::remove_file(&dest)
            .with_context(|| format!("removing stale artifact {}", dest.display()))?;
    }

    let backend = DiskBackend::new(info.clone())?;
    let resolution = resolver::resolve(&info, &backend, includes)?;
    report_warnings(&resolution);

    archive::pack(&backend, &resolution.decls, &dest)?;

    let written = fs::metadata(&dest)
        .with_context(|| format!("reading back {}", dest.display()))?
        .len();
    println!("Wrote {} bytes to {}", written, dest.display());

    Ok(())
}

fn cmd_list(includes: &[String]) -> anyhow::Result<()> {
    let info = Info::current()?;
    let backend = DiskBackend::new(info.clone())?;
    let resolution = resolver::resolve(&info, &backend, includes)?;
    report_warnings(&resolution);

    for decl in &resolution.decls {
        println!("{}", decl.id);
    }

    Ok(())
}

fn cmd_parse() -> anyhow::Result<()> {
    let info = Info::current()?;
    let backend = DiskBackend::new(info.clone())?;
    let resolution = resolver::resolve(&info, &backend, &[])?;
    report_warnings(&resolution);

    let mut grouped: BTreeMap<String, Vec<&Declaration>> = BTreeMap::new();
    for decl in &resolution.decls {
        if let Some(location) = &decl.location {
            grouped
                .entry(location.file.display().to_string())
                .or_default()
                .push(decl);
        }
    }
    println!("{}", serde_json::to_string_pretty(&grouped)?);

    Ok(())
}

fn cmd_path(path: &str) -> anyhow::Result<()> {
    let info = Info::current()?;
    let id = Identity::parse(path, &info.module)?;
    println!("{}", serde_json::to_string(&id)?);

    Ok(())
}

fn cmd_stat(path: &str) -> anyhow::Result<()> {
    let meta = packfs::stat(path)?;

    println!("Identity:  {}", meta.id);
    println!("Kind:      {}", if meta.is_dir { "directory" } else { "file" });
    println!("Size:      {} bytes", meta.size);
    println!("Mode:      {:o}", meta.mode);
    println!("Modified:  {}", meta.mtime);

    Ok(())
}

fn cmd_info() -> anyhow::Result<()> {
    let info = Info::current()?;
    println!("{}", serde_json::to_string_pretty(&info)?);

    Ok(())
}

fn report_warnings(resolution: &Resolution) {
    for warning in &resolution.warnings {
        eprintln!("warning: {}", warning);
    }
}
