//! seamfs CLI entry point.
//!
//! Browses a directory tree with zip archives resolved in place:
//!
//! ```text
//! seamfs --root ./data ls /
//! seamfs --root ./data ls /bundle.zip#/
//! seamfs --root ./data cat /bundle.zip#/docs/readme.md
//! seamfs --root ./data tree /
//! seamfs --mounts mounts.json ls /
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use seamfs_core::{
    FileSystem, FileSystemMounter, PhysicalFileSystem, ReadOnlyFileSystem, VirtualPath,
};
use seamfs_zip::seamless_zip;

#[derive(Parser)]
#[command(name = "seamfs", version, about = "Browse files with zip archives resolved in place")]
struct Cli {
    /// Physical directory exposed as the virtual root
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// JSON mount manifest: a list of {"path", "root", "read_only"} entries
    /// mounted over the root
    #[arg(long)]
    mounts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a directory's entities
    Ls { path: String },
    /// Print a file's contents
    Cat { path: String },
    /// Print a directory tree
    Tree { path: String },
}

/// One entry of the `--mounts` manifest.
#[derive(Deserialize)]
struct MountSpec {
    /// Virtual mount point, e.g. "/data/".
    path: String,
    /// Physical directory backing the mount.
    root: PathBuf,
    #[serde(default)]
    read_only: bool,
}

fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let fs = build_filesystem(&cli)?;

    match &cli.command {
        Command::Ls { path } => ls(fs.as_ref(), path),
        Command::Cat { path } => cat(fs.as_ref(), path),
        Command::Tree { path } => tree_cmd(fs.as_ref(), path),
    }
}

fn build_filesystem(cli: &Cli) -> Result<Arc<dyn FileSystem>> {
    let root_fs: Arc<dyn FileSystem> = Arc::new(
        PhysicalFileSystem::new(&cli.root)
            .with_context(|| format!("opening root directory {}", cli.root.display()))?,
    );

    let inner: Arc<dyn FileSystem> = match &cli.mounts {
        Some(manifest) => {
            let text = std::fs::read_to_string(manifest)
                .with_context(|| format!("reading mount manifest {}", manifest.display()))?;
            let specs: Vec<MountSpec> =
                serde_json::from_str(&text).context("parsing mount manifest")?;

            let mut mounter = FileSystemMounter::new();
            mounter.mount(VirtualPath::root(), root_fs)?;
            for spec in specs {
                let path = VirtualPath::parse(&spec.path)
                    .with_context(|| format!("mount point {:?}", spec.path))?;
                let backend: Arc<dyn FileSystem> = Arc::new(
                    PhysicalFileSystem::new(&spec.root)
                        .with_context(|| format!("opening {}", spec.root.display()))?,
                );
                let backend: Arc<dyn FileSystem> = if spec.read_only {
                    Arc::new(ReadOnlyFileSystem::new(backend))
                } else {
                    backend
                };
                mounter.mount(path, backend)?;
            }
            Arc::new(mounter)
        }
        None => root_fs,
    };

    Ok(Arc::new(seamless_zip(inner)))
}

/// Parse a user-supplied directory argument, tolerating a missing
/// trailing separator.
fn directory_path(arg: &str) -> Result<VirtualPath> {
    let s = if arg.ends_with('/') {
        arg.to_string()
    } else {
        format!("{arg}/")
    };
    Ok(VirtualPath::parse(&s)?)
}

fn ls(fs: &dyn FileSystem, path: &str) -> Result<()> {
    let path = directory_path(path)?;
    for entry in fs.entities(&path)? {
        println!("{entry}");
    }
    Ok(())
}

fn cat(fs: &dyn FileSystem, path: &str) -> Result<()> {
    let path = VirtualPath::parse(path)?;
    let bytes = fs.read(&path)?;
    std::io::stdout().write_all(&bytes)?;
    Ok(())
}

fn tree_cmd(fs: &dyn FileSystem, path: &str) -> Result<()> {
    let path = directory_path(path)?;
    println!("{path}");
    tree(fs, &path, 1)
}

fn tree(fs: &dyn FileSystem, dir: &VirtualPath, depth: usize) -> Result<()> {
    for entry in fs.entities(dir)? {
        let name = entry.entity_name().unwrap_or("/");
        println!("{:indent$}{name}{}", "", if entry.is_directory() { "/" } else { "" }, indent = depth * 2);
        if entry.is_directory() {
            tree(fs, &entry, depth + 1)?;
        }
    }
    Ok(())
}
