use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use madpack::app::maintenance::detect_unused_files;
use madpack::infra::config::Config;
use madpack::domain::definition::ModelDefinition;
use madpack::infra::finder::ModelFileFinder;
use madpack::infra::persist::{default_persisters, find_persister};
use madpack::infra::source::ModelSource;

#[derive(Parser)]
#[command(author, version, about = "Project automation commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cargo nextest with default configuration
    Nextest {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        release: bool,
    },
    /// Report (and optionally delete) files in a model directory that no
    /// model definition references
    CleanModels {
        /// Root directory containing model definition documents
        root: PathBuf,
        /// Delete the unused files instead of only listing them
        #[arg(long)]
        delete: bool,
    },
}

fn main() -> Result<()> {
    madpack::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Nextest { profile, release } => run_nextest(profile, release)?,
        Commands::CleanModels { root, delete } => clean_models(&root, delete)?,
    }
    Ok(())
}

fn run_nextest(profile: Option<String>, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.arg("nextest").arg("run");
    if let Some(profile) = profile {
        cmd.arg("--profile").arg(profile);
    }
    if release {
        cmd.arg("--release");
    }
    let status = cmd.status()?;
    if !status.success() {
        anyhow::bail!("cargo nextest run failed");
    }
    Ok(())
}

fn clean_models(root: &Path, delete: bool) -> Result<()> {
    let models = load_models(root)?;
    anyhow::ensure!(
        !models.is_empty(),
        "no model definition documents found below {}",
        root.display()
    );

    let pairs: Vec<(&ModelDefinition, &ModelFileFinder)> =
        models.iter().map(|(m, f)| (m, f)).collect();
    let unused = detect_unused_files(root, &pairs)
        .with_context(|| format!("scanning {}", root.display()))?;

    if unused.is_empty() {
        println!("no unused files below {}", root.display());
        return Ok(());
    }
    for path in &unused {
        if delete {
            std::fs::remove_file(path)
                .with_context(|| format!("deleting {}", path.display()))?;
            println!("deleted {}", path.display());
        } else {
            println!("unused: {}", path.display());
        }
    }
    if !delete {
        println!("{} unused file(s); re-run with --delete to remove them", unused.len());
    }
    Ok(())
}

/// Load every recognized model definition document below the root, each
/// paired with a finder reading from the root as a directory source.
fn load_models(root: &Path) -> Result<Vec<(ModelDefinition, ModelFileFinder)>> {
    let config = Config::load()?;
    let persisters = default_persisters();
    let mut models = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(persister) = find_persister(&persisters, &name) else {
            continue;
        };
        let mut file = File::open(entry.path())
            .with_context(|| format!("opening {}", entry.path().display()))?;
        let model = persister
            .load(&mut file)
            .with_context(|| format!("loading {}", entry.path().display()))?;
        let source_root = entry.path().parent().unwrap_or(root).to_path_buf();
        let finder = ModelFileFinder::from_config(
            &config,
            model.path_offsets.clone(),
            ModelSource::directory(source_root),
        );
        models.push((model, finder));
    }
    Ok(models)
}
