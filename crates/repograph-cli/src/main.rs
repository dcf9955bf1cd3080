//! CLI binary for repograph: initialize a repository and keep its graph in
//! sync with version control.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use repograph_core::config::RpgConfig;
use repograph_core::storage;
use repograph_evolve::evolver::{EvolutionOptions, Evolver, Externals};
use repograph_evolve::llm::{HttpDescriber, HttpEmbedder};
use repograph_evolve::vcs::{GitCli, VcsProbe as _};
use repograph_evolve::VcsError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "repograph", about = "Repository Planning Graph maintenance")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .rpg/config.json, install VCS hooks, and ignore .rpg/local/
    Init,

    /// Copy the canonical graph to .rpg/local/ and evolve it on branches
    Sync {
        /// Evolve even on the default branch
        #[arg(long)]
        force: bool,
    },

    /// Show graph statistics
    Info,
}

/// CLI failure with its documented exit code: 1 for a missing canonical
/// graph or config, 2 for VCS failures.
enum CliError {
    MissingCanonical(PathBuf),
    Vcs(VcsError),
    Other(anyhow::Error),
}

impl CliError {
    fn code(&self) -> u8 {
        match self {
            Self::MissingCanonical(_) | Self::Other(_) => 1,
            Self::Vcs(_) => 2,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCanonical(path) => {
                write!(f, "no canonical graph at {}", path.display())
            }
            Self::Vcs(e) => write!(f, "{e}"),
            Self::Other(e) => write!(f, "{e:#}"),
        }
    }
}

impl From<VcsError> for CliError {
    fn from(e: VcsError) -> Self {
        Self::Vcs(e)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = match &cli.project {
        Some(path) => path.clone(),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("error: cannot determine current directory: {e}");
                return ExitCode::from(1);
            }
        },
    };

    let outcome = match cli.command {
        Commands::Init => run_init(&root),
        Commands::Sync { force } => run_sync(&root, force),
        Commands::Info => run_info(&root),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.code())
        }
    }
}

const HOOK_LINE: &str = "repograph sync --force >/dev/null 2>&1 || true";

fn run_init(root: &Path) -> Result<(), CliError> {
    let config_path = storage::config_file(root);
    if config_path.exists() {
        println!("already initialized: {}", config_path.display());
    } else {
        let mut config = RpgConfig::default();
        config.name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repograph")
            .to_string();
        config.save(root).context("failed to write config")?;
        println!("wrote {}", config_path.display());
    }

    for hook in ["post-merge", "post-checkout"] {
        install_hook(root, hook).with_context(|| format!("failed to install {hook} hook"))?;
    }
    ensure_gitignore(root).context("failed to update .gitignore")?;
    Ok(())
}

/// Install a hook that re-syncs the graph. Existing hooks are appended to,
/// never overwritten.
fn install_hook(root: &Path, name: &str) -> anyhow::Result<()> {
    let hooks_dir = root.join(".git").join("hooks");
    if !hooks_dir.exists() {
        tracing::warn!(hook = name, "no .git/hooks directory, skipping hook install");
        return Ok(());
    }
    let path = hooks_dir.join(name);
    if path.exists() {
        let existing = std::fs::read_to_string(&path)?;
        if !existing.contains("repograph sync") {
            let mut appended = existing;
            if !appended.ends_with('\n') {
                appended.push('\n');
            }
            appended.push_str(HOOK_LINE);
            appended.push('\n');
            std::fs::write(&path, appended)?;
        }
    } else {
        std::fs::write(&path, format!("#!/bin/sh\n{HOOK_LINE}\n"))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        }
    }
    Ok(())
}

fn ensure_gitignore(root: &Path) -> anyhow::Result<()> {
    let path = root.join(".gitignore");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    if existing.lines().any(|l| l.trim() == ".rpg/local/") {
        return Ok(());
    }
    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(".rpg/local/\n");
    std::fs::write(&path, content)?;
    Ok(())
}

fn run_sync(root: &Path, force: bool) -> Result<(), CliError> {
    let config = RpgConfig::load(root)
        .map_err(|e| CliError::Other(anyhow::Error::new(e)))?;

    let canonical = storage::graph_file(root);
    if !canonical.exists() {
        return Err(CliError::MissingCanonical(canonical));
    }

    // Canonical → local copy is the baseline for every sync.
    let local = storage::local_graph_file(root);
    std::fs::create_dir_all(storage::local_dir(root))
        .and_then(|()| std::fs::copy(&canonical, &local).map(|_| ()))
        .context("failed to copy canonical graph to .rpg/local/")?;

    let git = GitCli::locate()?;
    let branch = git.current_branch(root)?;
    let default = git.default_branch(root)?;
    let head = git.head_sha(root)?;

    if branch != default || force {
        let base = git.merge_base(root, &default, "HEAD")?;
        let range = format!("{base}..HEAD");
        tracing::info!(branch, range, "evolving local graph");

        match evolve_local(root, &config, &range) {
            Ok(result) => println!(
                "evolved: +{} -{} ~{} rerouted {} pruned {} ({} ms)",
                result.inserted,
                result.deleted,
                result.modified,
                result.rerouted,
                result.pruned_nodes,
                result.duration_ms
            ),
            Err(e) => {
                // The local copy may be half-evolved; restore the canonical
                // baseline and report success with a warning.
                tracing::warn!(error = %e, "evolution failed, restoring canonical copy");
                std::fs::copy(&canonical, &local)
                    .context("failed to restore canonical graph")?;
            }
        }
    } else {
        println!("on default branch `{branch}`, canonical copy is authoritative");
    }

    storage::SyncState::now(head, branch)
        .save(root)
        .context("failed to write sync state")?;
    Ok(())
}

fn evolve_local(
    root: &Path,
    config: &RpgConfig,
    range: &str,
) -> anyhow::Result<repograph_evolve::EvolutionResult> {
    let local = storage::local_graph_file(root);
    let mut graph = storage::load_graph(&local).context("failed to load local graph")?;

    let mut options = EvolutionOptions::new(root, range);
    options.drift_threshold = config.evolution.drift_threshold;
    options.use_llm = config.evolution.use_llm;
    options.include_source = config.evolution.include_source;

    let externals = if config.evolution.use_llm {
        Externals {
            describer: Some(Arc::new(HttpDescriber::from_env())),
            embedder: Some(Arc::new(HttpEmbedder::from_env())),
            ..Externals::default()
        }
    } else {
        Externals::default()
    };

    let mut evolver = Evolver::new(options, externals)?;
    let result = evolver.evolve(&mut graph)?;
    storage::save_graph(&local, &graph, &config.graph_config())
        .context("failed to save local graph")?;
    Ok(result)
}

fn run_info(root: &Path) -> Result<(), CliError> {
    let canonical = storage::graph_file(root);
    if !canonical.exists() {
        return Err(CliError::MissingCanonical(canonical));
    }
    let graph = storage::load_graph(&canonical)
        .map_err(|e| CliError::Other(anyhow::Error::new(e)))?;
    let stats = graph.stats();
    let rendered = serde_json::to_string_pretty(&stats)
        .map_err(|e| CliError::Other(anyhow::Error::new(e)))?;
    println!("{rendered}");
    if let Ok(Some(state)) = storage::SyncState::load(root) {
        println!(
            "local: branch `{}` at {} (synced {})",
            state.branch, state.base_commit, state.last_sync
        );
    }
    Ok(())
}
