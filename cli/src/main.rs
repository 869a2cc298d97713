//! CLI for copilot-sync.
//!
//! Syncs Copilot agents, prompts, instructions and chat modes from GitHub
//! repositories into the current workspace, and manages their backups and
//! the configured repository list.

use clap::{Parser, Subcommand};
use copilot_sync::config::CONFIG_FILE_NAME;
use copilot_sync::{
    Category, ConfigFileStatus, Deployer, DeploymentSummary, DiscoveredWorkspace, FixedWorkspace,
    GitHubFetcher, ItemOutcome, LogNotifier, RepositoryConfig, SyncConfig, SyncOptions,
    TokenSignIn, WorkspaceResolver,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Copilot Sync - Install Copilot customization files from GitHub repositories.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workspace root. Discovered from the current directory if omitted.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Config file. Defaults to copilot-sync.toml in the workspace root.
    #[arg(long, global = true, env = "COPILOT_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// GitHub token, used when a request needs authorization.
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install or update every item from every enabled repository.
    Sync {
        /// Show what would change without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Ignore cached listings.
        #[arg(long)]
        refresh: bool,
    },

    /// List available items.
    List {
        /// Only list this category.
        #[arg(long)]
        category: Option<Category>,
    },

    /// Install specific items.
    Install {
        /// Category of the items.
        category: Category,

        /// Filenames, e.g. code-review.agent.md.
        #[arg(required = true)]
        names: Vec<String>,

        /// Show what would change without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show installed counts per category.
    Status,

    /// Snapshot a category directory.
    Backup {
        /// Category to back up.
        category: Category,
    },

    /// List backups of a category, most recent first.
    Backups {
        /// Category whose backups to list.
        category: Category,
    },

    /// Replace a category directory with one of its backups.
    Restore {
        /// Category to restore.
        category: Category,

        /// Backup id, as shown by `backups`.
        id: String,
    },

    /// Delete backups older than the configured retention.
    Cleanup,

    /// Manage configured repositories.
    #[command(subcommand)]
    Repo(RepoCommand),
}

#[derive(Subcommand, Debug)]
enum RepoCommand {
    /// List configured repositories.
    List,

    /// Add a repository.
    Add {
        /// Display name.
        name: String,

        /// GitHub URL, e.g. https://github.com/owner/repo.
        url: String,

        /// Branch to read from.
        #[arg(long)]
        branch: Option<String>,
    },

    /// Remove a repository.
    Remove {
        /// Repository URL.
        url: String,
    },

    /// Include a repository in syncs.
    Enable {
        /// Repository URL.
        url: String,
    },

    /// Exclude a repository from syncs.
    Disable {
        /// Repository URL.
        url: String,
    },
}

/// Outcome of a command, mapped to the exit code.
enum Outcome {
    Success,
    PartialFailure,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(Outcome::Success) => ExitCode::from(0),
        Ok(Outcome::PartialFailure) => ExitCode::from(1),
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Initializes tracing with a compact format and `RUST_LOG` filtering
/// (defaults to "info").
fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn run(args: Args) -> Result<Outcome, Box<dyn std::error::Error>> {
    let root = match &args.workspace {
        Some(path) => FixedWorkspace(Some(path.clone())).resolve()?,
        None => DiscoveredWorkspace::new(std::env::current_dir()?).resolve()?,
    };
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
    let mut config = SyncConfig::load(&config_path)?;

    let mut fetcher = GitHubFetcher::anonymous()?;
    if let Some(token) = args.token {
        fetcher = fetcher.with_sign_in(Arc::new(TokenSignIn::new(token)));
    }
    let deployer = Deployer::new(&FixedWorkspace(Some(root)), config.clone(), Arc::new(fetcher))?
        .with_notifier(Arc::new(LogNotifier));

    match args.command {
        Command::Sync { dry_run, refresh } => {
            let summary = deployer.sync(SyncOptions { dry_run, refresh }).await?;
            print_summary(&summary);
            Ok(outcome_of(&summary))
        }
        Command::Install {
            category,
            names,
            dry_run,
        } => {
            let selection: Vec<_> = names.into_iter().map(|name| (category, name)).collect();
            let summary = deployer
                .install_items(&selection, SyncOptions { dry_run, refresh: false })
                .await?;
            print_summary(&summary);
            Ok(outcome_of(&summary))
        }
        Command::List { category } => list(&deployer, category).await,
        Command::Status => {
            let installed = deployer.status();
            for (category, count) in installed.counts() {
                println!("{:<14} {count}", category.display_name());
                for name in installed.names(category) {
                    println!("  {name}");
                }
            }
            Ok(Outcome::Success)
        }
        Command::Backup { category } => {
            match deployer.backup_category(category)? {
                Some(id) => println!("Created backup {id}"),
                None => println!("Nothing to back up: {category} is not installed"),
            }
            Ok(Outcome::Success)
        }
        Command::Backups { category } => {
            let backups = deployer.list_backups(category)?;
            if backups.is_empty() {
                println!("No backups of {category}");
            }
            for backup in backups {
                println!("{}", backup.id);
            }
            Ok(Outcome::Success)
        }
        Command::Restore { category, id } => {
            let report = deployer.restore_category(category, &id)?;
            println!("Restored {category} from {}", report.restored);
            if let Some(safety) = report.safety_backup {
                println!("Previous contents saved as backup {safety}");
            }
            Ok(Outcome::Success)
        }
        Command::Cleanup => cleanup(&deployer),
        Command::Repo(command) => {
            run_repo_command(command, &mut config, &config_path)?;
            Ok(Outcome::Success)
        }
    }
}

async fn list(
    deployer: &Deployer,
    category: Option<Category>,
) -> Result<Outcome, Box<dyn std::error::Error>> {
    let listings = deployer.list(false).await;
    let installed = deployer.status();
    let mut outcome = Outcome::Success;

    for listing in &listings {
        println!("{} ({})", listing.repository_name, listing.repository_url);
        for item in listing
            .items
            .iter()
            .filter(|item| category.is_none_or(|c| c == item.category))
        {
            let marker = if installed.contains(item.category, &item.name) { "*" } else { " " };
            println!("  {marker} [{}] {} ({})", item.category, item.title, item.name);
        }
        for failure in &listing.failures {
            outcome = Outcome::PartialFailure;
            println!("  ! {}: {}", failure.category, failure.error);
        }
    }
    Ok(outcome)
}

fn cleanup(deployer: &Deployer) -> Result<Outcome, Box<dyn std::error::Error>> {
    let reports = deployer.cleanup_backups()?;
    let mut outcome = Outcome::Success;
    for (target, report) in reports {
        for id in &report.removed {
            println!("Removed {target} backup {id}");
        }
        for (id, error) in &report.failed {
            outcome = Outcome::PartialFailure;
            println!("Failed to remove {target} backup {id}: {error}");
        }
    }
    Ok(outcome)
}

fn run_repo_command(
    command: RepoCommand,
    config: &mut SyncConfig,
    config_path: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        RepoCommand::List => {
            for repository in &config.repositories {
                let state = if repository.enabled { "enabled" } else { "disabled" };
                let branch = repository.branch.as_deref().unwrap_or("default branch");
                let built_in = if repository.removable { "" } else { ", built in" };
                println!(
                    "{} <{}> ({branch}, {state}{built_in})",
                    repository.name, repository.url
                );
            }
            return Ok(());
        }
        RepoCommand::Add { name, url, branch } => {
            let mut repository = RepositoryConfig::new(name, url);
            repository.branch = branch;
            config.add_repository(repository)?;
        }
        RepoCommand::Remove { url } => {
            config.remove_repository(&url)?;
        }
        RepoCommand::Enable { url } => config.set_enabled(&url, true)?,
        RepoCommand::Disable { url } => config.set_enabled(&url, false)?,
    }
    config.save(config_path)?;
    println!("Saved {}", config_path.display());
    Ok(())
}

fn outcome_of(summary: &DeploymentSummary) -> Outcome {
    if summary.all_success() {
        Outcome::Success
    } else {
        Outcome::PartialFailure
    }
}

/// Prints the final deployment summary.
fn print_summary(summary: &DeploymentSummary) {
    println!("\nSummary:");
    println!(
        "  Mode: {}",
        if summary.dry_run { "Dry Run" } else { "Live" }
    );
    println!("  Installed: {}", summary.installed);
    println!("  Unchanged: {}", summary.unchanged);
    println!("  Failed: {}", summary.failed);
    if summary.duplicates_skipped > 0 {
        println!("  Duplicates skipped: {}", summary.duplicates_skipped);
    }

    for (category, counts) in &summary.per_category {
        println!(
            "  {:<14} installed {}, unchanged {}, failed {}",
            category.display_name(),
            counts.installed,
            counts.unchanged,
            counts.failed
        );
    }

    for outcome in &summary.items {
        if let ItemOutcome::Failed {
            category,
            name,
            error,
            ..
        } = outcome
        {
            println!("  ! {category}/{name}: {error}");
        }
    }
    for failure in &summary.source_failures {
        println!(
            "  ! {} ({}): {}",
            failure.repository, failure.category, failure.error
        );
    }
    for report in &summary.config_files {
        let status = match &report.status {
            ConfigFileStatus::Created => "created".to_string(),
            ConfigFileStatus::Updated => "updated".to_string(),
            ConfigFileStatus::Unchanged => continue,
            ConfigFileStatus::Replaced { backup: Some(id) } => {
                format!("replaced invalid file (backup {id})")
            }
            ConfigFileStatus::Replaced { backup: None } => "replaced invalid file".to_string(),
            ConfigFileStatus::Failed { error } => format!("failed: {error}"),
        };
        println!("  {}: {status}", report.kind);
    }
    for (category, id) in &summary.backups {
        println!("  Backed up {category} as {id}");
    }
}
