use std::path::PathBuf;

use clap::{Parser, Subcommand};
use treestat::git::status::RepoStatus;
use treestat::git::{Repository, ResetMode};

#[derive(Parser)]
#[command(name = "treestat")]
#[command(about = "Inspect git working tree and index state", long_about = None)]
#[command(version)]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long, global = true, value_name = "PATH")]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show working tree and index status
    Status {
        /// Emit the status model as JSON
        #[arg(long)]
        json: bool,
        /// Keep at most this many status entries
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Stash operations
    Stash {
        #[command(subcommand)]
        command: StashCommands,
    },
    /// Reset the current branch
    Reset {
        /// Reset behavior
        #[arg(long, value_enum, default_value_t = ResetMode::Mixed)]
        mode: ResetMode,
        /// Target revision
        #[arg(default_value = "HEAD")]
        target: String,
    },
}

#[derive(Subcommand)]
enum StashCommands {
    /// Stash working tree changes
    Push {
        /// Name the stash
        #[arg(short, long)]
        message: Option<String>,
        /// Include untracked files
        #[arg(short = 'u', long)]
        include_untracked: bool,
    },
    /// Apply and drop a stash
    Pop {
        #[arg(default_value_t = 0)]
        index: usize,
    },
    /// Drop a stash
    Drop {
        #[arg(default_value_t = 0)]
        index: usize,
    },
    /// List stashes
    List,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let repo = match cli.repo {
        Some(path) => Repository::at(path),
        None => Repository::current(),
    };

    let result = match cli.command {
        Commands::Status { json, limit } => status_command(&repo, json, limit),
        Commands::Stash { command } => stash_command(&repo, command),
        Commands::Reset { mode, target } => repo.reset(mode, &target).map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn status_command(repo: &Repository, json: bool, limit: Option<usize>) -> anyhow::Result<()> {
    let status = repo.status(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        render_status(&status);
    }
    Ok(())
}

fn stash_command(repo: &Repository, command: StashCommands) -> anyhow::Result<()> {
    match command {
        StashCommands::Push {
            message,
            include_untracked,
        } => repo.stash_push(message.as_deref(), include_untracked)?,
        StashCommands::Pop { index } => repo.stash_pop(index)?,
        StashCommands::Drop { index } => repo.stash_drop(index)?,
        StashCommands::List => {
            for entry in repo.stash_list()? {
                println!("stash@{{{}}}: {}", entry.index, entry.summary);
            }
        }
    }
    Ok(())
}

fn render_status(status: &RepoStatus) {
    match (&status.branch, &status.tip) {
        (Some(branch), _) => {
            match &status.upstream {
                Some(upstream) => println!("On branch {branch} (upstream {upstream})"),
                None => println!("On branch {branch}"),
            }
            if let Some(ab) = status.ahead_behind {
                println!("Ahead {}, behind {}", ab.ahead, ab.behind);
            }
        }
        (None, Some(tip)) => println!("HEAD detached at {}", &tip[..tip.len().min(7)]),
        (None, None) => println!("No commits yet"),
    }

    if status.files.is_empty() {
        println!("Working tree clean");
        return;
    }

    for file in &status.files {
        let side = if file.staged { "staged" } else { "unstaged" };
        match &file.old_path {
            Some(old_path) => {
                println!("{side:>9}  {:<10} {} -> {}", file.status, old_path, file.path)
            }
            None => println!("{side:>9}  {:<10} {}", file.status, file.path),
        }
    }

    if status.truncated {
        println!("(entry limit reached; list truncated)");
    }
}
