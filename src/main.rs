use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskloom::commands::{self, ItemSelector};
use taskloom::logbook::LogSelector;
use taskloom::models::{Duration, Item, LogEntry, Priority, RelationKind, Status};
use taskloom::storage::{Repository, Workspace};
use taskloom::sync::JsonlFlowClient;

#[derive(Parser)]
#[command(name = "tkl")]
#[command(about = "Personal task/dependency graph in a human-editable text file")]
struct Cli {
    /// Workspace directory (default: TASKLOOM_WORKSPACE or the platform
    /// data directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new item
    Add {
        /// Item id: lowercase letters, digits, underscores
        id: String,
        title: String,
        /// lowest, low, neutral, medium, high, critical, unsure
        #[arg(long)]
        priority: Option<String>,
        /// Effort estimate, e.g. 3mo, 2w, 5d
        #[arg(long)]
        duration: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Ids this item REQUIRES
        #[arg(long = "requires")]
        requires: Vec<String>,
    },
    /// Set an item's status
    Status {
        /// Substring of the item's id or title
        query: String,
        /// not_started, in_progress, blocked, completed
        status: String,
    },
    /// Set an item's priority
    Priority {
        query: String,
        priority: String,
    },
    /// Add a relation edge between two items
    Relate {
        query: String,
        /// REQUIRES, BLOCKS, ANYOF, SUFFICIENT, SUPERCHARGES, INDICATES,
        /// TOGETHER, CONFLICTS
        kind: String,
        target: String,
    },
    /// Archive items by id or tag
    Occlude {
        ids: Vec<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Report what would change without saving
        #[arg(long)]
        dry_run: bool,
    },
    /// Bring occluded items back
    Include {
        ids: Vec<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Append a log entry
    Log {
        message: String,
        #[arg(long, default_value = "default")]
        session: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Archive log entries by session or tag
    OccludeLogs {
        #[arg(long)]
        session: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Report the workspace's health: counts, cycles, dangling targets
    Check,
    /// Emit the whole graph as an operation log for sync migration
    Migrate {
        /// Where to append the operations (JSONL)
        #[arg(long, default_value = "operations.jsonl")]
        out: PathBuf,
    },
}

/// Initialize tracing to stderr so stdout stays clean for command output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "taskloom=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let root = match cli.workspace {
        Some(path) => path,
        None => match std::env::var_os("TASKLOOM_WORKSPACE") {
            Some(path) => PathBuf::from(path),
            None => Workspace::default_root()?,
        },
    };
    let repo = Repository::open(Workspace::new(root));

    let outcome = match cli.command {
        Commands::Add {
            id,
            title,
            priority,
            duration,
            tags,
            requires,
        } => {
            let mut item = Item::new(id, title).with_tags(tags);
            if let Some(p) = priority {
                item = item.with_priority(parse_priority(&p)?);
            }
            if let Some(d) = duration {
                let duration = Duration::parse(&d)
                    .ok_or_else(|| anyhow::anyhow!("invalid duration {d:?}"))?;
                item = item.with_duration(Some(duration));
            }
            for target in requires {
                item = item.with_relation(RelationKind::Requires, target);
            }
            commands::add_item(&repo, item)
        }
        Commands::Status { query, status } => {
            let status = Status::from_str(&status)
                .ok_or_else(|| anyhow::anyhow!("unknown status {status:?}"))?;
            commands::set_status(&repo, &query, status)
        }
        Commands::Priority { query, priority } => {
            commands::set_priority(&repo, &query, parse_priority(&priority)?)
        }
        Commands::Relate {
            query,
            kind,
            target,
        } => {
            let kind = RelationKind::from_str(&kind.to_uppercase())
                .ok_or_else(|| anyhow::anyhow!("unknown relation {kind:?}"))?;
            commands::add_relation(&repo, &query, kind, &target)
        }
        Commands::Occlude { ids, tag, dry_run } => {
            commands::occlude_items(&repo, &item_selector(ids, tag)?, dry_run)
        }
        Commands::Include { ids, tag, dry_run } => {
            commands::include_items(&repo, &item_selector(ids, tag)?, dry_run)
        }
        Commands::Log {
            message,
            session,
            tags,
        } => {
            let entry = LogEntry::new(session, Utc::now(), message).with_tags(tags);
            commands::append_log(&repo, entry)
        }
        Commands::OccludeLogs {
            session,
            tags,
            dry_run,
        } => {
            let selector = match (session, tags.is_empty()) {
                (Some(session), _) => LogSelector::Session(session),
                (None, false) => LogSelector::TagsAny(tags),
                (None, true) => anyhow::bail!("pass --session or at least one --tag"),
            };
            commands::occlude_logs(&repo, &selector, dry_run)
        }
        Commands::Check => commands::check(&repo),
        Commands::Migrate { out } => {
            let mut client = JsonlFlowClient::new(out);
            commands::migrate(&repo, &mut client)
        }
    };

    println!("{}", outcome.message);
    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_priority(s: &str) -> anyhow::Result<Priority> {
    Priority::from_str(s).ok_or_else(|| anyhow::anyhow!("unknown priority {s:?}"))
}

fn item_selector(ids: Vec<String>, tag: Option<String>) -> anyhow::Result<ItemSelector> {
    match (tag, ids.is_empty()) {
        (Some(tag), true) => Ok(ItemSelector::Tag(tag)),
        (None, false) => Ok(ItemSelector::Ids(ids)),
        (Some(_), false) => anyhow::bail!("pass ids or --tag, not both"),
        (None, true) => anyhow::bail!("pass ids or --tag"),
    }
}
