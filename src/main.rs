//! ledgertree command line entry point

use anyhow::Context;
use clap::Parser;
use ledgertree_config::Config;
use ledgertree_core::tree::walk;
use ledgertree_core::{AccountNode, AggregationOutcome, Hierarchy, MemoryStore, StatisticsScope, StoreSnapshot};
use ledgertree_utils::{format_amount, format_number, indent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "ledgertree")]
#[command(version = "0.1.0")]
#[command(about = "Build, search and total a ledger account hierarchy", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// JSON file with `accounts` and `entries`
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Restrict to one organization
    #[arg(long)]
    organization: Option<String>,

    /// Show only matches and their ancestors
    #[arg(short, long)]
    search: Option<String>,

    /// Compute transaction statistics and balances
    #[arg(long)]
    stats: bool,

    /// Expand every account above this level
    #[arg(long)]
    expand_level: Option<usize>,

    /// Print every account regardless of expansion
    #[arg(long)]
    all: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", Config::generate_default());
        return Ok(());
    }

    let config = if args.config.exists() {
        Config::load(args.config.clone())
            .with_context(|| format!("loading {}", args.config.display()))?
    } else {
        Config::default()
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();

    if !args.config.exists() {
        log::warn!("Config file {} not found, using defaults", args.config.display());
    }

    let data = args
        .data
        .clone()
        .context("--data is required unless --print-config is given")?;
    let content = std::fs::read_to_string(&data).with_context(|| format!("reading {}", data.display()))?;
    let snapshot: StoreSnapshot =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", data.display()))?;
    log::info!(
        "Read {} accounts and {} entries from {}",
        snapshot.accounts.len(),
        snapshot.entries.len(),
        data.display()
    );

    let rt = Runtime::new()?;
    rt.block_on(run(args, config, snapshot))
}

async fn run(args: Args, config: Config, snapshot: StoreSnapshot) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot));
    let mut hierarchy = Hierarchy::new(&config, store.clone(), store);

    let scope = match args.organization.as_deref() {
        Some(organization) => StatisticsScope::organization(organization),
        None => StatisticsScope::all(),
    };
    hierarchy.load(&scope).await?;

    for warning in hierarchy.warnings() {
        eprintln!("warning: record {}: {}", warning.index, warning.message);
    }

    if args.stats {
        if let AggregationOutcome::Applied(report) = hierarchy.refresh_statistics(&scope).await? {
            if !report.failed_nodes.is_empty() {
                eprintln!(
                    "warning: statistics unavailable for {}",
                    report.failed_nodes.join(", ")
                );
            }
        }
    }

    if let Some(level) = args.expand_level {
        hierarchy.expand_to_level(level);
    }

    let found;
    let rows: Vec<&AccountNode> = if let Some(text) = args.search.as_deref() {
        found = hierarchy.search(text);
        walk(&found).collect()
    } else if args.all {
        walk(hierarchy.roots()).collect()
    } else {
        hierarchy.visible_nodes()
    };

    for node in &rows {
        println!("{}", render(node, hierarchy.expansion().is_expanded(&node.id)));
    }
    if args.search.is_some() {
        println!("{} matching rows", format_number(rows.len()));
    }

    let summary = hierarchy.summary();
    println!(
        "{} accounts ({} active, {} inactive), {} roots, {} levels",
        format_number(summary.total_accounts),
        format_number(summary.active_accounts),
        format_number(summary.inactive_accounts),
        summary.root_count,
        summary.max_level + 1
    );

    Ok(())
}

fn render(node: &AccountNode, expanded: bool) -> String {
    let marker = if !node.has_children {
        " "
    } else if expanded {
        "-"
    } else {
        "+"
    };
    let mut line = indent(node.level, &format!("{} {} {}", marker, node.code, node.name));
    if !node.is_active {
        line.push_str(" (inactive)");
    }
    if let Some(ref stats) = node.statistics {
        line.push_str(&format!(
            "  [{} tx] {} / {}",
            format_number(stats.total_transactions),
            format_amount(stats.balance),
            format_amount(stats.total_balance)
        ));
    }
    line
}
