mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use repomend::config::RepairConfig;
use repomend::model::Issue;
use repomend::repair::{EventLog, RepairReport, Repairer, ScanReport};
use repomend::repository::{GitStore, Journal, RunSummary};
use repomend::util::{format_duration_ms, format_target, format_timestamp};

fn init_tracing(verbose: bool) {
    let default = if verbose { "repomend=debug" } else { "repomend=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn now_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn journal_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .context("Could not determine data directory")?
        .join("repomend");
    fs::create_dir_all(&data_dir)?;
    Ok(data_dir.join("journal.db"))
}

async fn open_journal() -> Result<Journal> {
    let path = journal_path()?;
    let path_str = path.to_str().context("Invalid path encoding")?;
    let journal = Journal::new(path_str).await?;
    journal.init_schema().await?;
    Ok(journal)
}

fn open_store(repo: &Path) -> Result<(PathBuf, GitStore)> {
    let abs_repo_path = fs::canonicalize(repo)
        .with_context(|| format!("Could not resolve path: {}", repo.display()))?;
    let store = GitStore::open(&abs_repo_path)
        .with_context(|| format!("Could not open git repository at {}", abs_repo_path.display()))?;
    Ok((abs_repo_path, store))
}

fn make_repairer(cli: &Cli, config: RepairConfig, quiet: bool) -> Repairer {
    if quiet {
        Repairer::quiet(config)
    } else if cli.profile {
        Repairer::profiling(config)
    } else {
        Repairer::new(config)
    }
}

fn confirm_backup() -> Result<bool> {
    eprint!("This rewrites history and moves references. Is the repository backed up? [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_issues(issues: &[Issue]) {
    for issue in issues {
        println!("  {}", issue);
    }
}

fn print_scan(report: &ScanReport) {
    println!(
        "Checked {} references, {} commits, {} trees",
        report.references, report.commits, report.trees
    );
    if report.is_clean() {
        println!("No issues found");
    } else {
        println!("{} issues:", report.issues.len());
        print_issues(&report.issues);
    }
}

fn print_report(report: &RepairReport) {
    if report.dry_run {
        println!("Dry run: nothing was written");
    }
    println!("Issues found: {}", report.initial.issues.len());
    print_issues(&report.initial.issues);

    if !report.planned.is_empty() {
        println!("Replacements ({} rounds):", report.rounds);
        for planned in &report.planned {
            println!(
                "  {} -> {} ({:?})",
                planned.original.short(),
                planned.replacement.short(),
                planned.kind
            );
        }
    }
    if !report.rewritten.is_empty() {
        println!("Rewritten commits: {}", report.rewritten.len());
    }
    if !report.retagged.is_empty() {
        println!("Rewritten tags: {}", report.retagged.len());
    }
    if !report.relocated.is_empty() {
        println!("Misplaced loose objects:");
        for relocation in &report.relocated {
            println!(
                "  {} at {} ({:?})",
                relocation.hash.short(),
                relocation.found_at.display(),
                relocation.outcome
            );
        }
    }
    if report.packed_refs_removed > 0 {
        println!("packed-refs lines removed: {}", report.packed_refs_removed);
    }

    if !report.references.is_empty() {
        println!("References:");
        for change in &report.references {
            println!(
                "  {:<40} {} -> {}  {}",
                change.name,
                format_target(change.before.as_ref()),
                format_target(change.after.as_ref()),
                change.outcome
            );
        }
    }

    if report.remaining.is_empty() {
        println!("Remaining issues: none");
    } else {
        println!("Remaining issues: {}", report.remaining.len());
        print_issues(&report.remaining);
    }
    if !report.dry_run && !report.overlay.is_empty() {
        println!("Old objects are now unreachable; run `git gc --prune=now` to drop them");
    }
}

fn diagnose(cli: &Cli, config: RepairConfig, json: bool) -> Result<ExitCode> {
    let (_, store) = open_store(&cli.repo)?;
    let repairer = make_repairer(cli, config, json);
    let report = repairer.diagnose(&store)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_scan(&report);
    }
    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn verify(cli: &Cli, config: RepairConfig) -> Result<ExitCode> {
    let (path, store) = open_store(&cli.repo)?;
    let report = make_repairer(cli, config, false).diagnose(&store)?;
    if report.is_clean() {
        println!("{}: OK", path.display());
        return Ok(ExitCode::SUCCESS);
    }
    println!("{}: {} issues", path.display(), report.issues.len());
    print_issues(&report.issues);
    Ok(ExitCode::from(1))
}

async fn fix(cli: &Cli, config: RepairConfig, dry_run: bool, yes: bool, json: bool, no_journal: bool) -> Result<ExitCode> {
    let (path, mut store) = open_store(&cli.repo)?;
    let repairer = make_repairer(cli, config, json);
    let mut events = if cli.verbose { EventLog::traced() } else { EventLog::new() };
    let started_at = now_ms();

    let report = if dry_run {
        let mut report = repairer.preview(&store, &mut events)?;
        report.relocated = store.relocate_misplaced_objects(true)?;
        report.packed_refs_removed = store.tidy_packed_refs(true)?;
        report
    } else {
        if !yes && !confirm_backup()? {
            bail!("Aborted: back up the repository first, or pass --yes");
        }
        let relocated = store.relocate_misplaced_objects(false)?;
        if !relocated.is_empty() {
            info!("Moved {} misplaced loose objects", relocated.len());
        }
        let removed = store.tidy_packed_refs(false)?;
        if removed > 0 {
            info!("Removed {} bad lines from packed-refs", removed);
        }
        let mut report = repairer.repair(&mut store, &mut events)?;
        report.relocated = relocated;
        report.packed_refs_removed = removed;
        report
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !no_journal {
        let summary = RunSummary {
            repository: path.display().to_string(),
            started_at,
            finished_at: now_ms(),
            dry_run,
            issues_found: report.initial.issues.len() as i64,
            issues_remaining: report.remaining.len() as i64,
            success: report.is_clean(),
        };
        match open_journal().await {
            Ok(journal) => {
                let run_id = journal.record_run(&summary, events.events()).await?;
                info!("Recorded run #{} in the journal", run_id);
            }
            Err(e) => warn!("Journal unavailable, run not recorded: {:#}", e),
        }
    }

    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

async fn history(limit: usize) -> Result<ExitCode> {
    let journal = open_journal().await?;
    let runs = journal.recent_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded");
    }
    for run in runs {
        let summary = &run.summary;
        println!(
            "#{:<4} {}  {:>8}  {}{}  issues {} -> {}  events {}  {}",
            run.id,
            format_timestamp(summary.started_at / 1000),
            format_duration_ms(summary.finished_at - summary.started_at),
            if summary.success { "ok" } else { "incomplete" },
            if summary.dry_run { " (dry run)" } else { "" },
            summary.issues_found,
            summary.issues_remaining,
            run.event_count,
            summary.repository,
        );
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = RepairConfig::load_or_default(cli.config.as_deref())
        .context("Could not load configuration")?;
    cli.apply_overrides(&mut config);

    match &cli.command {
        Command::Diagnose { json } => diagnose(&cli, config, *json),
        Command::Verify => verify(&cli, config),
        Command::Fix { dry_run, yes, json, no_journal } => {
            fix(&cli, config, *dry_run, *yes, *json, *no_journal).await
        }
        Command::History { limit } => history(*limit).await,
    }
}
