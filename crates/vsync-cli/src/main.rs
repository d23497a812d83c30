//! vsync: drive the push/pull/verify engines against a local vault and a
//! CouchDB-family remote store.
//!
//! Usage:
//!   vsync push   [--dry-run] [--force] [--path <prefix>] [--verify] [--concurrency <n>]
//!   vsync pull   [--dry-run] [--changed-only] [--path <prefix>] [--delete-orphans] [--concurrency <n>]
//!   vsync verify [--count <n>] [--path <prefix>]
//!
//! Credentials and the remote database are configured through the
//! environment (or a `.env` file next to the executable) — see
//! `vsync_core::config::Config`. The vault root and the sync directories
//! that participate are CLI concerns (`--vault`, `--sync-dir`): they carry
//! no wire-compatibility weight, unlike the document model they feed.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use vsync_core::Config;
use vsync_engine::{
    local_index::DEFAULT_EXCLUDES, FileOutcome, LocalIndex, PullEngine, PullOptions, PushEngine, PushOptions,
    Reconciler, RemoteIndex, Summary, VerifyEngine, VerifyOutcome, VerifyReport,
};
use vsync_transport::{HttpTransport, Transport};

#[derive(Parser, Debug)]
#[command(name = "vsync", version, about = "LiveSync-compatible vault <-> CouchDB synchronizer")]
struct Cli {
    /// Root of the local vault.
    #[arg(long, global = true, default_value = ".")]
    vault: PathBuf,

    /// A sync directory, relative to `--vault` (repeatable). Defaults to the
    /// whole vault when omitted.
    #[arg(long = "sync-dir", global = true)]
    sync_dirs: Vec<PathBuf>,

    /// Extra exclude substrings, in addition to the built-in VCS/OS/editor
    /// defaults.
    #[arg(long = "exclude", global = true)]
    excludes: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "VSYNC_LOG", default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push local files that are newer than their remote counterpart.
    Push {
        /// Report what would be pushed without writing anything.
        #[arg(long)]
        dry_run: bool,
        /// Push every matching file regardless of mtime.
        #[arg(long)]
        force: bool,
        /// Only consider paths starting with this prefix.
        #[arg(long = "path")]
        path_prefix: Option<String>,
        /// After pushing, re-chunk each pushed file and compare against what
        /// was just written.
        #[arg(long)]
        verify: bool,
        /// Bounded parallelism for chunk uploads within a single file.
        #[arg(long, default_value_t = vsync_engine::push::DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Pull remote file documents into the local vault.
    Pull {
        /// Report what would be pulled without writing anything.
        #[arg(long)]
        dry_run: bool,
        /// Skip files whose local mtime is already at or past the remote's.
        #[arg(long)]
        changed_only: bool,
        /// Only consider paths starting with this prefix.
        #[arg(long = "path")]
        path_prefix: Option<String>,
        /// Delete local files that have no remote counterpart, after pulling.
        #[arg(long)]
        delete_orphans: bool,
        /// Bounded parallelism for the chunk-batch fetch pool.
        #[arg(long, default_value_t = vsync_engine::push::DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Re-chunk local files that exist remotely and compare chunk ids.
    Verify {
        /// Maximum number of files to check.
        #[arg(long, default_value_t = 50)]
        count: usize,
        /// Only consider paths starting with this prefix.
        #[arg(long = "path")]
        path_prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config = Config::load()?;
    tracing::info!(db = %config.couchdb_db, "vsync starting");

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config)?);

    let sync_dirs = if cli.sync_dirs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.sync_dirs.clone()
    };
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(cli.excludes.clone());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing in-flight work and stopping");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Push {
            dry_run,
            force,
            path_prefix,
            verify,
            concurrency,
        } => {
            run_push(
                &cli.vault,
                &sync_dirs,
                &excludes,
                transport,
                PushOptions {
                    dry_run,
                    force,
                    path_prefix,
                    concurrency,
                },
                verify,
                &cancel,
            )
            .await?
        }
        Commands::Pull {
            dry_run,
            changed_only,
            path_prefix,
            delete_orphans,
            concurrency,
        } => {
            run_pull(
                &cli.vault,
                &sync_dirs,
                &excludes,
                transport,
                PullOptions {
                    dry_run,
                    changed_only,
                    force: false,
                    path_prefix,
                    concurrency,
                },
                delete_orphans,
                &cancel,
            )
            .await?
        }
        Commands::Verify { count, path_prefix } => {
            run_verify(&cli.vault, &sync_dirs, &excludes, transport, count, path_prefix).await?
        }
    }

    if cancel.is_cancelled() {
        tracing::warn!("run ended early due to interrupt");
        std::process::exit(130);
    }

    Ok(())
}

async fn run_push(
    vault: &std::path::Path,
    sync_dirs: &[PathBuf],
    excludes: &[String],
    transport: Arc<dyn Transport>,
    opts: PushOptions,
    verify_after: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let locals = LocalIndex::scan(vault, sync_dirs, excludes)?;
    let remote_files = RemoteIndex::scan(transport.as_ref()).await?;

    let push = PushEngine::new(transport.clone());
    let outcomes = push.push_all(&locals, &remote_files, &opts, cancel).await;
    report_outcomes("push", &outcomes);

    if verify_after && !opts.dry_run {
        let pushed_paths: Vec<String> = outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Pushed { .. }))
            .map(|o| o.path().to_string())
            .collect();
        if !pushed_paths.is_empty() {
            let remote_after = RemoteIndex::scan(transport.as_ref()).await?;
            let report = VerifyEngine::verify(&locals, &remote_after, pushed_paths.len(), opts.path_prefix.as_deref());
            print_verify_report(&report);
        }
    }

    Ok(())
}

async fn run_pull(
    vault: &std::path::Path,
    sync_dirs: &[PathBuf],
    excludes: &[String],
    transport: Arc<dyn Transport>,
    opts: PullOptions,
    delete_orphans: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let remote_files = RemoteIndex::scan(transport.as_ref()).await?;
    let locals = LocalIndex::scan(vault, sync_dirs, excludes)?;

    let pull = PullEngine::new(transport);
    let outcomes = pull.pull_all(vault, &remote_files, &locals, &opts, cancel).await;
    report_outcomes("pull", &outcomes);

    if delete_orphans && !opts.dry_run {
        let local_paths: std::collections::HashSet<String> = locals.keys().cloned().collect();
        let remote_paths: std::collections::HashSet<String> = remote_files.keys().cloned().collect();
        let orphans = Reconciler::find_orphans(&local_paths, &remote_paths);
        if orphans.is_empty() {
            tracing::info!("no orphans found");
        } else {
            let deletions = Reconciler::delete_orphans(vault, &orphans);
            report_outcomes("reconcile", &deletions);
        }
    }

    Ok(())
}

async fn run_verify(
    vault: &std::path::Path,
    sync_dirs: &[PathBuf],
    excludes: &[String],
    transport: Arc<dyn Transport>,
    count: usize,
    path_prefix: Option<String>,
) -> anyhow::Result<()> {
    let remote_files = RemoteIndex::scan(transport.as_ref()).await?;
    let locals = LocalIndex::scan(vault, sync_dirs, excludes)?;

    let outcomes = VerifyEngine::verify(&locals, &remote_files, count, path_prefix.as_deref());
    for outcome in &outcomes {
        match outcome {
            VerifyOutcome::Match { path } => tracing::info!(%path, "match"),
            VerifyOutcome::Mismatch { path, .. } => tracing::warn!(%path, "chunk-id mismatch"),
            VerifyOutcome::Skipped { path, reason } => tracing::debug!(%path, %reason, "skipped"),
        }
    }
    let report = VerifyReport::tally(&outcomes);
    print_verify_report(&report);
    Ok(())
}

fn report_outcomes(stage: &str, outcomes: &[FileOutcome]) {
    for outcome in outcomes {
        match outcome {
            FileOutcome::Pushed { path, chunks_uploaded, .. } => {
                tracing::info!(%path, chunks_uploaded, "pushed")
            }
            FileOutcome::Pulled { path, bytes } => tracing::info!(%path, bytes, "pulled"),
            FileOutcome::Deleted { path } => tracing::info!(%path, "deleted"),
            FileOutcome::Skipped { path, reason } => tracing::debug!(%path, %reason, "skipped"),
            FileOutcome::Failed { path, error } => tracing::error!(%path, %error, "failed"),
        }
    }
    let summary = Summary::tally(outcomes);
    tracing::info!(
        stage = %stage,
        pushed = summary.pushed,
        pulled = summary.pulled,
        deleted = summary.deleted,
        skipped = summary.skipped,
        failed = summary.failed,
        "run summary"
    );
}

fn print_verify_report(report: &VerifyReport) {
    tracing::info!(
        matched = report.matched,
        mismatched = report.mismatched,
        skipped = report.skipped,
        "verify summary"
    );
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}
