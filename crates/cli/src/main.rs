mod config;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use common::{FileIdentity, JobHash, JobKind, Position, Range};
use config::Config;
use reaper::DiskWorkspace;
use registry::{Job, JobRegistry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use substrate::{Session, DEFAULT_RESOLVE_TIMEOUT};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobs")]
#[command(about = "Propose, preview, and apply source edits", long_about = None)]
struct Cli {
    /// Workspace root; file arguments are resolved against the current directory.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Configuration file (defaults to <root>/jobs.toml when present).
    #[arg(long, global = true, env = "JOBS_CONFIG")]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse every source file under the root and list the proposed jobs.
    Scan,
    /// List the jobs whose range contains a cursor position (1-based).
    At {
        file: PathBuf,
        line: usize,
        column: usize,
    },
    /// Print a job's result: the whole file after applying it.
    Show {
        file: PathBuf,
        /// Job hash or unique hash prefix.
        job: String,
        /// Print the original text instead.
        #[arg(long)]
        original: bool,
    },
    /// Apply a job to the file.
    Accept {
        file: PathBuf,
        /// Job hash or unique hash prefix.
        job: String,
        /// Keep the edit in memory only (overrides save_on_accept).
        #[arg(long)]
        no_save: bool,
    },
    /// Discard a job and list what remains for the file.
    Reject {
        file: PathBuf,
        /// Job hash or unique hash prefix.
        job: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("warning: .env: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), &cli.root)?;
    init_tracing(&config.log_level, cli.verbose);
    debug!(?config, root = %cli.root.display(), "configuration loaded");

    let local = tokio::task::LocalSet::new();
    local.run_until(run(cli, config)).await
}

fn init_tracing(level: &str, verbose: bool) {
    let fallback = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        eprintln!("warning: tracing subscriber already installed");
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let workspace = Rc::new(
        DiskWorkspace::new(&cli.root)
            .with_context(|| format!("cannot open workspace {}", cli.root.display()))?,
    );
    let session = Session::new(workspace.clone(), config.passes.passes());
    let ctx = App {
        root: &cli.root,
        workspace: &workspace,
        session: &session,
        json: cli.json,
    };

    let result = match &cli.command {
        Commands::Scan => cmd_scan(&ctx).await,
        Commands::At { file, line, column } => cmd_at(&ctx, file, *line, *column).await,
        Commands::Show {
            file,
            job,
            original,
        } => cmd_show(&ctx, file, job, *original).await,
        Commands::Accept { file, job, no_save } => {
            cmd_accept(&ctx, file, job, config.save_on_accept && !*no_save).await
        }
        Commands::Reject { file, job } => cmd_reject(&ctx, file, job).await,
    };

    session.dispose();
    result
}

struct App<'a> {
    root: &'a Path,
    workspace: &'a Rc<DiskWorkspace>,
    session: &'a Session,
    json: bool,
}

impl App<'_> {
    fn registry(&self) -> &JobRegistry {
        self.session.registry()
    }

    /// Opens `path` and ingests what the configured passes propose for it.
    async fn analyze(&self, path: &Path) -> anyhow::Result<FileIdentity> {
        let file = anatomist::path_util::file_identity(self.root, path)
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        let text = self.workspace.open_document(&file).await?;
        let active = self.registry().analyze(&file, &text)?;
        debug!(file = %file, jobs = active.len(), "file analysed");
        Ok(file)
    }

    /// The active job of `file` whose hash starts with `prefix`.
    fn find_job(&self, file: &FileIdentity, prefix: &str) -> anyhow::Result<Job> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches: Vec<Job> = self
            .registry()
            .jobs_for_file(file)
            .into_iter()
            .filter(|job| job.hash.to_hex().starts_with(&prefix))
            .collect();
        match matches.len() {
            0 => bail!("no job of {file} matches `{prefix}`"),
            1 => Ok(matches.remove(0)),
            n => bail!("`{prefix}` is ambiguous: {n} jobs of {file} match"),
        }
    }

    fn print_jobs(&self, jobs: &[Job]) -> anyhow::Result<()> {
        if self.json {
            let views: Vec<JobView> = jobs.iter().map(JobView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
            return Ok(());
        }
        if jobs.is_empty() {
            println!("No jobs.");
        }
        for job in jobs {
            println!(
                "  {}  {}:{}  [{}]  {}",
                job.hash.short(12),
                job.file,
                display_range(job.range),
                job.kind,
                job.title
            );
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct JobView<'a> {
    hash: JobHash,
    file: &'a FileIdentity,
    kind: JobKind,
    range: Range,
    title: &'a str,
    uri: String,
}

impl<'a> From<&'a Job> for JobView<'a> {
    fn from(job: &'a Job) -> Self {
        JobView {
            hash: job.hash,
            file: &job.file,
            kind: job.kind,
            range: job.range,
            title: &job.title,
            uri: job.uri().to_string(),
        }
    }
}

/// 1-based `line:col-line:col`.
fn display_range(range: Range) -> String {
    format!(
        "{}:{}-{}:{}",
        range.start.line + 1,
        range.start.column + 1,
        range.end.line + 1,
        range.end.column + 1
    )
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

async fn cmd_scan(ctx: &App<'_>) -> anyhow::Result<()> {
    let paths = anatomist::scan::discover(ctx.root);
    let mut jobs = Vec::new();
    for path in &paths {
        match ctx.analyze(path).await {
            Ok(file) => jobs.extend(ctx.registry().jobs_for_file(&file)),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping file"),
        }
    }

    if !ctx.json {
        println!("+------------------------------------------+");
        println!("| JOBS SCAN                                |");
        println!("+------------------------------------------+");
        println!("| Files          : {:>23} |", paths.len());
        println!("| Jobs           : {:>23} |", jobs.len());
        println!("+------------------------------------------+");
    }
    ctx.print_jobs(&jobs)
}

// ---------------------------------------------------------------------------
// at
// ---------------------------------------------------------------------------

async fn cmd_at(ctx: &App<'_>, path: &Path, line: usize, column: usize) -> anyhow::Result<()> {
    if line == 0 || column == 0 {
        bail!("line and column are 1-based");
    }
    let file = ctx.analyze(path).await?;
    let jobs = ctx
        .registry()
        .lookup_by_range(&file, Position::new(line - 1, column - 1));
    ctx.print_jobs(&jobs)
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

async fn cmd_show(ctx: &App<'_>, path: &Path, prefix: &str, original: bool) -> anyhow::Result<()> {
    let file = ctx.analyze(path).await?;
    let job = ctx.find_job(&file, prefix)?;
    let uri = if original {
        ctx.session.original_uri(&file)
    } else {
        job.uri()
    };
    let content = ctx
        .session
        .read_resolved(&uri, DEFAULT_RESOLVE_TIMEOUT)
        .await?;

    if ctx.json {
        let body = serde_json::json!({
            "uri": uri.to_string(),
            "job": JobView::from(&job),
            "content": String::from_utf8_lossy(&content),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", String::from_utf8_lossy(&content));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// accept / reject
// ---------------------------------------------------------------------------

async fn cmd_accept(ctx: &App<'_>, path: &Path, prefix: &str, save: bool) -> anyhow::Result<()> {
    let file = ctx.analyze(path).await?;
    let job = ctx.find_job(&file, prefix)?;

    match reaper::accept(ctx.registry(), ctx.workspace.as_ref(), &job.hash, save).await {
        Ok(accepted) => {
            ctx.workspace.commit().await?;
            if !ctx.json {
                println!(
                    "ACCEPTED: {} ({})",
                    accepted.job.title,
                    if save { "saved" } else { "not saved" }
                );
            }
            ctx.print_jobs(&ctx.registry().jobs_for_file(&file))
        }
        Err(e) => {
            eprintln!("ACCEPT FAILED: {}. Rolling back...", e);
            ctx.workspace.restore_all().await?;
            Err(e.into())
        }
    }
}

async fn cmd_reject(ctx: &App<'_>, path: &Path, prefix: &str) -> anyhow::Result<()> {
    let file = ctx.analyze(path).await?;
    let job = ctx.find_job(&file, prefix)?;
    let rejected = ctx.registry().reject(&job.hash)?;
    if !ctx.json {
        println!("REJECTED: {}", rejected.title);
    }
    ctx.print_jobs(&ctx.registry().jobs_for_file(&file))
}
