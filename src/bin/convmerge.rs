//! CLI binary for convmerge.
//!
//! A thin presentation layer over the library: paths on the command line
//! are the file selection, a spinner stands in for the busy label, and the
//! final status line is printed to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use convmerge::error::service_detail;
use convmerge::{
    format_bytes, ClientConfig, OutputFormat, PathSource, ProgressCallback, Session, StatusReport,
    SubmissionProgressCallback, SubmitOutcome, Workflow, WorkflowKind,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while a submission is in flight.
struct SpinnerCallback {
    bar: ProgressBar,
}

impl SpinnerCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        Arc::new(Self { bar })
    }
}

impl SubmissionProgressCallback for SpinnerCallback {
    fn on_submit_start(&self, kind: WorkflowKind, file_count: usize) {
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_prefix(kind.busy_label());
        self.bar.set_message(format!("{file_count} file(s) → {}", kind.endpoint()));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_submit_complete(&self, _kind: WorkflowKind, _report: &StatusReport) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PNG to JPG at quality 80
  convmerge image photo.png --to jpg --quality 80

  # Convert to lossless PNG into a download folder
  convmerge --output-dir out image scan.webp --to png

  # Merge three PDFs, dropping the second one
  convmerge merge a.pdf b.pdf c.pdf --remove 2

  # Check the service is up
  convmerge --api-url http://10.0.0.5:8000 health

  # Machine-readable outcome
  convmerge --json merge a.pdf b.pdf

ENVIRONMENT VARIABLES:
  CONVMERGE_API_URL      Base address of the conversion service
  CONVMERGE_OUTPUT_DIR   Directory downloads are saved into
  RUST_LOG               Log filter (overrides -v / -q)
"#;

/// Convert images and merge PDFs through a conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "convmerge",
    version,
    about = "Convert images and merge PDFs through a conversion service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base address of the conversion service.
    #[arg(long, global = true, env = "CONVMERGE_API_URL",
          default_value = convmerge::config::DEFAULT_BASE_URL)]
    api_url: String,

    /// Directory downloaded artifacts are saved into.
    #[arg(long, global = true, env = "CONVMERGE_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Print the outcome as JSON on stdout.
    #[arg(long, global = true, env = "CONVMERGE_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "CONVMERGE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CONVMERGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CONVMERGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one image to another format.
    Image {
        /// Image file to convert.
        file: PathBuf,

        /// Output format.
        #[arg(long = "to", value_enum, default_value = "jpg")]
        to: FormatArg,

        /// Encoder quality for lossy formats (1–100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,
    },

    /// Merge PDFs, in the order given, into merged.pdf.
    Merge {
        /// PDF files to merge.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Drop the file at this 1-based position before submitting.
        /// Repeatable; applied in order against the current list.
        #[arg(long = "remove", value_name = "INDEX",
              value_parser = clap::value_parser!(u32).range(1..))]
        remove: Vec<u32>,
    },

    /// Check that the service is reachable.
    Health,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Jpg,
    Png,
    Webp,
    Bmp,
    Tiff,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Jpg => OutputFormat::Jpg,
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Webp => OutputFormat::Webp,
            FormatArg::Bmp => OutputFormat::Bmp,
            FormatArg::Tiff => OutputFormat::Tiff,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = ClientConfig::builder()
        .base_url(cli.api_url.clone())
        .output_dir(cli.output_dir.clone())
        .build()
        .context("Invalid configuration")?;

    let mut session = Session::new(&config).context("Failed to create session")?;
    if show_progress {
        let cb: ProgressCallback = SpinnerCallback::new();
        session = session.with_progress(cb);
    }

    match cli.command {
        Command::Health => run_health(&cli, &session).await,
        Command::Image {
            ref file,
            to,
            quality,
        } => {
            let workflow = session.image();
            stage(&cli, workflow, vec![file.clone()])?;
            workflow.set_output_format(to.into())?;
            if let Some(q) = quality {
                if let Err(e) = workflow.set_quality(q) {
                    if !cli.quiet {
                        eprintln!("{} {e}", dim("note:"));
                    }
                }
            }
            submit(&cli, workflow).await
        }
        Command::Merge {
            ref files,
            ref remove,
        } => {
            let workflow = session.pdf();
            stage(&cli, workflow, files.clone())?;
            for &position in remove {
                let index = position as usize - 1;
                match workflow.remove(index) {
                    Some(removed) if !cli.quiet => {
                        eprintln!("{} removed {}", dim("-"), removed.name());
                    }
                    Some(_) => {}
                    None => bail!(
                        "--remove {position}: only {} file(s) staged",
                        workflow.staged_count()
                    ),
                }
            }
            submit(&cli, workflow).await
        }
    }
}

/// Stage `paths` into `workflow`, printing rejections and the staged list.
fn stage(cli: &Cli, workflow: &Workflow, paths: Vec<PathBuf>) -> Result<()> {
    let mut source = PathSource::new(paths);
    let rejected = workflow.stage_from(&mut source);
    for e in &rejected {
        eprintln!("{} {e}", red("✗"));
    }

    if !cli.quiet && !cli.json {
        let report = workflow.report();
        for (i, f) in report.files.iter().enumerate() {
            eprintln!(
                "  {:>2}. {:<32} {}",
                i + 1,
                f.name,
                dim(&format_bytes(f.size))
            );
        }
        if let Some(preview) = workflow.preview_path() {
            eprintln!("      {}", dim(&format!("preview: {}", preview.display())));
        }
    }
    Ok(())
}

async fn submit(cli: &Cli, workflow: &Workflow) -> Result<()> {
    let outcome = workflow.submit().await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    }

    match outcome {
        SubmitOutcome::Succeeded { message, delivery } => {
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{} {}  →  {}  {}",
                    green("✔"),
                    message,
                    bold(&delivery.path.display().to_string()),
                    dim(&format_bytes(delivery.bytes)),
                );
            }
            Ok(())
        }
        SubmitOutcome::Failed { message } => {
            if !cli.json {
                let shown = service_detail(&message).unwrap_or(message);
                eprintln!("{} {}", red("✘"), shown);
            }
            bail!("{:?} failed", workflow.kind())
        }
        SubmitOutcome::AlreadySubmitting => bail!("a submission is already in flight"),
    }
}

async fn run_health(cli: &Cli, session: &Session) -> Result<()> {
    let status = session
        .health()
        .await
        .with_context(|| format!("Service at {} is not reachable", cli.api_url))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to serialise status")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{} {}  {}",
            if status.is_ok() { green("✔") } else { red("✘") },
            cli.api_url,
            status.message.as_deref().unwrap_or(&status.status),
        );
    }

    if !status.is_ok() {
        bail!("service reported status '{}'", status.status);
    }
    Ok(())
}
