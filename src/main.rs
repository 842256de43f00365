use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dealsift::cli::commands::run::{RunOptions, ThesisArgs};

#[derive(Parser)]
#[command(name = "dealsift")]
#[command(
    version,
    about = "Screen startup decks and deal sheets against an investment thesis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize dealsift in the current directory
    Init {
        #[arg(long, short, help = "Overwrite the existing project config")]
        force: bool,
    },

    /// Submit a screening job and follow its progress
    Run {
        #[arg(help = "Pitch decks or one-pagers: paths, glob patterns or URLs")]
        documents: Vec<String>,
        #[arg(long, help = "CSV file or Google Sheets link with one startup per row")]
        sheet: Option<String>,
        #[arg(long, help = "JSON file holding the investment thesis")]
        thesis: Option<PathBuf>,
        #[arg(long, help = "Target sector")]
        sector: Option<String>,
        #[arg(long, help = "Target funding stage")]
        stage: Option<String>,
        #[arg(long, help = "Target geography")]
        geography: Option<String>,
        #[arg(long, help = "Minimum ticket size, in thousands")]
        ticket_min: Option<f64>,
        #[arg(long, help = "Maximum ticket size, in thousands")]
        ticket_max: Option<f64>,
        #[arg(long, help = "Free-text strategic context")]
        context: Option<String>,
        #[arg(long, help = "Print the job id and exit without following")]
        detach: bool,
    },

    /// Show one job, or list every job
    Status {
        #[arg(help = "Job id")]
        job_id: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Show the ranking of a completed job
    Results {
        #[arg(help = "Job id")]
        job_id: String,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Request cancellation of a job
    Cancel {
        #[arg(help = "Job id")]
        job_id: String,
    },

    /// Write the markdown portfolio report of a completed job
    Report {
        #[arg(help = "Job id")]
        job_id: String,
        #[arg(long, short, help = "Output file (default: .dealsift/reports/<job>.md)")]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mdealsift hit an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "dealsift=debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { force } => {
            dealsift::cli::commands::init::run(force)?;
        }
        Commands::Run {
            documents,
            sheet,
            thesis,
            sector,
            stage,
            geography,
            ticket_min,
            ticket_max,
            context,
            detach,
        } => {
            let options = RunOptions {
                documents,
                sheet,
                thesis: ThesisArgs {
                    file: thesis,
                    sector,
                    stage,
                    geography,
                    ticket_min,
                    ticket_max,
                    context,
                },
                detach,
            };
            let rt = Runtime::new()?;
            rt.block_on(dealsift::cli::commands::run::run(options))?;
        }
        Commands::Status { job_id, format } => {
            let rt = Runtime::new()?;
            rt.block_on(dealsift::cli::commands::status::run(
                job_id.as_deref(),
                &format,
            ))?;
        }
        Commands::Results { job_id, format } => {
            let rt = Runtime::new()?;
            rt.block_on(dealsift::cli::commands::results::run(&job_id, &format))?;
        }
        Commands::Cancel { job_id } => {
            let rt = Runtime::new()?;
            rt.block_on(dealsift::cli::commands::cancel::run(&job_id))?;
        }
        Commands::Report { job_id, output } => {
            let rt = Runtime::new()?;
            rt.block_on(dealsift::cli::commands::report::run(
                &job_id,
                output.as_deref(),
            ))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                dealsift::cli::commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                dealsift::cli::commands::config::path()?;
            }
        },
    }

    Ok(())
}
