mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use codebench_common::types::ExecutionMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codebench")]
#[command(about = "codebench - run and score code in ten languages", long_about = None)]
struct Cli {
    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
pub struct RunArgs {
    /// Source file to execute
    pub file: PathBuf,

    /// Language id or alias (inferred from the file extension if omitted)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Execution path preference: local, remote or auto
    #[arg(short, long, default_value = "local")]
    pub mode: ExecutionMode,

    /// Timeout in seconds (can only shorten the language default)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// File whose contents are fed to the program's stdin
    #[arg(long)]
    pub stdin: Option<PathBuf>,
}

#[derive(Args)]
pub struct SuiteArgs {
    /// Source files, one case each, named after the file stem
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Language id or alias (inferred from the first file if omitted)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Execution path preference: local, remote or auto
    #[arg(short, long, default_value = "local")]
    pub mode: ExecutionMode,

    /// Timeout in seconds per case
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a source file
    Run(RunArgs),

    /// Execute a source file and print its benchmark and suggestions
    Analyze(RunArgs),

    /// Run several files of one language and summarize their scores
    Suite(SuiteArgs),

    /// List supported languages and whether their toolchains are installed
    Languages,

    /// Show benchmark statistics from the data directory
    Stats {
        /// Only benchmarks for this language
        #[arg(short, long)]
        language: Option<String>,

        /// Only benchmarks in this category (basic, algorithm, data_structure, io_intensive)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Rank languages by their recorded benchmarks
    Compare {
        /// Language ids to compare (all when omitted)
        languages: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let success = match cli.command {
        Commands::Run(args) => commands::run(&args, cli.json).await?,
        Commands::Analyze(args) => commands::analyze(&args, cli.json).await?,
        Commands::Suite(args) => commands::suite(&args, cli.json).await?,
        Commands::Languages => commands::list_languages(cli.json)?,
        Commands::Stats { language, category } => {
            commands::show_stats(language.as_deref(), category.as_deref(), cli.json)?
        }
        Commands::Compare { languages } => commands::compare(&languages, cli.json)?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
