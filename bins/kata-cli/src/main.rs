mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "kata-cli")]
#[command(about = "Kata CLI - Run, grade and syntax-check kata submissions", long_about = None)]
struct Cli {
    /// Path to languages.json (defaults to KATA_LANGUAGES_CONFIG or config/languages.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a submission against a kata's public (or hidden) tests
    Run {
        /// Language (python, javascript, typescript, cpp, or py/js/ts)
        #[arg(short, long)]
        lang: String,

        /// Kata directory holding tests.<ext> / hidden_tests.<ext>
        #[arg(short, long)]
        kata_dir: PathBuf,

        /// File containing the submission
        #[arg(short, long)]
        code_file: PathBuf,

        /// Run the hidden tests instead of the public ones
        #[arg(long, default_value = "false")]
        hidden: bool,

        /// Custom test file name inside the kata directory
        #[arg(short, long, default_value = "")]
        test_file: String,

        /// Wall-clock budget in milliseconds (defaults to KATA_DEFAULT_TIMEOUT_MS)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the raw result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run public and hidden tests and print the weighted verdict
    Grade {
        #[arg(short, long)]
        lang: String,

        #[arg(short, long)]
        kata_dir: PathBuf,

        #[arg(short, long)]
        code_file: PathBuf,

        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Weight of the public score
        #[arg(long, default_value = "0.3")]
        public_weight: f64,

        /// Weight of the hidden score
        #[arg(long, default_value = "0.7")]
        hidden_weight: f64,

        /// Minimum final score to pass
        #[arg(long, default_value = "70")]
        threshold: f64,

        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Check a submission's syntax without running it
    Check {
        #[arg(short, long)]
        lang: String,

        #[arg(short, long)]
        code_file: PathBuf,

        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List languages and their toolchains
    Languages {
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Quiet by default so human output stays readable; RUST_LOG turns it up
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = commands::CliContext::load(cli.config.as_deref())?;

    let passed = match cli.command {
        Commands::Run {
            lang,
            kata_dir,
            code_file,
            hidden,
            test_file,
            timeout_ms,
            json,
        } => {
            commands::run(
                &context,
                &lang,
                &kata_dir,
                &code_file,
                &test_file,
                hidden,
                timeout_ms,
                json,
            )
            .await?
        }
        Commands::Grade {
            lang,
            kata_dir,
            code_file,
            timeout_ms,
            public_weight,
            hidden_weight,
            threshold,
            json,
        } => {
            let scoring = kata_common::types::ScoringConfig {
                public_weight,
                hidden_weight,
                passing_threshold: threshold,
            };
            commands::grade(&context, &lang, &kata_dir, &code_file, timeout_ms, &scoring, json).await?
        }
        Commands::Check {
            lang,
            code_file,
            json,
        } => commands::check(&context, &lang, &code_file, json).await?,
        Commands::Languages { json } => commands::languages(&context, json)?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
