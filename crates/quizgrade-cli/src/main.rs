//! quizgrade CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(
    name = "quizgrade",
    version,
    about = "Quiz grading with model-assisted evaluation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a quiz from a question bank with answers read from a file
    Quiz {
        /// Path to .toml question bank or directory of banks
        #[arg(long)]
        bank: PathBuf,

        /// Module to quiz on (defaults to the only module in --bank)
        #[arg(long)]
        module: Option<Uuid>,

        /// TOML file of answers keyed by question id
        #[arg(long)]
        answers: PathBuf,

        /// Learner id
        #[arg(long, default_value = "1")]
        user: i64,

        /// Grade subjective answers without a model (fallback results)
        #[arg(long)]
        offline: bool,

        /// Output directory for the JSON report
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Summarize a score log into module and course scores
    Scores {
        /// JSON array of score entries
        #[arg(long)]
        log: PathBuf,

        /// Learner id
        #[arg(long, default_value = "1")]
        user: i64,

        /// TOML course definition (id, name, module_ids)
        #[arg(long)]
        course: Option<PathBuf>,
    },

    /// Validate question bank TOML files
    Validate {
        /// Path to bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizgrade=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Quiz {
            bank,
            module,
            answers,
            user,
            offline,
            output,
            config,
        } => {
            commands::quiz::execute(commands::quiz::QuizArgs {
                bank,
                module,
                answers,
                user,
                offline,
                output,
                config,
            })
            .await
        }
        Commands::Scores { log, user, course } => {
            commands::scores::execute(log, user, course).await
        }
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
