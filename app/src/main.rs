#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;
mod server;

use command::{
    CommandStrategy, HistoryInput, HistoryStrategy, InfoStrategy, InitStrategy, ResetInput,
    ResetStrategy, ServeInput, ServeStrategy, TurnInput, TurnStrategy, UsersStrategy,
    VersionStrategy,
};

#[derive(Parser)]
#[command(name = "fluency")]
#[command(about = "Spoken speech-therapy practice partner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init,
    /// Show version
    Version,
    /// Show configuration and check the database
    Info,
    /// Run one practice turn on a recorded file
    Turn {
        /// User whose conversation this turn belongs to
        #[arg(short, long)]
        user: String,

        /// Recorded utterance (webm, mp3 or wav)
        #[arg(short, long)]
        audio: PathBuf,

        /// Where to write the spoken reply
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print a user's stored conversation
    History {
        #[arg(short, long)]
        user: String,
    },
    /// Forget a user's conversation
    Reset {
        #[arg(short, long)]
        user: String,
    },
    /// List users with stored conversations
    Users,
    /// Start the HTTP service
    Serve {
        /// Address to listen on (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Turn { user, audio, out } => {
            TurnStrategy
                .execute(TurnInput { user, audio, out })
                .await
        }
        Commands::History { user } => HistoryStrategy.execute(HistoryInput { user }).await,
        Commands::Reset { user } => ResetStrategy.execute(ResetInput { user }).await,
        Commands::Users => UsersStrategy.execute(()).await,
        Commands::Serve { bind } => ServeStrategy.execute(ServeInput { bind }).await,
    }
}
