use alter::{cli, config, context::AppContext, profile, scoring, server, user::UserProfile};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alter", version, about = "Local AI alter-ego with long-term memory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat in the terminal (reminders run in the background)
    Chat,
    /// Serve the JSON chat API and run the scheduler
    Serve,
    /// Run only the reminder and daily-summary scheduler
    Remind,
    /// List stored memories
    Memories {
        /// Rank by relevance to this query instead of listing the newest
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Manage the retrieval document folder
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
    /// Check configuration, the model daemon and the memory store
    Doctor,
    /// Serve the TOEFL speaking scorer
    ScoreServer {
        #[arg(long)]
        port: Option<u16>,
        /// Directory of static files served at `/`
        #[arg(long)]
        static_dir: Option<String>,
    },
}

#[derive(Subcommand)]
enum DocsAction {
    /// Copy a file into the docs folder and rebuild the index
    Add { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Provider keys for the scorer may live in .env
    let _ = dotenvy::dotenv();

    let config = config::AlterConfig::load()?;

    // Log to stderr so the REPL's stdout stays clean.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Chat => {
            let ctx = build_context(config).await?;
            cli::chat::repl(ctx).await?;
        }
        Command::Serve => {
            let ctx = build_context(config).await?;
            server::serve(ctx).await?;
        }
        Command::Remind => {
            let ctx = build_context(config).await?;
            server::run_scheduler(ctx).await?;
        }
        Command::Memories { query, limit } => {
            let user = load_user(&config)?;
            let store = profile::create_store(&config, &user.name)?;
            let profile = profile::Profile::new(store);
            cli::memories::list(&profile, &user.name, query.as_deref(), limit).await;
        }
        Command::Docs { action } => match action {
            DocsAction::Add { path } => {
                let ctx = build_context(config).await?;
                cli::docs::add(&ctx, &path).await?;
            }
        },
        Command::Doctor => {
            cli::doctor::doctor(&config).await?;
        }
        Command::ScoreServer { port, static_dir } => {
            let mut scoring = config.scoring.clone();
            scoring.apply_env();
            if let Some(port) = port {
                scoring.port = port;
            }
            if let Some(dir) = static_dir {
                scoring.static_dir = dir;
            }
            scoring::server::serve(scoring).await?;
        }
    }

    Ok(())
}

fn load_user(config: &config::AlterConfig) -> Result<UserProfile> {
    UserProfile::load_or_create(&config.resolved_user_config_path(), cli::ask)
}

async fn build_context(config: config::AlterConfig) -> Result<AppContext> {
    let user = load_user(&config)?;
    AppContext::build(config, user).await
}
