use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use moodreel_catalog::{MovieCatalog, TmdbCatalog};
use moodreel_channels::telegram::TelegramBot;
use moodreel_channels::ChannelBot;
use moodreel_core::{load_config, require_telegram_token, validate_config, MoodreelConfig, Recommender};
use moodreel_gateway::{spawn_session_sweeper, Gateway};
use moodreel_schema::{plain_text, InboundMessage};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Parser)]
#[command(name = "moodreel", version, about = "Movie recommendations for your mood, over Telegram")]
struct Cli {
    #[arg(
        long,
        default_value = "config/main.yaml",
        help = "Config file (missing file means defaults + environment)"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the Telegram bot (long polling)")]
    Start,
    #[command(about = "Local REPL for testing (no Telegram needed)")]
    Chat,
    #[command(about = "Resolve a mood and print the top movie once")]
    Recommend {
        #[arg(help = "Free text, e.g. \"I'm sad, want a romance movie\"")]
        text: String,
    },
    #[command(about = "Validate the config file")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let log_dir = &config.logging.dir;
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "moodreel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Start => start_bot(&config).await?,
        Commands::Chat => run_repl(&config).await?,
        Commands::Recommend { text } => recommend_once(&config, &text).await?,
        Commands::Validate => {
            validate_config(&config)?;
            println!("Config OK: {}", describe_config(&cli.config, &config));
            if require_telegram_token(&config).is_err() {
                println!("Note: telegram token is empty, `moodreel start` will refuse to run.");
            }
        }
    }

    Ok(())
}

fn describe_config(path: &Path, config: &MoodreelConfig) -> String {
    format!(
        "{} ({} mood rules, {} genres, locale {})",
        path.display(),
        config.conversation.mood_rules.len(),
        config.conversation.genres.len(),
        config.catalog.locale,
    )
}

async fn start_bot(config: &MoodreelConfig) -> Result<()> {
    validate_config(config)?;
    let token = require_telegram_token(config)?.to_string();

    let gateway = Arc::new(Gateway::from_config(config));
    spawn_session_sweeper(gateway.clone(), SESSION_SWEEP_INTERVAL);
    tracing::info!("Registering Telegram bot: {}", config.telegram.connector_id);
    let bot: Box<dyn ChannelBot> = Box::new(TelegramBot::new(
        token,
        config.telegram.connector_id.clone(),
        gateway,
    ));

    let channel = bot.channel_type().to_string();
    let connector = bot.connector_id().to_string();
    if let Err(err) = bot.run().await {
        tracing::error!("{channel} bot {connector} exited with error: {err}");
        return Err(err);
    }
    Ok(())
}

async fn run_repl(config: &MoodreelConfig) -> Result<()> {
    validate_config(config)?;
    let gateway = Gateway::from_config(config);

    println!("moodreel REPL. Type /start to begin, 'quit' to exit.");
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let inbound = InboundMessage {
            trace_id: uuid::Uuid::new_v4(),
            channel_type: "repl".into(),
            connector_id: "repl".into(),
            conversation_scope: "repl:0".into(),
            user_scope: "user:local".into(),
            text: input.to_string(),
            at: chrono::Utc::now(),
            sender_name: std::env::var("USER").ok(),
            message_id: None,
        };

        if let Some(out) = gateway.handle_inbound(inbound).await {
            println!("{}", out.text());
            if let Some(image) = out.image() {
                println!("[poster] {}", image.url);
            }
        }
    }

    Ok(())
}

async fn recommend_once(config: &MoodreelConfig, text: &str) -> Result<()> {
    validate_config(config)?;
    let catalog: Arc<dyn MovieCatalog> = Arc::new(TmdbCatalog::new(&config.catalog));
    let recommender = Recommender::new(config.conversation.resolver(), catalog);

    let reply = recommender.recommend(text).await?.to_reply();
    println!("{}", plain_text(&reply.body));
    for attachment in &reply.attachments {
        println!("[poster] {}", attachment.url);
    }
    Ok(())
}
