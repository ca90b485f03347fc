use chatsearch::agents::PromptAugmenter;
use chatsearch::chat::{ChatEvent, ChatOptions, ChatSession, ChatState};
use chatsearch::llm::available_models;
use chatsearch::settings::SettingsStorage;
use chatsearch::utils::init_logger;
use chatsearch::{config::Config, routes::create_router, AppState};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "chatsearch", version, about = "Streaming chat with web search augmentation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask one question and stream the answer to stdout
    Ask {
        question: String,
        #[arg(long)]
        model: Option<String>,
        /// Skip web research for this question
        #[arg(long, default_value_t = false)]
        no_search: bool,
        #[arg(long)]
        max_queries: Option<usize>,
    },
    /// Run the research pipeline and print the prompt context it produces
    Research {
        topic: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_queries: Option<usize>,
    },
    /// List available models
    Models {
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Ask {
            question,
            model,
            no_search,
            max_queries,
        } => ask(config, question, model, no_search, max_queries).await,
        Command::Research {
            topic,
            model,
            max_queries,
        } => research(config, topic, model, max_queries).await,
        Command::Models { refresh } => models(config, refresh).await,
    }
}

async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    info!("Configuration loaded: {:?}", config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = create_router(AppState::from_config(config));

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

fn session_options(config: &Config, model: Option<String>, max_queries: Option<usize>) -> ChatOptions {
    let mut options = ChatOptions::from_config(config);
    if let Some(model) = model {
        options.model = model;
    }
    if let Some(max_queries) = max_queries {
        options.max_queries = max_queries.max(1);
    }
    options
}

async fn ask(
    config: Config,
    question: String,
    model: Option<String>,
    no_search: bool,
    max_queries: Option<usize>,
) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let mut options = session_options(&state.config, model, max_queries);
    options.web_search = state.config.research.enabled && !no_search;
    options.system_prompt = state.settings.load().await.effective_system_prompt().to_string();

    let session = ChatSession::new(state.llm.clone(), state.search.clone(), options);
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = session
        .send_user_message(&question, &cancel, |event| match event {
            ChatEvent::Notice { message } => eprintln!("note: {message}"),
            ChatEvent::Research { queries, summary } => eprintln!(
                "searched {} queries: {} results from {} sources",
                queries.len(),
                summary.total_results,
                summary.total_sources
            ),
            ChatEvent::Delta { delta, .. } => {
                print!("{delta}");
                let _ = std::io::stdout().flush();
            }
            ChatEvent::State { .. } => {}
        })
        .await;
    println!();

    match outcome.state {
        ChatState::Failed { error } => Err(anyhow::anyhow!(error)),
        ChatState::Cancelled => {
            eprintln!("cancelled");
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn research(
    config: Config,
    topic: String,
    model: Option<String>,
    max_queries: Option<usize>,
) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let options = session_options(&state.config, model, max_queries);
    let session = ChatSession::new(state.llm.clone(), state.search.clone(), options);

    let result = session.research(&topic).await;
    if let Some(reason) = result.fallback_reason() {
        eprintln!("note: using keyword-based queries ({reason})");
    }
    println!("{}", PromptAugmenter::format(&result, &topic));
    Ok(())
}

async fn models(config: Config, refresh: bool) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let storage: &SettingsStorage = &state.settings;
    let models = available_models(state.llm.as_ref(), storage, refresh).await?;
    for model in models {
        match model.owned_by {
            Some(owner) => println!("{}\t{}", model.id, owner),
            None => println!("{}", model.id),
        }
    }
    Ok(())
}
