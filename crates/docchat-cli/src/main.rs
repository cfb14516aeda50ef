use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use docchat_app::bulk::{BulkUploader, Enqueued, ProgressObserver, QueuedState};
use docchat_app::chat::ChatService;
use docchat_app::uploader::UploadService;
use docchat_core::auth::{AuthContext, Credentials, StaticTokenIssuer, TokenIssuer};
use docchat_core::config::ClientConfig;
use docchat_core::document::DocumentStore;
use docchat_core::session::ChatStore;
use docchat_gateway::RagApiClient;

mod repl;

#[derive(Parser)]
#[command(name = "docchat")]
#[command(about = "docchat - Enterprise RAG document chat client", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Send a single query and print the answer
    Query {
        /// The question to ask
        text: String,
    },
    /// Upload documents through the validated bulk flow
    Upload {
        /// Files to upload
        files: Vec<PathBuf>,
        /// Retry failed files once after the first pass
        #[arg(long)]
        retry: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::resolve(cli.config.as_deref())?;

    let mut client = RagApiClient::from_config(&config.backend)?;
    if let Some(auth) = auth_context(&config).await? {
        client = client.with_auth(auth);
    }

    match cli.command {
        Commands::Chat => run_chat(client).await,
        Commands::Query { text } => run_query(client, &text).await,
        Commands::Upload { files, retry } => run_upload(client, &config, &files, retry).await,
    }
}

/// Builds the authentication context when the deployment uses a gateway
/// token. The context is handed to the client explicitly; nothing global.
async fn auth_context(config: &ClientConfig) -> Result<Option<AuthContext>> {
    let Some(token) = &config.backend.auth_token else {
        return Ok(None);
    };
    let issuer = StaticTokenIssuer::new(token.clone());
    let email = std::env::var("USER")
        .map(|user| format!("{}@localhost", user))
        .unwrap_or_else(|_| "user@localhost".to_string());
    let context = issuer
        .issue(&Credentials {
            email,
            password: String::new(),
        })
        .await?;
    Ok(Some(context))
}

async fn run_chat(client: RagApiClient) -> Result<()> {
    let sessions = Arc::new(ChatStore::new());
    let documents = Arc::new(DocumentStore::new());
    let chat = Arc::new(ChatService::new(sessions.clone(), Arc::new(client.clone())));
    let uploads = Arc::new(UploadService::new(
        documents.clone(),
        sessions.clone(),
        Arc::new(client),
    ));

    repl::run(repl::ReplContext {
        sessions,
        documents,
        chat,
        uploads,
    })
    .await
}

async fn run_query(client: RagApiClient, text: &str) -> Result<()> {
    let sessions = Arc::new(ChatStore::new());
    let chat = ChatService::new(sessions.clone(), Arc::new(client));

    let session = sessions.create_session("Query").await;
    match chat.send_message(&session.id, text).await? {
        Some(message) => {
            for line in message.content.lines() {
                println!("{}", line.bright_blue());
            }
        }
        None => println!("{}", "(no reply)".bright_black()),
    }
    Ok(())
}

async fn run_upload(
    client: RagApiClient,
    config: &ClientConfig,
    files: &[PathBuf],
    retry: bool,
) -> Result<()> {
    if files.is_empty() {
        println!("{}", "Nothing to upload.".yellow());
        return Ok(());
    }

    // Names for progress lines, filled in as files are admitted.
    let names: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
    let observer: ProgressObserver = {
        let names = names.clone();
        Arc::new(move |file_id, state| {
            let names = names.lock().unwrap();
            let name = names.get(file_id).map(String::as_str).unwrap_or(file_id);
            match state {
                QueuedState::Uploading { progress: 0 } => {
                    println!("{}", format!("Uploading {}...", name).bright_black());
                }
                QueuedState::Success => {
                    println!("{}", format!("{} uploaded", name).green());
                }
                QueuedState::Error { reason } => {
                    eprintln!("{}", format!("{} failed: {}", name, reason).red());
                }
                _ => {}
            }
        })
    };

    let uploader = BulkUploader::new(
        Arc::new(client),
        config.upload.constraints(),
        std::time::Duration::from_millis(config.upload.progress_step_ms),
    )
    .with_observer(observer);

    for path in files {
        match uploader.enqueue(path).await {
            Ok(Enqueued::Accepted { file_id }) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                names.lock().unwrap().insert(file_id, name);
            }
            Ok(Enqueued::Rejected { error }) => {
                eprintln!("{}", format!("{}: {}", path.display(), error).red());
            }
            Err(err) => {
                eprintln!("{}", format!("{}: {}", path.display(), err).red());
            }
        }
    }

    uploader.process_all().await;

    if retry {
        let failed: Vec<String> = uploader
            .queue()
            .await
            .into_iter()
            .filter(|f| matches!(f.state, QueuedState::Error { .. }))
            .map(|f| f.id)
            .collect();
        for file_id in failed {
            uploader.retry(&file_id).await?;
        }
    }

    let queue = uploader.queue().await;
    let succeeded = queue
        .iter()
        .filter(|f| f.state == QueuedState::Success)
        .count();
    println!(
        "{}",
        format!("{}/{} files uploaded", succeeded, queue.len()).bold()
    );
    Ok(())
}
