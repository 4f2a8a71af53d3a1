//! CareAgents terminal client
//!
//! Usage:
//!   careagents-cli chat [--patient <id>] [--no-stream] [--auto-route]
//!   careagents-cli ask <message> [--patient <id>]
//!   careagents-cli session show|clear
//!   careagents-cli history

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

use careagents::client::{
    ChatConnection, ChatView, ConnectionConfig, ConnectionStatus, FileStorage, SessionManager,
    ViewEvent,
};
use careagents::models::chat::RecordKind;
use careagents::models::envelope::{ClientMessage, ServerMessage};

#[derive(Parser)]
#[command(name = "careagents-cli")]
#[command(version)]
#[command(about = "Chat with CareAgents from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server root URL
    #[arg(short, long, env = "CAREAGENTS_SERVER", default_value = "ws://localhost:8000")]
    server: String,

    /// File holding the session identifier and cached transcript
    #[arg(long, default_value = ".careagents/session.json")]
    state: PathBuf,

    /// Connection attempts before giving up
    #[arg(long, default_value = "5")]
    retries: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat. Type /help for in-chat commands.
    Chat {
        /// Patient whose records ground the answers
        #[arg(short, long)]
        patient: Option<String>,

        /// Wait for whole answers instead of streaming them
        #[arg(long)]
        no_stream: bool,

        /// Let the server pick the chat or record agent
        #[arg(long)]
        auto_route: bool,
    },

    /// Send one message and print the answer
    Ask {
        message: String,

        #[arg(short, long)]
        patient: Option<String>,
    },

    /// Inspect or reset the stored session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Print the cached transcript
    History,
}

#[derive(Subcommand)]
enum SessionAction {
    Show,
    /// Start a new session and drop server-side memory for the old one
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = FileStorage::open(&cli.state)
        .with_context(|| format!("failed to open {}", cli.state.display()))?;
    let mut sessions = SessionManager::new(storage);

    let connection = ConnectionConfig {
        base_url: cli.server.clone(),
        max_attempts: cli.retries,
        retry_delay: Duration::from_secs(1),
    };

    match cli.command {
        Commands::Chat {
            patient,
            no_stream,
            auto_route,
        } => {
            let options = ChatOptions {
                patient,
                stream: !no_stream,
                auto_route,
            };
            interactive(&cli.server, connection, &mut sessions, options).await
        }
        Commands::Ask { message, patient } => {
            let session_id = sessions.session_id()?;
            let mut conn = ChatConnection::connect(connection, &session_id, patient.as_deref()).await?;
            let mut view = ChatView::new(sessions.history());
            await_welcome(&mut conn, &mut view, false).await?;

            view.push_user(&message);
            exchange(&mut conn, &mut view, ClientMessage::chat(message)).await?;
            sessions.save_history(&view.messages)?;
            conn.close().await?;
            Ok(())
        }
        Commands::Session { action } => match action {
            SessionAction::Show => {
                if sessions.has_session() {
                    println!("session: {}", sessions.session_id()?);
                } else {
                    println!("no session yet");
                }
                println!("cached messages: {}", sessions.history().len());
                Ok(())
            }
            SessionAction::Clear => {
                if sessions.has_session() {
                    let old = sessions.session_id()?;
                    if let Err(e) = clear_remote(&cli.server, &old).await {
                        warn!(error = %e, "could not clear server-side memory");
                    }
                }
                println!("new session: {}", sessions.clear_session()?);
                Ok(())
            }
        },
        Commands::History => {
            for message in sessions.history() {
                println!("{}: {}", message.role, message.content);
            }
            Ok(())
        }
    }
}

struct ChatOptions {
    patient: Option<String>,
    stream: bool,
    auto_route: bool,
}

async fn interactive(
    server: &str,
    config: ConnectionConfig,
    sessions: &mut SessionManager<FileStorage>,
    options: ChatOptions,
) -> Result<()> {
    let mut session_id = sessions.session_id()?;
    let mut conn = ChatConnection::connect(config.clone(), &session_id, options.patient.as_deref()).await?;
    let mut view = ChatView::new(sessions.history());
    await_welcome(&mut conn, &mut view, true).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt();
            continue;
        }

        let message = match line {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("/clear  start a new session");
                println!("/record summary|vitals|prescriptions");
                println!("/quit   leave");
                prompt();
                continue;
            }
            "/clear" => {
                if let Err(e) = clear_remote(server, &session_id).await {
                    warn!(error = %e, "could not clear server-side memory");
                }
                session_id = sessions.clear_session()?;
                view.clear();
                conn.close().await.ok();
                conn = ChatConnection::connect(config.clone(), &session_id, options.patient.as_deref()).await?;
                await_welcome(&mut conn, &mut view, true).await?;
                prompt();
                continue;
            }
            other if other.starts_with("/record") => match parse_record(other) {
                Some(kind) => ClientMessage::RecordRequest {
                    request_type: kind,
                    patient_id: options.patient.clone(),
                    vital_type: None,
                    days: 30,
                },
                None => {
                    println!("usage: /record summary|vitals|prescriptions");
                    prompt();
                    continue;
                }
            },
            text => {
                view.push_user(text);
                ClientMessage::ChatMessage {
                    message: text.to_string(),
                    patient_id: options.patient.clone(),
                    stream: options.stream,
                    auto_route: options.auto_route,
                }
            }
        };

        if let Err(e) = exchange(&mut conn, &mut view, message).await {
            eprintln!("connection lost: {}", e);
            view.discard_unanswered();
            view.set_status(ConnectionStatus::Reconnecting { attempt: 1 });
            conn.reconnect().await?;
            await_welcome(&mut conn, &mut view, false).await?;
        }
        sessions.save_history(&view.messages)?;
        prompt();
    }

    conn.close().await.ok();
    Ok(())
}

fn prompt() {
    print!("> ");
    std::io::stdout().flush().ok();
}

fn parse_record(command: &str) -> Option<RecordKind> {
    match command.split_whitespace().nth(1)? {
        "summary" => Some(RecordKind::Summary),
        "vitals" => Some(RecordKind::Vitals),
        "prescriptions" => Some(RecordKind::Prescriptions),
        _ => None,
    }
}

async fn await_welcome(conn: &mut ChatConnection, view: &mut ChatView, print: bool) -> Result<()> {
    match conn.next_frame().await {
        Some(frame) => {
            if let ViewEvent::Welcome(text) = view.apply(frame?) {
                if print {
                    println!("{}", text);
                }
            }
            Ok(())
        }
        None => bail!("server closed the connection before greeting"),
    }
}

/// Send one request and render frames until the server is done with it.
async fn exchange(conn: &mut ChatConnection, view: &mut ChatView, message: ClientMessage) -> Result<()> {
    conn.send(&message).await?;

    let mut started = false;
    let mut streamed = false;
    while let Some(frame) = conn.next_frame().await {
        let frame = frame?;
        let finished = matches!(frame, ServerMessage::Typing { is_typing: false, .. });
        if matches!(frame, ServerMessage::Typing { is_typing: true, .. }) {
            started = true;
        }

        match view.apply(frame) {
            ViewEvent::Chunk(chunk) => {
                streamed = true;
                print!("{}", chunk);
                std::io::stdout().flush().ok();
            }
            ViewEvent::Completed(message) => {
                if streamed {
                    println!();
                } else {
                    println!("{}", message.content);
                }
            }
            ViewEvent::Failed(error) => {
                if streamed {
                    println!();
                }
                eprintln!("error [{}]: {}", error.code, error.message);
                // Rejections that never started a response get no typing frames.
                if !started {
                    return Ok(());
                }
            }
            ViewEvent::Welcome(_) | ViewEvent::Unchanged => {}
        }

        if finished {
            return Ok(());
        }
    }
    Err(anyhow!("connection closed mid-response"))
}

/// `DELETE /api/session/{id}` on the HTTP side of `server`.
async fn clear_remote(server: &str, session_id: &str) -> Result<()> {
    let mut url = Url::parse(server)?;
    let scheme = if matches!(url.scheme(), "wss" | "https") { "https" } else { "http" };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot derive HTTP address from {}", server))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("cannot derive HTTP address from {}", server))?
        .pop_if_empty()
        .extend(["api", "session", session_id]);

    reqwest::Client::new()
        .delete(url)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
