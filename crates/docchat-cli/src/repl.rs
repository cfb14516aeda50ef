//! Interactive chat REPL.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use docchat_app::chat::ChatService;
use docchat_app::uploader::{UploadReport, UploadService};
use docchat_core::document::{DocumentStatus, DocumentStore};
use docchat_core::session::{ChatStore, Message, SessionSummary};

/// Conversation starters shown for an empty session.
const SUGGESTED_PROMPTS: [&str; 3] = [
    "Summarize the Q3 financial report",
    "What are the new company policies?",
    "Analyze customer feedback trends",
];

/// Slash commands the prompt understands.
const COMMANDS: &[&str] = &[
    "/new", "/sessions", "/switch", "/delete", "/search", "/docs", "/stats", "/upload", "/help",
];

fn command_matches<'a>(prefix: &'a str) -> impl Iterator<Item = &'static str> + 'a {
    COMMANDS
        .iter()
        .copied()
        .filter(move |cmd| cmd.starts_with(prefix))
}

/// Line helper for the chat prompt.
///
/// Completes the slash-command word, switches to filesystem-path completion
/// for the `/upload` argument, colors command lines as they are typed
/// (yellow once no command can match, a likely typo), and hints the rest of
/// a command once the prefix is unambiguous.
struct ChatHelper {
    paths: FilenameCompleter,
}

impl ChatHelper {
    fn new() -> Self {
        Self {
            paths: FilenameCompleter::new(),
        }
    }
}

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let typed = &line[..pos];

        // `/upload` takes a path argument; hand that part over to the
        // filesystem completer.
        if typed.starts_with("/upload ") {
            return self.paths.complete(line, pos, ctx);
        }

        // Only the command word itself completes; chat text never does.
        if typed.starts_with('/') && !typed.contains(' ') {
            let candidates = command_matches(typed)
                .map(|cmd| Pair {
                    display: cmd.to_string(),
                    replacement: cmd.to_string(),
                })
                .collect();
            return Ok((0, candidates));
        }

        Ok((pos, Vec::new()))
    }
}

impl Highlighter for ChatHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if !line.starts_with('/') {
            return Borrowed(line);
        }
        let word = line.split_whitespace().next().unwrap_or(line);
        if command_matches(word).next().is_some() {
            Owned(line.bright_cyan().to_string())
        } else {
            Owned(line.yellow().to_string())
        }
    }

    fn highlight_char(&self, line: &str, _pos: usize, _forced: bool) -> bool {
        line.starts_with('/')
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let typed = &line[..pos];
        if !typed.starts_with('/') || typed.contains(' ') {
            return None;
        }
        let mut matches = command_matches(typed);
        let only = matches.next()?;
        if matches.next().is_some() {
            // Ambiguous prefix; completion will list the options.
            return None;
        }
        (only.len() > typed.len()).then(|| only[typed.len()..].to_string())
    }
}

impl Validator for ChatHelper {}

/// Everything the REPL needs to serve one user.
pub struct ReplContext {
    pub sessions: Arc<ChatStore>,
    pub documents: Arc<DocumentStore>,
    pub chat: Arc<ChatService>,
    pub uploads: Arc<UploadService>,
}

/// Runs the interactive chat loop until the user leaves.
pub async fn run(ctx: ReplContext) -> Result<()> {
    let mut rl = Editor::new()?;
    rl.set_helper(Some(ChatHelper::new()));

    println!("{}", "docchat".bright_magenta().bold());
    println!(
        "{}",
        "Ask a question to query your documents. /help lists commands; 'exit' leaves."
            .bright_black()
    );
    println!();

    loop {
        // The prompt names the conversation the next message lands in.
        let prompt = match ctx.sessions.active().await {
            Some(session) => format!("[{}] ", truncate_title(&session.title)),
            None => "docchat ".to_string(),
        };

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "Interrupted. 'exit' or Ctrl-D leaves the chat.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Input error: {}", err).red());
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        rl.add_history_entry(input).ok();

        match input {
            "exit" | "quit" => break,
            command if command.starts_with('/') => handle_command(&ctx, &command[1..]).await,
            text => send_chat_message(&ctx, text).await,
        }
    }

    println!("{}", "Bye.".bright_green());
    Ok(())
}

/// Keeps the prompt short when a session has a long title.
fn truncate_title(title: &str) -> String {
    const MAX_CHARS: usize = 24;
    if title.chars().count() <= MAX_CHARS {
        return title.to_string();
    }
    let head: String = title.chars().take(MAX_CHARS - 1).collect();
    format!("{}…", head)
}

async fn send_chat_message(ctx: &ReplContext, text: &str) {
    let session_id = match ctx.sessions.active_id().await {
        Some(id) => id,
        None => {
            let session = ctx.sessions.create_session("New Conversation").await;
            println!(
                "{}",
                format!("Started '{}'", session.title).bright_black()
            );
            session.id
        }
    };

    match ctx.chat.send_message(&session_id, text).await {
        Ok(Some(message)) => print_assistant_message(&message),
        Ok(None) => {
            println!("{}", "(reply superseded by a newer query)".bright_black());
        }
        Err(err) => {
            eprintln!("{}", format!("Error: {}", err).red());
        }
    }
}

fn print_assistant_message(message: &Message) {
    for line in message.content.lines() {
        println!("{}", line.bright_blue());
    }
    for source in &message.sources {
        println!(
            "{}",
            format!("  [{}] {}", source.title, source.excerpt).bright_black()
        );
    }
}

async fn handle_command(ctx: &ReplContext, command: &str) {
    let (name, args) = match command.split_once(' ') {
        Some((name, args)) => (name, args.trim()),
        None => (command, ""),
    };

    match name {
        "new" => {
            let title = if args.is_empty() {
                "New Conversation"
            } else {
                args
            };
            let session = ctx.sessions.create_session(title).await;
            println!("{}", format!("Started '{}'", session.title).green());
            println!("{}", "Try one of:".bright_black());
            for prompt in SUGGESTED_PROMPTS {
                println!("{}", format!("  {}", prompt).bright_black());
            }
        }
        "sessions" => print_sessions(&ctx.sessions.list().await, ctx).await,
        "search" => {
            if args.is_empty() {
                println!("{}", "Usage: /search <query>".yellow());
            } else {
                print_sessions(&ctx.sessions.search(args).await, ctx).await;
            }
        }
        "switch" => match resolve_session(ctx, args).await {
            Some(id) => match ctx.sessions.set_active(&id).await {
                Ok(()) => println!("{}", "Switched.".green()),
                Err(err) => eprintln!("{}", format!("Error: {}", err).red()),
            },
            None => println!("{}", "Usage: /switch <number>".yellow()),
        },
        "delete" => match resolve_session(ctx, args).await {
            Some(id) => match ctx.sessions.delete_session(&id).await {
                Ok(()) => match ctx.sessions.active().await {
                    Some(active) => {
                        println!("{}", format!("Deleted. Now on '{}'.", active.title).green())
                    }
                    None => println!("{}", "Deleted. No sessions left.".green()),
                },
                Err(err) => eprintln!("{}", format!("Error: {}", err).red()),
            },
            None => println!("{}", "Usage: /delete <number>".yellow()),
        },
        "docs" => {
            let documents = ctx.documents.list().await;
            if documents.is_empty() {
                println!("{}", "No documents.".bright_black());
            }
            for document in documents {
                let status = match document.status {
                    DocumentStatus::Ready => "ready".green(),
                    DocumentStatus::Processing => "processing".yellow(),
                    DocumentStatus::Error => "error".red(),
                };
                println!(
                    "{:40} {:>10}  {}",
                    document.name,
                    human_size(document.size),
                    status
                );
            }
        }
        "stats" => {
            let stats = ctx.documents.stats().await;
            println!(
                "{} documents, {} ({} ready, {} processing, {} error)",
                stats.total,
                human_size(stats.total_bytes),
                stats.ready,
                stats.processing,
                stats.error
            );
        }
        "upload" => {
            if args.is_empty() {
                println!("{}", "Usage: /upload <path>".yellow());
                return;
            }
            let session_id = match ctx.sessions.active_id().await {
                Some(id) => id,
                None => ctx.sessions.create_session("New Conversation").await.id,
            };
            match ctx.uploads.upload_from_chat(&session_id, Path::new(args)).await {
                Ok(UploadReport::Accepted { document }) => {
                    println!(
                        "{}",
                        format!(
                            "{} has been successfully uploaded and processed.",
                            document.name
                        )
                        .green()
                    );
                }
                Ok(UploadReport::Failed { reason }) => {
                    eprintln!("{}", reason.red());
                }
                Err(err) => eprintln!("{}", format!("Error: {}", err).red()),
            }
        }
        "help" => {
            println!("{}", "Commands:".bright_magenta());
            println!("  /new [title]      start a new conversation");
            println!("  /sessions         list conversations");
            println!("  /search <query>   filter conversations");
            println!("  /switch <number>  activate a conversation");
            println!("  /delete <number>  delete a conversation");
            println!("  /docs             list documents");
            println!("  /stats            document statistics");
            println!("  /upload <path>    upload a document into the chat");
            println!("  exit              leave the chat");
        }
        _ => println!(
            "{}",
            format!("No such command: /{} (see /help)", name).yellow()
        ),
    }
}

async fn print_sessions(sessions: &[SessionSummary], ctx: &ReplContext) {
    if sessions.is_empty() {
        println!("{}", "No conversations.".bright_black());
        return;
    }
    let active_id = ctx.sessions.active_id().await;
    for (index, session) in sessions.iter().enumerate() {
        let marker = if active_id.as_deref() == Some(&session.id) {
            "*"
        } else {
            " "
        };
        let preview = if session.last_message.is_empty() {
            String::new()
        } else {
            format!(" - {}", session.last_message)
        };
        println!(
            "{} {:2}. {} ({} messages){}",
            marker,
            index + 1,
            session.title.bold(),
            session.message_count,
            preview.bright_black()
        );
    }
}

/// Resolves a 1-based list index to a session id.
async fn resolve_session(ctx: &ReplContext, args: &str) -> Option<String> {
    let index: usize = args.parse().ok()?;
    let sessions = ctx.sessions.list().await;
    sessions.get(index.checked_sub(1)?).map(|s| s.id.clone())
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / 1024.0 / 1024.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_matches_filters_by_prefix() {
        let hits: Vec<_> = command_matches("/s").collect();
        assert_eq!(hits, vec!["/sessions", "/switch", "/search", "/stats"]);
        assert!(command_matches("/z").next().is_none());
    }

    #[test]
    fn test_hint_only_for_unambiguous_prefixes() {
        let helper = ChatHelper::new();
        let history = rustyline::history::DefaultHistory::new();
        let ctx = Context::new(&history);

        // "/se" could be /sessions or /search.
        assert_eq!(helper.hint("/se", 3, &ctx), None);
        // "/up" can only be /upload.
        assert_eq!(helper.hint("/up", 3, &ctx), Some("load".to_string()));
        // Once an argument starts, no command hints.
        assert_eq!(helper.hint("/upload re", 10, &ctx), None);
    }

    #[test]
    fn test_truncate_title_keeps_short_titles() {
        assert_eq!(truncate_title("Q3 Analysis"), "Q3 Analysis");
        let long = "An unreasonably long conversation title";
        let truncated = truncate_title(long);
        assert!(truncated.chars().count() <= 24);
        assert!(truncated.ends_with('…'));
    }
}
