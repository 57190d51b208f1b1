use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use colored::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader as AsyncBufReader};

use crate::files;
use crate::session::{ChatOutcome, SessionController};
use crate::views::{ChatTurn, DocumentList, MessageLog, Role, Transcript};

/// Transcript that also prints every turn as it is appended.
pub struct EchoLog {
    transcript: Arc<Transcript>,
}

impl EchoLog {
    pub fn new(transcript: Arc<Transcript>) -> Self {
        Self { transcript }
    }
}

impl MessageLog for EchoLog {
    fn append(&self, text: &str, role: Role) {
        self.transcript.append(text, role);
        // The user already sees what they typed.
        if role == Role::Assistant {
            if let Some(turn) = self.transcript.last() {
                print_turn(&turn);
            }
        }
    }
}

pub fn print_turn(turn: &ChatTurn) {
    let label = format!("{}:", turn.role.label());
    let label = match turn.role {
        Role::User => label.bright_green().bold(),
        Role::Assistant => label.bright_cyan().bold(),
    };
    println!("{} {}", label, turn.text);
}

fn print_help() {
    println!("{}", "Commands:".bright_white().bold());
    println!("  {}  upload PDF files", "/upload <path>...".cyan());
    println!("  {}        show processed documents", "/documents".cyan());
    println!("  {}          re-fetch the document list", "/refresh".cyan());
    println!("  {}              start a new conversation", "/new".cyan());
    println!("  {}             exit", "/quit".cyan());
    println!("Anything else is sent to the assistant.");
}

fn print_documents(documents: &DocumentList) {
    let names = documents.names();
    if names.is_empty() {
        println!("{}", "No processed documents.".dimmed());
        return;
    }
    println!("{}", "Processed documents:".bright_white().bold());
    for name in names {
        println!("  • {}", name);
    }
}

/// Runs the classic line-mode interface
pub async fn run_classic_cli(controller: Arc<SessionController>, documents: Arc<DocumentList>, server_url: &str) -> Result<()> {
    let header_width = 60;
    println!("{}", "═".repeat(header_width).bright_blue());
    println!("{} {}", "docchat".bright_white().bold(), server_url.cyan());
    println!("{}", "═".repeat(header_width).bright_blue());
    println!("{} Type '/help' for available commands", "💡".yellow());
    println!();

    run_repl(controller, documents, AsyncBufReader::new(tokio::io::stdin())).await
}

/// Reads commands and chat lines from `reader` until EOF or `/quit`.
pub async fn run_repl<R>(controller: Arc<SessionController>, documents: Arc<DocumentList>, mut reader: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        print!("{} ", "You:".bright_green().bold());
        io::stdout().flush()?;

        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break; // EOF
        }
        let input = line.trim();

        if !input.starts_with('/') {
            if controller.submit_text(input).await != ChatOutcome::Ignored {
                println!();
            }
            continue;
        }

        let (command, arg) = input.split_once(' ').unwrap_or((input, ""));
        match command {
            "/quit" | "/exit" => break,
            "/help" => print_help(),
            "/documents" => print_documents(&documents),
            "/refresh" => {
                if controller.refresh_documents().await {
                    print_documents(&documents);
                } else {
                    eprintln!("{}", "Could not refresh documents (see log)".red());
                }
            }
            "/new" => {
                controller.new_conversation();
                println!("{}", "Started a new conversation.".dimmed());
            }
            "/upload" => {
                let selector = &controller.session().file_selector;
                selector.set_value(arg);
                let Some(pending) = controller.begin_upload() else {
                    println!("Usage: /upload <path>...");
                    continue;
                };

                let (selected, failures) = files::read_selection(&pending.paths).await;
                for (path, e) in &failures {
                    controller
                        .session()
                        .log
                        .append(&format!("Could not read {}: {:#}", path.display(), e), Role::Assistant);
                }
                if selected.is_empty() {
                    continue;
                }

                controller.finish_upload(pending, selected).await;
                print_documents(&documents);
            }
            _ => println!("Unknown command: {}", command),
        }
        println!();
    }

    println!("{}", "Goodbye!".bright_white());
    Ok(())
}
