//! Interactive question prompt.

use std::sync::Arc;

use anyhow::Result;
use docchat_rag::{Answer, ConversationTurn, Session};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

const HELP: &str = "\
Commands:
  /history   show the conversation so far
  /export    print the conversation as JSON
  /sources   toggle printing retrieved passages
  /help      show this message
  /quit      leave
Anything else is asked as a question.";

/// Longest passage preview printed under an answer.
const PREVIEW_CHARS: usize = 160;

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    History,
    Export,
    ToggleSources,
    Help,
    Unknown(&'a str),
    Ask(&'a str),
    Nothing,
}

fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    match line {
        "" => Command::Nothing,
        "/quit" | "/exit" => Command::Quit,
        "/history" => Command::History,
        "/export" => Command::Export,
        "/sources" => Command::ToggleSources,
        "/help" => Command::Help,
        other if other.starts_with('/') => Command::Unknown(other),
        question => Command::Ask(question),
    }
}

/// Run the prompt until the user quits or closes stdin.
pub async fn run(session: Arc<Session>, mut show_sources: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask a question about your documents (/help for commands).");

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match parse(&line) {
            Command::Nothing => {}
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::History => print_history(&session.history().await),
            Command::Export => {
                println!("{}", serde_json::to_string_pretty(&session.history().await)?)
            }
            Command::ToggleSources => {
                show_sources = !show_sources;
                println!("Sources {}.", if show_sources { "on" } else { "off" });
            }
            Command::Unknown(command) => println!("Unknown command {command}. Try /help."),
            Command::Ask(question) => {
                let _ = editor.add_history_entry(question);
                match session.answer_with_sources(question).await {
                    Ok(answer) => print_answer(&answer, show_sources),
                    Err(e) => {
                        warn!(error = %e, "question failed");
                        eprintln!("error: {e}");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Print an answer, optionally followed by the passages it was grounded on.
pub fn print_answer(answer: &Answer, show_sources: bool) {
    println!("{}", answer.text);
    if show_sources {
        for (rank, source) in answer.sources.iter().enumerate() {
            println!(
                "  [{}] {} #{} (score {:.3}): {}",
                rank + 1,
                source.chunk.source_id,
                source.chunk.sequence_index,
                source.score,
                preview(&source.chunk.text)
            );
        }
    }
}

fn print_history(history: &[ConversationTurn]) {
    if history.is_empty() {
        println!("No questions asked yet.");
    }
    for (number, turn) in history.iter().enumerate() {
        println!("{}. Q: {}\n   A: {}", number + 1, turn.question, turn.answer);
    }
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}
