use crate::constants::PREVIEW_CHARS;
use crate::reducer::AnswerObserver;
use crate::str_utils::first_n_chars_lossy;
use crate::types::{AnswerState, AnswerStatus, PublicUser, SourceRef};
use colored::*;
use std::io::Write;

/// Streams answer snapshots into the terminal. Because `text` only grows
/// while streaming, each update prints just the unseen suffix; a terminal
/// error replaces the line wholesale.
pub struct TerminalRenderer {
    printed: usize,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self { printed: 0 }
    }

    fn print_delta(&mut self, state: &AnswerState) {
        if let Some(delta) = state.text.get(self.printed..) {
            if !delta.is_empty() {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
                self.printed = state.text.len();
            }
        }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerObserver for TerminalRenderer {
    fn on_update(&mut self, state: &AnswerState) {
        match state.status {
            AnswerStatus::Streaming => self.print_delta(state),
            AnswerStatus::Done => {
                self.print_delta(state);
                println!();
                if let Some(sources) = &state.sources {
                    print_sources(sources);
                }
            }
            AnswerStatus::Errored => {
                // Partial text was already echoed; the error supersedes it.
                if self.printed > 0 {
                    println!();
                }
                println!("{}", state.text.red());
            }
            AnswerStatus::Interrupted => {
                self.print_delta(state);
                println!();
                println!("{}", "[answer interrupted]".yellow());
            }
        }
    }
}

pub fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }
    println!();
    println!("{}", format!("Sources ({})", sources.len()).bold());
    for (idx, source) in sources.iter().enumerate() {
        println!(
            "  {} {}  {}",
            format!("#{}", idx + 1).dimmed(),
            format!("Page {}", source.page_label()).cyan(),
            first_n_chars_lossy(&source.preview, PREVIEW_CHARS)
        );
    }
}

pub fn answer_header() {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    println!(
        "{} {}",
        "AI".bold().magenta(),
        format!("({})", timestamp).dimmed()
    );
}

pub fn user_header(user: &PublicUser) {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    println!(
        "{} {}",
        user.initial().bold().green(),
        format!("({})", timestamp).dimmed()
    );
}

pub fn system_line(text: &str) {
    println!("{}", text.dimmed());
}

pub fn error_line(text: &str) {
    println!("{}", text.red());
}
