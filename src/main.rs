use clap::Parser;
use colored::*;
use ragline::main_helper::{AppContext, Args};
use ragline::render::{self, TerminalRenderer};
use ragline::session::{load_session, FileStore};
use ragline::types::{ChatTurn, ConversationId, Session, UploadReceipt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Arc::new(Args::parse());
    let _guard = ragline::logging::init_tracing(&args.log_dir);
    ragline::logging::setup_panic_hook();

    let client = match reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let store = match FileStore::open(&args.session_file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open session store {}: {}", args.session_file, e);
            std::process::exit(1);
        }
    };
    let ctx = AppContext::new(client, args, Arc::new(store));

    println!("{}", "ragline — chat with your documents".bold());
    println!("Backend: {}", ctx.base_url);
    let mut session = load_session(ctx.store.as_ref());
    match &session {
        Some(s) => println!("Signed in as {} <{}>", s.user.name, s.user.email),
        None => render::system_line(
            "Not signed in. Use /login <email> <password> or /signup <name> <email> <password>.",
        ),
    }
    render::system_line("Type /help for commands.");
    println!();

    let mut current_file: Option<UploadReceipt> = None;
    let mut conversation_tag = "default".to_string();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bold());
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                render::error_line(&format!("Failed to read input: {}", e));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let keep_going = handle_command(
                &ctx,
                command,
                &mut session,
                &mut current_file,
                &mut conversation_tag,
            )
            .await;
            if !keep_going {
                break;
            }
            continue;
        }

        let Some(active) = &session else {
            render::system_line("Sign in first: /login <email> <password>");
            continue;
        };
        if current_file.is_none() {
            render::system_line("Please upload a PDF document first to ask questions.");
            continue;
        }

        let turn = ChatTurn {
            conversation_id: ConversationId(format!("{}_{}", active.user.id, conversation_tag)),
            user_text: line.to_string(),
            hybrid: ctx.hybrid_enabled(),
        };

        render::user_header(&active.user);
        render::answer_header();
        let cancel = CancellationToken::new();
        let mut turn_fut = std::pin::pin!(ragline::chat::run_turn(
            &ctx,
            &turn,
            TerminalRenderer::new(),
            cancel.clone(),
        ));
        // Ctrl-C cancels the turn but keeps whatever already streamed.
        let _state = tokio::select! {
            state = &mut turn_fut => state,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                turn_fut.await
            }
        };
        println!();
    }

    render::system_line("Bye.");
}

/// Dispatches one slash command. Returns false when the REPL should exit.
async fn handle_command(
    ctx: &AppContext,
    command: &str,
    session: &mut Option<Session>,
    current_file: &mut Option<UploadReceipt>,
    conversation_tag: &mut String,
) -> bool {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();

    match name {
        "help" => {
            render::system_line("/signup <name> <email> <password>  create an account");
            render::system_line("/login <email> <password>          sign in");
            render::system_line("/logout                            sign out");
            render::system_line("/upload <path>                     index a PDF");
            render::system_line("/clear                             start a fresh conversation");
            render::system_line("/quit                              exit");
        }
        "signup" => {
            if rest.len() != 3 {
                render::system_line("Usage: /signup <name> <email> <password>");
                return true;
            }
            match ragline::auth::signup(ctx, rest[0], rest[1], rest[2]).await {
                Ok(s) => {
                    println!("Signed in as {} <{}>", s.user.name, s.user.email);
                    *session = Some(s);
                }
                Err(e) => render::error_line(&e.inner.to_string()),
            }
        }
        "login" => {
            if rest.len() != 2 {
                render::system_line("Usage: /login <email> <password>");
                return true;
            }
            match ragline::auth::login(ctx, rest[0], rest[1]).await {
                Ok(s) => {
                    println!("Signed in as {} <{}>", s.user.name, s.user.email);
                    *session = Some(s);
                }
                Err(e) => render::error_line(&e.inner.to_string()),
            }
        }
        "logout" => {
            ragline::auth::logout(ctx);
            *session = None;
            *current_file = None;
            render::system_line("Signed out.");
        }
        "upload" => {
            if rest.is_empty() {
                render::system_line("Usage: /upload <path-to-pdf>");
                return true;
            }
            let path = rest.join(" ");
            match ragline::upload::upload_pdf(ctx, Path::new(&path)).await {
                Ok(receipt) => {
                    println!(
                        "Document \"{}\" has been uploaded and indexed ({} pages, {} chunks). You can now ask questions about it.",
                        receipt.filename,
                        receipt
                            .pages
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "?".to_string()),
                        receipt
                            .chunks
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "?".to_string()),
                    );
                    *current_file = Some(receipt);
                }
                Err(e) => render::error_line(&e.inner.to_string()),
            }
        }
        "clear" => {
            // A new conversation id gives the backend a fresh memory scope.
            *conversation_tag = uuid::Uuid::new_v4().simple().to_string();
            render::system_line("Conversation cleared. You can continue asking questions about your document.");
        }
        "quit" | "exit" => return false,
        other => {
            render::system_line(&format!("Unknown command: /{}. Try /help.", other));
        }
    }
    true
}
