use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use apstra_assistant::client::{ChatClient, ChatSession};

/// Chat with the Apstra Assistant backend from a terminal
#[derive(Parser, Debug)]
#[command(name = "assistant-chat", version)]
struct Args {
    /// Assistant backend URL
    #[arg(long, env = "ASSISTANT_BACKEND_URL", default_value = "http://127.0.0.1:8000")]
    backend: String,

    /// Apstra controller URL
    #[arg(long, env = "APSTRA_URL", default_value = "")]
    apstra_url: String,

    /// Apstra username
    #[arg(long, env = "APSTRA_USERNAME", default_value = "admin")]
    username: String,

    /// Apstra password
    #[arg(long, env = "APSTRA_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Backend access password, when the backend requires one
    #[arg(long, env = "ASSISTANT_ACCESS_PASSWORD", hide_env_values = true)]
    access_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the conversation, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let client = ChatClient::new(&args.backend, args.access_password);
    let session = ChatSession {
        apstra_url: args.apstra_url,
        username: args.username,
        password: args.password,
    };

    let missing = client.missing_fields(&session);
    if !missing.is_empty() {
        eprintln!("Please fill in all required fields. Missing: {}", missing.join(", "));
        std::process::exit(2);
    }

    println!("{}", "Apstra Assistant".bold());
    println!("Ask about blueprints, systems or anomalies. Type /quit to leave.\n");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }

        let turn = client.send(&session, message).await;
        println!("{}\n", turn.render());
    }

    Ok(())
}
