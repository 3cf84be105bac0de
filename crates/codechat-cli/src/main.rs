mod cli;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use codechat_client::prelude::*;
use codechat_client::init_observability;
use tokio::io::AsyncBufReadExt as _;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_observability(if cli.verbose { "debug" } else { "warn" });

    let config = ClientConfig::from_env()
        .context("invalid client configuration")?
        .base_url(cli.api_url.clone());
    let transport = Arc::new(HttpTransport::new(config).context("failed to create HTTP client")?);

    tracing::debug!(api_url = %cli.api_url, command = cli.command.name(), "dispatching command");
    match cli.command {
        Commands::Ask {
            repo,
            question,
            deadline_secs,
        } => {
            let mut options = SessionOptions::default();
            if let Some(secs) = deadline_secs {
                options = options.deadline(Duration::from_secs(secs));
            }
            ask(transport, repo, question, options).await
        }
        Commands::Chat { repo } => chat(transport, repo).await,
        Commands::Analyze { repo } => {
            let response = transport.analyze(repo).await?;
            println!("{} ({}): {}", response.repo_id, response.status, response.message);
            Ok(())
        }
        Commands::Delete { repo } => {
            let response = transport.delete(repo).await?;
            println!("{}", response.message);
            for (store, deleted) in &response.deleted_from {
                println!("  {store}: {}", if *deleted { "deleted" } else { "not deleted" });
            }
            Ok(())
        }
    }
}

async fn ask(
    transport: Arc<HttpTransport>,
    repo: String,
    question: String,
    options: SessionOptions,
) -> Result<()> {
    let mut stream = StreamSession::new(transport, repo, question)
        .options(options)
        .start()
        .await?;

    let abort = stream.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling answer");
            abort.abort();
        }
    });

    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next_event().await {
        match event {
            SessionEvent::Content { delta, .. } => {
                write!(stdout, "{delta}")?;
                stdout.flush()?;
            }
            SessionEvent::Completed(answer) => {
                writeln!(stdout)?;
                print_sources(&answer.sources);
            }
            SessionEvent::Failed { error, .. } => {
                writeln!(stdout)?;
                return Err(ChatError::Failed(error).into());
            }
            SessionEvent::Cancelled => {
                writeln!(stdout)?;
                eprintln!("cancelled");
            }
            SessionEvent::Streaming | SessionEvent::Sources(_) => {}
        }
    }
    Ok(())
}

async fn chat(transport: Arc<HttpTransport>, repo: String) -> Result<()> {
    // Repository status is not polled; the service rejects unindexed repos.
    let mut conversation = Conversation::new(transport, Repository::ready(repo));
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply_id = match conversation.submit(line).await {
            Ok(id) => id,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };

        loop {
            let update = tokio::select! {
                update = conversation.next_update() => update,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received; cancelling answer");
                    conversation.cancel();
                    Some(TranscriptUpdate::Cancelled)
                }
            };
            let Some(update) = update else { break };
            match update {
                TranscriptUpdate::Delta { delta, .. } => {
                    write!(stdout, "{delta}")?;
                    stdout.flush()?;
                }
                TranscriptUpdate::Completed { .. } => {
                    writeln!(stdout)?;
                    let sources = conversation
                        .transcript()
                        .get(reply_id)
                        .and_then(|message| message.sources.clone())
                        .unwrap_or_default();
                    print_sources(&sources);
                    break;
                }
                TranscriptUpdate::Failed { error, .. } => {
                    writeln!(stdout)?;
                    eprintln!("error: {error}");
                    conversation.dismiss_error();
                    break;
                }
                TranscriptUpdate::Cancelled => {
                    writeln!(stdout)?;
                    eprintln!("cancelled");
                    break;
                }
                TranscriptUpdate::Streaming | TranscriptUpdate::Sources { .. } => {}
            }
        }
    }
    Ok(())
}

fn print_sources(sources: &[String]) {
    if sources.is_empty() {
        return;
    }
    println!("Sources:");
    for source in sources {
        println!("  {source}");
    }
}
