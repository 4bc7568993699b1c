#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for following a Gmail mailbox and reviewing its messages

use anyhow::Context;
use clap::{Parser, Subcommand};
use mailtail::{
    CrosstermTerminal, EditorComposer, Feed, GmailClient, LabelTable, MailService, Message,
    SessionConfig, Verifier, Viewer, feed_line,
};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailtail")]
#[command(about = "Follow a Gmail mailbox and review messages from the terminal")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Session config file (dotenv format, mode 0600)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON (labels, verify)
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print one line per new message
    Tail {
        /// Seconds to wait between poll cycles
        #[arg(long, default_value = "10")]
        poll_secs: u64,

        /// Run a single poll cycle and exit
        #[arg(long)]
        once: bool,

        /// Start from this history id instead of the current one
        #[arg(long)]
        since: Option<u64>,

        /// Maximum number of simultaneous message fetches
        #[arg(long)]
        fetch_limit: Option<NonZeroUsize>,
    },

    /// Review the newest messages of a label interactively
    Review {
        /// Label to review, by name or id
        #[arg(long, default_value = "INBOX")]
        label: String,

        /// Maximum number of messages to load
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Write logs here instead of discarding them
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// List labels
    Labels,

    /// Verify the signature of a message
    Verify {
        /// Message id
        id: String,
    },
}

fn init_logging(command: &Command) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env());
    match command {
        // The terminal belongs to the viewer.
        Command::Review {
            log_file: Some(path),
            ..
        } => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        Command::Review { log_file: None, .. } => builder.with_writer(std::io::sink).init(),
        _ => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args.command)?;

    let config = SessionConfig::load(args.config.as_deref())?;
    let verifier =
        Verifier::new(config.verifier.clone()).with_leading_args(config.verifier_args.clone());
    let client = Arc::new(GmailClient::new(config)?);

    match &args.command {
        Command::Tail {
            poll_secs,
            once,
            since,
            fetch_limit,
        } => {
            cmd_tail(
                client,
                Duration::from_secs(*poll_secs),
                *once,
                *since,
                *fetch_limit,
            )
            .await?;
        }
        Command::Review { label, limit, .. } => {
            cmd_review(client, &verifier, label, *limit).await?;
        }
        Command::Labels => {
            cmd_labels(client.as_ref(), &args).await?;
        }
        Command::Verify { id } => {
            return cmd_verify(client.as_ref(), &verifier, &args, id).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_tail(
    client: Arc<GmailClient>,
    poll: Duration,
    once: bool,
    since: Option<u64>,
    fetch_limit: Option<NonZeroUsize>,
) -> anyhow::Result<()> {
    let mut feed = Feed::new(client);
    if let Some(limit) = fetch_limit {
        feed = feed.with_fetch_limit(limit);
    }
    let cursor = match since {
        Some(cursor) => cursor,
        None => feed.start_cursor().await?,
    };
    info!("Following changes from {}", cursor);

    let print = |message: &Message| println!("{}", feed_line(message));
    if once {
        let next = feed.poll_cycle(cursor, print).await;
        debug!("Next cursor {}", next);
    } else {
        feed.watch(cursor, poll, print).await;
    }
    Ok(())
}

async fn cmd_review(
    client: Arc<GmailClient>,
    verifier: &Verifier,
    label: &str,
    limit: u32,
) -> anyhow::Result<()> {
    let labels = LabelTable::new(client.list_labels().await?);
    let label_id = labels.id(label).unwrap_or(label).to_string();

    let refs = client.list_messages(&label_id, limit).await?;
    let messages: Vec<Message> = Feed::new(Arc::clone(&client))
        .fetch_batch(&refs)
        .await
        .into_iter()
        .flatten()
        .collect();
    if messages.is_empty() {
        println!("No messages in {label}.");
        return Ok(());
    }

    let composer = EditorComposer::from_env();
    let mut viewer = Viewer::new(client, &labels, &composer, verifier, &messages, &label_id);
    let exit = {
        let mut term = CrosstermTerminal::enter()?;
        viewer.run(&mut term).await
    }?;
    debug!("Viewer closed: {:?}", exit);

    let state = viewer.into_state();
    let marked = state.marked();
    if !marked.is_empty() {
        println!("{} message(s) marked:", marked.len());
        for message in messages.iter().filter(|m| marked.contains(&m.id)) {
            println!("{}", feed_line(message));
        }
    }
    Ok(())
}

async fn cmd_labels(client: &GmailClient, args: &Args) -> anyhow::Result<()> {
    let labels = LabelTable::new(client.list_labels().await?).labels();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&labels)?);
    } else if labels.is_empty() {
        println!("No labels found.");
    } else {
        for label in &labels {
            println!("{:<24} {}", label.id, label.name);
        }
    }

    Ok(())
}

async fn cmd_verify(
    client: &GmailClient,
    verifier: &Verifier,
    args: &Args,
    id: &str,
) -> anyhow::Result<ExitCode> {
    let message = client.get_message(id).await?;
    let outcome = verifier.verify(&message.body()).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{outcome}");
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
