use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use courier::render::{format_routes, format_sources, print_event};
use courier::{attachments, cookie_path, load_settings, CourierSession, FileArg};
use courier_core::{telemetry, CancellationToken, CookieRedirectStore, OutgoingChatMessage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Chat with Courier assistants")]
struct Cli {
    /// Read settings from this file instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List navigation routes, including every assistant the backend exposes.
    Assistants,
    /// Send a message to an assistant and stream the reply.
    Chat {
        #[arg(long, short)]
        assistant: String,
        /// Attach a file, optionally as PATH=MIME.
        #[arg(long = "file", short = 'f')]
        files: Vec<FileArg>,
        message: String,
    },
    /// Show the path stored for return after signing in.
    Redirect,
}

fn main() -> Result<()> {
    telemetry::init_tracing(telemetry::env_filter_or("warn"))?;
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref())?;
    let store = Arc::new(CookieRedirectStore::new(
        cookie_path(),
        settings.redirect_key.clone(),
    ));
    let runtime = Runtime::new()?;
    let session = CourierSession::new(settings, store)?;

    match cli.command {
        Command::Assistants => runtime.block_on(list_assistants(&session)),
        Command::Chat {
            assistant,
            files,
            message,
        } => runtime.block_on(chat(&session, assistant, files, message)),
        Command::Redirect => {
            match session.stored_redirect() {
                Some(path) => println!("{path}"),
                None => println!("(none)"),
            }
            Ok(())
        }
    }
}

async fn list_assistants(session: &CourierSession) -> Result<()> {
    match session.routes().await {
        Ok(routes) => print!("{}", format_routes(&routes)),
        Err(err) => {
            if session.navigator().pending_sign_in().is_some() {
                return Err(err.into());
            }
            warn!(%err, "showing static routes only");
            print!("{}", format_routes(session.static_routes()));
        }
    }
    Ok(())
}

async fn chat(
    session: &CourierSession,
    assistant: String,
    files: Vec<FileArg>,
    text: String,
) -> Result<()> {
    let message =
        OutgoingChatMessage::new(assistant, text).with_files(attachments::load_all(&files).await?);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut write_failed = None;
    let outcome = session
        .chat(&message, cancel, |event| {
            if let Err(err) = print_event(event) {
                write_failed.get_or_insert(err);
            }
        })
        .await;
    if let Some(err) = write_failed {
        return Err(err.into());
    }

    match outcome {
        Ok(reply) => {
            println!();
            if !reply.sources.is_empty() {
                print!("\nSources:\n{}", format_sources(&reply.sources));
            }
            Ok(())
        }
        Err(err) if err.is_cancelled() => {
            println!();
            eprintln!("cancelled");
            Ok(())
        }
        Err(err) => bail!(err),
    }
}
