use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    remote::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SERVER_URL},
    CredentialService, ExportField, HandoffFlowError, MemoryStagingCache, MissingViewActivator,
    PasscodePrompt, RemoteClient, RenderContext, RenderedView, RetrievalController,
    StaticPageInspector,
};
use shared::domain::CycleId;
use storage::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod capabilities;

use capabilities::{FixedPasscode, ProcessViewActivator, StdinPasscodePrompt, SystemClipboard};

const DEFAULT_STAGING_DB: &str = "sqlite://data/staging.db";

#[derive(Parser, Debug)]
#[command(about = "Save credentials to the local server and view them on demand")]
struct Args {
    #[arg(long, global = true, env = "CREDENTIAL_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,
    /// Database shared by the initiating and rendering views.
    #[arg(long, global = true, env = "CREDENTIAL_STAGING_DB", default_value = DEFAULT_STAGING_DB)]
    staging_db: String,
    #[arg(long, global = true, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Store one credential.
    Save {
        #[arg(long)]
        website: Option<String>,
        /// Page address to take the website from when --website is absent.
        #[arg(long)]
        page_url: Option<String>,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Unlock the vault and open the rendering view.
    Retrieve {
        /// Skip the interactive prompt.
        #[arg(long, env = "CREDENTIAL_PASSCODE")]
        passcode: Option<String>,
    },
    /// Show the batch staged for one retrieve cycle.
    View {
        #[arg(long)]
        cycle: CycleId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewCommand {
    Copy { index: usize, field: ExportField },
    Quit,
}

/// Parses one line typed into the rendering view: `u <n>`, `p <n>` or `q`.
/// Item numbers are 1-based as printed.
fn parse_view_command(line: &str) -> Option<ViewCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    let field = match verb {
        "q" | "quit" => return Some(ViewCommand::Quit),
        "u" | "user" => ExportField::Username,
        "p" | "pass" => ExportField::Password,
        _ => return None,
    };
    let number: usize = parts.next()?.parse().ok()?;
    if number == 0 || parts.next().is_some() {
        return None;
    }
    Some(ViewCommand::Copy {
        index: number - 1,
        field,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    match args.command {
        Cmd::View { cycle } => run_view(open_staging(&args.staging_db).await?, cycle).await,
        Cmd::Save {
            website,
            page_url,
            username,
            password,
        } => {
            let client = RemoteClient::with_timeout(
                &args.server_url,
                Duration::from_secs(args.timeout_secs),
            )?;
            let form = SaveForm {
                website,
                page_url,
                username,
                password,
            };
            match run_save(Arc::new(client), form).await {
                Ok(message) => {
                    println!("{message}");
                    Ok(())
                }
                Err(err) => fail(err),
            }
        }
        Cmd::Retrieve { passcode } => {
            let client = RemoteClient::with_timeout(
                &args.server_url,
                Duration::from_secs(args.timeout_secs),
            )?;
            let staging = open_staging(&args.staging_db).await?;
            let views = Arc::new(ProcessViewActivator::new(args.staging_db.clone())?);
            let prompt: Arc<dyn PasscodePrompt> = match passcode {
                Some(passcode) => Arc::new(FixedPasscode(passcode)),
                None => Arc::new(StdinPasscodePrompt),
            };
            let controller = RetrievalController::new(
                Arc::new(client),
                staging,
                views.clone(),
                prompt,
                Arc::new(StaticPageInspector::new(None)),
            );
            match controller.retrieve().await {
                Ok(receipt) => {
                    if let Some(notice) = controller.notice().await {
                        eprintln!("{}", notice.text);
                    }
                    info!(cycle_id = %receipt.cycle_id, count = receipt.credential_count, "handoff complete");
                    views.wait().await
                }
                Err(err) => fail(err),
            }
        }
    }
}

struct SaveForm {
    website: Option<String>,
    page_url: Option<String>,
    username: String,
    password: String,
}

/// Saving never stages or opens the rendering view, so it runs without the
/// staging database.
async fn run_save(
    service: Arc<dyn CredentialService>,
    form: SaveForm,
) -> Result<String, HandoffFlowError> {
    let controller = RetrievalController::new(
        service,
        Arc::new(MemoryStagingCache::new()),
        Arc::new(MissingViewActivator),
        Arc::new(StdinPasscodePrompt),
        Arc::new(StaticPageInspector::new(form.page_url)),
    );
    match form.website {
        Some(website) => controller.set_website(website).await,
        None => controller.prefill_website().await,
    }
    controller.set_username(form.username).await;
    controller.set_password(form.password).await;
    controller.save().await
}

async fn open_staging(database_url: &str) -> Result<Arc<Storage>> {
    let storage = Storage::new(database_url)
        .await
        .with_context(|| format!("failed to open staging database {database_url}"))?;
    Ok(Arc::new(storage))
}

fn fail(err: HandoffFlowError) -> Result<()> {
    error!(error = %err, "request failed");
    eprintln!("{}", err.user_message());
    std::process::exit(1);
}

async fn run_view(staging: Arc<Storage>, cycle: CycleId) -> Result<()> {
    let ctx = RenderContext::new(staging, Arc::new(SystemClipboard));
    let view = ctx.initialize(cycle).await;
    if let Some(status) = view.status_message() {
        println!("{status}");
        if matches!(view, RenderedView::LoadFailed) {
            std::process::exit(1);
        }
        return Ok(());
    }

    for (number, item) in view.items().iter().enumerate() {
        println!(
            "{:>3}. {}  {}  {}",
            number + 1,
            item.website(),
            item.username(),
            item.password()
        );
    }
    println!("Copy with `u <n>` (username) or `p <n>` (password); `q` to close.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_view_command(&line) {
            Some(ViewCommand::Quit) => break,
            Some(ViewCommand::Copy { index, field }) => match view.items().get(index) {
                Some(item) => match item.export(field, ctx.clipboard()).await {
                    Ok(message) => println!("{message}"),
                    Err(err) => println!("{}", err.user_message()),
                },
                None => println!("No item {}.", index + 1),
            },
            None => println!("Unrecognized command."),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
