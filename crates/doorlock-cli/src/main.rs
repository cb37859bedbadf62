//! Doorlock CLI - lock or unlock the door through doorlockd

use std::io::{BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doorlock_core::{Action, ActionRequest, Response};
use doorlockd::{DoorClient, ListenAddr};

#[derive(Parser)]
#[command(name = "doorlock")]
#[command(about = "Lock or unlock the door through doorlockd", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon address, `tcp:<host>:<port>` or `unix:<path>`
    #[arg(long, global = true, default_value = "tcp:127.0.0.1:5555")]
    connect: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lock the door
    Lock(Credentials),

    /// Unlock the door
    Unlock(Credentials),

    /// Send a raw request payload
    Raw {
        /// Payload sent verbatim as one line
        payload: String,
    },
}

#[derive(clap::Args)]
struct Credentials {
    /// Directory user name
    #[arg(short, long)]
    user: String,

    /// Token shown on the door display
    #[arg(short, long)]
    token: String,

    /// Client address reported to the daemon
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let addr: ListenAddr = cli.connect.parse()?;
    let client = DoorClient::new(addr);

    let response = match cli.command {
        Commands::Lock(credentials) => send(&client, Action::Lock, credentials).await?,
        Commands::Unlock(credentials) => send(&client, Action::Unlock, credentials).await?,
        Commands::Raw { payload } => client.send_raw(&payload).await?,
    };

    println!("{} (code {})", response, response.code());

    if response.door_in_requested_state() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn send(client: &DoorClient, action: Action, credentials: Credentials) -> Result<Response> {
    let password = read_password(&credentials.user)?;

    let request = ActionRequest {
        action: action.as_str().to_string(),
        ip: credentials.ip,
        user: credentials.user,
        password,
        token: credentials.token,
    };

    Ok(client.request(&request).await?)
}

/// Password from `DOORLOCK_PASSWORD`, otherwise one line from stdin
fn read_password(user: &str) -> Result<String> {
    if let Ok(password) = std::env::var("DOORLOCK_PASSWORD") {
        return Ok(password);
    }

    eprint!("Password for {}: ", user);
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
