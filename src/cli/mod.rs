use crate::config::Config;
use crate::session::SessionSnapshot;
use crate::token::{TokenClient, TokenSource};
use anyhow::Result;

pub mod args;
pub mod service_client;

pub use args::{Cli, CliCommand};
pub use service_client::ServiceClient;

/// Commands forwarded to a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Toggle,
    Connect,
    Disconnect,
}

impl RemoteCommand {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

pub async fn handle_token_command(config: &Config) -> Result<()> {
    let client = TokenClient::from_config(&config.backend)?;
    let details = client.fetch().await?;

    println!("Endpoint: {}", client.endpoint());
    println!("Room:     {}", details.room);
    println!("URL:      {}", details.url);
    println!("Token:    {}", details.token_preview());

    Ok(())
}

pub async fn handle_remote_command(command: RemoteCommand, config: &Config) -> Result<()> {
    let client = ServiceClient::local(config.api.port);
    let response = client.command(command.path()).await?;

    let status = response
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("unknown");
    let microphone = response
        .get("microphone_active")
        .and_then(|m| m.as_bool())
        .unwrap_or(false);

    println!(
        "{}: session {} (microphone {})",
        command.path(),
        status,
        if microphone { "on" } else { "off" }
    );

    Ok(())
}

pub async fn handle_status_command(config: &Config, show_transcript: bool) -> Result<()> {
    let client = ServiceClient::local(config.api.port);
    let snapshot = client.status().await?;

    print!("{}", format_status(&snapshot));

    if show_transcript {
        let lines = client.transcript().await?;
        if lines.is_empty() {
            println!("\nTranscript is empty.");
        } else {
            println!("\nTranscript:");
            for line in lines {
                println!("  {}", line);
            }
        }
    }

    Ok(())
}

fn format_status(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let status = if snapshot.connecting {
        "connecting"
    } else {
        snapshot.status.as_str()
    };
    out.push_str(&format!("Status:     {}\n", status));
    out.push_str(&format!(
        "Microphone: {}\n",
        if snapshot.microphone_active { "on" } else { "off" }
    ));
    if let Some(room) = &snapshot.room {
        out.push_str(&format!("Room:       {}\n", room));
    }
    if let Some(seconds) = snapshot.duration_seconds {
        out.push_str(&format!("Connected:  {}m {:02}s\n", seconds / 60, seconds % 60));
    }
    if let Some(error) = &snapshot.last_error {
        out.push_str(&format!("Error:      {}\n", error));
    }
    out
}
