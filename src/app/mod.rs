use crate::api::{ApiCommand, ApiServer};
use crate::config::Config;
use crate::console::{self, ConsoleCommand};
use crate::media::TracingPlayback;
use crate::room::LoopbackRoomFactory;
use crate::session::{SessionController, SessionSettings};
use crate::token::TokenClient;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting voice console");

    let tokens = Arc::new(TokenClient::from_config(&config.backend)?);
    let rooms = Arc::new(LoopbackRoomFactory::new(config.room.agent_identity.clone()));
    let session = SessionController::new(
        SessionSettings::from(&config.room),
        tokens,
        rooms,
        Arc::new(TracingPlayback),
    );

    let (tx, mut rx) = mpsc::channel::<ApiCommand>(10);

    if config.api.enabled {
        let api_server = ApiServer::new(tx.clone(), session.clone(), &config);
        tokio::spawn(async move {
            if let Err(e) = api_server.start().await {
                error!("API server failed: {}", e);
            }
        });
    }

    spawn_renderer(session.clone(), config.ui.transcript_lines);
    spawn_stdin_reader(tx.clone());

    info!("Voice console is ready!");
    info!("{}", console::HELP);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(ApiCommand::ToggleMicrophone) => {
                    let session = session.clone();
                    tokio::spawn(async move { session.toggle_microphone().await });
                }
                Some(ApiCommand::Connect) => {
                    let session = session.clone();
                    tokio::spawn(async move {
                        match session.connect().await {
                            Ok(outcome) => debug!("Connect finished: {:?}", outcome),
                            Err(e) => warn!("Connect failed: {}", e),
                        }
                    });
                }
                Some(ApiCommand::Disconnect) => {
                    let session = session.clone();
                    tokio::spawn(async move { session.disconnect().await });
                }
                Some(ApiCommand::ClearTranscript) => session.clear_transcript(),
                Some(ApiCommand::Shutdown) | None => break,
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    session.shutdown().await;
    info!("Voice console stopped");
    Ok(())
}

/// Prints the console view after every session transition.
fn spawn_renderer(session: SessionController, transcript_lines: usize) {
    let mut updates = session.subscribe();
    tokio::spawn(async move {
        println!("{}", console::render(&session.state(), transcript_lines));
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            println!("{}", console::render(&state, transcript_lines));
        }
    });
}

/// Reads console commands on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<ApiCommand>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            };

            let command = match ConsoleCommand::parse(&line) {
                Some(ConsoleCommand::Toggle) => ApiCommand::ToggleMicrophone,
                Some(ConsoleCommand::Disconnect) => ApiCommand::Disconnect,
                Some(ConsoleCommand::ClearTranscript) => ApiCommand::ClearTranscript,
                Some(ConsoleCommand::Quit) => ApiCommand::Shutdown,
                Some(ConsoleCommand::Help) => {
                    println!("{}", console::HELP);
                    continue;
                }
                None => {
                    println!("Unknown command '{}'. {}", line.trim(), console::HELP);
                    continue;
                }
            };

            if tx.blocking_send(command).is_err() {
                break;
            }
        }
        debug!("stdin closed");
    });
}
