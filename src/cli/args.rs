use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "voice-console")]
#[command(about = "Talk to a voice agent from the terminal", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Fetch a room token from the backend and show the connection details
    Token,
    /// Toggle the microphone of a running instance
    Toggle,
    /// Ask a running instance to join the room
    Connect,
    /// Ask a running instance to leave the room
    Disconnect,
    /// Show the session status of a running instance
    Status {
        /// Also print the transcript
        #[arg(short, long)]
        transcript: bool,
    },
}
