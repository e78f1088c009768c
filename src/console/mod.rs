//! Terminal view of the session.
//!
//! `render` is a pure function of the session state; the service loop calls
//! it whenever the state changes and prints the result.

use crate::session::SessionState;

const RULE: &str = "────────────────────────────────────────";
const EMPTY_TRANSCRIPT: &str = "Waiting for input...";

/// Commands typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Toggle,
    Disconnect,
    ClearTranscript,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses one input line. An empty line toggles, like pressing the button.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "t" | "toggle" => Some(Self::Toggle),
            "d" | "disconnect" => Some(Self::Disconnect),
            "c" | "clear" => Some(Self::ClearTranscript),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

pub const HELP: &str = "Enter/t: toggle microphone  d: disconnect  c: clear transcript  h: help  q: quit";

pub fn render(state: &SessionState, transcript_lines: usize) -> String {
    let mut out = Vec::new();

    out.push(RULE.to_string());
    out.push("Jarvis Voice Assistant".to_string());

    let indicator = if state.is_connected() {
        "● Connected"
    } else {
        "○ Not connected"
    };
    out.push(indicator.to_string());

    if let Some(error) = &state.last_error {
        out.push(format!("! {error}"));
    }

    out.push("Console".to_string());
    if state.transcript.is_empty() {
        out.push(format!("  {EMPTY_TRANSCRIPT}"));
    } else {
        let skip = state.transcript.len().saturating_sub(transcript_lines);
        for line in state.transcript.iter().skip(skip) {
            out.push(format!("  {line}"));
        }
    }

    let button = if state.microphone_active {
        "[ Stop ]"
    } else {
        "[ Mic ]"
    };
    if state.connecting {
        out.push(format!("{button} (disabled)"));
    } else {
        out.push(button.to_string());
    }
    out.push(hint(state).to_string());

    if state.is_connected() {
        out.push("[ Disconnect: d ]".to_string());
    }
    out.push(RULE.to_string());

    out.join("\n")
}

fn hint(state: &SessionState) -> &'static str {
    if state.connecting {
        "Connecting..."
    } else if state.microphone_active {
        "Listening... press Enter to stop"
    } else if state.is_connected() {
        "Press Enter to start speaking"
    } else {
        "Press Enter to connect and speak"
    }
}
