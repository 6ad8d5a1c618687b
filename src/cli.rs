use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chatsync", about = "Realtime chat client (REST + websocket)")]
pub struct Cli {
    /// Path to config file (default: ./chatsync.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bearer token; overrides the configured one
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Stay connected and log chat activity until interrupted
    Run,
    /// Print the chat list, most recent first
    Chats,
    /// Print one page of a chat's history
    Messages {
        #[arg(long)]
        chat: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Send a text message
    Send {
        #[arg(long)]
        chat: String,
        text: String,
    },
    /// Create a chat with the given participants
    NewChat {
        #[arg(required = true)]
        participants: Vec<String>,
        /// Group name, used when there is more than one other participant
        #[arg(long)]
        name: Option<String>,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}
